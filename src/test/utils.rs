use std::sync::Once;

use chrono::NaiveDate;
use rocket::local::asynchronous::Client;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::models::{
    Frequency, ScheduledTask, StudySession, Subject, TaskOrigin, TaskStatus, Test, TestType,
    Topic,
};

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

fn slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

pub struct SubjectBuilder {
    subject: Subject,
}

impl SubjectBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            subject: Subject {
                id: format!("{}-id", slug(name)),
                name: name.to_string(),
                topics: Vec::new(),
                color: "bg-chart-1/10 text-chart-1".to_string(),
                start_date: date("2025-11-01"),
                end_date: date("2025-12-31"),
                total_hours: 0.0,
                completed_hours: 0.0,
                in_progress_hours: 0.0,
                status: None,
                frequency: None,
                custom_days: None,
                auto_add_to_calendar: None,
            },
        }
    }

    pub fn topics(mut self, topics: &[(&str, bool)]) -> Self {
        let subject_id = self.subject.id.clone();
        self.subject.topics = topics
            .iter()
            .enumerate()
            .map(|(i, (name, completed))| Topic {
                id: format!("{}-t{}", subject_id, i + 1),
                name: name.to_string(),
                completed: *completed,
            })
            .collect();
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.subject.status = Some(status);
        self
    }

    pub fn in_progress(self) -> Self {
        self.status(TaskStatus::InProgress)
    }

    pub fn auto_add(mut self) -> Self {
        self.subject.auto_add_to_calendar = Some(true);
        self
    }

    pub fn dates(mut self, start: &str, end: &str) -> Self {
        self.subject.start_date = date(start);
        self.subject.end_date = date(end);
        self
    }

    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.subject.frequency = Some(frequency);
        self
    }

    pub fn custom_days(mut self, days: &[u8]) -> Self {
        self.subject.custom_days = Some(days.to_vec());
        self
    }

    pub fn completed_hours(mut self, hours: f64) -> Self {
        self.subject.completed_hours = hours;
        self
    }

    pub fn build(self) -> Subject {
        self.subject
    }
}

pub struct TaskBuilder {
    task: ScheduledTask,
}

impl TaskBuilder {
    pub fn new(subject_name: &str) -> Self {
        Self {
            task: ScheduledTask {
                id: format!("{}-task", slug(subject_name)),
                subject_id: None,
                subject_name: subject_name.to_string(),
                topic_ids: Vec::new(),
                topic_names: Vec::new(),
                start_date: date("2025-11-10"),
                end_date: date("2025-11-20"),
                status: TaskStatus::NotStarted,
                target_hours: 5.0,
                completed_hours: 0.0,
                notes: None,
                color: "bg-chart-1/10 text-chart-1".to_string(),
                daily_log: Default::default(),
                origin: TaskOrigin::Auto,
            },
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.task.id = id.to_string();
        self
    }

    pub fn subject_id(mut self, subject_id: &str) -> Self {
        self.task.subject_id = Some(subject_id.to_string());
        self
    }

    pub fn dates(mut self, start: &str, end: &str) -> Self {
        self.task.start_date = date(start);
        self.task.end_date = date(end);
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn manual(mut self) -> Self {
        self.task.origin = TaskOrigin::Manual;
        self
    }

    pub fn build(self) -> ScheduledTask {
        self.task
    }
}

pub fn session(id: &str, date_str: &str, hours: f64) -> StudySession {
    StudySession {
        id: id.to_string(),
        date: date(date_str),
        hours,
    }
}

pub fn mock_test(id: &str, score: f64, total_marks: f64) -> Test {
    Test {
        id: id.to_string(),
        date: date("2025-11-14"),
        score,
        total_marks,
        test_type: TestType::Mock,
        subject_id: None,
        subject_name: None,
        unit_id: None,
        unit_name: None,
    }
}

pub fn subject_test(id: &str, subject_id: &str, score: f64, total_marks: f64) -> Test {
    Test {
        test_type: TestType::Subject,
        subject_id: Some(subject_id.to_string()),
        ..mock_test(id, score, total_marks)
    }
}

pub async fn setup_test_pool() -> Pool<Sqlite> {
    init_test_logging();

    // One connection so every query sees the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub async fn setup_test_client() -> (Client, Pool<Sqlite>) {
    let pool = setup_test_pool().await;

    let client = Client::tracked(crate::init_rocket(pool.clone()).await)
        .await
        .expect("Failed to build test client");

    (client, pool)
}
