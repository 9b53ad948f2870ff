use chrono::{Local, NaiveDate, Utc};
use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::models::{
    Frequency, ScheduledTask, StudySession, Subject, TaskStatus, Test, TestType, Topic,
};
use crate::planner::{DailyPlan, PlanPreferences, PlannerConfig, generate_daily_plan};
use crate::schedule::{
    SchedulePeriod, advance_status, build_manual_task, derive_status, resolve_period_end,
    toggle_day,
};
use crate::stats::{
    DashboardStats, SubjectPerformance, daily_hours, dashboard_stats, format_hours, last_n_days,
    subject_performance,
};
use crate::store::{
    load_sessions, load_subjects, load_tasks, load_tests, save_sessions, save_subjects,
    save_tasks, save_tests,
};
use crate::sync::{remove_subject_tasks, sync_subject, sync_topic_toggle};
use crate::timer::StopwatchRegistry;
use crate::validation::{AppErrorExt, JsonValidateExt, ValidationResponse};

type ApiError = Custom<Json<ValidationResponse>>;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRequest {
    #[validate(length(min = 1, message = "Subject name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "At least one topic is required"))]
    pub topics: Vec<String>,
    pub color: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub custom_days: Option<Vec<u8>>,
    #[serde(default)]
    pub auto_add_to_calendar: Option<bool>,
}

impl SubjectRequest {
    fn check_rules(&self) -> Result<(), AppError> {
        if self.end_date < self.start_date {
            return Err(AppError::Validation(
                "End date must not be before the start date".to_string(),
            ));
        }
        if let Some(days) = &self.custom_days {
            if days.iter().any(|d| *d > 6) {
                return Err(AppError::Validation(
                    "Custom days must be between 0 (Sunday) and 6 (Saturday)".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Builds the stored subject. An edit replaces the whole object but
    /// keeps the subject id, the accumulated hour counters, and the identity
    /// and completion of topics that line up positionally with the new list.
    fn into_subject(self, existing: Option<&Subject>) -> Subject {
        let topics = self
            .topics
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let prior = existing.and_then(|s| s.topics.get(i));
                Topic {
                    id: prior
                        .map(|t| t.id.clone())
                        .unwrap_or_else(|| Uuid::new_v4().to_string()),
                    name: name.trim().to_string(),
                    completed: prior.map(|t| t.completed).unwrap_or(false),
                }
            })
            .collect();

        Subject {
            id: existing
                .map(|s| s.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: self.name.trim().to_string(),
            topics,
            color: self.color,
            start_date: self.start_date,
            end_date: self.end_date,
            total_hours: existing.map(|s| s.total_hours).unwrap_or(0.0),
            completed_hours: existing.map(|s| s.completed_hours).unwrap_or(0.0),
            in_progress_hours: existing.map(|s| s.in_progress_hours).unwrap_or(0.0),
            status: self.status,
            frequency: self.frequency,
            custom_days: self.custom_days,
            auto_add_to_calendar: self.auto_add_to_calendar,
        }
    }
}

#[derive(Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ManualTaskRequest {
    pub subject_id: String,
    #[validate(length(min = 1, message = "Select at least one topic"))]
    pub topic_ids: Vec<String>,
    #[serde(default)]
    pub period: SchedulePeriod,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[validate(range(min = 0.5, message = "Target hours must be at least 0.5"))]
    pub target_hours: f64,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize, Validate, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[validate(range(min = 0.0, message = "Score cannot be negative"))]
    pub score: f64,
    #[validate(range(exclusive_min = 0.0, message = "Total marks must be positive"))]
    pub total_marks: f64,
    pub test_type: TestType,
    #[serde(default)]
    pub subject_id: Option<String>,
    #[serde(default)]
    pub subject_name: Option<String>,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub unit_name: Option<String>,
}

#[derive(Deserialize, Validate, Clone)]
pub struct SessionRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[validate(range(min = 0.5, max = 24.0, message = "Hours must be between 0.5 and 24"))]
    pub hours: f64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateResponse {
    pub subjects: Vec<Subject>,
    pub tests: Vec<Test>,
    pub study_sessions: Vec<StudySession>,
    pub scheduled_tasks: Vec<ScheduledTask>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: ScheduledTask,
    pub effective_status: TaskStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyHoursPoint {
    pub date: NaiveDate,
    pub hours: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    #[serde(flatten)]
    pub dashboard: DashboardStats,
    pub subject_performance: Vec<SubjectPerformance>,
    pub daily_hours: Vec<DailyHoursPoint>,
    pub study_dates: Vec<NaiveDate>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopwatchResponse {
    pub running: bool,
    pub elapsed_seconds: i64,
    pub elapsed_hours: f64,
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}

#[get("/users/<user_id>/state")]
pub async fn api_get_state(
    user_id: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<StateResponse>, ApiError> {
    let subjects = load_subjects(db, user_id).await.validate_custom()?;
    let tests = load_tests(db, user_id).await.validate_custom()?;
    let study_sessions = load_sessions(db, user_id).await.validate_custom()?;
    let scheduled_tasks = load_tasks(db, user_id).await.validate_custom()?;

    Ok(Json(StateResponse {
        subjects,
        tests,
        study_sessions,
        scheduled_tasks,
    }))
}

#[post("/users/<user_id>/subjects", data = "<subject>")]
pub async fn api_create_subject(
    user_id: &str,
    subject: Json<SubjectRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Subject>>, ApiError> {
    let validated = subject.validate_custom()?;
    validated.check_rules().validate_custom()?;

    let mut subjects = load_subjects(db, user_id).await.validate_custom()?;
    let mut tasks = load_tasks(db, user_id).await.validate_custom()?;

    let new_subject = validated.into_subject(None);
    let tasks_changed = sync_subject(&new_subject, &mut tasks);
    subjects.push(new_subject.clone());

    save_subjects(db, user_id, &subjects).await.validate_custom()?;
    if tasks_changed {
        save_tasks(db, user_id, &tasks).await.validate_custom()?;
    }

    Ok(Custom(Status::Created, Json(new_subject)))
}

#[put("/users/<user_id>/subjects/<subject_id>", data = "<subject>")]
pub async fn api_update_subject(
    user_id: &str,
    subject_id: &str,
    subject: Json<SubjectRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Subject>, ApiError> {
    let validated = subject.validate_custom()?;
    validated.check_rules().validate_custom()?;

    let mut subjects = load_subjects(db, user_id).await.validate_custom()?;
    let mut tasks = load_tasks(db, user_id).await.validate_custom()?;

    let position = subjects
        .iter()
        .position(|s| s.id == subject_id)
        .ok_or_else(|| AppError::NotFound(format!("Subject {} not found", subject_id)))
        .validate_custom()?;

    let updated = validated.into_subject(Some(&subjects[position]));
    let tasks_changed = sync_subject(&updated, &mut tasks);
    subjects[position] = updated.clone();

    save_subjects(db, user_id, &subjects).await.validate_custom()?;
    if tasks_changed {
        save_tasks(db, user_id, &tasks).await.validate_custom()?;
    }

    Ok(Json(updated))
}

#[delete("/users/<user_id>/subjects/<subject_id>")]
pub async fn api_delete_subject(
    user_id: &str,
    subject_id: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    let mut subjects = load_subjects(db, user_id).await.validate_custom()?;
    let mut tasks = load_tasks(db, user_id).await.validate_custom()?;

    let before = subjects.len();
    subjects.retain(|s| s.id != subject_id);
    if subjects.len() == before {
        return Err(AppError::NotFound(format!("Subject {} not found", subject_id)))
            .validate_custom();
    }

    let tasks_changed = remove_subject_tasks(subject_id, &mut tasks);

    save_subjects(db, user_id, &subjects).await.validate_custom()?;
    if tasks_changed {
        save_tasks(db, user_id, &tasks).await.validate_custom()?;
    }

    Ok(Status::NoContent)
}

#[post("/users/<user_id>/subjects/<subject_id>/topics/<topic_id>/toggle")]
pub async fn api_toggle_topic(
    user_id: &str,
    subject_id: &str,
    topic_id: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Subject>, ApiError> {
    let mut subjects = load_subjects(db, user_id).await.validate_custom()?;
    let mut tasks = load_tasks(db, user_id).await.validate_custom()?;

    let subject = subjects
        .iter_mut()
        .find(|s| s.id == subject_id)
        .ok_or_else(|| AppError::NotFound(format!("Subject {} not found", subject_id)))
        .validate_custom()?;
    let topic = subject
        .topics
        .iter_mut()
        .find(|t| t.id == topic_id)
        .ok_or_else(|| AppError::NotFound(format!("Topic {} not found", topic_id)))
        .validate_custom()?;

    topic.completed = !topic.completed;
    let updated = subject.clone();
    let tasks_changed = sync_topic_toggle(&updated, &mut tasks);

    save_subjects(db, user_id, &subjects).await.validate_custom()?;
    if tasks_changed {
        save_tasks(db, user_id, &tasks).await.validate_custom()?;
    }

    Ok(Json(updated))
}

#[get("/users/<user_id>/tasks")]
pub async fn api_get_tasks(
    user_id: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<TaskView>>, ApiError> {
    let mut tasks = load_tasks(db, user_id).await.validate_custom()?;
    tasks.sort_by_key(|t| t.start_date);

    let now = today();
    let views = tasks
        .into_iter()
        .map(|task| TaskView {
            effective_status: derive_status(&task, now),
            task,
        })
        .collect();

    Ok(Json(views))
}

#[post("/users/<user_id>/tasks", data = "<task>")]
pub async fn api_create_task(
    user_id: &str,
    task: Json<ManualTaskRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<ScheduledTask>>, ApiError> {
    let validated = task.validate_custom()?;

    let subjects = load_subjects(db, user_id).await.validate_custom()?;
    let subject = subjects
        .iter()
        .find(|s| s.id == validated.subject_id)
        .ok_or_else(|| AppError::NotFound(format!("Subject {} not found", validated.subject_id)))
        .validate_custom()?;

    let end_date = resolve_period_end(validated.period, validated.start_date, validated.end_date)
        .validate_custom()?;
    let new_task = build_manual_task(
        subject,
        &validated.topic_ids,
        validated.start_date,
        end_date,
        validated.target_hours,
        validated.notes.clone(),
    )
    .validate_custom()?;

    let mut tasks = load_tasks(db, user_id).await.validate_custom()?;
    tasks.push(new_task.clone());
    save_tasks(db, user_id, &tasks).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(new_task)))
}

#[post("/users/<user_id>/tasks/<task_id>/cycle")]
pub async fn api_cycle_task_status(
    user_id: &str,
    task_id: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ScheduledTask>, ApiError> {
    let mut tasks = load_tasks(db, user_id).await.validate_custom()?;

    let task = tasks
        .iter_mut()
        .find(|t| t.id == task_id)
        .ok_or_else(|| AppError::NotFound(format!("Task {} not found", task_id)))
        .validate_custom()?;

    task.status = advance_status(&task.status);
    let updated = task.clone();

    save_tasks(db, user_id, &tasks).await.validate_custom()?;

    Ok(Json(updated))
}

#[post("/users/<user_id>/tasks/<task_id>/days/<date>/toggle")]
pub async fn api_toggle_task_day(
    user_id: &str,
    task_id: &str,
    date: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ScheduledTask>, ApiError> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid date: {}", date)))
        .validate_custom()?;

    let mut tasks = load_tasks(db, user_id).await.validate_custom()?;

    let task = tasks
        .iter_mut()
        .find(|t| t.id == task_id)
        .ok_or_else(|| AppError::NotFound(format!("Task {} not found", task_id)))
        .validate_custom()?;

    toggle_day(task, date);
    let updated = task.clone();

    save_tasks(db, user_id, &tasks).await.validate_custom()?;

    Ok(Json(updated))
}

#[delete("/users/<user_id>/tasks/<task_id>")]
pub async fn api_delete_task(
    user_id: &str,
    task_id: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    let mut tasks = load_tasks(db, user_id).await.validate_custom()?;

    let before = tasks.len();
    tasks.retain(|t| t.id != task_id);
    if tasks.len() == before {
        return Err(AppError::NotFound(format!("Task {} not found", task_id))).validate_custom();
    }

    save_tasks(db, user_id, &tasks).await.validate_custom()?;

    Ok(Status::NoContent)
}

#[post("/users/<user_id>/tests", data = "<test>")]
pub async fn api_create_test(
    user_id: &str,
    test: Json<TestRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<Test>>, ApiError> {
    let validated = test.validate_custom()?;

    let new_test = Test {
        id: Uuid::new_v4().to_string(),
        date: validated.date.unwrap_or_else(today),
        score: validated.score,
        total_marks: validated.total_marks,
        test_type: validated.test_type,
        subject_id: validated.subject_id,
        subject_name: validated.subject_name,
        unit_id: validated.unit_id,
        unit_name: validated.unit_name,
    };

    let mut tests = load_tests(db, user_id).await.validate_custom()?;
    tests.push(new_test.clone());
    save_tests(db, user_id, &tests).await.validate_custom()?;

    Ok(Custom(Status::Created, Json(new_test)))
}

#[delete("/users/<user_id>/tests/<test_id>")]
pub async fn api_delete_test(
    user_id: &str,
    test_id: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, ApiError> {
    let mut tests = load_tests(db, user_id).await.validate_custom()?;

    let before = tests.len();
    tests.retain(|t| t.id != test_id);
    if tests.len() == before {
        return Err(AppError::NotFound(format!("Test {} not found", test_id))).validate_custom();
    }

    save_tests(db, user_id, &tests).await.validate_custom()?;

    Ok(Status::NoContent)
}

#[post("/users/<user_id>/sessions", data = "<session>")]
pub async fn api_create_session(
    user_id: &str,
    session: Json<SessionRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<StudySession>>, ApiError> {
    let validated = session.validate_custom()?;

    let new_session = StudySession {
        id: Uuid::new_v4().to_string(),
        date: validated.date.unwrap_or_else(today),
        hours: validated.hours,
    };

    let mut sessions = load_sessions(db, user_id).await.validate_custom()?;
    sessions.push(new_session.clone());
    save_sessions(db, user_id, &sessions).await.validate_custom()?;

    tracing::info!(date = %new_session.date, "Logged {}", format_hours(new_session.hours, true));

    Ok(Custom(Status::Created, Json(new_session)))
}

#[get("/users/<user_id>/stats")]
pub async fn api_get_stats(
    user_id: &str,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let subjects = load_subjects(db, user_id).await.validate_custom()?;
    let tests = load_tests(db, user_id).await.validate_custom()?;
    let sessions = load_sessions(db, user_id).await.validate_custom()?;

    let now = today();
    let days = last_n_days(7, now);
    let hours = daily_hours(&sessions, &days);
    let daily = days
        .into_iter()
        .zip(hours)
        .map(|(date, hours)| DailyHoursPoint { date, hours })
        .collect();

    let mut study_dates: Vec<NaiveDate> = sessions.iter().map(|s| s.date).collect();
    study_dates.sort_unstable();
    study_dates.dedup();

    Ok(Json(StatsResponse {
        dashboard: dashboard_stats(&subjects, &tests, &sessions, now),
        subject_performance: subject_performance(&subjects, &tests),
        daily_hours: daily,
        study_dates,
    }))
}

fn stopwatch_response(registry: &StopwatchRegistry, user_id: &str) -> Json<StopwatchResponse> {
    let now = Utc::now();
    let stopwatch = registry.snapshot(user_id);
    Json(StopwatchResponse {
        running: stopwatch.running,
        elapsed_seconds: stopwatch.elapsed_seconds(now),
        elapsed_hours: round2(stopwatch.elapsed_hours(now)),
    })
}

#[get("/users/<user_id>/stopwatch")]
pub fn api_get_stopwatch(
    user_id: &str,
    registry: &State<StopwatchRegistry>,
) -> Json<StopwatchResponse> {
    stopwatch_response(registry, user_id)
}

#[post("/users/<user_id>/stopwatch/start")]
pub fn api_start_stopwatch(
    user_id: &str,
    registry: &State<StopwatchRegistry>,
) -> Json<StopwatchResponse> {
    registry.with(user_id, |sw| sw.start(Utc::now()));
    stopwatch_response(registry, user_id)
}

#[post("/users/<user_id>/stopwatch/pause")]
pub fn api_pause_stopwatch(
    user_id: &str,
    registry: &State<StopwatchRegistry>,
) -> Json<StopwatchResponse> {
    registry.with(user_id, |sw| sw.pause(Utc::now()));
    stopwatch_response(registry, user_id)
}

#[post("/users/<user_id>/stopwatch/reset")]
pub fn api_reset_stopwatch(
    user_id: &str,
    registry: &State<StopwatchRegistry>,
) -> Json<StopwatchResponse> {
    registry.with(user_id, |sw| sw.reset());
    stopwatch_response(registry, user_id)
}

/// Stops the stopwatch and logs the elapsed time as a study session. Too
/// little time to round to a loggable value leaves the stopwatch paused with
/// its total intact, so the user can resume instead of losing the segment.
#[post("/users/<user_id>/stopwatch/log")]
pub async fn api_log_stopwatch(
    user_id: &str,
    registry: &State<StopwatchRegistry>,
    db: &State<Pool<Sqlite>>,
) -> Result<Custom<Json<StudySession>>, ApiError> {
    let seconds = registry.with(user_id, |sw| {
        sw.pause(Utc::now());
        sw.accumulated_seconds
    });

    let hours = round2(seconds as f64 / 3600.0);
    if hours < 0.01 {
        return Err(AppError::Validation(
            "Not enough time recorded to log a session".to_string(),
        ))
        .validate_custom();
    }

    let new_session = StudySession {
        id: Uuid::new_v4().to_string(),
        date: today(),
        hours,
    };

    let mut sessions = load_sessions(db, user_id).await.validate_custom()?;
    sessions.push(new_session.clone());
    save_sessions(db, user_id, &sessions).await.validate_custom()?;

    registry.with(user_id, |sw| sw.reset());
    tracing::info!("Logged {} from the stopwatch", format_hours(hours, true));

    Ok(Custom(Status::Created, Json(new_session)))
}

#[post("/users/<user_id>/plan", data = "<prefs>")]
pub async fn api_generate_plan(
    user_id: &str,
    prefs: Json<PlanPreferences>,
    db: &State<Pool<Sqlite>>,
    http: &State<reqwest::Client>,
) -> Result<Json<DailyPlan>, ApiError> {
    let prefs = prefs.validate_custom()?;

    let subjects = load_subjects(db, user_id).await.validate_custom()?;
    if subjects.is_empty() {
        return Err(AppError::Validation(
            "Add subjects before requesting a study plan".to_string(),
        ))
        .validate_custom();
    }
    let tasks = load_tasks(db, user_id).await.validate_custom()?;

    let config = PlannerConfig::from_env().validate_custom()?;
    let plan = generate_daily_plan(http, &config, &subjects, &tasks, &prefs, today())
        .await
        .validate_custom()?;

    Ok(Json(plan))
}

#[catch(404)]
pub fn not_found() -> Json<ValidationResponse> {
    Json(ValidationResponse::with_error("resource", "Resource not found"))
}

#[catch(422)]
pub fn unprocessable() -> Json<ValidationResponse> {
    Json(ValidationResponse::with_error(
        "request",
        "Request body is missing required fields or has the wrong shape",
    ))
}
