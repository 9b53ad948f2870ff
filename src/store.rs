//! Document store for per-user collections.
//!
//! Each of the four collections is one row in `progress_records`, keyed by
//! `(student_id, category)`; every save replaces the whole payload for that
//! key. There is no delta format and no concurrency token: the last write
//! wins, which is acceptable for a single user's personal data.

use std::fmt;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ScheduledTask, StudySession, Subject, Test};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Subjects,
    MockTests,
    StudySessions,
    ScheduledTasks,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Subjects => "subjects",
            Category::MockTests => "mock_tests",
            Category::StudySessions => "study_sessions",
            Category::ScheduledTasks => "scheduled_tasks",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProgressRecord {
    pub id: String,
    pub student_id: String,
    pub category: String,
    pub payload: String,
    pub updated_at: NaiveDateTime,
}

#[instrument(skip(pool))]
pub async fn fetch_record(
    pool: &Pool<Sqlite>,
    student_id: &str,
    category: Category,
) -> Result<Option<ProgressRecord>, AppError> {
    let record = sqlx::query_as::<_, ProgressRecord>(
        "SELECT id, student_id, category, payload, updated_at
         FROM progress_records
         WHERE student_id = ? AND category = ?",
    )
    .bind(student_id)
    .bind(category.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Replaces the stored payload for `(student_id, category)`, creating the
/// record on first save. One UPDATE or INSERT per call, so each save is a
/// single atomic replace.
#[instrument(skip(pool, payload))]
pub async fn save_record(
    pool: &Pool<Sqlite>,
    student_id: &str,
    category: Category,
    payload: &str,
) -> Result<ProgressRecord, AppError> {
    info!("Saving progress record");
    let now = Utc::now().naive_utc();

    let existing = fetch_record(pool, student_id, category).await?;
    let id = match existing {
        Some(record) => {
            sqlx::query("UPDATE progress_records SET payload = ?, updated_at = ? WHERE id = ?")
                .bind(payload)
                .bind(now)
                .bind(&record.id)
                .execute(pool)
                .await?;
            record.id
        }
        None => {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO progress_records (id, student_id, category, payload, updated_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(student_id)
            .bind(category.as_str())
            .bind(payload)
            .bind(now)
            .execute(pool)
            .await?;
            id
        }
    };

    Ok(ProgressRecord {
        id,
        student_id: student_id.to_string(),
        category: category.as_str().to_string(),
        payload: payload.to_string(),
        updated_at: now,
    })
}

/// Loads a collection, treating a missing record as empty. A payload that no
/// longer parses is logged and also loaded as empty rather than failing the
/// request.
pub async fn load_collection<T: DeserializeOwned>(
    pool: &Pool<Sqlite>,
    student_id: &str,
    category: Category,
) -> Result<Vec<T>, AppError> {
    let Some(record) = fetch_record(pool, student_id, category).await? else {
        return Ok(Vec::new());
    };

    let parsed: Result<serde_json::Value, _> = serde_json::from_str(&record.payload);
    let items = parsed
        .ok()
        .and_then(|mut v| v.get_mut(category.as_str()).map(serde_json::Value::take))
        .and_then(|v| serde_json::from_value::<Vec<T>>(v).ok());

    match items {
        Some(items) => Ok(items),
        None => {
            warn!(%category, record_id = %record.id, "Stored payload is malformed, loading empty");
            Ok(Vec::new())
        }
    }
}

/// Serializes the full collection under its category key and overwrites the
/// stored record, mirroring the payload shape the store has always held:
/// `{"<category>": [...]}`.
pub async fn save_collection<T: Serialize>(
    pool: &Pool<Sqlite>,
    student_id: &str,
    category: Category,
    items: &[T],
) -> Result<(), AppError> {
    let mut envelope = serde_json::Map::new();
    envelope.insert(category.as_str().to_string(), serde_json::to_value(items)?);
    let payload = serde_json::Value::Object(envelope).to_string();

    save_record(pool, student_id, category, &payload).await?;
    Ok(())
}

pub async fn load_subjects(pool: &Pool<Sqlite>, user: &str) -> Result<Vec<Subject>, AppError> {
    load_collection(pool, user, Category::Subjects).await
}

pub async fn save_subjects(
    pool: &Pool<Sqlite>,
    user: &str,
    subjects: &[Subject],
) -> Result<(), AppError> {
    save_collection(pool, user, Category::Subjects, subjects).await
}

pub async fn load_tests(pool: &Pool<Sqlite>, user: &str) -> Result<Vec<Test>, AppError> {
    load_collection(pool, user, Category::MockTests).await
}

pub async fn save_tests(pool: &Pool<Sqlite>, user: &str, tests: &[Test]) -> Result<(), AppError> {
    save_collection(pool, user, Category::MockTests, tests).await
}

pub async fn load_sessions(
    pool: &Pool<Sqlite>,
    user: &str,
) -> Result<Vec<StudySession>, AppError> {
    load_collection(pool, user, Category::StudySessions).await
}

pub async fn save_sessions(
    pool: &Pool<Sqlite>,
    user: &str,
    sessions: &[StudySession],
) -> Result<(), AppError> {
    save_collection(pool, user, Category::StudySessions, sessions).await
}

pub async fn load_tasks(pool: &Pool<Sqlite>, user: &str) -> Result<Vec<ScheduledTask>, AppError> {
    load_collection(pool, user, Category::ScheduledTasks).await
}

pub async fn save_tasks(
    pool: &Pool<Sqlite>,
    user: &str,
    tasks: &[ScheduledTask],
) -> Result<(), AppError> {
    save_collection(pool, user, Category::ScheduledTasks, tasks).await
}
