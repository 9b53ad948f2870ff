use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle status shared by subjects and scheduled tasks.
///
/// Unknown strings coming back from the store are preserved in `Other` so a
/// read-modify-write cycle never destroys an externally injected status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    NotStarted,
    InProgress,
    Completed,
    Overdue,
    Other(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::NotStarted => "not-started",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Overdue => "overdue",
            TaskStatus::Other(s) => s,
        }
    }
}

impl From<&str> for TaskStatus {
    fn from(value: &str) -> Self {
        match value {
            "not-started" => TaskStatus::NotStarted,
            "in-progress" => TaskStatus::InProgress,
            "completed" => TaskStatus::Completed,
            "overdue" => TaskStatus::Overdue,
            other => TaskStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TaskStatus::from(raw.as_str()))
    }
}

/// How often a subject is meant to be studied; drives the note text on the
/// auto-synced calendar task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Everyday,
    Weekdays,
    Custom,
}

/// Where a scheduled task came from. The synchronizer only manages `Auto`
/// tasks; `Manual` tasks change through user actions alone.
///
/// Stored records predating the discriminant deserialize as `Auto`, which is
/// the behavior those records effectively had.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOrigin {
    #[default]
    Auto,
    Manual,
}

/// Per-day completion mark on a scheduled task. Independent of the task's
/// overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayMark {
    Done,
    Pending,
}

impl DayMark {
    pub fn flipped(self) -> Self {
        match self {
            DayMark::Done => DayMark::Pending,
            DayMark::Pending => DayMark::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Mock,
    Subject,
    Unit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub topics: Vec<Topic>,
    pub color: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_hours: f64,
    pub completed_hours: f64,
    pub in_progress_hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_days: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_add_to_calendar: Option<bool>,
}

impl Subject {
    /// Topics not yet marked complete, in subject order.
    pub fn pending_topics(&self) -> Vec<&Topic> {
        self.topics.iter().filter(|t| !t.completed).collect()
    }

    /// Whether this subject should have an auto-synced calendar task.
    pub fn wants_auto_task(&self) -> bool {
        matches!(self.status, Some(TaskStatus::InProgress))
            && self.auto_add_to_calendar.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    pub subject_name: String,
    pub topic_ids: Vec<String>,
    pub topic_names: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: TaskStatus,
    pub target_hours: f64,
    pub completed_hours: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub color: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub daily_log: BTreeMap<NaiveDate, DayMark>,
    #[serde(default)]
    pub origin: TaskOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub id: String,
    pub date: NaiveDate,
    pub score: f64,
    pub total_marks: f64,
    pub test_type: TestType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudySession {
    pub id: String,
    pub date: NaiveDate,
    pub hours: f64,
}
