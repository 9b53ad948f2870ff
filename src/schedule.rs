use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{DayMark, ScheduledTask, Subject, TaskOrigin, TaskStatus};

/// Computes the status a task should display on a given day.
///
/// An explicit `completed` is sticky and never reverts through dates. Any
/// status outside the three date-driven values is passed through untouched.
/// Otherwise the date window decides, at day granularity: before the window
/// the task has not started, after it the task is overdue, inside it the
/// task is in progress.
///
/// Callers must re-derive on every read; the result is never written back
/// unless the user explicitly completes the task.
pub fn derive_status(task: &ScheduledTask, today: NaiveDate) -> TaskStatus {
    match &task.status {
        TaskStatus::Completed => TaskStatus::Completed,
        TaskStatus::Other(_) => task.status.clone(),
        _ => {
            if today < task.start_date {
                TaskStatus::NotStarted
            } else if today > task.end_date {
                TaskStatus::Overdue
            } else {
                TaskStatus::InProgress
            }
        }
    }
}

/// The user-driven status cycle: not-started, then in-progress, then
/// completed, wrapping back around. Anything else (overdue included) lands on
/// not-started. Overdue is never a target of the cycle; it only ever comes
/// out of `derive_status`.
pub fn advance_status(status: &TaskStatus) -> TaskStatus {
    match status {
        TaskStatus::NotStarted => TaskStatus::InProgress,
        TaskStatus::InProgress => TaskStatus::Completed,
        _ => TaskStatus::NotStarted,
    }
}

/// Flips the per-day completion mark for `date`, treating an absent entry as
/// pending. Only that one key changes. Dates outside the task's interval are
/// accepted; the log is a free-form per-day overlay and does not feed back
/// into the task status.
pub fn toggle_day(task: &mut ScheduledTask, date: NaiveDate) -> DayMark {
    let next = task
        .daily_log
        .get(&date)
        .copied()
        .unwrap_or(DayMark::Pending)
        .flipped();
    task.daily_log.insert(date, next);
    next
}

/// Period choice for manually scheduled tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulePeriod {
    #[default]
    Weekly,
    Custom,
}

/// Resolves the end date for a manual schedule. A weekly period always spans
/// seven days; a custom period requires an explicit end no earlier than the
/// start.
pub fn resolve_period_end(
    period: SchedulePeriod,
    start: NaiveDate,
    end: Option<NaiveDate>,
) -> Result<NaiveDate, AppError> {
    match period {
        SchedulePeriod::Weekly => start
            .checked_add_days(Days::new(6))
            .ok_or_else(|| AppError::Validation("Start date is out of range".to_string())),
        SchedulePeriod::Custom => {
            let end = end.ok_or_else(|| {
                AppError::Validation("End date is required for a custom period".to_string())
            })?;
            if end < start {
                return Err(AppError::Validation(
                    "End date must not be before the start date".to_string(),
                ));
            }
            Ok(end)
        }
    }
}

/// Builds a manually scheduled task from a subject and a chosen subset of its
/// topics. The result starts life as not-started and is never touched by the
/// subject synchronizer afterwards.
pub fn build_manual_task(
    subject: &Subject,
    topic_ids: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
    target_hours: f64,
    notes: Option<String>,
) -> Result<ScheduledTask, AppError> {
    let selected: Vec<_> = subject
        .topics
        .iter()
        .filter(|t| topic_ids.contains(&t.id))
        .collect();

    if selected.is_empty() {
        return Err(AppError::Validation(
            "None of the selected topics belong to this subject".to_string(),
        ));
    }

    Ok(ScheduledTask {
        id: Uuid::new_v4().to_string(),
        subject_id: Some(subject.id.clone()),
        subject_name: subject.name.clone(),
        topic_ids: selected.iter().map(|t| t.id.clone()).collect(),
        topic_names: selected.iter().map(|t| t.name.clone()).collect(),
        start_date,
        end_date,
        status: TaskStatus::NotStarted,
        target_hours,
        completed_hours: 0.0,
        notes: notes.filter(|n| !n.trim().is_empty()),
        color: subject.color.clone(),
        daily_log: Default::default(),
        origin: TaskOrigin::Manual,
    })
}
