//! Keeps each in-progress subject mirrored into at most one auto-generated
//! calendar task.
//!
//! All functions here are pure over the task collection and return whether
//! they changed anything, so callers can skip a store write when a re-run
//! was a no-op.

use tracing::debug;
use uuid::Uuid;

use crate::models::{Frequency, ScheduledTask, Subject, TaskOrigin, TaskStatus, Topic};

const WEEKDAY_ABBREVS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Target hours for an auto-synced task: two hours per pending topic with a
/// five hour floor.
pub fn target_hours_for(pending_count: usize) -> f64 {
    (pending_count * 2).max(5) as f64
}

/// Human-readable description of a subject's study frequency, e.g.
/// "Weekdays (Mon-Fri)" or "Custom: Mon, Wed, Fri".
pub fn frequency_label(subject: &Subject) -> String {
    match subject.frequency {
        Some(Frequency::Weekdays) => "Weekdays (Mon-Fri)".to_string(),
        Some(Frequency::Custom) => {
            let days: Vec<&str> = subject
                .custom_days
                .as_deref()
                .unwrap_or_default()
                .iter()
                .filter_map(|d| WEEKDAY_ABBREVS.get(*d as usize).copied())
                .collect();
            if days.is_empty() {
                "Custom".to_string()
            } else {
                format!("Custom: {}", days.join(", "))
            }
        }
        Some(Frequency::Everyday) | None => "Everyday".to_string(),
    }
}

fn sync_notes(subject: &Subject, pending_count: usize) -> String {
    let plural = if pending_count == 1 { "" } else { "s" };
    format!(
        "Auto-scheduled {} pending topic{}. Frequency: {}",
        pending_count,
        plural,
        frequency_label(subject)
    )
}

fn linked_auto_task(tasks: &[ScheduledTask], subject_id: &str) -> Option<usize> {
    tasks.iter().position(|t| {
        t.origin == TaskOrigin::Auto && t.subject_id.as_deref() == Some(subject_id)
    })
}

fn build_auto_task(subject: &Subject, pending: &[&Topic]) -> ScheduledTask {
    ScheduledTask {
        id: Uuid::new_v4().to_string(),
        subject_id: Some(subject.id.clone()),
        subject_name: subject.name.clone(),
        topic_ids: pending.iter().map(|t| t.id.clone()).collect(),
        topic_names: pending.iter().map(|t| t.name.clone()).collect(),
        start_date: subject.start_date,
        end_date: subject.end_date,
        status: TaskStatus::InProgress,
        target_hours: target_hours_for(pending.len()),
        completed_hours: subject.completed_hours,
        notes: Some(sync_notes(subject, pending.len())),
        color: subject.color.clone(),
        daily_log: Default::default(),
        origin: TaskOrigin::Auto,
    }
}

/// Reacts to a subject being created or edited (full replacement).
///
/// While the subject is in progress with auto-add enabled and has pending
/// topics, exactly one auto task mirrors it; otherwise no auto task exists.
/// Updates happen in place so the task id is stable across edits, and the
/// task's own status is left alone (only creation forces in-progress).
pub fn sync_subject(subject: &Subject, tasks: &mut Vec<ScheduledTask>) -> bool {
    let linked = linked_auto_task(tasks, &subject.id);

    if !subject.wants_auto_task() {
        return remove_linked(tasks, linked, &subject.id);
    }

    let pending = subject.pending_topics();
    if pending.is_empty() {
        return remove_linked(tasks, linked, &subject.id);
    }

    match linked {
        None => {
            debug!(subject_id = %subject.id, "Creating auto-synced task");
            tasks.push(build_auto_task(subject, &pending));
            true
        }
        Some(idx) => {
            let task = &mut tasks[idx];
            let desired_topic_ids: Vec<String> = pending.iter().map(|t| t.id.clone()).collect();
            let desired_topic_names: Vec<String> = pending.iter().map(|t| t.name.clone()).collect();
            let desired_notes = Some(sync_notes(subject, pending.len()));
            let desired_target = target_hours_for(pending.len());

            let unchanged = task.subject_name == subject.name
                && task.topic_ids == desired_topic_ids
                && task.topic_names == desired_topic_names
                && task.start_date == subject.start_date
                && task.end_date == subject.end_date
                && task.target_hours == desired_target
                && task.completed_hours == subject.completed_hours
                && task.notes == desired_notes
                && task.color == subject.color;
            if unchanged {
                return false;
            }

            debug!(subject_id = %subject.id, task_id = %task.id, "Refreshing auto-synced task");
            task.subject_name = subject.name.clone();
            task.topic_ids = desired_topic_ids;
            task.topic_names = desired_topic_names;
            task.start_date = subject.start_date;
            task.end_date = subject.end_date;
            task.target_hours = desired_target;
            task.completed_hours = subject.completed_hours;
            task.notes = desired_notes;
            task.color = subject.color.clone();
            true
        }
    }
}

/// Reacts to a single topic being flipped on a subject.
///
/// Unlike the full-edit path, running out of pending topics here does not
/// delete the task: it empties the topic lists, forces completed, and zeroes
/// the target instead. Only the topic lists and target are refreshed
/// otherwise; dates, notes, and the rest stay as they were.
pub fn sync_topic_toggle(subject: &Subject, tasks: &mut [ScheduledTask]) -> bool {
    let Some(idx) = linked_auto_task(tasks, &subject.id) else {
        return false;
    };
    let task = &mut tasks[idx];

    let pending = subject.pending_topics();
    if pending.is_empty() {
        let unchanged = task.topic_ids.is_empty()
            && task.topic_names.is_empty()
            && task.status == TaskStatus::Completed
            && task.target_hours == 0.0;
        if unchanged {
            return false;
        }
        debug!(subject_id = %subject.id, task_id = %task.id, "All topics done, completing task");
        task.topic_ids.clear();
        task.topic_names.clear();
        task.status = TaskStatus::Completed;
        task.target_hours = 0.0;
        return true;
    }

    let desired_topic_ids: Vec<String> = pending.iter().map(|t| t.id.clone()).collect();
    let desired_topic_names: Vec<String> = pending.iter().map(|t| t.name.clone()).collect();
    let desired_target = target_hours_for(pending.len());

    let unchanged = task.topic_ids == desired_topic_ids
        && task.topic_names == desired_topic_names
        && task.target_hours == desired_target;
    if unchanged {
        return false;
    }

    task.topic_ids = desired_topic_ids;
    task.topic_names = desired_topic_names;
    task.target_hours = desired_target;
    true
}

/// Deletion cascade: removes every task linked to the subject, regardless of
/// origin. A subject owns its calendar entries; the reverse is not true.
pub fn remove_subject_tasks(subject_id: &str, tasks: &mut Vec<ScheduledTask>) -> bool {
    let before = tasks.len();
    tasks.retain(|t| t.subject_id.as_deref() != Some(subject_id));
    if tasks.len() != before {
        debug!(subject_id, removed = before - tasks.len(), "Removed linked tasks");
        true
    } else {
        false
    }
}

fn remove_linked(tasks: &mut Vec<ScheduledTask>, linked: Option<usize>, subject_id: &str) -> bool {
    match linked {
        Some(idx) => {
            debug!(subject_id, task_id = %tasks[idx].id, "Removing auto-synced task");
            tasks.remove(idx);
            true
        }
        None => false,
    }
}
