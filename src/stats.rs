//! Read-only figures derived from the raw collections. Nothing here is ever
//! persisted; every value is recomputed from current state on demand.
//!
//! All functions take `today` explicitly so they stay deterministic under
//! test.

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::models::{StudySession, Subject, Test, TestType};

/// Consecutive calendar days ending today with at least one study session.
///
/// Walks the unique session dates newest-first; day `i` of the walk must be
/// exactly `i` days before today or the streak stops. A day without a
/// session breaks the run with no partial credit.
pub fn study_streak(sessions: &[StudySession], today: NaiveDate) -> u32 {
    let mut dates: Vec<NaiveDate> = sessions.iter().map(|s| s.date).collect();
    dates.sort_unstable();
    dates.dedup();
    dates.reverse();

    let mut streak: u32 = 0;
    for date in dates {
        if (today - date).num_days() == i64::from(streak) {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

/// Mean percentage score over the given tests; 0 for an empty subset.
pub fn average_score<'a>(tests: impl IntoIterator<Item = &'a Test>) -> f64 {
    let mut total = 0.0;
    let mut count = 0u32;
    for test in tests {
        total += test.score / test.total_marks * 100.0;
        count += 1;
    }
    if count == 0 { 0.0 } else { total / f64::from(count) }
}

/// Percentage of a subject's topics marked complete; 0 for no topics.
pub fn subject_completion(subject: &Subject) -> f64 {
    if subject.topics.is_empty() {
        return 0.0;
    }
    let done = subject.topics.iter().filter(|t| t.completed).count();
    done as f64 / subject.topics.len() as f64 * 100.0
}

/// Completed and total topic counts across all subjects.
pub fn topic_totals(subjects: &[Subject]) -> (u32, u32) {
    let total = subjects.iter().map(|s| s.topics.len()).sum::<usize>() as u32;
    let done = subjects
        .iter()
        .flat_map(|s| &s.topics)
        .filter(|t| t.completed)
        .count() as u32;
    (done, total)
}

/// Hours studied since the most recent Sunday (inclusive).
pub fn weekly_hours(sessions: &[StudySession], today: NaiveDate) -> f64 {
    let week_start = today - Days::new(u64::from(today.weekday().num_days_from_sunday()));
    sessions
        .iter()
        .filter(|s| s.date >= week_start)
        .map(|s| s.hours)
        .sum()
}

/// The last `n` calendar days ending today, oldest first.
pub fn last_n_days(n: u64, today: NaiveDate) -> Vec<NaiveDate> {
    (0..n)
        .rev()
        .filter_map(|i| today.checked_sub_days(Days::new(i)))
        .collect()
}

/// Total hours per day, aligned with `days`.
pub fn daily_hours(sessions: &[StudySession], days: &[NaiveDate]) -> Vec<f64> {
    days.iter()
        .map(|day| {
            sessions
                .iter()
                .filter(|s| s.date == *day)
                .map(|s| s.hours)
                .sum()
        })
        .collect()
}

/// Formats an hour count for display, e.g. "2.5h", or "2h 30m" in detailed
/// mode.
pub fn format_hours(hours: f64, detailed: bool) -> String {
    if !detailed {
        return format!("{}h", hours);
    }
    let whole = hours.floor();
    let minutes = ((hours - whole) * 60.0).round() as u32;
    if minutes == 0 {
        format!("{}h", whole as i64)
    } else {
        format!("{}h {}m", whole as i64, minutes)
    }
}

/// Headline dashboard figures.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub study_streak: u32,
    pub weekly_hours: f64,
    pub average_score: f64,
    pub topics_completed: u32,
    pub total_topics: u32,
    pub completion_percent: f64,
}

/// Assembles the dashboard from current collections. The average covers mock
/// tests only, matching the headline card.
pub fn dashboard_stats(
    subjects: &[Subject],
    tests: &[Test],
    sessions: &[StudySession],
    today: NaiveDate,
) -> DashboardStats {
    let (topics_completed, total_topics) = topic_totals(subjects);
    let completion_percent = if total_topics == 0 {
        0.0
    } else {
        f64::from(topics_completed) / f64::from(total_topics) * 100.0
    };
    DashboardStats {
        study_streak: study_streak(sessions, today),
        weekly_hours: weekly_hours(sessions, today),
        average_score: average_score(tests.iter().filter(|t| t.test_type == TestType::Mock)),
        topics_completed,
        total_topics,
        completion_percent,
    }
}

/// Per-subject average versus a fixed target, for the analytics chart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformance {
    pub subject: String,
    pub score: f64,
    pub target_score: f64,
    pub completion: f64,
}

const TARGET_SCORE: f64 = 80.0;

pub fn subject_performance(subjects: &[Subject], tests: &[Test]) -> Vec<SubjectPerformance> {
    subjects
        .iter()
        .map(|subject| SubjectPerformance {
            subject: subject.name.clone(),
            score: average_score(
                tests
                    .iter()
                    .filter(|t| t.subject_id.as_deref() == Some(subject.id.as_str())),
            ),
            target_score: TARGET_SCORE,
            completion: subject_completion(subject),
        })
        .collect()
}
