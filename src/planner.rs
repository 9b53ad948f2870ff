//! Client for the external study-plan generation service.
//!
//! One request carries the full planning context (subjects, scheduled tasks,
//! preferences) as a prompt; the response is expected to be a single JSON
//! document describing today's plan. Model output is not trusted: parsing
//! falls back to extracting the first balanced JSON object from the text,
//! and anything still unusable fails loudly with the raw response attached.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::error::AppError;
use crate::models::{ScheduledTask, Subject};
use crate::schedule::derive_status;

static TIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}:\d{2}$").expect("time pattern"));
static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\n?").expect("fence pattern"));

const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

impl PlannerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let api_key = std::env::var("PLANNER_API_KEY").map_err(|_| {
            AppError::ExternalService("PLANNER_API_KEY is not configured".to_string())
        })?;
        Ok(Self {
            api_url: std::env::var("PLANNER_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            api_key,
            model: std::env::var("PLANNER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct PlanPreferences {
    #[validate(range(min = 1.0, max = 12.0, message = "Study hours must be between 1 and 12"))]
    pub study_hours_per_day: f64,
    #[validate(regex(path = *TIME_RE, message = "Start time must be HH:MM"))]
    pub preferred_start_time: String,
    #[validate(regex(path = *TIME_RE, message = "End time must be HH:MM"))]
    pub preferred_end_time: String,
    #[validate(range(min = 5, max = 60, message = "Break must be between 5 and 60 minutes"))]
    pub break_minutes: u32,
    pub additional_notes: Option<String>,
}

impl Default for PlanPreferences {
    fn default() -> Self {
        Self {
            study_hours_per_day: 6.0,
            preferred_start_time: "09:00".to_string(),
            preferred_end_time: "21:00".to_string(),
            break_minutes: 15,
            additional_notes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTask {
    pub subject: String,
    pub topic: String,
    pub duration: f64,
    pub time_slot: String,
    pub priority: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyPlan {
    pub date: String,
    pub tasks: Vec<PlanTask>,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default)]
    pub motivation: String,
}

/// Renders the planning context into the prompt sent to the model.
pub fn build_prompt(
    subjects: &[Subject],
    tasks: &[ScheduledTask],
    prefs: &PlanPreferences,
    today: NaiveDate,
) -> String {
    let subject_lines: Vec<String> = subjects
        .iter()
        .map(|s| {
            let topics: Vec<String> = s
                .topics
                .iter()
                .map(|t| {
                    format!("{} {}", t.name, if t.completed { "(done)" } else { "(pending)" })
                })
                .collect();
            format!(
                "- {}: {} topics pending\n  Topics: {}",
                s.name,
                s.pending_topics().len(),
                topics.join(", ")
            )
        })
        .collect();

    let task_lines = if tasks.is_empty() {
        "No specific scheduled tasks.".to_string()
    } else {
        tasks
            .iter()
            .map(|t| {
                format!(
                    "- {}: {} (Deadline: {}, Status: {}, Progress: {}/{}h)",
                    t.subject_name,
                    t.topic_names.join(", "),
                    t.end_date,
                    derive_status(t, today),
                    t.completed_hours,
                    t.target_hours
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are an AI study planner for exam preparation. Based on the following information, \
create an optimized daily study plan for today ({today}).

**Subjects and Topics:**
{subjects}

**Scheduled Tasks:**
{tasks}

**Study Preferences:**
- Total study hours per day: {hours} hours
- Preferred time: {start} - {end}
- Break duration: {break_minutes} minutes
- Additional notes: {notes}

IMPORTANT: Return ONLY valid JSON. Do NOT include any explanation, markdown, code block, or \
extra text. The response must be a single valid JSON object, nothing else. If you cannot \
answer, return an empty JSON object {{}}.

JSON format:
{{
  \"date\": \"{today}\",
  \"tasks\": [
    {{
      \"subject\": \"subject name\",
      \"topic\": \"specific topic to study\",
      \"duration\": 1.5,
      \"timeSlot\": \"09:00 - 10:30\",
      \"priority\": \"high\"
    }}
  ],
  \"tips\": [\"tip 1\", \"tip 2\", \"tip 3\"],
  \"motivation\": \"motivational message\"
}}

Consider:
1. Prioritize tasks with approaching deadlines from 'Scheduled Tasks'.
2. Balance between different subjects.
3. Include breaks between study sessions ({break_minutes} min).
4. Focus on pending topics.
5. Keep sessions focused (45-90 minutes per topic).
6. Ensure all 'timeSlot' entries fit between '{start}' and '{end}'.
7. The total 'duration' of all tasks should sum up to approximately {hours} hours.",
        today = today,
        subjects = subject_lines.join("\n"),
        tasks = task_lines,
        hours = prefs.study_hours_per_day,
        start = prefs.preferred_start_time,
        end = prefs.preferred_end_time,
        break_minutes = prefs.break_minutes,
        notes = prefs.additional_notes.as_deref().unwrap_or("None"),
    )
}

/// Finds the first balanced `{...}` object in free-form text.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses model output into a plan. Tries the text as-is (minus code
/// fences), then the first balanced JSON object inside it. A plan without a
/// `tasks` array is rejected.
pub fn extract_plan(text: &str) -> Result<DailyPlan, AppError> {
    let cleaned = FENCE_RE.replace_all(text, "");
    let cleaned = cleaned.trim();

    let value: Option<serde_json::Value> = serde_json::from_str(cleaned).ok().or_else(|| {
        first_json_object(cleaned).and_then(|candidate| serde_json::from_str(candidate).ok())
    });

    let Some(value) = value else {
        return Err(AppError::ExternalService(format!(
            "Planner response is not valid JSON. Raw response: {}",
            text
        )));
    };

    if !value.get("tasks").is_some_and(serde_json::Value::is_array) {
        return Err(AppError::ExternalService(format!(
            "Planner response has no task list. Raw response: {}",
            text
        )));
    }

    serde_json::from_value(value).map_err(|e| {
        AppError::ExternalService(format!(
            "Planner response does not match the expected plan shape ({}). Raw response: {}",
            e, text
        ))
    })
}

/// Calls the planning service and returns the parsed daily plan. Any failure
/// (transport, non-2xx, missing content, unparseable JSON) aborts with the
/// diagnostic detail attached; no partial plan is ever returned.
#[instrument(skip_all, fields(model = %config.model))]
pub async fn generate_daily_plan(
    client: &reqwest::Client,
    config: &PlannerConfig,
    subjects: &[Subject],
    tasks: &[ScheduledTask],
    prefs: &PlanPreferences,
    today: NaiveDate,
) -> Result<DailyPlan, AppError> {
    info!("Requesting daily study plan");
    let prompt = build_prompt(subjects, tasks, prefs, today);

    let body = serde_json::json!({
        "contents": [{ "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "temperature": 0.7,
            "topK": 40,
            "topP": 0.95,
            "maxOutputTokens": 8192,
            "responseMimeType": "application/json",
        },
    });

    let response = client
        .post(config.endpoint())
        .header("x-goog-api-key", &config.api_key)
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    let raw = response.text().await?;
    if !status.is_success() {
        warn!(status = %status, "Planner API returned an error");
        return Err(AppError::ExternalService(format!(
            "Planner API error {}: {}",
            status, raw
        )));
    }

    let envelope: serde_json::Value = serde_json::from_str(&raw).map_err(|_| {
        AppError::ExternalService(format!("Planner API returned non-JSON body: {}", raw))
    })?;

    let text = envelope["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .ok_or_else(|| {
            AppError::ExternalService(format!(
                "Planner response missing expected content. Full response: {}",
                raw
            ))
        })?;

    extract_plan(text)
}
