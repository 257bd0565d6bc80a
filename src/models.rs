use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SeniorRecord {
    pub id: Uuid,
    pub full_name: String,
    pub guardian_email: String,
}

/// Raw checklist payloads arrive as one of three shapes; every shape maps
/// to a bounded scale score in `score::answer_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Bool(bool),
    Integer(i32),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ChecklistAnswer {
    pub category_code: String,
    pub value: AnswerValue,
    pub note: Option<String>,
}

/// Per-category tally for a single care session. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionScore {
    pub total_score: i32,
    pub answer_count: i32,
    pub max_possible_score: i32,
}

impl SessionScore {
    pub fn percentage(&self) -> f64 {
        if self.max_possible_score <= 0 {
            return 0.0;
        }
        let raw = self.total_score as f64 / self.max_possible_score as f64 * 100.0;
        (raw * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStatus {
    Improving,
    Stable,
    Declining,
}

impl WeekStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeekStatus::Improving => "improving",
            WeekStatus::Stable => "stable",
            WeekStatus::Declining => "declining",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "improving" => WeekStatus::Improving,
            "declining" => WeekStatus::Declining,
            _ => WeekStatus::Stable,
        }
    }
}

/// Persisted weekly aggregate, keyed by (senior, category, week start).
/// Rows merge within a week but are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyScore {
    pub senior_id: Uuid,
    pub category_code: String,
    pub week_start: NaiveDate,
    pub total_score: i32,
    pub max_possible_score: i32,
    pub score_percentage: f64,
    pub submission_count: i32,
    pub status: WeekStatus,
}

/// One week of a senior's combined history, the unit the trend classifier
/// and alert detector read.
#[derive(Debug, Clone, PartialEq)]
pub struct WeekPoint {
    pub week_start: NaiveDate,
    pub score_percentage: f64,
    pub submission_count: i32,
    pub total_score: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ScoreDrop,
    ContinuousDecline,
    LowActivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSummary {
    pub week_start: NaiveDate,
    pub score_percentage: f64,
    pub trend_indicator: Trend,
    pub submission_count: i32,
    pub total_score: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTrend {
    pub display_name: String,
    pub current_score: f64,
    pub trend: Trend,
    pub change: f64,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAnalysisResult {
    pub senior_id: Uuid,
    pub period_weeks: u32,
    pub trend: Trend,
    pub trend_strength: f64,
    pub average_score: f64,
    pub score_change: f64,
    pub message: Option<String>,
    pub weekly_data: Vec<WeekSummary>,
    pub category_trends: BTreeMap<String, CategoryTrend>,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<String>,
}
