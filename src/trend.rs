use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use crate::config::CategoryConfig;
use crate::models::{
    Alert, AlertKind, CategoryTrend, Severity, Trend, TrendAnalysisResult, WeekPoint, WeekSummary,
    WeeklyScore,
};
use crate::score::round_two;

pub const DEFAULT_LOOKBACK_WEEKS: u32 = 4;

/// First calendar date inside the lookback window ending today.
pub fn lookback_since(today: NaiveDate, weeks: u32) -> NaiveDate {
    today - Duration::weeks(weeks.max(1) as i64)
}

const SLOPE_THRESHOLD: f64 = 2.0;
const STRENGTH_CAP: f64 = 10.0;
const SCORE_DROP_POINTS: f64 = 15.0;
const WEEK_INDICATOR_POINTS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSignal {
    pub trend: Trend,
    pub strength: f64,
}

/// Least-squares slope over week index versus score. Fewer than two points
/// is a defined degenerate case, not an error.
pub fn classify(scores: &[f64]) -> TrendSignal {
    if scores.len() < 2 {
        return TrendSignal {
            trend: Trend::Stable,
            strength: 0.0,
        };
    }

    let n = scores.len() as f64;
    let x_mean = (scores.len() - 1) as f64 / 2.0;
    let y_mean = scores.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, score) in scores.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (score - y_mean);
        denominator += dx * dx;
    }

    let slope = if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    };

    let trend = if slope > SLOPE_THRESHOLD {
        Trend::Improving
    } else if slope < -SLOPE_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    };

    TrendSignal {
        trend,
        strength: slope.abs().min(STRENGTH_CAP),
    }
}

/// Scan the recent weekly history for sudden drops, sustained decline, and
/// reduced care activity. Rules fire independently; emission order is fixed
/// so reports and tests stay reproducible. Short histories suppress rules
/// rather than erroring.
pub fn detect_alerts(weeks: &[WeekPoint]) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if weeks.len() < 2 {
        return alerts;
    }

    let latest = &weeks[weeks.len() - 1];
    let previous = &weeks[weeks.len() - 2];

    let diff = latest.score_percentage - previous.score_percentage;
    if diff < -SCORE_DROP_POINTS {
        alerts.push(Alert {
            kind: AlertKind::ScoreDrop,
            severity: Severity::High,
            message: format!(
                "Weekly score dropped {:.1} points from the previous week",
                diff.abs()
            ),
            recommendation: "Contact the guardian immediately to check on the senior".to_string(),
        });
    }

    if weeks.len() >= 3 {
        let last_three = &weeks[weeks.len() - 3..];
        let strictly_decreasing = last_three
            .windows(2)
            .all(|pair| pair[0].score_percentage > pair[1].score_percentage);
        if strictly_decreasing {
            alerts.push(Alert {
                kind: AlertKind::ContinuousDecline,
                severity: Severity::Medium,
                message: "Scores have declined for three consecutive weeks".to_string(),
                recommendation: "Consider a professional medical consultation".to_string(),
            });
        }
    }

    if latest.submission_count < 2 && previous.submission_count >= 3 {
        alerts.push(Alert {
            kind: AlertKind::LowActivity,
            severity: Severity::Low,
            message: "Care activity this week is lower than usual".to_string(),
            recommendation: "Verify the caregiver schedule with the care team".to_string(),
        });
    }

    alerts
}

/// Collapse per-category weekly rows into one combined point per week.
/// Totals and maximums add across categories; the submission count takes
/// the per-category maximum, since every category submitted in the same
/// session shares that session.
pub fn combine_weeks(rows: &[WeeklyScore]) -> Vec<WeekPoint> {
    let mut by_week: BTreeMap<NaiveDate, (i32, i32, i32)> = BTreeMap::new();

    for row in rows {
        let entry = by_week.entry(row.week_start).or_insert((0, 0, 0));
        entry.0 += row.total_score;
        entry.1 += row.max_possible_score;
        entry.2 = entry.2.max(row.submission_count);
    }

    by_week
        .into_iter()
        .map(|(week_start, (total, max, submissions))| WeekPoint {
            week_start,
            score_percentage: if max > 0 {
                round_two(total as f64 / max as f64 * 100.0)
            } else {
                0.0
            },
            submission_count: submissions,
            total_score: total,
        })
        .collect()
}

fn week_summaries(weeks: &[WeekPoint]) -> Vec<WeekSummary> {
    weeks
        .iter()
        .enumerate()
        .map(|(i, week)| {
            let trend_indicator = if i == 0 {
                Trend::Stable
            } else {
                let delta = week.score_percentage - weeks[i - 1].score_percentage;
                if delta > WEEK_INDICATOR_POINTS {
                    Trend::Improving
                } else if delta < -WEEK_INDICATOR_POINTS {
                    Trend::Declining
                } else {
                    Trend::Stable
                }
            };
            WeekSummary {
                week_start: week.week_start,
                score_percentage: week.score_percentage,
                trend_indicator,
                submission_count: week.submission_count,
                total_score: week.total_score,
            }
        })
        .collect()
}

fn category_trends(
    rows: &[WeeklyScore],
    config: &CategoryConfig,
) -> BTreeMap<String, CategoryTrend> {
    let mut series: BTreeMap<String, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for row in rows {
        series
            .entry(row.category_code.clone())
            .or_default()
            .push((row.week_start, row.score_percentage));
    }

    let mut trends = BTreeMap::new();
    for (category, mut points) in series {
        if points.len() < 2 {
            continue;
        }
        points.sort_by_key(|(week, _)| *week);
        let values: Vec<f64> = points.iter().map(|(_, score)| *score).collect();
        let signal = classify(&values);
        let current = *values.last().unwrap_or(&0.0);
        let first = *values.first().unwrap_or(&0.0);
        let average = values.iter().sum::<f64>() / values.len() as f64;
        trends.insert(
            category.clone(),
            CategoryTrend {
                display_name: config.display_name(&category).to_string(),
                current_score: current,
                trend: signal.trend,
                change: round_two(current - first),
                average: round_two(average),
            },
        );
    }
    trends
}

fn recommendations(trend: Trend, alerts: &[Alert]) -> Vec<String> {
    let mut recs: Vec<String> = Vec::new();

    match trend {
        Trend::Improving => {
            recs.push("Condition is improving; keep the current care routine".to_string());
            recs.push(
                "Regular check-in calls from the guardian will reinforce the progress".to_string(),
            );
        }
        Trend::Declining => {
            recs.push("The decline is concerning; review the care plan".to_string());
            recs.push("Consult medical staff about adjusting the care approach".to_string());
            recs.push("Increase guardian contact to strengthen emotional support".to_string());
        }
        Trend::Stable => {
            recs.push("Condition is holding steady".to_string());
            recs.push("Continue the current care routine".to_string());
        }
        Trend::InsufficientData => {
            recs.push(
                "Collect more weekly checklist data before drawing conclusions".to_string(),
            );
        }
    }

    for alert in alerts {
        match alert.kind {
            AlertKind::ScoreDrop => recs.push(
                "Rule out an emergency and contact medical staff if needed".to_string(),
            ),
            AlertKind::ContinuousDecline => {
                recs.push("Schedule a comprehensive health checkup".to_string())
            }
            AlertKind::LowActivity => {}
        }
    }

    recs
}

/// Assemble the full trend analysis for a senior over the lookback window.
/// With fewer than two combined weeks the result is the defined
/// insufficient-data outcome, distinct from a stable trend.
pub fn analyze(
    senior_id: Uuid,
    rows: &[WeeklyScore],
    period_weeks: u32,
    config: &CategoryConfig,
) -> TrendAnalysisResult {
    let weeks = combine_weeks(rows);
    let weekly_data = week_summaries(&weeks);

    if weeks.len() < 2 {
        return TrendAnalysisResult {
            senior_id,
            period_weeks,
            trend: Trend::InsufficientData,
            trend_strength: 0.0,
            average_score: 0.0,
            score_change: 0.0,
            message: Some("Not enough weekly data to analyze yet".to_string()),
            weekly_data,
            category_trends: BTreeMap::new(),
            alerts: Vec::new(),
            recommendations: recommendations(Trend::InsufficientData, &[]),
        };
    }

    let percentages: Vec<f64> = weeks.iter().map(|week| week.score_percentage).collect();
    let signal = classify(&percentages);
    let alerts = detect_alerts(&weeks);
    let average = percentages.iter().sum::<f64>() / percentages.len() as f64;
    let change = percentages[percentages.len() - 1] - percentages[0];
    let recs = recommendations(signal.trend, &alerts);

    TrendAnalysisResult {
        senior_id,
        period_weeks,
        trend: signal.trend,
        trend_strength: signal.strength,
        average_score: round_two(average),
        score_change: round_two(change),
        message: None,
        weekly_data,
        category_trends: category_trends(rows, config),
        alerts,
        recommendations: recs,
    }
}
