use std::fmt::Write;

use crate::models::{SeniorRecord, Severity, Trend, TrendAnalysisResult};

fn trend_label(trend: Trend) -> &'static str {
    match trend {
        Trend::Improving => "improving",
        Trend::Declining => "declining",
        Trend::Stable => "stable",
        Trend::InsufficientData => "insufficient data",
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "HIGH",
        Severity::Medium => "MEDIUM",
        Severity::Low => "LOW",
    }
}

pub fn build_report(senior: &SeniorRecord, result: &TrendAnalysisResult) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Weekly Care Trend Report");
    let _ = writeln!(
        output,
        "Senior: {} (guardian {})",
        senior.full_name, senior.guardian_email
    );
    let _ = writeln!(
        output,
        "Window: last {} weeks, overall trend {}",
        result.period_weeks,
        trend_label(result.trend)
    );

    if let Some(message) = &result.message {
        let _ = writeln!(output);
        let _ = writeln!(output, "{message}.");
    } else {
        let _ = writeln!(
            output,
            "Average score {:.2}%, net change {:+.2} points (strength {:.2})",
            result.average_score, result.score_change, result.trend_strength
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Scores");

    if result.weekly_data.is_empty() {
        let _ = writeln!(output, "No weekly scores recorded in this window.");
    } else {
        for week in &result.weekly_data {
            let _ = writeln!(
                output,
                "- week of {}: {:.2}% ({}) across {} sessions",
                week.week_start,
                week.score_percentage,
                trend_label(week.trend_indicator),
                week.submission_count
            );
        }
    }

    if !result.category_trends.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Category Trends");
        for (code, category) in &result.category_trends {
            let _ = writeln!(
                output,
                "- {} ({}): {:.2}% now, {} ({:+.2} change, {:.2} average)",
                category.display_name,
                code,
                category.current_score,
                trend_label(category.trend),
                category.change,
                category.average
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alerts");

    if result.alerts.is_empty() {
        let _ = writeln!(output, "No alerts for this window.");
    } else {
        for alert in &result.alerts {
            let _ = writeln!(
                output,
                "- [{}] {}: {}",
                severity_label(alert.severity),
                alert.message,
                alert.recommendation
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recommendations");

    for recommendation in &result.recommendations {
        let _ = writeln!(output, "- {recommendation}");
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryConfig;
    use crate::models::{WeekStatus, WeeklyScore};
    use crate::score::round_two;
    use crate::trend;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn senior() -> SeniorRecord {
        SeniorRecord {
            id: Uuid::new_v4(),
            full_name: "Margaret Holt".to_string(),
            guardian_email: "guardian@example.com".to_string(),
        }
    }

    fn row(day: u32, total: i32, max: i32) -> WeeklyScore {
        WeeklyScore {
            senior_id: Uuid::nil(),
            category_code: "nutrition".to_string(),
            week_start: NaiveDate::from_ymd_opt(2026, 8, day).unwrap(),
            total_score: total,
            max_possible_score: max,
            score_percentage: round_two(total as f64 / max as f64 * 100.0),
            submission_count: 2,
            status: WeekStatus::Stable,
        }
    }

    #[test]
    fn report_renders_alerts_and_recommendations() {
        let config = CategoryConfig::default();
        let rows = vec![row(10, 14, 16), row(17, 8, 16)];
        let result = trend::analyze(Uuid::nil(), &rows, 4, &config);
        let report = build_report(&senior(), &result);

        assert!(report.contains("# Weekly Care Trend Report"));
        assert!(report.contains("Margaret Holt"));
        assert!(report.contains("## Weekly Scores"));
        assert!(report.contains("[HIGH]"));
        assert!(report.contains("review the care plan"));
    }

    #[test]
    fn insufficient_data_report_is_displayable() {
        let config = CategoryConfig::default();
        let rows = vec![row(17, 14, 16)];
        let result = trend::analyze(Uuid::nil(), &rows, 4, &config);
        let report = build_report(&senior(), &result);

        assert!(report.contains("insufficient data"));
        assert!(report.contains("Not enough weekly data to analyze yet"));
        assert!(report.contains("No alerts for this window."));
    }
}
