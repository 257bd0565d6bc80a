use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{SessionScore, WeekStatus, WeeklyScore};
use crate::score::round_two;

/// Fold one session's category score into the weekly aggregate for
/// (senior, category, week). Creates the row on the first submission of
/// the week, otherwise adds onto the running totals and recomputes the
/// percentage. The status field compares the merged raw total against the
/// most recent prior week's raw total; with no prior week it stays stable.
///
/// Callers must invoke this exactly once per completed session — the
/// ingestion boundary enforces at-most-once submission.
pub fn merge_session(
    existing: Option<WeeklyScore>,
    prior_week_total: Option<i32>,
    senior_id: Uuid,
    category_code: &str,
    week_start: NaiveDate,
    session: &SessionScore,
) -> WeeklyScore {
    let (total_score, max_possible_score, submission_count) = match &existing {
        Some(record) => (
            record.total_score + session.total_score,
            record.max_possible_score + session.max_possible_score,
            record.submission_count + 1,
        ),
        None => (session.total_score, session.max_possible_score, 1),
    };

    let score_percentage = if max_possible_score > 0 {
        round_two(total_score as f64 / max_possible_score as f64 * 100.0)
    } else {
        0.0
    };

    let status = match prior_week_total {
        Some(prior) if total_score > prior => WeekStatus::Improving,
        Some(prior) if total_score < prior => WeekStatus::Declining,
        Some(_) => WeekStatus::Stable,
        None => WeekStatus::Stable,
    };

    WeeklyScore {
        senior_id,
        category_code: category_code.to_string(),
        week_start,
        total_score,
        max_possible_score,
        score_percentage,
        submission_count,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(total: i32, max: i32) -> SessionScore {
        SessionScore {
            total_score: total,
            answer_count: max / 4,
            max_possible_score: max,
        }
    }

    fn week(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn first_submission_creates_stable_record() {
        let merged = merge_session(
            None,
            None,
            Uuid::new_v4(),
            "nutrition",
            week(2026, 8, 24),
            &session(7, 8),
        );

        assert_eq!(merged.total_score, 7);
        assert_eq!(merged.max_possible_score, 8);
        assert_eq!(merged.submission_count, 1);
        assert_eq!(merged.status, WeekStatus::Stable);
        assert!((merged.score_percentage - 87.5).abs() < 1e-9);
    }

    #[test]
    fn same_week_merge_sums_both_sessions() {
        let senior_id = Uuid::new_v4();
        let first = merge_session(
            None,
            None,
            senior_id,
            "nutrition",
            week(2026, 8, 24),
            &session(7, 8),
        );
        let merged = merge_session(
            Some(first),
            None,
            senior_id,
            "nutrition",
            week(2026, 8, 24),
            &session(4, 8),
        );

        assert_eq!(merged.total_score, 11);
        assert_eq!(merged.max_possible_score, 16);
        assert_eq!(merged.submission_count, 2);
        assert!((merged.score_percentage - 68.75).abs() < 1e-9);
    }

    #[test]
    fn status_compares_raw_totals_against_prior_week() {
        let senior_id = Uuid::new_v4();
        let improving = merge_session(
            None,
            Some(5),
            senior_id,
            "nutrition",
            week(2026, 8, 31),
            &session(7, 8),
        );
        assert_eq!(improving.status, WeekStatus::Improving);

        let declining = merge_session(
            None,
            Some(9),
            senior_id,
            "nutrition",
            week(2026, 8, 31),
            &session(7, 8),
        );
        assert_eq!(declining.status, WeekStatus::Declining);

        let steady = merge_session(
            None,
            Some(7),
            senior_id,
            "nutrition",
            week(2026, 8, 31),
            &session(7, 8),
        );
        assert_eq!(steady.status, WeekStatus::Stable);
    }

    #[test]
    fn merge_keeps_percentage_in_bounds() {
        let merged = merge_session(
            None,
            None,
            Uuid::new_v4(),
            "depression",
            week(2026, 8, 24),
            &session(8, 8),
        );
        assert!((0.0..=100.0).contains(&merged.score_percentage));
        assert!((merged.score_percentage - 100.0).abs() < 1e-9);
    }
}
