use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::config::CategoryConfig;
use crate::models::{AnswerValue, ChecklistAnswer, SessionScore};

pub fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Monday beginning the ISO week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Total mapping from an answer payload to a scale score in [1, max_scale].
/// Boolean answers hit the extremes, integers are taken as-is (the
/// ingestion boundary rejects out-of-range values before they get here),
/// and free-text answers are tiered by how much the caregiver wrote.
pub fn answer_score(value: &AnswerValue, max_scale: i32) -> i32 {
    let max_scale = max_scale.max(1);
    match value {
        AnswerValue::Bool(true) => max_scale,
        AnswerValue::Bool(false) => 1,
        AnswerValue::Integer(score) => *score,
        AnswerValue::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                1
            } else if trimmed.chars().count() > 10 {
                max_scale
            } else {
                (max_scale - 1).max(1)
            }
        }
    }
}

/// Tally one session's answers into per-category scores. Pure; categories
/// with no answers are simply absent from the result, and an empty input
/// yields an empty map.
pub fn aggregate(
    answers: &[ChecklistAnswer],
    config: &CategoryConfig,
) -> BTreeMap<String, SessionScore> {
    let mut scores: BTreeMap<String, SessionScore> = BTreeMap::new();

    for answer in answers {
        let max_scale = config.max_scale(&answer.category_code);
        let entry = scores
            .entry(answer.category_code.clone())
            .or_insert(SessionScore {
                total_score: 0,
                answer_count: 0,
                max_possible_score: 0,
            });

        entry.total_score += answer_score(&answer.value, max_scale);
        entry.answer_count += 1;
        entry.max_possible_score += max_scale;
    }

    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale_answer(category: &str, score: i32) -> ChecklistAnswer {
        ChecklistAnswer {
            category_code: category.to_string(),
            value: AnswerValue::Integer(score),
            note: None,
        }
    }

    #[test]
    fn aggregates_scale_answers_per_category() {
        let config = CategoryConfig::default();
        let answers = vec![
            scale_answer("nutrition", 4),
            scale_answer("nutrition", 3),
            scale_answer("depression", 2),
        ];

        let scores = aggregate(&answers, &config);
        assert_eq!(scores.len(), 2);

        let nutrition = &scores["nutrition"];
        assert_eq!(nutrition.total_score, 7);
        assert_eq!(nutrition.answer_count, 2);
        assert_eq!(nutrition.max_possible_score, 8);
        assert!((nutrition.percentage() - 87.5).abs() < 1e-9);

        let depression = &scores["depression"];
        assert_eq!(depression.total_score, 2);
        assert_eq!(depression.max_possible_score, 4);
        assert!((depression.percentage() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_yields_empty_map() {
        let config = CategoryConfig::default();
        let scores = aggregate(&[], &config);
        assert!(scores.is_empty());
    }

    #[test]
    fn percentage_rounds_to_two_decimals() {
        let score = SessionScore {
            total_score: 1,
            answer_count: 3,
            max_possible_score: 12,
        };
        assert!((score.percentage() - 8.33).abs() < 1e-9);
    }

    #[test]
    fn answer_mapping_is_total() {
        assert_eq!(answer_score(&AnswerValue::Bool(true), 4), 4);
        assert_eq!(answer_score(&AnswerValue::Bool(false), 4), 1);
        assert_eq!(answer_score(&AnswerValue::Integer(3), 4), 3);
        // Pre-validated scale values pass through untouched.
        assert_eq!(answer_score(&AnswerValue::Integer(1), 4), 1);
        assert_eq!(answer_score(&AnswerValue::Integer(4), 4), 4);
        assert_eq!(answer_score(&AnswerValue::Text(String::new()), 4), 1);
        assert_eq!(answer_score(&AnswerValue::Text("ok".to_string()), 4), 3);
        assert_eq!(
            answer_score(&AnswerValue::Text("ate a full meal today".to_string()), 4),
            4
        );
    }

    #[test]
    fn week_starts_on_monday() {
        let saturday = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        assert_eq!(week_start_of(saturday), monday);
        assert_eq!(week_start_of(monday), monday);

        let sunday = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        assert_eq!(week_start_of(sunday), monday);
    }
}
