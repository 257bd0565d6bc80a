use std::collections::BTreeMap;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::CategoryConfig;
use crate::models::{
    AnswerValue, ChecklistAnswer, SeniorRecord, SessionScore, TrendAnalysisResult, WeekStatus,
    WeeklyScore,
};
use crate::rollup;
use crate::score;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn upsert_senior(
    pool: &PgPool,
    full_name: &str,
    guardian_email: &str,
) -> anyhow::Result<Uuid> {
    let row = sqlx::query(
        r#"
        INSERT INTO care_trends.seniors (id, full_name, guardian_email)
        VALUES ($1, $2, $3)
        ON CONFLICT (guardian_email) DO UPDATE
        SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(guardian_email)
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}

pub async fn find_senior(pool: &PgPool, guardian_email: &str) -> anyhow::Result<SeniorRecord> {
    let row = sqlx::query(
        "SELECT id, full_name, guardian_email FROM care_trends.seniors WHERE guardian_email = $1",
    )
    .bind(guardian_email)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("no senior registered for guardian {guardian_email}"))?;

    Ok(SeniorRecord {
        id: row.get("id"),
        full_name: row.get("full_name"),
        guardian_email: row.get("guardian_email"),
    })
}

/// Ingestion boundary: scale answers must already be inside the configured
/// bounds before the aggregator ever sees them.
fn validate_answers(answers: &[ChecklistAnswer], config: &CategoryConfig) -> anyhow::Result<()> {
    for answer in answers {
        anyhow::ensure!(
            config.contains(&answer.category_code),
            "unknown checklist category {}",
            answer.category_code
        );
        if let AnswerValue::Integer(value) = answer.value {
            let max_scale = config.max_scale(&answer.category_code);
            anyhow::ensure!(
                (1..=max_scale).contains(&value),
                "scale value {value} out of range 1..={max_scale} for category {}",
                answer.category_code
            );
        }
    }
    Ok(())
}

/// Record one completed care session and fold its scores into the weekly
/// aggregates, all inside a single transaction. Returns false when the
/// session's source key was already recorded; nothing is written in that
/// case, which keeps submissions at-most-once.
pub async fn record_session(
    pool: &PgPool,
    senior_id: Uuid,
    caregiver_name: &str,
    session_date: NaiveDate,
    source_key: &str,
    answers: &[ChecklistAnswer],
    config: &CategoryConfig,
) -> anyhow::Result<bool> {
    validate_answers(answers, config)?;

    let mut tx = pool.begin().await?;
    let session_id = Uuid::new_v4();

    let inserted = sqlx::query(
        r#"
        INSERT INTO care_trends.care_sessions
        (id, senior_id, caregiver_name, session_date, source_key)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(session_id)
    .bind(senior_id)
    .bind(caregiver_name)
    .bind(session_date)
    .bind(source_key)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        debug!(source_key, "session already recorded, skipping");
        return Ok(false);
    }

    for answer in answers {
        let (kind, bool_value, int_value, text_value) = match &answer.value {
            AnswerValue::Bool(value) => ("bool", Some(*value), None, None),
            AnswerValue::Integer(value) => ("scale", None, Some(*value), None),
            AnswerValue::Text(value) => ("text", None, None, Some(value.as_str())),
        };

        sqlx::query(
            r#"
            INSERT INTO care_trends.checklist_answers
            (id, session_id, category_code, answer_kind, bool_value, int_value, text_value, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(&answer.category_code)
        .bind(kind)
        .bind(bool_value)
        .bind(int_value)
        .bind(text_value)
        .bind(answer.note.as_deref())
        .execute(&mut *tx)
        .await?;
    }

    let week_start = score::week_start_of(session_date);
    let session_scores = score::aggregate(answers, config);

    for (category, session_score) in &session_scores {
        let merged =
            merge_weekly_score(&mut tx, senior_id, category, week_start, session_score).await?;
        info!(
            senior = %senior_id,
            category = %category,
            week = %week_start,
            answers = session_score.answer_count,
            session_pct = session_score.percentage(),
            week_pct = merged.score_percentage,
            submissions = merged.submission_count,
            "weekly score merged"
        );
    }

    tx.commit().await?;
    Ok(true)
}

/// Read-modify-write for one (senior, category, week) key under a row lock,
/// so two sessions landing in the same week cannot lose an update.
async fn merge_weekly_score(
    tx: &mut Transaction<'_, Postgres>,
    senior_id: Uuid,
    category: &str,
    week_start: NaiveDate,
    session_score: &SessionScore,
) -> anyhow::Result<WeeklyScore> {
    let existing = sqlx::query(
        r#"
        SELECT total_score, max_possible_score, score_percentage, submission_count, status
        FROM care_trends.weekly_scores
        WHERE senior_id = $1 AND category_code = $2 AND week_start = $3
        FOR UPDATE
        "#,
    )
    .bind(senior_id)
    .bind(category)
    .bind(week_start)
    .fetch_optional(&mut **tx)
    .await?
    .map(|row| WeeklyScore {
        senior_id,
        category_code: category.to_string(),
        week_start,
        total_score: row.get("total_score"),
        max_possible_score: row.get("max_possible_score"),
        score_percentage: row.get("score_percentage"),
        submission_count: row.get("submission_count"),
        status: WeekStatus::parse(row.get("status")),
    });

    let prior_week_total: Option<i32> = sqlx::query(
        r#"
        SELECT total_score
        FROM care_trends.weekly_scores
        WHERE senior_id = $1 AND category_code = $2 AND week_start < $3
        ORDER BY week_start DESC
        LIMIT 1
        "#,
    )
    .bind(senior_id)
    .bind(category)
    .bind(week_start)
    .fetch_optional(&mut **tx)
    .await?
    .map(|row| row.get("total_score"));

    let merged = rollup::merge_session(
        existing,
        prior_week_total,
        senior_id,
        category,
        week_start,
        session_score,
    );

    sqlx::query(
        r#"
        INSERT INTO care_trends.weekly_scores
        (id, senior_id, category_code, week_start, total_score, max_possible_score,
         score_percentage, submission_count, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (senior_id, category_code, week_start) DO UPDATE
        SET total_score = EXCLUDED.total_score,
            max_possible_score = EXCLUDED.max_possible_score,
            score_percentage = EXCLUDED.score_percentage,
            submission_count = EXCLUDED.submission_count,
            status = EXCLUDED.status,
            updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(senior_id)
    .bind(category)
    .bind(week_start)
    .bind(merged.total_score)
    .bind(merged.max_possible_score)
    .bind(merged.score_percentage)
    .bind(merged.submission_count)
    .bind(merged.status.as_str())
    .execute(&mut **tx)
    .await?;

    Ok(merged)
}

pub async fn list_weekly_scores(
    pool: &PgPool,
    senior_id: Uuid,
    since: NaiveDate,
) -> anyhow::Result<Vec<WeeklyScore>> {
    let rows = sqlx::query(
        r#"
        SELECT category_code, week_start, total_score, max_possible_score,
               score_percentage, submission_count, status
        FROM care_trends.weekly_scores
        WHERE senior_id = $1 AND week_start >= $2
        ORDER BY week_start, category_code
        "#,
    )
    .bind(senior_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    let mut scores = Vec::new();
    for row in rows {
        scores.push(WeeklyScore {
            senior_id,
            category_code: row.get("category_code"),
            week_start: row.get("week_start"),
            total_score: row.get("total_score"),
            max_possible_score: row.get("max_possible_score"),
            score_percentage: row.get("score_percentage"),
            submission_count: row.get("submission_count"),
            status: WeekStatus::parse(row.get("status")),
        });
    }

    Ok(scores)
}

fn snapshot_payload(result: &TrendAnalysisResult) -> anyhow::Result<(String, String)> {
    let summary = serde_json::to_string(result).context("failed to serialize trend analysis")?;
    let key_indicators = serde_json::json!({
        "trend": result.trend,
        "alert_count": result.alerts.len(),
        "weekly_count": result.weekly_data.len(),
    })
    .to_string();
    Ok((summary, key_indicators))
}

/// Snapshot the analysis result for the day, one row per (senior, date).
pub async fn save_trend_snapshot(
    pool: &PgPool,
    analysis_date: NaiveDate,
    result: &TrendAnalysisResult,
) -> anyhow::Result<()> {
    let (summary, key_indicators) = snapshot_payload(result)?;

    sqlx::query(
        r#"
        INSERT INTO care_trends.trend_snapshots
        (id, senior_id, analysis_date, period_weeks, summary, key_indicators)
        VALUES ($1, $2, $3, $4, $5::jsonb, $6::jsonb)
        ON CONFLICT (senior_id, analysis_date) DO UPDATE
        SET period_weeks = EXCLUDED.period_weeks,
            summary = EXCLUDED.summary,
            key_indicators = EXCLUDED.key_indicators,
            updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(result.senior_id)
    .bind(analysis_date)
    .bind(result.period_weeks as i32)
    .bind(summary)
    .bind(key_indicators)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn seed(pool: &PgPool, config: &CategoryConfig) -> anyhow::Result<()> {
    let scale = |category: &str, value: i32| ChecklistAnswer {
        category_code: category.to_string(),
        value: AnswerValue::Integer(value),
        note: None,
    };
    let yes_no = |category: &str, value: bool| ChecklistAnswer {
        category_code: category.to_string(),
        value: AnswerValue::Bool(value),
        note: None,
    };

    let margaret = upsert_senior(pool, "Margaret Holt", "guardian.holt@carelink.example").await?;
    let elena = upsert_senior(pool, "Elena Park", "guardian.park@carelink.example").await?;

    let date = |day: u32| NaiveDate::from_ymd_opt(2026, 8, day).context("invalid seed date");

    // Margaret: three weeks of worsening scores with a thin final week,
    // enough history to fire every alert rule.
    let margaret_sessions: Vec<(u32, &str, Vec<ChecklistAnswer>)> = vec![
        (
            3,
            "seed-margaret-w1-a",
            vec![
                scale("nutrition", 4),
                scale("nutrition", 4),
                yes_no("hypertension", true),
                scale("depression", 3),
            ],
        ),
        (
            5,
            "seed-margaret-w1-b",
            vec![
                scale("nutrition", 4),
                scale("nutrition", 3),
                yes_no("hypertension", true),
                scale("depression", 4),
            ],
        ),
        (
            10,
            "seed-margaret-w2-a",
            vec![
                scale("nutrition", 3),
                scale("nutrition", 3),
                yes_no("hypertension", true),
                scale("depression", 3),
            ],
        ),
        (
            12,
            "seed-margaret-w2-b",
            vec![
                scale("nutrition", 3),
                scale("nutrition", 3),
                yes_no("hypertension", true),
                scale("depression", 2),
            ],
        ),
        (
            14,
            "seed-margaret-w2-c",
            vec![
                scale("nutrition", 3),
                scale("nutrition", 2),
                yes_no("hypertension", false),
                scale("depression", 3),
            ],
        ),
        (
            17,
            "seed-margaret-w3-a",
            vec![
                scale("nutrition", 2),
                scale("nutrition", 2),
                yes_no("hypertension", false),
                ChecklistAnswer {
                    category_code: "depression".to_string(),
                    value: AnswerValue::Integer(1),
                    note: Some("Very withdrawn today".to_string()),
                },
            ],
        ),
    ];

    // Elena: two weeks trending upward.
    let elena_sessions: Vec<(u32, &str, Vec<ChecklistAnswer>)> = vec![
        (
            10,
            "seed-elena-w1-a",
            vec![
                scale("nutrition", 2),
                yes_no("hypertension", true),
                scale("depression", 2),
            ],
        ),
        (
            12,
            "seed-elena-w1-b",
            vec![
                scale("nutrition", 3),
                yes_no("hypertension", false),
                scale("depression", 2),
            ],
        ),
        (
            17,
            "seed-elena-w2-a",
            vec![
                scale("nutrition", 4),
                yes_no("hypertension", true),
                scale("depression", 3),
            ],
        ),
        (
            19,
            "seed-elena-w2-b",
            vec![
                scale("nutrition", 4),
                yes_no("hypertension", true),
                ChecklistAnswer {
                    category_code: "depression".to_string(),
                    value: AnswerValue::Text("Cheerful, chatted about her garden".to_string()),
                    note: None,
                },
            ],
        ),
    ];

    for (day, source_key, answers) in margaret_sessions {
        record_session(
            pool,
            margaret,
            "Dana Cho",
            date(day)?,
            source_key,
            &answers,
            config,
        )
        .await?;
    }
    for (day, source_key, answers) in elena_sessions {
        record_session(
            pool,
            elena,
            "Sam Okafor",
            date(day)?,
            source_key,
            &answers,
            config,
        )
        .await?;
    }

    Ok(())
}

pub async fn import_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
    config: &CategoryConfig,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        guardian_email: String,
        caregiver_name: String,
        session_date: NaiveDate,
        session_key: String,
        category_code: String,
        answer_kind: String,
        answer_value: String,
        note: Option<String>,
    }

    struct PendingSession {
        full_name: String,
        guardian_email: String,
        caregiver_name: String,
        session_date: NaiveDate,
        answers: Vec<ChecklistAnswer>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut sessions: BTreeMap<String, PendingSession> = BTreeMap::new();

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let value = parse_answer(&row.answer_kind, &row.answer_value)
            .with_context(|| format!("bad answer in session {}", row.session_key))?;

        let session = sessions
            .entry(row.session_key.clone())
            .or_insert_with(|| PendingSession {
                full_name: row.full_name.clone(),
                guardian_email: row.guardian_email.clone(),
                caregiver_name: row.caregiver_name.clone(),
                session_date: row.session_date,
                answers: Vec::new(),
            });

        session.answers.push(ChecklistAnswer {
            category_code: row.category_code,
            value,
            note: row.note,
        });
    }

    let mut inserted = 0usize;
    for (session_key, session) in sessions {
        let senior_id =
            upsert_senior(pool, &session.full_name, &session.guardian_email).await?;
        let recorded = record_session(
            pool,
            senior_id,
            &session.caregiver_name,
            session.session_date,
            &format!("import-{session_key}"),
            &session.answers,
            config,
        )
        .await?;
        if recorded {
            inserted += 1;
        }
    }

    Ok(inserted)
}

fn parse_answer(kind: &str, value: &str) -> anyhow::Result<AnswerValue> {
    match kind {
        "bool" => Ok(AnswerValue::Bool(
            value.parse().context("bool answer must be true or false")?,
        )),
        "scale" => Ok(AnswerValue::Integer(
            value.parse().context("scale answer must be an integer")?,
        )),
        "text" => Ok(AnswerValue::Text(value.to_string())),
        other => anyhow::bail!("unknown answer kind {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_scale_is_rejected_at_the_boundary() {
        let config = CategoryConfig::default();
        let answers = vec![ChecklistAnswer {
            category_code: "nutrition".to_string(),
            value: AnswerValue::Integer(7),
            note: None,
        }];
        assert!(validate_answers(&answers, &config).is_err());
    }

    #[test]
    fn unknown_category_is_rejected_at_the_boundary() {
        let config = CategoryConfig::default();
        let answers = vec![ChecklistAnswer {
            category_code: "mobility".to_string(),
            value: AnswerValue::Integer(2),
            note: None,
        }];
        assert!(validate_answers(&answers, &config).is_err());
    }

    #[test]
    fn in_range_and_non_scale_answers_pass_validation() {
        let config = CategoryConfig::default();
        let answers = vec![
            ChecklistAnswer {
                category_code: "nutrition".to_string(),
                value: AnswerValue::Integer(4),
                note: None,
            },
            ChecklistAnswer {
                category_code: "depression".to_string(),
                value: AnswerValue::Text("quiet morning".to_string()),
                note: None,
            },
        ];
        assert!(validate_answers(&answers, &config).is_ok());
    }

    #[test]
    fn snapshot_payload_keeps_stored_shape() {
        let config = CategoryConfig::default();
        let rows = vec![
            WeeklyScore {
                senior_id: Uuid::nil(),
                category_code: "nutrition".to_string(),
                week_start: NaiveDate::from_ymd_opt(2026, 8, 10).unwrap(),
                total_score: 14,
                max_possible_score: 16,
                score_percentage: 87.5,
                submission_count: 2,
                status: WeekStatus::Stable,
            },
            WeeklyScore {
                senior_id: Uuid::nil(),
                category_code: "nutrition".to_string(),
                week_start: NaiveDate::from_ymd_opt(2026, 8, 17).unwrap(),
                total_score: 8,
                max_possible_score: 16,
                score_percentage: 50.0,
                submission_count: 2,
                status: WeekStatus::Declining,
            },
        ];
        let result = crate::trend::analyze(Uuid::nil(), &rows, 4, &config);
        let (summary, key_indicators) = snapshot_payload(&result).unwrap();

        let summary: serde_json::Value = serde_json::from_str(&summary).unwrap();
        assert_eq!(summary["trend"], "declining");
        assert_eq!(summary["period_weeks"], 4);
        assert_eq!(summary["alerts"][0]["kind"], "score_drop");
        assert_eq!(summary["alerts"][0]["severity"], "high");
        assert_eq!(summary["weekly_data"].as_array().unwrap().len(), 2);
        assert_eq!(summary["weekly_data"][0]["week_start"], "2026-08-10");
        assert_eq!(summary["weekly_data"][1]["trend_indicator"], "declining");
        assert!(summary["category_trends"]["nutrition"].is_object());

        let key_indicators: serde_json::Value = serde_json::from_str(&key_indicators).unwrap();
        assert_eq!(key_indicators["trend"], "declining");
        assert_eq!(key_indicators["alert_count"], 1);
        assert_eq!(key_indicators["weekly_count"], 2);
    }

    #[test]
    fn answer_parsing_covers_all_kinds() {
        assert_eq!(
            parse_answer("bool", "true").unwrap(),
            AnswerValue::Bool(true)
        );
        assert_eq!(parse_answer("scale", "3").unwrap(), AnswerValue::Integer(3));
        assert_eq!(
            parse_answer("text", "slept well").unwrap(),
            AnswerValue::Text("slept well".to_string())
        );
        assert!(parse_answer("emoji", ":)").is_err());
    }
}
