use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{Cohort, NewReport, Report, User, Window};
use crate::store::{CohortStats, ReportStore, UserStore};

const REPORT_COLUMNS: &str = "id, user_id, alert_count, analysis_time, report_type, predict, \
     score, normal_ratio, status_frequencies, distances, neck_angles, created_at";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let users = vec![
        (
            Uuid::parse_str("9b2e4c61-7d3a-4f0b-a1e8-52c9d0f3b714")?,
            "Seo-yeon Han",
            "seoyeon",
            "seoyeon.han@baro.app",
            24,
            "female",
        ),
        (
            Uuid::parse_str("4a8f1d27-c6b5-4e93-8d20-7f1e3a9c5b62")?,
            "Ji-woo Lim",
            "jiwoo",
            "jiwoo.lim@baro.app",
            27,
            "female",
        ),
        (
            Uuid::parse_str("e17c9a45-3b2d-4c8e-9f61-0a5d7b2e8c93")?,
            "Do-hyun Kang",
            "dohyun",
            "dohyun.kang@baro.app",
            31,
            "male",
        ),
    ];

    for (id, name, nickname, email, age, gender) in users {
        sqlx::query(
            r#"
            INSERT INTO posture.users (id, name, nickname, email, age, gender)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name, nickname = EXCLUDED.nickname,
                age = EXCLUDED.age, gender = EXCLUDED.gender
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(nickname)
        .bind(email)
        .bind(age)
        .bind(gender)
        .execute(pool)
        .await?;
    }

    let reports = vec![
        ("6f1c2b9e-55a4-4d0e-9a64-0d4b7d3c1a01", "seoyeon.han@baro.app", "Study", "[1 1 1 0 1 1]", "79.17", 2),
        ("6f1c2b9e-55a4-4d0e-9a64-0d4b7d3c1a02", "seoyeon.han@baro.app", "Work", "[1 0 0 1 1 1]", "64.50", 9),
        ("6f1c2b9e-55a4-4d0e-9a64-0d4b7d3c1a03", "jiwoo.lim@baro.app", "Study", "[1 1 1 1 1 1]", "91.50", 4),
        ("6f1c2b9e-55a4-4d0e-9a64-0d4b7d3c1a04", "dohyun.kang@baro.app", "Gaming", "[0 0 0 1 1 1]", "56.17", 1),
    ];

    for (id, email, kind, predict, score, days_ago) in reports {
        let user_id: Uuid = sqlx::query("SELECT id FROM posture.users WHERE email = $1")
            .bind(email)
            .fetch_one(pool)
            .await?
            .get("id");

        sqlx::query(
            r#"
            INSERT INTO posture.reports
            (id, user_id, alert_count, analysis_time, report_type, predict, score,
             normal_ratio, status_frequencies, distances, neck_angles, created_at)
            VALUES ($1, $2, 4, 1800, $3, $4, $5, '66.667', '[4 1 1 0]',
                    '[10.512 11.204 12.930 10.877 11.002 10.644]',
                    '[41.300 44.120 52.871 40.915 42.006 41.775]',
                    NOW() - make_interval(days => $6))
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(user_id)
        .bind(kind)
        .bind(predict)
        .bind(score)
        .bind(days_ago)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        name: String,
        nickname: String,
        email: String,
        age: i32,
        gender: String,
        #[serde(default)]
        fcm_token: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut written = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let result = sqlx::query(
            r#"
            INSERT INTO posture.users
            (id, name, nickname, email, age, gender, fcm_token)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (email) DO UPDATE
            SET name = EXCLUDED.name, nickname = EXCLUDED.nickname, age = EXCLUDED.age,
                gender = EXCLUDED.gender, fcm_token = EXCLUDED.fcm_token
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.name)
        .bind(&row.nickname)
        .bind(&row.email)
        .bind(row.age)
        .bind(&row.gender)
        .bind(row.fcm_token.unwrap_or_default())
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            written += 1;
        }
    }

    Ok(written)
}

/// Postgres-backed user, report and cohort statistics store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn report_from_row(row: &PgRow) -> Result<Report, sqlx::Error> {
    Ok(Report {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        alert_count: row.try_get("alert_count")?,
        analysis_time: row.try_get("analysis_time")?,
        kind: row.try_get("report_type")?,
        predict: row.try_get("predict")?,
        score: row.try_get("score")?,
        normal_ratio: row.try_get("normal_ratio")?,
        status_frequencies: row.try_get("status_frequencies")?,
        distances: row.try_get("distances")?,
        neck_angles: row.try_get("neck_angles")?,
        created_at: row.try_get("created_at")?,
    })
}

fn reports_from_rows(rows: &[PgRow]) -> Result<Vec<Report>, Error> {
    rows.iter()
        .map(report_from_row)
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::from)
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        let row = sqlx::query(
            "SELECT id, name, nickname, email, age, gender, fcm_token \
             FROM posture.users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(User {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
                nickname: r.try_get("nickname")?,
                email: r.try_get("email")?,
                age: r.try_get("age")?,
                gender: r.try_get("gender")?,
                fcm_token: r.try_get("fcm_token")?,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ReportStore for PgStore {
    async fn save(&self, report: &NewReport) -> Result<Report, Error> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO posture.reports
            (id, user_id, alert_count, analysis_time, report_type, predict, score,
             normal_ratio, status_frequencies, distances, neck_angles)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(report.user_id)
        .bind(report.alert_count)
        .bind(report.analysis_time)
        .bind(&report.kind)
        .bind(&report.predict)
        .bind(&report.score)
        .bind(&report.normal_ratio)
        .bind(&report.status_frequencies)
        .bind(&report.distances)
        .bind(&report.neck_angles)
        .fetch_one(&self.pool)
        .await?;

        Ok(report_from_row(&row)?)
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Vec<Report>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {REPORT_COLUMNS} FROM posture.reports WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        reports_from_rows(&rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>, Error> {
        let row = sqlx::query(&format!(
            "SELECT {REPORT_COLUMNS} FROM posture.reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(report_from_row).transpose()?)
    }

    async fn find_by_year_and_month(
        &self,
        user_id: Uuid,
        year_and_month: &str,
    ) -> Result<Vec<Report>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT {REPORT_COLUMNS} FROM posture.reports \
             WHERE user_id = $1 AND to_char(created_at, 'YYYYMM') = $2"
        ))
        .bind(user_id)
        .bind(year_and_month)
        .fetch_all(&self.pool)
        .await?;
        reports_from_rows(&rows)
    }

    async fn find_all(&self) -> Result<Vec<Report>, Error> {
        let rows = sqlx::query(&format!("SELECT {REPORT_COLUMNS} FROM posture.reports"))
            .fetch_all(&self.pool)
            .await?;
        reports_from_rows(&rows)
    }
}

#[async_trait]
impl CohortStats for PgStore {
    async fn user_average_score(&self, user_id: Uuid, window: &Window) -> Result<Option<f64>, Error> {
        let average: Option<f64> = sqlx::query(
            r#"
            SELECT AVG(CAST(score AS DOUBLE PRECISION)) AS average
            FROM posture.reports
            WHERE user_id = $1 AND created_at >= $2 AND created_at < $3
            "#,
        )
        .bind(user_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await?
        .try_get("average")?;
        Ok(average)
    }

    async fn cohort_population(&self, cohort: &Cohort) -> Result<i64, Error> {
        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM posture.users
            WHERE age >= $1 AND age < $2 AND gender = $3
            "#,
        )
        .bind(cohort.age_floor)
        .bind(cohort.age_ceiling())
        .bind(&cohort.gender)
        .fetch_one(&self.pool)
        .await?
        .try_get("total")?;
        Ok(total)
    }

    async fn cohort_average_score(
        &self,
        cohort: &Cohort,
        window: &Window,
    ) -> Result<Option<f64>, Error> {
        let average: Option<f64> = sqlx::query(
            r#"
            SELECT AVG(CAST(r.score AS DOUBLE PRECISION)) AS average
            FROM posture.reports r
            JOIN posture.users u ON u.id = r.user_id
            WHERE u.age >= $1 AND u.age < $2 AND u.gender = $3
              AND r.created_at >= $4 AND r.created_at < $5
            "#,
        )
        .bind(cohort.age_floor)
        .bind(cohort.age_ceiling())
        .bind(&cohort.gender)
        .bind(window.start)
        .bind(window.end)
        .fetch_one(&self.pool)
        .await?
        .try_get("average")?;
        Ok(average)
    }

    async fn count_members_above(
        &self,
        cohort: &Cohort,
        window: &Window,
        subject: Uuid,
        score: f64,
    ) -> Result<i64, Error> {
        let rank: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS rank_count
            FROM (
                SELECT r.user_id, AVG(CAST(r.score AS DOUBLE PRECISION)) AS average_score
                FROM posture.reports r
                JOIN posture.users u ON u.id = r.user_id
                WHERE u.age >= $1 AND u.age < $2 AND u.gender = $3
                  AND r.created_at >= $4 AND r.created_at < $5
                  AND r.user_id <> $6
                GROUP BY r.user_id
            ) AS per_user
            WHERE average_score > $7
            "#,
        )
        .bind(cohort.age_floor)
        .bind(cohort.age_ceiling())
        .bind(&cohort.gender)
        .bind(window.start)
        .bind(window.end)
        .bind(subject)
        .bind(score)
        .fetch_one(&self.pool)
        .await?
        .try_get("rank_count")?;
        Ok(rank)
    }
}
