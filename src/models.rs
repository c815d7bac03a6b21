use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub nickname: String,
    pub email: String,
    pub age: i32,
    pub gender: String,
    pub fcm_token: String,
}

/// Report fields known before the row is written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub user_id: Uuid,
    pub alert_count: i32,
    pub analysis_time: i32,
    pub kind: String,
    pub predict: String,
    pub score: String,
    pub normal_ratio: String,
    pub status_frequencies: String,
    pub distances: String,
    pub neck_angles: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub user_id: Uuid,
    pub alert_count: i32,
    pub analysis_time: i32,
    #[serde(rename = "type")]
    pub kind: String,
    pub predict: String,
    pub score: String,
    pub normal_ratio: String,
    pub status_frequencies: String,
    pub distances: String,
    pub neck_angles: String,
    pub created_at: DateTime<Utc>,
}

impl Report {
    #[cfg(test)]
    pub fn from_new(id: Uuid, report: NewReport, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: report.user_id,
            alert_count: report.alert_count,
            analysis_time: report.analysis_time,
            kind: report.kind,
            predict: report.predict,
            score: report.score,
            normal_ratio: report.normal_ratio,
            status_frequencies: report.status_frequencies,
            distances: report.distances,
            neck_angles: report.neck_angles,
            created_at,
        }
    }
}

/// Calendar marker for the monthly summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<&Report> for ReportSummary {
    fn from(report: &Report) -> Self {
        Self {
            id: report.id,
            created_at: report.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortRankResult {
    pub user_id: Uuid,
    pub nickname: String,
    pub age: i32,
    pub gender: String,
    pub normal_ratio: String,
    pub average_score: String,
    pub all_average_score: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub video_url: String,
    #[serde(default)]
    pub alert_count: i32,
    #[serde(default)]
    pub analysis_time: i32,
    #[serde(rename = "type")]
    pub kind: String,
}

impl AnalysisRequest {
    pub fn validate(&self) -> Result<(), Error> {
        if self.video_url.trim().is_empty() {
            return Err(Error::Validation("video_url is required".to_string()));
        }
        if self.kind.trim().is_empty() {
            return Err(Error::Validation("type is required".to_string()));
        }
        if self.alert_count < 0 {
            return Err(Error::Validation("alert_count must be >= 0".to_string()));
        }
        if self.analysis_time < 0 {
            return Err(Error::Validation("analysis_time must be >= 0".to_string()));
        }
        Ok(())
    }
}

/// Checks a `YYYYMM` month key.
pub fn validate_year_and_month(value: &str) -> Result<(), Error> {
    let invalid = || Error::Validation(format!("year_and_month must be YYYYMM, got '{value}'"));

    if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let month: u32 = value[4..].parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok(())
}

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn trailing_days(days: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(days.max(1)),
            end,
        }
    }

    #[cfg(test)]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// Users sharing an age decade and gender.
#[derive(Debug, Clone, PartialEq)]
pub struct Cohort {
    pub age_floor: i32,
    pub gender: String,
}

impl Cohort {
    pub fn of(user: &User) -> Self {
        Self {
            age_floor: user.age.div_euclid(10) * 10,
            gender: user.gender.clone(),
        }
    }

    pub fn age_ceiling(&self) -> i32 {
        self.age_floor + 10
    }

    #[cfg(test)]
    pub fn contains(&self, user: &User) -> bool {
        user.age >= self.age_floor && user.age < self.age_ceiling() && user.gender == self.gender
    }
}
