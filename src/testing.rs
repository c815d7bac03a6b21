//! In-memory stores for exercising services without Postgres.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{Cohort, NewReport, Report, User, Window};
use crate::store::{CohortStats, ReportStore, UserStore};

pub fn sample_user(email: &str, age: i32, gender: &str) -> User {
    let nickname = email.split('@').next().unwrap_or(email).to_string();
    User {
        id: Uuid::new_v4(),
        name: nickname.clone(),
        nickname,
        email: email.to_string(),
        age,
        gender: gender.to_string(),
        fcm_token: "device-token".to_string(),
    }
}

pub fn sample_new_report(user_id: Uuid, score: &str) -> NewReport {
    NewReport {
        user_id,
        alert_count: 3,
        analysis_time: 600,
        kind: "Study".to_string(),
        predict: "[1 1 0]".to_string(),
        score: score.to_string(),
        normal_ratio: "66.667".to_string(),
        status_frequencies: "[2 1 0 0]".to_string(),
        distances: "[10.000 11.000 12.000]".to_string(),
        neck_angles: "[40.000 41.000 42.000]".to_string(),
    }
}

#[derive(Default)]
pub struct MemoryStore {
    users: Vec<User>,
    reports: Mutex<Vec<Report>>,
}

impl MemoryStore {
    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users,
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn insert_at(&self, report: NewReport, created_at: DateTime<Utc>) -> Report {
        let report = Report::from_new(Uuid::new_v4(), report, created_at);
        self.reports.lock().unwrap().push(report.clone());
        report
    }

    fn cohort_ids(&self, cohort: &Cohort) -> Vec<Uuid> {
        self.users
            .iter()
            .filter(|u| cohort.contains(u))
            .map(|u| u.id)
            .collect()
    }

    fn scores_in_window(&self, window: &Window, owners: &[Uuid]) -> Vec<(Uuid, f64)> {
        self.reports
            .lock()
            .unwrap()
            .iter()
            .filter(|r| owners.contains(&r.user_id) && window.contains(r.created_at))
            .map(|r| (r.user_id, r.score.parse::<f64>().unwrap()))
            .collect()
    }
}

fn average(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        Ok(self.users.iter().find(|u| u.id == user_id).cloned())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn save(&self, report: &NewReport) -> Result<Report, Error> {
        Ok(self.insert_at(report.clone(), Utc::now()))
    }

    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Vec<Report>, Error> {
        let reports = self.reports.lock().unwrap();
        Ok(reports.iter().filter(|r| r.user_id == user_id).cloned().collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>, Error> {
        let reports = self.reports.lock().unwrap();
        Ok(reports.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_year_and_month(
        &self,
        user_id: Uuid,
        year_and_month: &str,
    ) -> Result<Vec<Report>, Error> {
        let reports = self.reports.lock().unwrap();
        Ok(reports
            .iter()
            .filter(|r| {
                r.user_id == user_id && r.created_at.format("%Y%m").to_string() == year_and_month
            })
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> Result<Vec<Report>, Error> {
        Ok(self.reports.lock().unwrap().clone())
    }
}

#[async_trait]
impl CohortStats for MemoryStore {
    async fn user_average_score(&self, user_id: Uuid, window: &Window) -> Result<Option<f64>, Error> {
        Ok(average(
            self.scores_in_window(window, &[user_id])
                .into_iter()
                .map(|(_, s)| s),
        ))
    }

    async fn cohort_population(&self, cohort: &Cohort) -> Result<i64, Error> {
        Ok(self.cohort_ids(cohort).len() as i64)
    }

    async fn cohort_average_score(
        &self,
        cohort: &Cohort,
        window: &Window,
    ) -> Result<Option<f64>, Error> {
        let ids = self.cohort_ids(cohort);
        Ok(average(
            self.scores_in_window(window, &ids).into_iter().map(|(_, s)| s),
        ))
    }

    async fn count_members_above(
        &self,
        cohort: &Cohort,
        window: &Window,
        subject: Uuid,
        score: f64,
    ) -> Result<i64, Error> {
        let ids = self.cohort_ids(cohort);
        let mut per_user: HashMap<Uuid, Vec<f64>> = HashMap::new();
        for (user_id, s) in self.scores_in_window(window, &ids) {
            if user_id == subject {
                continue;
            }
            per_user.entry(user_id).or_default().push(s);
        }
        Ok(per_user
            .into_values()
            .filter_map(|scores| average(scores.into_iter()))
            .filter(|avg| *avg > score)
            .count() as i64)
    }
}
