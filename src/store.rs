use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Error;
use crate::models::{Cohort, NewReport, Report, User, Window};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, Error>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save(&self, report: &NewReport) -> Result<Report, Error>;
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Vec<Report>, Error>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>, Error>;
    /// Reports whose creation month equals `year_and_month` (`YYYYMM`).
    async fn find_by_year_and_month(
        &self,
        user_id: Uuid,
        year_and_month: &str,
    ) -> Result<Vec<Report>, Error>;
    async fn find_all(&self) -> Result<Vec<Report>, Error>;
}

/// Aggregates behind the cohort percentile.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CohortStats: Send + Sync {
    /// `None` when the user has no reports in the window.
    async fn user_average_score(&self, user_id: Uuid, window: &Window) -> Result<Option<f64>, Error>;
    async fn cohort_population(&self, cohort: &Cohort) -> Result<i64, Error>;
    async fn cohort_average_score(&self, cohort: &Cohort, window: &Window)
        -> Result<Option<f64>, Error>;
    /// Cohort members other than `subject` whose per-user average is strictly above `score`.
    async fn count_members_above(
        &self,
        cohort: &Cohort,
        window: &Window,
        subject: Uuid,
        score: f64,
    ) -> Result<i64, Error>;
}
