use std::sync::Arc;

use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    validate_year_and_month, AnalysisRequest, CohortRankResult, Report, ReportSummary, User,
    Window,
};
use crate::pipeline::{ReportBuilder, Submission};
use crate::rank::{find_rank_at_age_and_gender, RANK_WINDOW_DAYS};
use crate::store::{CohortStats, ReportStore, UserStore};

/// Report operations as seen by the request layer.
///
/// `current_user` is whatever id the caller's authentication resolved, if any.
pub struct ReportService {
    users: Arc<dyn UserStore>,
    reports: Arc<dyn ReportStore>,
    stats: Arc<dyn CohortStats>,
    builder: Option<ReportBuilder>,
}

impl ReportService {
    pub fn new(
        users: Arc<dyn UserStore>,
        reports: Arc<dyn ReportStore>,
        stats: Arc<dyn CohortStats>,
    ) -> Self {
        Self {
            users,
            reports,
            stats,
            builder: None,
        }
    }

    pub fn with_builder(mut self, builder: ReportBuilder) -> Self {
        self.builder = Some(builder);
        self
    }

    async fn current_user(&self, current_user: Option<Uuid>) -> Result<User, Error> {
        let user_id = current_user.ok_or_else(|| Error::NotFound("user id".to_string()))?;
        self.users
            .find_user(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("user".to_string()))
    }

    pub async fn analysis(
        &self,
        current_user: Option<Uuid>,
        request: AnalysisRequest,
    ) -> Result<Submission, Error> {
        request.validate()?;
        let user = self.current_user(current_user).await?;
        let builder = self.builder.as_ref().ok_or_else(|| {
            Error::Configuration("analysis endpoint is not configured".to_string())
        })?;
        Ok(builder.submit(user, request))
    }

    pub async fn find_reports_by_current_user(
        &self,
        current_user: Option<Uuid>,
    ) -> Result<Vec<Report>, Error> {
        let user = self.current_user(current_user).await?;
        self.reports.find_by_user_id(user.id).await
    }

    /// No ownership check: any caller may read any report by id.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Report, Error> {
        self.reports
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("report {id}")))
    }

    pub async fn find_summary_by_month(
        &self,
        current_user: Option<Uuid>,
        year_and_month: &str,
    ) -> Result<Vec<ReportSummary>, Error> {
        validate_year_and_month(year_and_month)?;
        let user = self.current_user(current_user).await?;
        let reports = self
            .reports
            .find_by_year_and_month(user.id, year_and_month)
            .await?;
        Ok(reports.iter().map(ReportSummary::from).collect())
    }

    pub async fn find_all(&self) -> Result<Vec<Report>, Error> {
        self.reports.find_all().await
    }

    pub async fn find_rank_at_age_and_gender(
        &self,
        current_user: Option<Uuid>,
    ) -> Result<CohortRankResult, Error> {
        let user = self.current_user(current_user).await?;
        let window = Window::trailing_days(RANK_WINDOW_DAYS);
        find_rank_at_age_and_gender(self.stats.as_ref(), &user, &window).await
    }
}
