use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::analysis::{parse_analysis, AnalysisClient};
use crate::error::Error;
use crate::models::{AnalysisRequest, NewReport, Report, User};
use crate::notify::{completion_message, Notifier};
use crate::score::calculate_score;
use crate::store::ReportStore;

pub const SUBMITTED_MESSAGE: &str = "Video submitted successfully";

/// Acknowledgment for a submitted video.
///
/// The handle is for callers that must outlive the task (the CLI); servers
/// drop it and the task runs detached.
pub struct Submission {
    pub message: String,
    pub task: JoinHandle<()>,
}

/// Turns a submitted video into a persisted report and a push notification.
#[derive(Clone)]
pub struct ReportBuilder {
    client: Arc<dyn AnalysisClient>,
    reports: Arc<dyn ReportStore>,
    notifier: Arc<dyn Notifier>,
}

impl ReportBuilder {
    pub fn new(
        client: Arc<dyn AnalysisClient>,
        reports: Arc<dyn ReportStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            client,
            reports,
            notifier,
        }
    }

    /// Spawns the pipeline and returns at once. Failures are logged only.
    pub fn submit(&self, user: User, request: AnalysisRequest) -> Submission {
        let builder = self.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = builder.run(&user, &request).await {
                error!(
                    user_id = %user.id,
                    video_url = %request.video_url,
                    error = %e,
                    "analysis pipeline failed"
                );
            }
        });

        Submission {
            message: SUBMITTED_MESSAGE.to_string(),
            task,
        }
    }

    pub async fn run(&self, user: &User, request: &AnalysisRequest) -> Result<Report, Error> {
        let payload = self.client.analyze(&request.video_url).await?;

        let parsed = parse_analysis(&payload)?;
        debug!(user_id = %user.id, segments = parsed.postures.len(), "analysis parsed");

        let score = calculate_score(&parsed.postures, &parsed.confidences)?;
        debug!(user_id = %user.id, %score, "analysis scored");

        let report = self
            .reports
            .save(&NewReport {
                user_id: user.id,
                alert_count: request.alert_count,
                analysis_time: request.analysis_time,
                kind: request.kind.clone(),
                predict: parsed.predict(),
                score,
                normal_ratio: parsed.normal_ratio,
                status_frequencies: parsed.status_frequencies,
                distances: parsed.distances,
                neck_angles: parsed.angles,
            })
            .await?;
        info!(user_id = %user.id, report_id = %report.id, score = %report.score, "report saved");

        let (title, body) = completion_message(report.created_at);
        self.notifier.send(&user.fcm_token, &title, &body).await?;
        debug!(user_id = %user.id, report_id = %report.id, "completion notification sent");

        Ok(report)
    }
}
