use anyhow::Context;
use reqwest::Url;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com/v1";

/// Process configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub analysis: Option<AnalysisConfig>,
    pub fcm: Option<FcmConfig>,
}

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub endpoint: Url,
}

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub endpoint: Url,
    pub project_id: String,
    pub access_token: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {raw}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let analysis = lookup("AI_SERVER_API_URL")
            .map(|raw| {
                Url::parse(&raw)
                    .with_context(|| format!("AI_SERVER_API_URL is not a valid URL: {raw}"))
                    .map(|endpoint| AnalysisConfig { endpoint })
            })
            .transpose()?;

        let fcm = match (lookup("FCM_PROJECT_ID"), lookup("FCM_ACCESS_TOKEN")) {
            (Some(project_id), Some(access_token)) => {
                let raw = lookup("FCM_ENDPOINT").unwrap_or_else(|| DEFAULT_FCM_ENDPOINT.to_string());
                let endpoint = Url::parse(&raw)
                    .with_context(|| format!("FCM_ENDPOINT is not a valid URL: {raw}"))?;
                Some(FcmConfig {
                    endpoint,
                    project_id,
                    access_token,
                })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            max_connections,
            analysis,
            fcm,
        })
    }

    pub fn require_analysis(&self) -> anyhow::Result<AnalysisConfig> {
        self.analysis
            .clone()
            .context("AI_SERVER_API_URL must be set to submit videos for analysis")
    }
}
