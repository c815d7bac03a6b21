use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed analysis payload: {0}")]
    MalformedPayload(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Aggregate query '{query}' failed: {source}")]
    AggregateQuery {
        query: &'static str,
        #[source]
        source: Box<Error>,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

impl Error {
    /// Wraps a failed ranking query so callers see which aggregate aborted.
    pub fn aggregate(query: &'static str) -> impl FnOnce(Error) -> Error {
        move |source| Error::AggregateQuery {
            query,
            source: Box::new(source),
        }
    }
}
