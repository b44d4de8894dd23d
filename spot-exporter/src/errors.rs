use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Configuration that parsed but cannot be used
    #[error("Config validation: {message}")]
    Config { message: String },

    /// Metric descriptor or registration error
    #[error(transparent)]
    Metrics(#[from] prometheus::Error),

    /// Failure building the metadata HTTP client
    #[error(transparent)]
    HttpClient(#[from] reqwest::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config { message: message.into() }
    }
}
