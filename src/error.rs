#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::error::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid config file: {0}")]
    ConfigParseError(#[from] toml::de::Error),

    #[error("Could not serialize config: {0}")]
    ConfigWriteError(#[from] toml::ser::Error),

    #[error("Invalid url: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Invalid job path pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("No monitored site named {0:?} in config")]
    MissingSite(String),
}
