use std::io;

/// Custom error type for slack_deploy_bot operations
#[derive(Debug, thiserror::Error)]
pub enum DeployBotError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

/// Helper type for Results that use DeployBotError
pub type Result<T> = std::result::Result<T, DeployBotError>;
