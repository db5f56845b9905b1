use chrono::Utc;
use slack_deploy_bot::auth::SigningContext;
use slack_deploy_bot::error::DeployBotError;
use slack_deploy_bot::github::GithubClient;
use slack_deploy_bot::handlers::router;
use slack_deploy_bot::{AppState, DeployConfig};
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tracing::{self, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:4567";
const DEFAULT_CONFIG_PATH: &str = "deploy_config.toml";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Load, parse and validate the configuration file
fn load_config(path: &str) -> Result<DeployConfig, DeployBotError> {
    let config_str = fs::read_to_string(path)?;
    let config: DeployConfig = toml::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

fn require_env(name: &str) -> Result<String, DeployBotError> {
    std::env::var(name).map_err(|_| DeployBotError::ConfigError(format!("{} must be set", name)))
}

/// Builds the process-wide state: config, signing context and GitHub client
/// are all constructed eagerly so a bad setup fails before the server binds.
fn build_state(config_path: &str) -> Result<AppState, DeployBotError> {
    let config = load_config(config_path)?;
    let signing = SigningContext::new(require_env("SLACK_SIGNING_SECRET")?);
    let github_token = require_env("GITHUB_TOKEN")?;
    let github_api_url =
        std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_GITHUB_API_URL.to_string());
    let github = GithubClient::new(github_token, github_api_url)?;

    Ok(AppState {
        config,
        signing,
        github,
        ref_override: std::env::var("GITHUB_REF_OVERRIDE").ok(),
        start_time: Instant::now(),
        started_at: Utc::now(),
    })
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    let config_path =
        std::env::var("DEPLOY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let state = match build_state(&config_path) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app = router(state);

    info!("Listening on {}", bind_address);
    info!("Using config at {:?}", config_path);
    let listener = tokio::net::TcpListener::bind(bind_address).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn example_config_loads_and_validates() {
        let config = load_config("deploy_config.example.toml").unwrap();
        assert!(config.repo_in_command());
        assert_eq!(config.workflow, "deploy.yml");
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let err = load_config("no_such_deploy_config.toml").unwrap_err();
        assert!(matches!(err, DeployBotError::IoError(_)));
    }

    #[test]
    fn malformed_config_file_is_a_parse_error() {
        let path =
            std::env::temp_dir().join(format!("deploy_config_{}.toml", uuid::Uuid::now_v7()));
        fs::write(&path, "workflow = ").unwrap();
        let err = load_config(path.to_str().unwrap()).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(matches!(err, DeployBotError::TomlParseError(_)));
    }
}
