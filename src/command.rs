//! Deploy command parsing and allow-list validation.

use regex::Regex;
use std::sync::LazyLock;

use crate::{DeployConfig, RepoConfig};

// Conservative allow-list for a source-control ref name. ASCII only;
// rejects whitespace, shell metacharacters and anything traversal-shaped.
static BRANCH_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_./-]+$").unwrap());

/// A parsed slash-command payload. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployCommand {
    pub team_id: String,
    pub repo: Option<String>,
    pub stage: String,
    pub branch: String,
    pub user_id: String,
}

/// Why a command was turned away before dispatch.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    MissingArgs(String),

    #[error("Invalid repo. Allowed repos: {0}")]
    UnknownRepo(String),

    #[error("Invalid stage. Allowed stages: {0}")]
    UnknownStage(String),

    #[error("Invalid branch name.")]
    InvalidBranch,
}

/// Splits trimmed text on runs of whitespace into at most `limit` tokens.
/// Whatever follows the second-to-last split point stays attached to the
/// final token, so "a b  c d" with limit 3 yields ["a", "b", "c d"].
fn split_command(text: &str, limit: usize) -> Vec<&str> {
    let mut tokens = Vec::with_capacity(limit);
    let mut rest = text.trim();
    while tokens.len() + 1 < limit {
        match rest.find(char::is_whitespace) {
            Some(idx) => {
                tokens.push(&rest[..idx]);
                rest = rest[idx..].trim_start();
            }
            None => break,
        }
    }
    if !rest.is_empty() {
        tokens.push(rest);
    }
    tokens
}

pub fn usage_text(repo_in_command: bool) -> String {
    if repo_in_command {
        "Usage: /deploy <repo> <stage> <branch>\nExample: /deploy golfee staging_two main"
            .to_string()
    } else {
        "Usage: /deploy <stage> <branch>\nExample: /deploy staging_two main".to_string()
    }
}

/// Parses the free-text command into a `DeployCommand`.
///
/// In 3-token mode the tokens are repo, stage, branch; in 2-token mode the
/// configured single repo is implied and the tokens are stage, branch.
pub fn parse_command(
    text: &str,
    team_id: &str,
    user_id: &str,
    repo_in_command: bool,
) -> Result<DeployCommand, CommandError> {
    let expected = if repo_in_command { 3 } else { 2 };
    let tokens = split_command(text, expected);
    if tokens.len() < expected {
        return Err(CommandError::MissingArgs(usage_text(repo_in_command)));
    }

    let (repo, stage, branch) = if repo_in_command {
        (Some(tokens[0]), tokens[1], tokens[2])
    } else {
        (None, tokens[0], tokens[1])
    };

    Ok(DeployCommand {
        team_id: team_id.to_string(),
        repo: repo.map(str::to_string),
        stage: stage.to_string(),
        branch: branch.to_string(),
        user_id: user_id.to_string(),
    })
}

/// Validates a parsed command against the configured allow-lists.
///
/// Checks run in order repo, stage, branch and stop at the first failure.
/// Returns the repo config the dispatch call should target.
pub fn validate<'a>(
    config: &'a DeployConfig,
    command: &DeployCommand,
) -> Result<&'a RepoConfig, CommandError> {
    let repo = config
        .resolve_repo(command.repo.as_deref())
        .ok_or_else(|| CommandError::UnknownRepo(config.repo_names().join(", ")))?;

    if !config.is_allowed_stage(&command.stage) {
        return Err(CommandError::UnknownStage(config.allowed_stages.join(", ")));
    }

    if !BRANCH_REF_RE.is_match(&command.branch) {
        return Err(CommandError::InvalidBranch);
    }

    Ok(repo)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_token_config() -> DeployConfig {
        toml::from_str(
            r#"
            allowed_stages = ["staging_one", "staging_two", "staging_three"]
            workflow = "deploy.yml"
            repo_in_command = true

            [[repo]]
            name = "golfee"
            repository = "acme/golfee"

            [[repo]]
            name = "caddie"
            repository = "acme/caddie"
            "#,
        )
        .unwrap()
    }

    fn two_token_config() -> DeployConfig {
        toml::from_str(
            r#"
            allowed_stages = ["staging_one", "staging_two", "staging_three"]
            workflow = "deploy.yml"
            repo_in_command = false

            [[repo]]
            name = "golfee"
            repository = "acme/golfee"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn parses_three_tokens() {
        let cmd = parse_command("golfee staging_two main", "T1", "U1", true).unwrap();
        assert_eq!(cmd.repo.as_deref(), Some("golfee"));
        assert_eq!(cmd.stage, "staging_two");
        assert_eq!(cmd.branch, "main");
        assert_eq!(cmd.user_id, "U1");
    }

    #[test]
    fn parses_two_tokens() {
        let cmd = parse_command("staging_two main", "T1", "U1", false).unwrap();
        assert_eq!(cmd.repo, None);
        assert_eq!(cmd.stage, "staging_two");
        assert_eq!(cmd.branch, "main");
    }

    #[test]
    fn collapses_whitespace_runs() {
        let cmd = parse_command("  golfee \t staging_two   main  ", "T1", "U1", true).unwrap();
        assert_eq!(cmd.repo.as_deref(), Some("golfee"));
        assert_eq!(cmd.stage, "staging_two");
        assert_eq!(cmd.branch, "main");
    }

    #[test]
    fn single_token_yields_usage_help() {
        let err = parse_command("staging_two", "T1", "U1", true).unwrap_err();
        match err {
            CommandError::MissingArgs(usage) => {
                assert!(usage.contains("Usage: /deploy <repo> <stage> <branch>"));
                assert!(usage.contains("Example: /deploy golfee staging_two main"));
            }
            other => panic!("expected MissingArgs, got {:?}", other),
        }

        let err = parse_command("staging_two", "T1", "U1", false).unwrap_err();
        match err {
            CommandError::MissingArgs(usage) => {
                assert!(usage.contains("Usage: /deploy <stage> <branch>"));
            }
            other => panic!("expected MissingArgs, got {:?}", other),
        }
    }

    #[test]
    fn empty_text_yields_usage_help() {
        let err = parse_command("   ", "T1", "U1", false).unwrap_err();
        assert!(matches!(err, CommandError::MissingArgs(_)));
    }

    #[test]
    fn remainder_folds_into_branch_token() {
        let cmd = parse_command("golfee staging_two main extra words", "T1", "U1", true).unwrap();
        assert_eq!(cmd.branch, "main extra words");

        // The folded remainder then fails the branch check.
        let err = validate(&three_token_config(), &cmd).unwrap_err();
        assert_eq!(err, CommandError::InvalidBranch);
    }

    #[test]
    fn validates_in_repo_stage_branch_order() {
        let config = three_token_config();
        let cmd = parse_command("bogus bogus bogus", "T1", "U1", true).unwrap();
        let err = validate(&config, &cmd).unwrap_err();
        assert_eq!(
            err,
            CommandError::UnknownRepo("golfee, caddie".to_string())
        );

        let cmd = parse_command("golfee bogus bogus", "T1", "U1", true).unwrap();
        let err = validate(&config, &cmd).unwrap_err();
        assert_eq!(
            err,
            CommandError::UnknownStage("staging_one, staging_two, staging_three".to_string())
        );

        let cmd = parse_command("golfee staging_two bo gus", "T1", "U1", true).unwrap();
        let err = validate(&config, &cmd).unwrap_err();
        assert_eq!(err, CommandError::InvalidBranch);
    }

    #[test]
    fn accepts_conventional_branch_names() {
        let config = two_token_config();
        for branch in ["main", "feature/fix-1.2", "release/v2", "hotfix_1"] {
            let cmd = parse_command(&format!("staging_two {}", branch), "T1", "U1", false).unwrap();
            assert!(validate(&config, &cmd).is_ok(), "rejected {}", branch);
        }
    }

    #[test]
    fn rejects_hazardous_branch_names() {
        let config = two_token_config();
        for text in [
            "staging_two ; rm -rf /",
            "staging_two main; evil",
            "staging_two $(reboot)",
            "staging_two heads?x=1",
        ] {
            let cmd = parse_command(text, "T1", "U1", false).unwrap();
            assert_eq!(
                validate(&config, &cmd).unwrap_err(),
                CommandError::InvalidBranch,
                "accepted {:?}",
                text
            );
        }
    }

    #[test]
    fn two_token_mode_targets_the_single_configured_repo() {
        let config = two_token_config();
        let cmd = parse_command("staging_two main", "T1", "U1", false).unwrap();
        let repo = validate(&config, &cmd).unwrap();
        assert_eq!(repo.repository, "acme/golfee");
    }

    #[test]
    fn error_display_matches_chat_texts() {
        assert_eq!(
            CommandError::UnknownStage("a, b".to_string()).to_string(),
            "Invalid stage. Allowed stages: a, b"
        );
        assert_eq!(
            CommandError::InvalidBranch.to_string(),
            "Invalid branch name."
        );
    }
}
