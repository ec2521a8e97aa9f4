//! Delegated credentials from a local helper command.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::process::Command;
use tracing::debug;

use super::{AccessToken, TokenProvider};
use crate::error::{Error, Result};

/// Lifetime assigned to helper-printed tokens, regardless of what the
/// helper itself would report.
pub const TOKEN_LIFETIME_MINUTES: i64 = 50;

/// Runs a command whose trimmed stdout is the bearer token.
#[derive(Debug, Clone)]
pub struct CommandTokenSource {
    program: String,
    args: Vec<String>,
    lifetime: Duration,
}

impl CommandTokenSource {
    /// `gcloud auth print-access-token`
    pub fn gcloud() -> Self {
        Self {
            program: "gcloud".to_string(),
            args: vec!["auth".to_string(), "print-access-token".to_string()],
            lifetime: Duration::minutes(TOKEN_LIFETIME_MINUTES),
        }
    }

    /// Arbitrary helper; the first element is the program.
    pub fn new(command: Vec<String>) -> Result<Self> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::Config("credential helper command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
            lifetime: Duration::minutes(TOKEN_LIFETIME_MINUTES),
        })
    }

    pub fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl TokenProvider for CommandTokenSource {
    async fn token(&self) -> Result<AccessToken> {
        debug!("Running credential helper `{}`", self.describe());
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| Error::Auth(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Auth(format!(
                "failed to get access token from {} ({}): {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(Error::Auth(format!(
                "{} printed an empty access token",
                self.program
            )));
        }

        Ok(AccessToken::new(token, Utc::now() + self.lifetime))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CachedToken;

    fn sh(script: &str) -> CommandTokenSource {
        CommandTokenSource::new(vec!["sh".into(), "-c".into(), script.into()]).unwrap()
    }

    #[tokio::test]
    async fn test_stdout_is_trimmed_token() {
        let token = sh("printf '  ya29.token \\n'").token().await.unwrap();
        assert_eq!(token.secret(), "ya29.token");
        let remaining = token.expires_at() - Utc::now();
        assert!(remaining > Duration::minutes(49));
        assert!(remaining <= Duration::minutes(TOKEN_LIFETIME_MINUTES));
    }

    #[tokio::test]
    async fn test_failing_helper_is_auth_error() {
        let err = sh("echo denied >&2; exit 3").token().await.unwrap_err();
        match err {
            Error::Auth(msg) => assert!(msg.contains("denied")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_output_is_auth_error() {
        assert!(matches!(sh("true").token().await, Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn test_missing_program_is_auth_error() {
        let source = CommandTokenSource::new(vec!["/nonexistent/gemctl-helper".into()]).unwrap();
        assert!(matches!(source.token().await, Err(Error::Auth(_))));
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(matches!(
            CommandTokenSource::new(vec![]),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_cached_helper_runs_once_within_lifetime() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("calls");
        let script = format!("echo call >> {}; echo tok", counter.display());
        let cache = CachedToken::new(sh(&script));

        assert_eq!(cache.token().await.unwrap().secret(), "tok");
        assert_eq!(cache.token().await.unwrap().secret(), "tok");

        let calls = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(calls.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_cached_helper_reruns_after_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("calls");
        let script = format!("echo call >> {}; echo tok", counter.display());
        let mut source = sh(&script);
        source.lifetime = Duration::zero();
        let cache = CachedToken::new(source);

        cache.token().await.unwrap();
        cache.token().await.unwrap();

        let calls = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(calls.lines().count(), 2);
    }
}
