use std::sync::Arc;

use log::info;
use tokio_util::sync::CancellationToken;

use super::retention::DEFAULT_KEEP;
use super::Registry;
use crate::auth::Token;
use crate::config::Config;
use crate::error::{Result, SweepError};
use crate::providers::gitlab::{CurrentUser, GitLabClient, MAX_PAGE_SIZE};

/// Knobs shared by every pipeline a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSettings {
    pub workers: usize,
    pub page_size: usize,
    pub keep: usize,
    pub min_access_level: u8,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            workers: 10,
            page_size: MAX_PAGE_SIZE,
            keep: DEFAULT_KEEP,
            min_access_level: 40,
        }
    }
}

impl From<&Config> for SweepSettings {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.pipeline.workers,
            page_size: config.pipeline.page_size,
            keep: config.retention.keep,
            min_access_level: config.search.min_access_level,
        }
    }
}

/// An authenticated registry handle plus the settings and cancellation
/// token used by every operation started from it.
pub struct Session {
    registry: Arc<Registry>,
    settings: SweepSettings,
    cancel: CancellationToken,
    user: Option<CurrentUser>,
}

impl Session {
    /// Connects to a GitLab instance and checks the token by asking who it
    /// belongs to.
    pub async fn connect(base_url: &str, token: Option<Token>, settings: SweepSettings) -> Result<Self> {
        let token = token.filter(|t| !t.as_str().is_empty()).ok_or_else(|| {
            SweepError::Config(
                "a GitLab token is required (use --token, GITLAB_TOKEN or gitlab.token)".to_string(),
            )
        })?;

        let client = GitLabClient::new(base_url, Some(token))?;
        let user = client.current_user().await?;
        info!("Authenticated to {} as {}", client.web_url(), user.username);

        Ok(Self {
            registry: Arc::new(client),
            settings,
            cancel: CancellationToken::new(),
            user: Some(user),
        })
    }

    /// Wraps an existing registry without validating it.
    pub fn new(registry: Arc<Registry>, settings: SweepSettings) -> Self {
        Self {
            registry,
            settings,
            cancel: CancellationToken::new(),
            user: None,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    /// Cancelling the returned token stops every pipeline of this session.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_follow_config() {
        let mut config = Config::default();
        config.pipeline.workers = 3;
        config.retention.keep = 5;

        let settings = SweepSettings::from(&config);
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.keep, 5);
        assert_eq!(settings.page_size, 100);
        assert_eq!(SweepSettings::from(&Config::default()), SweepSettings::default());
    }

    #[tokio::test]
    async fn test_connect_requires_token() {
        let result = Session::connect("https://gitlab.com", None, SweepSettings::default()).await;
        assert!(matches!(result, Err(SweepError::Config(_))));
    }

    #[tokio::test]
    async fn test_connect_validates_token() {
        let mut server = mockito::Server::new_async().await;
        let _user = server
            .mock("GET", "/api/v4/user")
            .match_header("authorization", "Bearer glpat-good")
            .with_status(200)
            .with_body(r#"{"id": 7, "username": "ops-bot"}"#)
            .create_async()
            .await;

        let session = tokio_test::assert_ok!(
            Session::connect(
                &server.url(),
                Some(Token::from("glpat-good")),
                SweepSettings::default(),
            )
            .await
        );

        assert_eq!(session.user().map(|u| u.username.as_str()), Some("ops-bot"));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_token() {
        let mut server = mockito::Server::new_async().await;
        let _user = server
            .mock("GET", "/api/v4/user")
            .with_status(401)
            .with_body(r#"{"message":"401 Unauthorized"}"#)
            .create_async()
            .await;

        let result = Session::connect(
            &server.url(),
            Some(Token::from("glpat-bad")),
            SweepSettings::default(),
        )
        .await;

        assert!(matches!(result, Err(SweepError::Api { status: 401, .. })));
    }
}
