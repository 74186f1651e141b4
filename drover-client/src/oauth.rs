//! Git provider token refresh

use crate::ControlChannel;
use crate::error::{ClientError, Result};
use drover_core::dto::methods;
use drover_core::dto::oauth::{RefreshGitTokenRequest, RefreshGitTokenResponse};

impl ControlChannel {
    /// Ask the server for a fresh delegated git token
    ///
    /// # Arguments
    /// * `installation_id` - Git provider installation the token belongs to
    /// * `organization_id` - Organization owning the installation
    ///
    /// # Errors
    /// [`ClientError::RefreshInProgress`] when another refresh is underway
    pub async fn refresh_git_token(&self, installation_id: i64, organization_id: &str) -> Result<String> {
        let response: RefreshGitTokenResponse = self
            .call_for(
                methods::OAUTH_REFRESH_GIT_TOKEN,
                organization_id,
                RefreshGitTokenRequest { installation_id },
            )
            .await?;

        if response.in_progress {
            return Err(ClientError::RefreshInProgress);
        }

        response.token.ok_or_else(|| {
            ClientError::ParseError("token refresh reply did not carry a token".to_string())
        })
    }
}
