//! Git provider token refresh DTOs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshGitTokenRequest {
    pub installation_id: i64,
}

/// Refresh reply; `in_progress` means another runner is already refreshing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshGitTokenResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub in_progress: bool,
}
