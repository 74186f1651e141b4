//! Versioned method names understood by the orchestrator

pub const JOBS_GET_PENDING: &str = "Jobs.GetPendingV2";
pub const JOBS_MARK_COMPLETE: &str = "Jobs.MarkCompleteV1";
pub const JOBS_UPSERT_HEARTBEAT: &str = "Jobs.UpsertHeartbeatV1";
pub const JOBS_UPDATE_OUTPUT: &str = "Jobs.UpdateOutputV1";
pub const PING_SEND: &str = "Ping.SendV1";
pub const BUILDS_UPDATE: &str = "Builds.UpdateV1";
pub const PREVIEWS_UPDATE: &str = "Previews.UpdateV1";
pub const DEPLOYMENTS_UPDATE: &str = "Deployments.UpdateV1";
pub const DEPLOYMENTS_GET: &str = "Deployments.GetV1";
pub const CERTIFICATES_UPDATE: &str = "Certificates.UpdateV1";
pub const CLUSTERS_UPSERT: &str = "Clusters.UpsertV2";
pub const VPCS_UPSERT: &str = "Vpcs.UpsertV2";
pub const LOGS_ADD_FOR_JOB: &str = "Logs.AddForJobV1";
pub const NOTIFICATIONS_SEND: &str = "Notifications.SendV1";
pub const OAUTH_REFRESH_GIT_TOKEN: &str = "Oauth.RefreshGitProviderTokenV1";
pub const AGENTS_UPDATE_RESPONSE: &str = "Agents.UpdateResponseV1";
pub const AUTOMATIONS_UPDATE_RESPONSE: &str = "Automations.UpdateResponseV1";
