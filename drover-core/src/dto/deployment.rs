//! Deployment lookup DTOs

use serde::{Deserialize, Serialize};

use crate::domain::payload::DeploymentData;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDeploymentRequest {
    pub deployment_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDeploymentResponse {
    pub deployment: Option<DeploymentData>,
}
