//! Liveness probe DTOs

use serde::{Deserialize, Serialize};

pub const PING: &str = "ping";
pub const PONG: &str = "pong";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ping {
    pub send: String,
}

impl Default for Ping {
    fn default() -> Self {
        Self {
            send: PING.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pong {
    #[serde(default)]
    pub send: String,
}

impl Pong {
    pub fn is_pong(&self) -> bool {
        self.send == PONG
    }
}
