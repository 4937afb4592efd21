use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::ActionName;
use crate::model::{ChainName, ChainStatus};

/// Progress of one multi-chain action, persisted after every chain leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSession {
    pub id: Uuid,
    pub action: ActionName,
    pub address: String,
    pub chains: Vec<ChainName>,
    pub status: ChainStatus,
    pub started_at: DateTime<Utc>,
}

impl ActionSession {
    pub fn new(action: ActionName, address: &str, chains: Vec<ChainName>) -> Self {
        ActionSession {
            id: Uuid::new_v4(),
            action,
            address: address.to_string(),
            status: ChainStatus::pending(&chains),
            chains,
            started_at: Utc::now(),
        }
    }

    /// Cache key shared by every run of `action` for `address`.
    pub fn key(address: &str, action: ActionName) -> String {
        format!("{}:{action}", address.to_lowercase())
    }

    pub fn is_finished(&self) -> bool {
        self.status.all_complete(&self.chains)
    }

    /// An unfinished session over the same chains can be picked up again.
    pub fn can_resume(&self, chains: &[ChainName]) -> bool {
        !self.is_finished() && self.chains == chains
    }
}
