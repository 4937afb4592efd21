use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{Chain, FlowNode};

/// What the wallet reports back for one executed flow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReceipt {
    pub node_id: String,
    pub tx_hash: String,
    /// Signed USD slippage of the step, when it swapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trading_loss: Option<f64>,
}

/// Signs and submits transactions for flow nodes.
#[async_trait]
pub trait Wallet: Send + Sync {
    fn address(&self) -> &str;

    async fn switch_chain(&self, chain: &Chain) -> anyhow::Result<()>;

    async fn execute_step(&self, chain: &Chain, node: &FlowNode) -> anyhow::Result<StepReceipt>;
}

/// Logs every call and returns synthetic hashes.
#[derive(Debug)]
pub struct DryRunWallet {
    address: String,
    nonce: AtomicU64,
}

impl DryRunWallet {
    pub fn new(address: impl Into<String>) -> Self {
        DryRunWallet {
            address: address.into(),
            nonce: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Wallet for DryRunWallet {
    fn address(&self) -> &str {
        &self.address
    }

    async fn switch_chain(&self, chain: &Chain) -> anyhow::Result<()> {
        info!(chain = %chain, chain_id = ?chain.chain_id(), "[dry-run] switch chain");
        Ok(())
    }

    async fn execute_step(&self, chain: &Chain, node: &FlowNode) -> anyhow::Result<StepReceipt> {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        info!(chain = %chain, step = %node.name, "[dry-run] execute");
        Ok(StepReceipt {
            node_id: node.id.clone(),
            tx_hash: format!("0x{nonce:064x}"),
            trading_loss: None,
        })
    }
}
