//! Test-network faucet client
//!
//! Thin HTTP wrapper: request funds, hand back the transaction hash. The
//! caller awaits the hash through the chain executor.

use async_trait::async_trait;
use reqwest;
use serde::Deserialize;
use tracing::info;

use crate::error::WalletError;

/// Faucet collaborator: request test funds for an address, get back the
/// funding transaction hash.
#[async_trait]
pub trait FaucetService: Send + Sync {
    async fn request_funds(
        &self,
        asset: &str,
        network: &str,
        address: &str,
    ) -> Result<String, WalletError>;
}

pub struct FaucetClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl FaucetClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

#[async_trait]
impl FaucetService for FaucetClient {
    async fn request_funds(
        &self,
        asset: &str,
        network: &str,
        address: &str,
    ) -> Result<String, WalletError> {
        let url = format!(
            "{}/get-faucet?token={}&testnet={}&addr={}",
            self.base_url,
            asset.to_lowercase(),
            network,
            address
        );

        let resp = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| WalletError::Http(format!("faucet request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(WalletError::Http(format!(
                "faucet returned {}",
                resp.status()
            )));
        }

        #[derive(Deserialize)]
        struct FaucetResponse {
            #[serde(rename = "txHash")]
            tx_hash: String,
        }

        let data: FaucetResponse = resp
            .json()
            .await
            .map_err(|e| WalletError::Http(format!("faucet response parse error: {}", e)))?;

        info!(asset, address, tx_hash = data.tx_hash.as_str(), "faucet funds requested");
        Ok(data.tx_hash)
    }
}
