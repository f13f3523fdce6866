use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WalletConfig {
    pub api_key: String,
    /// Network identifier passed to the faucet and executor ("goerli" etc.)
    pub network: String,
    pub faucet_url: String,
    pub swap_router: String,
    /// Opaque sponsorship address forwarded to the executor, never interpreted
    #[serde(default)]
    pub gas_sponsor: Option<String>,
    #[serde(default = "default_submit_timeout_secs")]
    pub submit_timeout_secs: u64,
    #[serde(default = "default_tracked_assets")]
    pub tracked_assets: Vec<String>,
}

fn default_submit_timeout_secs() -> u64 {
    120
}

fn default_tracked_assets() -> Vec<String> {
    vec!["ETH".to_string(), "USDC".to_string()]
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            network: "goerli".to_string(),
            faucet_url: "https://faucet.example.dev/demo-faucet".to_string(),
            swap_router: "0x7a250d5630b4cf539739df2c5dacb4c659f2488d".to_string(),
            gas_sponsor: None,
            submit_timeout_secs: default_submit_timeout_secs(),
            tracked_assets: default_tracked_assets(),
        }
    }
}

impl WalletConfig {
    pub fn load_or_default(path: &str) -> Self {
        if std::path::Path::new(path).exists() {
            match std::fs::read_to_string(path) {
                Ok(s) => match toml::from_str(&s) {
                    Ok(c) => {
                        info!("Config loaded from {}", path);
                        c
                    }
                    Err(e) => {
                        warn!("Error parsing config: {}. Using defaults.", e);
                        Self::default()
                    }
                },
                Err(e) => {
                    warn!("Error reading config: {}. Using defaults.", e);
                    Self::default()
                }
            }
        } else {
            info!("Config file not found at '{}'. Creating default.", path);
            let config = Self::default();
            if let Ok(s) = toml::to_string_pretty(&config) {
                let _ = std::fs::write(path, s);
            }
            config
        }
    }

    pub fn submit_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.submit_timeout_secs)
    }
}
