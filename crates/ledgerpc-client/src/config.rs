use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use ledgerpc_common::{AccountId, LedgerError, Result};
use ledgerpc_orchestrator::BackoffConfig;
use serde::{Deserialize, Serialize};

/// How long a subscription keeps retrying errors its request marks retryable.
pub const DEFAULT_SUBSCRIPTION_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Client configuration, usually loaded from JSON.
///
/// ```json
/// {
///   "network": { "127.0.0.1:50211": "0.0.3", "127.0.0.1:50212": "0.0.4" },
///   "mirror_network": ["127.0.0.1:5600"],
///   "operator": "0.0.1001",
///   "backoff": { "max_attempts": 5 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `"host:port"` to node account id (`"shard.realm.num"`).
    pub network: HashMap<String, String>,
    /// Mirror node addresses, `"host:port"`.
    pub mirror_network: Vec<String>,
    /// Default payer for generated transaction ids.
    pub operator: Option<String>,
    pub regenerate_transaction_id: bool,
    pub backoff: BackoffConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: HashMap::new(),
            mirror_network: Vec::new(),
            operator: None,
            regenerate_transaction_id: true,
            backoff: BackoffConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LedgerError::Config(format!("invalid client config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Checks every address and account id without opening any channel.
    pub fn validate(&self) -> Result<()> {
        self.network_addresses()?;
        self.operator_account_id()?;

        for address in &self.mirror_network {
            validate_address(address)?;
        }

        if self.backoff.max_attempts == 0 {
            return Err(LedgerError::Config("backoff.max_attempts must be at least 1".to_string()));
        }

        Ok(())
    }

    /// The node address map with parsed account ids.
    pub fn network_addresses(&self) -> Result<HashMap<String, AccountId>> {
        self.network
            .iter()
            .map(|(address, account_id)| {
                validate_address(address)?;
                let account_id = account_id
                    .parse()
                    .map_err(|e| LedgerError::Config(format!("node {}: {}", address, e)))?;
                Ok((address.clone(), account_id))
            })
            .collect()
    }

    pub fn operator_account_id(&self) -> Result<Option<AccountId>> {
        self.operator
            .as_deref()
            .map(|operator| {
                operator
                    .parse()
                    .map_err(|e| LedgerError::Config(format!("operator: {}", e)))
            })
            .transpose()
    }
}

fn validate_address(address: &str) -> Result<()> {
    let valid = address
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());

    if valid {
        Ok(())
    } else {
        Err(LedgerError::Config(format!("invalid address '{}', expected host:port", address)))
    }
}
