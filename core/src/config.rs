//! Console configuration.
//!
//! Everything here has a default, so an empty JSON object or an empty
//! environment yields a working configuration.

use serde::{Deserialize, Serialize};

/// How store transitions treat contract violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractMode {
    /// Return the violation as an error.
    Strict,
    /// Log the violation and leave state unchanged.
    Tolerant,
}

impl Default for ContractMode {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ContractMode::Strict
        } else {
            ContractMode::Tolerant
        }
    }
}

impl ContractMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(ContractMode::Strict),
            "tolerant" => Some(ContractMode::Tolerant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConsoleConfig {
    pub contract_mode: ContractMode,
    /// Also send `Console::log` lines to the host as `LOG` frames.
    pub forward_logs: bool,
}

impl ConsoleConfig {
    /// Read `CONSOLE_CONTRACT_MODE` and `CONSOLE_FORWARD_LOGS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let contract_mode = lookup("CONSOLE_CONTRACT_MODE")
            .and_then(|v| ContractMode::parse(&v))
            .unwrap_or(defaults.contract_mode);
        let forward_logs = lookup("CONSOLE_FORWARD_LOGS")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(defaults.forward_logs);
        Self {
            contract_mode,
            forward_logs,
        }
    }

    pub fn strict() -> Self {
        Self {
            contract_mode: ContractMode::Strict,
            ..Self::default()
        }
    }

    pub fn tolerant() -> Self {
        Self {
            contract_mode: ContractMode::Tolerant,
            ..Self::default()
        }
    }
}
