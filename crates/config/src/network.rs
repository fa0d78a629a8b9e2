//! Network identification.

use serde::{Deserialize, Serialize};

/// The public Neo N3 networks, plus a catch-all for private deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Neo MainNet (network magic 860833102).
    #[default]
    MainNet,
    /// Neo TestNet T5 (network magic 894710606).
    TestNet,
    /// Any other network; carries protocol defaults with a custom magic.
    Private,
}

impl NetworkType {
    /// Returns the network magic number.
    pub fn magic(&self) -> u32 {
        match self {
            NetworkType::MainNet => 860_833_102, // "NEO3" LE
            NetworkType::TestNet => 894_710_606,
            NetworkType::Private => 0,
        }
    }

    /// Parses a network name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Some(NetworkType::MainNet),
            "testnet" | "test" => Some(NetworkType::TestNet),
            "private" | "local" => Some(NetworkType::Private),
            _ => None,
        }
    }
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkType::MainNet => write!(f, "mainnet"),
            NetworkType::TestNet => write!(f, "testnet"),
            NetworkType::Private => write!(f, "private"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_values() {
        assert_eq!(NetworkType::MainNet.magic(), 860_833_102);
        assert_eq!(NetworkType::TestNet.magic(), 894_710_606);
    }

    #[test]
    fn parse_names() {
        assert_eq!(NetworkType::parse("MainNet"), Some(NetworkType::MainNet));
        assert_eq!(NetworkType::parse("test"), Some(NetworkType::TestNet));
        assert_eq!(NetworkType::parse("nope"), None);
    }
}
