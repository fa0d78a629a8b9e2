//! Protocol settings profiles.

use crate::hardfork::Hardfork;
use neo_config::{self as config, NetworkType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A fixed parameter set describing one network.
///
/// MainNet and TestNet carry the published activation heights; the private
/// profile carries protocol defaults (every hardfork active from genesis)
/// with a caller-chosen magic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSettings {
    /// Network magic, mixed into signed data.
    pub network: u32,
    /// Address version byte.
    pub address_version: u8,
    /// Number of consensus validators.
    pub validators_count: usize,
    /// Number of committee members.
    pub committee_members_count: usize,
    /// Target milliseconds between blocks.
    pub milliseconds_per_block: u32,
    /// Default bound on `valid_until_block` distance.
    pub max_valid_until_block_increment: u32,
    /// Maximum transactions per block.
    pub max_transactions_per_block: u32,
    /// Number of blocks a transaction stays traceable.
    pub max_traceable_blocks: u32,
    /// GAS distributed at genesis, in datoshi.
    pub initial_gas_distribution: i64,
    /// Hardfork activation heights. Absent forks never activate.
    pub hardforks: BTreeMap<Hardfork, u32>,
    /// Standby committee as 33-byte compressed points; validators are the
    /// first `validators_count` entries. Empty on private profiles unless
    /// the caller seeds one.
    pub standby_committee: Vec<Vec<u8>>,
}

impl ProtocolSettings {
    /// The MainNet profile.
    pub fn mainnet() -> Self {
        let mut hardforks = BTreeMap::new();
        hardforks.insert(Hardfork::Aspidochelone, 1_730_000);
        hardforks.insert(Hardfork::Basilisk, 4_120_000);
        hardforks.insert(Hardfork::Cockatrice, 5_450_000);
        hardforks.insert(Hardfork::Domovoi, 5_570_000);
        hardforks.insert(Hardfork::Echidna, 7_300_000);
        hardforks.insert(Hardfork::Faun, 8_600_000);
        Self {
            network: NetworkType::MainNet.magic(),
            hardforks,
            ..Self::base()
        }
    }

    /// The TestNet T5 profile.
    pub fn testnet() -> Self {
        let mut hardforks = BTreeMap::new();
        hardforks.insert(Hardfork::Aspidochelone, 210_000);
        hardforks.insert(Hardfork::Basilisk, 2_680_000);
        hardforks.insert(Hardfork::Cockatrice, 3_967_000);
        hardforks.insert(Hardfork::Domovoi, 4_144_000);
        hardforks.insert(Hardfork::Echidna, 5_870_000);
        hardforks.insert(Hardfork::Faun, 6_950_000);
        Self {
            network: NetworkType::TestNet.magic(),
            hardforks,
            ..Self::base()
        }
    }

    /// A profile with protocol defaults and every hardfork active from
    /// genesis, for private networks and test harnesses.
    pub fn default_with_magic(network: u32) -> Self {
        let hardforks = Hardfork::ALL.iter().map(|hf| (*hf, 0)).collect();
        Self {
            network,
            hardforks,
            ..Self::base()
        }
    }

    fn base() -> Self {
        Self {
            network: 0,
            address_version: config::ADDRESS_VERSION,
            validators_count: config::VALIDATORS_COUNT,
            committee_members_count: config::COMMITTEE_MEMBERS_COUNT,
            milliseconds_per_block: config::MILLISECONDS_PER_BLOCK,
            max_valid_until_block_increment: config::MAX_VALID_UNTIL_BLOCK_INCREMENT,
            max_transactions_per_block: config::MAX_TRANSACTIONS_PER_BLOCK,
            max_traceable_blocks: config::MAX_TRACEABLE_BLOCKS,
            initial_gas_distribution: config::INITIAL_GAS_DISTRIBUTION,
            hardforks: BTreeMap::new(),
            standby_committee: Vec::new(),
        }
    }

    /// Whether `hardfork` is active at `block_index`.
    pub fn is_hardfork_enabled(&self, hardfork: Hardfork, block_index: u32) -> bool {
        match self.hardforks.get(&hardfork) {
            Some(height) => *height <= block_index,
            None => false,
        }
    }

    /// The activation height of `hardfork`, if configured.
    pub fn hardfork_height(&self, hardfork: Hardfork) -> Option<u32> {
        self.hardforks.get(&hardfork).copied()
    }
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self::default_with_magic(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_profile() {
        let settings = ProtocolSettings::mainnet();
        assert_eq!(settings.network, 860_833_102);
        assert!(settings.is_hardfork_enabled(Hardfork::Aspidochelone, 1_730_000));
        assert!(!settings.is_hardfork_enabled(Hardfork::Aspidochelone, 1_729_999));
        assert!(!settings.is_hardfork_enabled(Hardfork::Faun, 7_300_000));
    }

    #[test]
    fn default_profile_activates_everything_at_genesis() {
        let settings = ProtocolSettings::default_with_magic(12345);
        assert_eq!(settings.network, 12345);
        for hf in Hardfork::ALL {
            assert!(settings.is_hardfork_enabled(hf, 0));
        }
    }

    #[test]
    fn hardfork_heights_are_monotone() {
        for settings in [ProtocolSettings::mainnet(), ProtocolSettings::testnet()] {
            let heights: Vec<u32> = Hardfork::ALL
                .iter()
                .filter_map(|hf| settings.hardfork_height(*hf))
                .collect();
            let mut sorted = heights.clone();
            sorted.sort_unstable();
            assert_eq!(heights, sorted);
        }
    }
}
