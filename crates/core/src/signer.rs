//! Transaction signer with witness scoping.

use crate::witness_rule::{WitnessRule, WitnessScope};
use crate::UInt160;
use neo_config::{EC_POINT_SIZE, MAX_SUBITEMS};
use neo_io::{BinaryReader, BinaryWriter, IoError, IoResult, Serializable};

/// One account signing a transaction, with the scope restricting where its
/// witness is honored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signer {
    pub account: UInt160,
    pub scopes: WitnessScope,
    /// Populated when scope includes `CUSTOM_CONTRACTS`.
    pub allowed_contracts: Vec<UInt160>,
    /// Populated when scope includes `CUSTOM_GROUPS`; 33-byte points.
    pub allowed_groups: Vec<Vec<u8>>,
    /// Populated when scope includes `WITNESS_RULES`.
    pub rules: Vec<WitnessRule>,
}

impl Signer {
    /// A signer with `CALLED_BY_ENTRY` scope.
    pub fn called_by_entry(account: UInt160) -> Self {
        Self {
            account,
            scopes: WitnessScope::CALLED_BY_ENTRY,
            allowed_contracts: Vec::new(),
            allowed_groups: Vec::new(),
            rules: Vec::new(),
        }
    }

    /// A signer with `GLOBAL` scope.
    pub fn global(account: UInt160) -> Self {
        Self {
            scopes: WitnessScope::GLOBAL,
            ..Self::called_by_entry(account)
        }
    }
}

impl Serializable for Signer {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.account.serialize(writer)?;
        writer.write_u8(self.scopes.bits());
        if self.scopes.contains(WitnessScope::CUSTOM_CONTRACTS) {
            writer.write_serializable_list(&self.allowed_contracts)?;
        }
        if self.scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            writer.write_var_int(self.allowed_groups.len() as u64);
            for group in &self.allowed_groups {
                writer.write_bytes(group);
            }
        }
        if self.scopes.contains(WitnessScope::WITNESS_RULES) {
            writer.write_serializable_list(&self.rules)?;
        }
        Ok(())
    }

    fn deserialize(reader: &mut BinaryReader<'_>) -> IoResult<Self> {
        let account = UInt160::deserialize(reader)?;
        let bits = reader.read_u8()?;
        let scopes = WitnessScope::from_bits(bits)
            .ok_or_else(|| IoError::invalid_format(format!("invalid witness scope {bits:#04x}")))?;
        if !scopes.is_valid() {
            return Err(IoError::invalid_format(
                "global scope cannot be combined with other flags",
            ));
        }

        let allowed_contracts = if scopes.contains(WitnessScope::CUSTOM_CONTRACTS) {
            reader.read_serializable_list::<UInt160>(MAX_SUBITEMS)?
        } else {
            Vec::new()
        };
        let allowed_groups = if scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            let count = reader.read_var_int(MAX_SUBITEMS as u64)? as usize;
            let mut groups = Vec::with_capacity(count);
            for _ in 0..count {
                groups.push(reader.read_bytes(EC_POINT_SIZE)?);
            }
            groups
        } else {
            Vec::new()
        };
        let rules = if scopes.contains(WitnessScope::WITNESS_RULES) {
            reader.read_serializable_list::<WitnessRule>(MAX_SUBITEMS)?
        } else {
            Vec::new()
        };

        Ok(Self {
            account,
            scopes,
            allowed_contracts,
            allowed_groups,
            rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::witness_rule::{WitnessCondition, WitnessRuleAction};

    #[test]
    fn round_trip_all_scopes() {
        let signer = Signer {
            account: UInt160::from([9u8; 20]),
            scopes: WitnessScope::CUSTOM_CONTRACTS
                | WitnessScope::CUSTOM_GROUPS
                | WitnessScope::WITNESS_RULES,
            allowed_contracts: vec![UInt160::from([1u8; 20])],
            allowed_groups: vec![vec![2u8; 33]],
            rules: vec![WitnessRule {
                action: WitnessRuleAction::Deny,
                condition: WitnessCondition::CalledByEntry,
            }],
        };
        let bytes = signer.to_bytes().unwrap();
        assert_eq!(Signer::from_bytes(&bytes).unwrap(), signer);
    }

    #[test]
    fn combined_global_scope_rejected() {
        let mut bytes = Signer::global(UInt160::ZERO).to_bytes().unwrap();
        *bytes.last_mut().unwrap() = 0x81; // GLOBAL | CALLED_BY_ENTRY
        assert!(Signer::from_bytes(&bytes).is_err());
    }
}
