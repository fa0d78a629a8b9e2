//! Witness scopes, rules and condition trees.

use crate::{UInt160, UInt256};
use bitflags::bitflags;
use neo_config::{EC_POINT_SIZE, MAX_NESTING_DEPTH, MAX_SUBITEMS};
use neo_io::{BinaryReader, BinaryWriter, IoError, IoResult, Serializable};

bitflags! {
    /// The contexts in which a signer's witness is usable.
    ///
    /// `GLOBAL` cannot be combined with any other flag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WitnessScope: u8 {
        const NONE = 0x00;
        const CALLED_BY_ENTRY = 0x01;
        const CUSTOM_CONTRACTS = 0x10;
        const CUSTOM_GROUPS = 0x20;
        const WITNESS_RULES = 0x40;
        const GLOBAL = 0x80;
    }
}

impl WitnessScope {
    /// Validates the combination rules.
    pub fn is_valid(&self) -> bool {
        if self.contains(WitnessScope::GLOBAL) {
            return *self == WitnessScope::GLOBAL;
        }
        true
    }
}

/// Whether a matched rule admits or rejects the witness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WitnessRuleAction {
    Deny = 0,
    Allow = 1,
}

/// One rule in a signer's `WITNESS_RULES` scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessRule {
    pub action: WitnessRuleAction,
    pub condition: WitnessCondition,
}

impl Serializable for WitnessRule {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u8(self.action as u8);
        self.condition.serialize_into(writer)
    }

    fn deserialize(reader: &mut BinaryReader<'_>) -> IoResult<Self> {
        let action = match reader.read_u8()? {
            0 => WitnessRuleAction::Deny,
            1 => WitnessRuleAction::Allow,
            other => {
                return Err(IoError::invalid_format(format!(
                    "invalid witness rule action {other:#04x}"
                )))
            }
        };
        let condition = WitnessCondition::deserialize_from(reader, 0)?;
        Ok(Self { action, condition })
    }
}

/// A witness condition tree, nesting bounded at two levels with at most
/// sixteen subitems per AND/OR node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WitnessCondition {
    Boolean(bool),
    Not(Box<WitnessCondition>),
    And(Vec<WitnessCondition>),
    Or(Vec<WitnessCondition>),
    ScriptHash(UInt160),
    Group(Vec<u8>),
    CalledByEntry,
    CalledByContract(UInt160),
    CalledByGroup(Vec<u8>),
}

impl WitnessCondition {
    const TYPE_BOOLEAN: u8 = 0x00;
    const TYPE_NOT: u8 = 0x01;
    const TYPE_AND: u8 = 0x02;
    const TYPE_OR: u8 = 0x03;
    const TYPE_SCRIPT_HASH: u8 = 0x18;
    const TYPE_GROUP: u8 = 0x19;
    const TYPE_CALLED_BY_ENTRY: u8 = 0x20;
    const TYPE_CALLED_BY_CONTRACT: u8 = 0x28;
    const TYPE_CALLED_BY_GROUP: u8 = 0x29;

    /// The wire type byte.
    pub fn type_byte(&self) -> u8 {
        match self {
            WitnessCondition::Boolean(_) => Self::TYPE_BOOLEAN,
            WitnessCondition::Not(_) => Self::TYPE_NOT,
            WitnessCondition::And(_) => Self::TYPE_AND,
            WitnessCondition::Or(_) => Self::TYPE_OR,
            WitnessCondition::ScriptHash(_) => Self::TYPE_SCRIPT_HASH,
            WitnessCondition::Group(_) => Self::TYPE_GROUP,
            WitnessCondition::CalledByEntry => Self::TYPE_CALLED_BY_ENTRY,
            WitnessCondition::CalledByContract(_) => Self::TYPE_CALLED_BY_CONTRACT,
            WitnessCondition::CalledByGroup(_) => Self::TYPE_CALLED_BY_GROUP,
        }
    }

    fn serialize_into(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u8(self.type_byte());
        match self {
            WitnessCondition::Boolean(expression) => writer.write_bool(*expression),
            WitnessCondition::Not(inner) => inner.serialize_into(writer)?,
            WitnessCondition::And(items) | WitnessCondition::Or(items) => {
                writer.write_var_int(items.len() as u64);
                for item in items {
                    item.serialize_into(writer)?;
                }
            }
            WitnessCondition::ScriptHash(hash) | WitnessCondition::CalledByContract(hash) => {
                hash.serialize(writer)?;
            }
            WitnessCondition::Group(point) | WitnessCondition::CalledByGroup(point) => {
                writer.write_bytes(point);
            }
            WitnessCondition::CalledByEntry => {}
        }
        Ok(())
    }

    fn deserialize_from(reader: &mut BinaryReader<'_>, depth: usize) -> IoResult<Self> {
        if depth > MAX_NESTING_DEPTH {
            return Err(IoError::invalid_format(format!(
                "witness condition nesting exceeds {MAX_NESTING_DEPTH}"
            )));
        }
        let type_byte = reader.read_u8()?;
        let condition = match type_byte {
            Self::TYPE_BOOLEAN => WitnessCondition::Boolean(reader.read_bool()?),
            Self::TYPE_NOT => {
                WitnessCondition::Not(Box::new(Self::deserialize_from(reader, depth + 1)?))
            }
            Self::TYPE_AND | Self::TYPE_OR => {
                let count = reader.read_var_int(MAX_SUBITEMS as u64)? as usize;
                if count == 0 {
                    return Err(IoError::invalid_format("empty AND/OR condition"));
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(Self::deserialize_from(reader, depth + 1)?);
                }
                if type_byte == Self::TYPE_AND {
                    WitnessCondition::And(items)
                } else {
                    WitnessCondition::Or(items)
                }
            }
            Self::TYPE_SCRIPT_HASH => WitnessCondition::ScriptHash(UInt160::deserialize(reader)?),
            Self::TYPE_GROUP => WitnessCondition::Group(reader.read_bytes(EC_POINT_SIZE)?),
            Self::TYPE_CALLED_BY_ENTRY => WitnessCondition::CalledByEntry,
            Self::TYPE_CALLED_BY_CONTRACT => {
                WitnessCondition::CalledByContract(UInt160::deserialize(reader)?)
            }
            Self::TYPE_CALLED_BY_GROUP => {
                WitnessCondition::CalledByGroup(reader.read_bytes(EC_POINT_SIZE)?)
            }
            other => {
                return Err(IoError::invalid_format(format!(
                    "unknown witness condition type {other:#04x}"
                )))
            }
        };
        Ok(condition)
    }

    /// Evaluates the condition against a witness-check context.
    ///
    /// `calling` is the hash of the contract performing the check, `entry`
    /// the entry script hash, and `current_groups` the groups of the
    /// calling contract's manifest.
    pub fn matches(&self, ctx: &WitnessMatchContext<'_>) -> bool {
        match self {
            WitnessCondition::Boolean(expression) => *expression,
            WitnessCondition::Not(inner) => !inner.matches(ctx),
            WitnessCondition::And(items) => items.iter().all(|c| c.matches(ctx)),
            WitnessCondition::Or(items) => items.iter().any(|c| c.matches(ctx)),
            WitnessCondition::ScriptHash(hash) => ctx.current == *hash,
            WitnessCondition::Group(point) => ctx.current_groups.iter().any(|g| g == point),
            WitnessCondition::CalledByEntry => ctx.calling == ctx.entry || ctx.current == ctx.entry,
            WitnessCondition::CalledByContract(hash) => ctx.calling == *hash,
            WitnessCondition::CalledByGroup(point) => {
                ctx.calling_groups.iter().any(|g| g == point)
            }
        }
    }
}

/// The execution facts a witness condition is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct WitnessMatchContext<'a> {
    /// Hash of the contract performing the CheckWitness.
    pub current: UInt160,
    /// Hash of the contract that called it (entry hash at top level).
    pub calling: UInt160,
    /// Entry script hash of the execution.
    pub entry: UInt160,
    /// Manifest groups of the current contract.
    pub current_groups: &'a [Vec<u8>],
    /// Manifest groups of the calling contract.
    pub calling_groups: &'a [Vec<u8>],
    /// Container hash for diagnostics.
    pub container: Option<UInt256>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(condition: WitnessCondition) -> WitnessRule {
        WitnessRule {
            action: WitnessRuleAction::Allow,
            condition,
        }
    }

    #[test]
    fn global_scope_is_exclusive() {
        assert!(WitnessScope::GLOBAL.is_valid());
        let combined = WitnessScope::GLOBAL | WitnessScope::CALLED_BY_ENTRY;
        assert!(!combined.is_valid());
        assert!((WitnessScope::CUSTOM_CONTRACTS | WitnessScope::WITNESS_RULES).is_valid());
    }

    #[test]
    fn rule_round_trip() {
        let original = rule(WitnessCondition::And(vec![
            WitnessCondition::Boolean(true),
            WitnessCondition::Not(Box::new(WitnessCondition::CalledByEntry)),
        ]));
        let bytes = original.to_bytes().unwrap();
        assert_eq!(WitnessRule::from_bytes(&bytes).unwrap(), original);
    }

    #[test]
    fn nesting_depth_is_bounded() {
        // NOT(NOT(NOT(bool))) exceeds depth 2.
        let bytes = [1u8, 1, 1, 1, 0, 1];
        let mut reader = BinaryReader::new(&bytes);
        assert!(WitnessRule::deserialize(&mut reader).is_err());
    }

    #[test]
    fn condition_evaluation() {
        let entry = UInt160::from([1u8; 20]);
        let current = UInt160::from([2u8; 20]);
        let ctx = WitnessMatchContext {
            current,
            calling: entry,
            entry,
            ..Default::default()
        };
        assert!(WitnessCondition::CalledByEntry.matches(&ctx));
        assert!(WitnessCondition::ScriptHash(current).matches(&ctx));
        assert!(!WitnessCondition::ScriptHash(entry).matches(&ctx));
        assert!(WitnessCondition::Or(vec![
            WitnessCondition::Boolean(false),
            WitnessCondition::CalledByContract(entry),
        ])
        .matches(&ctx));
    }
}
