//! Transaction envelope.

use crate::signer::Signer;
use crate::witness::Witness;
use crate::{UInt160, UInt256};
use neo_config::{MAX_TRANSACTION_ATTRIBUTES, MAX_TRANSACTION_SIGNERS, MAX_TRANSACTION_SIZE};
use neo_cryptography::hash256;
use neo_io::{BinaryReader, BinaryWriter, IoError, IoResult, Serializable};

/// Maximum serialized script length in an envelope.
const MAX_SCRIPT_LENGTH: usize = u16::MAX as usize;
/// Maximum oracle response payload.
const MAX_ORACLE_RESULT: usize = u16::MAX as usize;

/// Oracle response verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OracleResponseCode {
    Success = 0x00,
    ProtocolNotSupported = 0x10,
    ConsensusUnreachable = 0x12,
    NotFound = 0x14,
    Timeout = 0x16,
    Forbidden = 0x18,
    ResponseTooLarge = 0x1a,
    InsufficientFunds = 0x1c,
    ContentTypeNotSupported = 0x1f,
    Error = 0xff,
}

impl OracleResponseCode {
    /// Decodes the wire byte.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Success),
            0x10 => Some(Self::ProtocolNotSupported),
            0x12 => Some(Self::ConsensusUnreachable),
            0x14 => Some(Self::NotFound),
            0x16 => Some(Self::Timeout),
            0x18 => Some(Self::Forbidden),
            0x1a => Some(Self::ResponseTooLarge),
            0x1c => Some(Self::InsufficientFunds),
            0x1f => Some(Self::ContentTypeNotSupported),
            0xff => Some(Self::Error),
            _ => None,
        }
    }
}

/// Typed transaction attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionAttribute {
    /// Priority admission into a block; committee-gated.
    HighPriority,
    /// Oracle response payload attached by the oracle committee.
    OracleResponse {
        id: u64,
        code: OracleResponseCode,
        result: Vec<u8>,
    },
    /// The transaction is invalid before this height.
    NotValidBefore { height: u32 },
    /// The transaction conflicts with another by hash.
    Conflicts { hash: UInt256 },
    /// Notary-assisted transaction with `n` keys.
    NotaryAssisted { n_keys: u8 },
}

impl TransactionAttribute {
    const TYPE_HIGH_PRIORITY: u8 = 0x01;
    const TYPE_ORACLE_RESPONSE: u8 = 0x11;
    const TYPE_NOT_VALID_BEFORE: u8 = 0x20;
    const TYPE_CONFLICTS: u8 = 0x21;
    const TYPE_NOTARY_ASSISTED: u8 = 0x22;

    /// The wire type byte.
    pub fn type_byte(&self) -> u8 {
        match self {
            TransactionAttribute::HighPriority => Self::TYPE_HIGH_PRIORITY,
            TransactionAttribute::OracleResponse { .. } => Self::TYPE_ORACLE_RESPONSE,
            TransactionAttribute::NotValidBefore { .. } => Self::TYPE_NOT_VALID_BEFORE,
            TransactionAttribute::Conflicts { .. } => Self::TYPE_CONFLICTS,
            TransactionAttribute::NotaryAssisted { .. } => Self::TYPE_NOTARY_ASSISTED,
        }
    }

    /// Whether several attributes of this type may coexist.
    pub fn allows_multiple(&self) -> bool {
        matches!(self, TransactionAttribute::Conflicts { .. })
    }
}

impl Serializable for TransactionAttribute {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u8(self.type_byte());
        match self {
            TransactionAttribute::HighPriority => {}
            TransactionAttribute::OracleResponse { id, code, result } => {
                writer.write_u64(*id);
                writer.write_u8(*code as u8);
                writer.write_var_bytes(result);
            }
            TransactionAttribute::NotValidBefore { height } => writer.write_u32(*height),
            TransactionAttribute::Conflicts { hash } => hash.serialize(writer)?,
            TransactionAttribute::NotaryAssisted { n_keys } => writer.write_u8(*n_keys),
        }
        Ok(())
    }

    fn deserialize(reader: &mut BinaryReader<'_>) -> IoResult<Self> {
        let type_byte = reader.read_u8()?;
        match type_byte {
            Self::TYPE_HIGH_PRIORITY => Ok(TransactionAttribute::HighPriority),
            Self::TYPE_ORACLE_RESPONSE => {
                let id = reader.read_u64()?;
                let code_byte = reader.read_u8()?;
                let code = OracleResponseCode::from_byte(code_byte).ok_or_else(|| {
                    IoError::invalid_format(format!("invalid oracle code {code_byte:#04x}"))
                })?;
                let result = reader.read_var_bytes(MAX_ORACLE_RESULT)?;
                if code != OracleResponseCode::Success && !result.is_empty() {
                    return Err(IoError::invalid_format(
                        "oracle result must be empty unless successful",
                    ));
                }
                Ok(TransactionAttribute::OracleResponse { id, code, result })
            }
            Self::TYPE_NOT_VALID_BEFORE => Ok(TransactionAttribute::NotValidBefore {
                height: reader.read_u32()?,
            }),
            Self::TYPE_CONFLICTS => Ok(TransactionAttribute::Conflicts {
                hash: UInt256::deserialize(reader)?,
            }),
            Self::TYPE_NOTARY_ASSISTED => Ok(TransactionAttribute::NotaryAssisted {
                n_keys: reader.read_u8()?,
            }),
            other => Err(IoError::invalid_format(format!(
                "unknown attribute type {other:#04x}"
            ))),
        }
    }
}

/// A Neo N3 transaction.
///
/// The hash covers the unsigned portion only; witnesses ride outside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u8,
    pub nonce: u32,
    /// Execution fee in datoshi.
    pub system_fee: i64,
    /// Size/verification fee in datoshi.
    pub network_fee: i64,
    pub valid_until_block: u32,
    pub signers: Vec<Signer>,
    pub attributes: Vec<TransactionAttribute>,
    pub script: Vec<u8>,
    pub witnesses: Vec<Witness>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: 0,
            nonce: 0,
            system_fee: 0,
            network_fee: 0,
            valid_until_block: 0,
            signers: Vec::new(),
            attributes: Vec::new(),
            script: Vec::new(),
            witnesses: Vec::new(),
        }
    }
}

impl Transaction {
    /// The sender is the first signer's account.
    pub fn sender(&self) -> UInt160 {
        self.signers
            .first()
            .map(|s| s.account)
            .unwrap_or(UInt160::ZERO)
    }

    /// Serializes the unsigned portion (everything but witnesses).
    pub fn serialize_unsigned(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u8(self.version);
        writer.write_u32(self.nonce);
        writer.write_i64(self.system_fee);
        writer.write_i64(self.network_fee);
        writer.write_u32(self.valid_until_block);
        writer.write_serializable_list(&self.signers)?;
        writer.write_serializable_list(&self.attributes)?;
        writer.write_var_bytes(&self.script);
        Ok(())
    }

    /// The transaction hash: double SHA-256 of the unsigned serialization.
    pub fn hash(&self) -> UInt256 {
        let mut writer = BinaryWriter::new();
        // The unsigned form cannot fail to serialize.
        let _ = self.serialize_unsigned(&mut writer);
        UInt256::from(hash256(writer.as_bytes()))
    }

    /// Validates the structural envelope rules that do not need state.
    pub fn validate_envelope(&self) -> IoResult<()> {
        if self.version != 0 {
            return Err(IoError::invalid_format("unsupported transaction version"));
        }
        if self.script.is_empty() {
            return Err(IoError::invalid_format("empty script"));
        }
        if self.signers.is_empty() {
            return Err(IoError::invalid_format("transaction needs a signer"));
        }
        if self.signers.len() > MAX_TRANSACTION_SIGNERS {
            return Err(IoError::invalid_format("too many signers"));
        }
        let mut seen = std::collections::HashSet::new();
        for signer in &self.signers {
            if !signer.scopes.is_valid() {
                return Err(IoError::invalid_format("invalid signer scope"));
            }
            if !seen.insert(signer.account) {
                return Err(IoError::invalid_format("duplicate signer account"));
            }
        }
        for attribute in &self.attributes {
            if !attribute.allows_multiple() {
                let duplicates = self
                    .attributes
                    .iter()
                    .filter(|a| a.type_byte() == attribute.type_byte())
                    .count();
                if duplicates > 1 {
                    return Err(IoError::invalid_format("duplicate attribute type"));
                }
            }
        }
        if self.system_fee < 0 || self.network_fee < 0 {
            return Err(IoError::invalid_format("negative fee"));
        }
        let size = self.to_bytes()?.len();
        if size > MAX_TRANSACTION_SIZE {
            return Err(IoError::LengthExceeded {
                length: size as u64,
                max: MAX_TRANSACTION_SIZE as u64,
            });
        }
        Ok(())
    }
}

impl Serializable for Transaction {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.serialize_unsigned(writer)?;
        writer.write_serializable_list(&self.witnesses)?;
        Ok(())
    }

    fn deserialize(reader: &mut BinaryReader<'_>) -> IoResult<Self> {
        let version = reader.read_u8()?;
        if version != 0 {
            return Err(IoError::invalid_format("unsupported transaction version"));
        }
        let nonce = reader.read_u32()?;
        let system_fee = reader.read_i64()?;
        if system_fee < 0 {
            return Err(IoError::invalid_format("negative system fee"));
        }
        let network_fee = reader.read_i64()?;
        if network_fee < 0 {
            return Err(IoError::invalid_format("negative network fee"));
        }
        let valid_until_block = reader.read_u32()?;
        let signers = reader.read_serializable_list::<Signer>(MAX_TRANSACTION_SIGNERS)?;
        if signers.is_empty() {
            return Err(IoError::invalid_format("transaction needs a signer"));
        }
        let attributes = reader
            .read_serializable_list::<TransactionAttribute>(MAX_TRANSACTION_ATTRIBUTES)?;
        let script = reader.read_var_bytes(MAX_SCRIPT_LENGTH)?;
        if script.is_empty() {
            return Err(IoError::invalid_format("empty script"));
        }
        let witnesses = reader.read_serializable_list::<Witness>(signers.len())?;
        Ok(Self {
            version,
            nonce,
            system_fee,
            network_fee,
            valid_until_block,
            signers,
            attributes,
            script,
            witnesses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            nonce: 0x01020304,
            system_fee: 100,
            network_fee: 200,
            valid_until_block: 1000,
            signers: vec![Signer::called_by_entry(UInt160::from([3u8; 20]))],
            attributes: vec![TransactionAttribute::HighPriority],
            script: vec![0x40],
            witnesses: vec![Witness::default()],
            ..Transaction::default()
        }
    }

    #[test]
    fn round_trip() {
        let tx = sample_tx();
        let bytes = tx.to_bytes().unwrap();
        assert_eq!(Transaction::from_bytes(&bytes).unwrap(), tx);
    }

    #[test]
    fn hash_ignores_witnesses() {
        let mut tx = sample_tx();
        let hash = tx.hash();
        tx.witnesses[0].invocation_script = vec![1, 2, 3];
        assert_eq!(tx.hash(), hash);
        tx.nonce += 1;
        assert_ne!(tx.hash(), hash);
    }

    #[test]
    fn duplicate_signers_rejected() {
        let mut tx = sample_tx();
        tx.signers.push(tx.signers[0].clone());
        tx.witnesses.push(Witness::default());
        assert!(tx.validate_envelope().is_err());
    }

    #[test]
    fn duplicate_attributes_rejected() {
        let mut tx = sample_tx();
        tx.attributes.push(TransactionAttribute::HighPriority);
        assert!(tx.validate_envelope().is_err());
    }

    #[test]
    fn conflicts_may_repeat() {
        let mut tx = sample_tx();
        tx.attributes = vec![
            TransactionAttribute::Conflicts {
                hash: UInt256::from([1u8; 32]),
            },
            TransactionAttribute::Conflicts {
                hash: UInt256::from([2u8; 32]),
            },
        ];
        assert!(tx.validate_envelope().is_ok());
    }

    #[test]
    fn oracle_result_must_be_empty_on_failure() {
        let attribute = TransactionAttribute::OracleResponse {
            id: 7,
            code: OracleResponseCode::Timeout,
            result: vec![1],
        };
        let bytes = attribute.to_bytes().unwrap();
        assert!(TransactionAttribute::from_bytes(&bytes).is_err());
    }
}
