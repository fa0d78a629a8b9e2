//! Deployed contract state, NEF files and method tokens.

use crate::manifest::ContractManifest;
use crate::{ContractError, ContractResult};
use neo_core::UInt160;
use neo_cryptography::{hash160, hash256};
use neo_io::{BinaryReader, BinaryWriter, IoError, IoResult, Serializable};
use neo_vm::CallFlags;

/// "NEF3" little-endian.
pub const NEF_MAGIC: u32 = 0x3346_454E;
/// Maximum NEF script length.
pub const MAX_NEF_SCRIPT: usize = 512 * 1024;
/// Maximum method tokens per NEF.
pub const MAX_METHOD_TOKENS: usize = 128;
/// Maximum source URL length.
pub const MAX_SOURCE_LENGTH: usize = 256;

/// One entry of a NEF's method-token table: a pre-encoded call site used
/// by CALLT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodToken {
    pub hash: UInt160,
    pub method: String,
    pub parameters_count: u16,
    pub has_return_value: bool,
    pub call_flags: CallFlags,
}

impl Serializable for MethodToken {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.hash.serialize(writer)?;
        writer.write_var_string(&self.method);
        writer.write_u16(self.parameters_count);
        writer.write_bool(self.has_return_value);
        writer.write_u8(self.call_flags.bits());
        Ok(())
    }

    fn deserialize(reader: &mut BinaryReader<'_>) -> IoResult<Self> {
        let hash = UInt160::deserialize(reader)?;
        let method = reader.read_var_string(32)?;
        if method.starts_with('_') {
            return Err(IoError::invalid_format(
                "method token cannot target a reserved method",
            ));
        }
        let parameters_count = reader.read_u16()?;
        let has_return_value = reader.read_bool()?;
        let flag_bits = reader.read_u8()?;
        let call_flags = CallFlags::from_bits(flag_bits)
            .ok_or_else(|| IoError::invalid_format(format!("invalid call flags {flag_bits:#04x}")))?;
        Ok(MethodToken {
            hash,
            method,
            parameters_count,
            has_return_value,
            call_flags,
        })
    }
}

/// The Neo Executable Format: compiler tag, method tokens, script, and a
/// double-SHA checksum over everything before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NefFile {
    pub compiler: String,
    pub source: String,
    pub tokens: Vec<MethodToken>,
    pub script: Vec<u8>,
    pub checksum: u32,
}

impl NefFile {
    /// Builds a NEF with a freshly computed checksum.
    pub fn new(compiler: &str, script: Vec<u8>) -> ContractResult<NefFile> {
        let mut nef = NefFile {
            compiler: compiler.to_string(),
            source: String::new(),
            tokens: Vec::new(),
            script,
            checksum: 0,
        };
        nef.checksum = nef.compute_checksum()?;
        Ok(nef)
    }

    fn serialize_without_checksum(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(NEF_MAGIC);
        writer.write_fixed_string(&self.compiler, 64)?;
        writer.write_var_string(&self.source);
        writer.write_u8(0);
        writer.write_serializable_list(&self.tokens)?;
        writer.write_u16(0);
        writer.write_var_bytes(&self.script);
        Ok(())
    }

    /// The checksum: first four bytes of hash256 of the body.
    pub fn compute_checksum(&self) -> ContractResult<u32> {
        let mut writer = BinaryWriter::new();
        self.serialize_without_checksum(&mut writer)?;
        let digest = hash256(writer.as_bytes());
        Ok(u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]))
    }

    /// Validates structure and checksum.
    pub fn validate(&self) -> ContractResult<()> {
        if self.script.is_empty() {
            return Err(ContractError::InvalidContract("empty NEF script".into()));
        }
        if self.script.len() > MAX_NEF_SCRIPT {
            return Err(ContractError::InvalidContract(format!(
                "NEF script exceeds {MAX_NEF_SCRIPT} bytes"
            )));
        }
        if self.checksum != self.compute_checksum()? {
            return Err(ContractError::InvalidContract("NEF checksum mismatch".into()));
        }
        Ok(())
    }
}

impl Serializable for NefFile {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.serialize_without_checksum(writer)?;
        writer.write_u32(self.checksum);
        Ok(())
    }

    fn deserialize(reader: &mut BinaryReader<'_>) -> IoResult<Self> {
        let magic = reader.read_u32()?;
        if magic != NEF_MAGIC {
            return Err(IoError::invalid_format(format!("bad NEF magic {magic:#010x}")));
        }
        let compiler_bytes = reader.read_bytes(64)?;
        let compiler = String::from_utf8_lossy(&compiler_bytes)
            .trim_end_matches('\0')
            .to_string();
        let source = reader.read_var_string(MAX_SOURCE_LENGTH)?;
        let reserved = reader.read_u8()?;
        if reserved != 0 {
            return Err(IoError::invalid_format("NEF reserved byte must be zero"));
        }
        let tokens = reader.read_serializable_list::<MethodToken>(MAX_METHOD_TOKENS)?;
        let reserved = reader.read_u16()?;
        if reserved != 0 {
            return Err(IoError::invalid_format("NEF reserved word must be zero"));
        }
        let script = reader.read_var_bytes(MAX_NEF_SCRIPT)?;
        let checksum = reader.read_u32()?;
        Ok(NefFile {
            compiler,
            source,
            tokens,
            script,
            checksum,
        })
    }
}

/// A deployed (or native) contract as persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractState {
    /// Sequential id; negative for natives.
    pub id: i32,
    pub update_counter: u16,
    pub hash: UInt160,
    pub nef: NefFile,
    pub manifest: ContractManifest,
}

impl ContractState {
    /// Computes a deployed contract's hash from its deployment facts.
    pub fn compute_hash(sender: &UInt160, nef_checksum: u32, name: &str) -> UInt160 {
        let mut builder = neo_vm::ScriptBuilder::new();
        builder.emit(neo_vm::OpCode::ABORT);
        builder.emit_push_bytes(sender.as_bytes());
        builder.emit_push_int(i64::from(nef_checksum));
        builder.emit_push_string(name);
        UInt160::from(hash160(builder.as_bytes()))
    }

    /// Serializes to the storage encoding (id, counter, hash, nef,
    /// manifest JSON).
    pub fn to_storage_bytes(&self) -> ContractResult<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        writer.write_i32(self.id);
        writer.write_u16(self.update_counter);
        self.hash.serialize(&mut writer)?;
        let nef_bytes = self.nef.to_bytes()?;
        writer.write_var_bytes(&nef_bytes);
        writer.write_var_bytes(&self.manifest.to_json());
        Ok(writer.into_bytes())
    }

    /// Inverse of [`ContractState::to_storage_bytes`].
    pub fn from_storage_bytes(bytes: &[u8]) -> ContractResult<ContractState> {
        let mut reader = BinaryReader::new(bytes);
        let id = reader.read_i32()?;
        let update_counter = reader.read_u16()?;
        let hash = UInt160::deserialize(&mut reader)?;
        let nef_bytes = reader.read_var_bytes(MAX_NEF_SCRIPT + 1024)?;
        let nef = NefFile::from_bytes(&nef_bytes)?;
        let manifest_bytes = reader.read_var_bytes(crate::manifest::MAX_MANIFEST_SIZE)?;
        let manifest = ContractManifest::from_json(&manifest_bytes)?;
        Ok(ContractState {
            id,
            update_counter,
            hash,
            nef,
            manifest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nef_checksum_round_trip() {
        let nef = NefFile::new("neo-core-v3.0", vec![0x40]).unwrap();
        assert!(nef.validate().is_ok());
        let bytes = nef.to_bytes().unwrap();
        let parsed = NefFile::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, nef);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn tampered_checksum_is_rejected() {
        let mut nef = NefFile::new("c", vec![0x40, 0x40]).unwrap();
        nef.script[0] = 0x41;
        assert!(matches!(
            nef.validate(),
            Err(ContractError::InvalidContract(_))
        ));
    }

    #[test]
    fn contract_hash_depends_on_all_inputs() {
        let sender = UInt160::from([1u8; 20]);
        let a = ContractState::compute_hash(&sender, 1, "x");
        let b = ContractState::compute_hash(&sender, 2, "x");
        let c = ContractState::compute_hash(&sender, 1, "y");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn contract_state_storage_round_trip() {
        let state = ContractState {
            id: 5,
            update_counter: 2,
            hash: UInt160::from([9u8; 20]),
            nef: NefFile::new("compiler", vec![0x11, 0x40]).unwrap(),
            manifest: ContractManifest::new("demo"),
        };
        let bytes = state.to_storage_bytes().unwrap();
        assert_eq!(ContractState::from_storage_bytes(&bytes).unwrap(), state);
    }
}
