//! Transaction witness (invocation + verification script pair).

use neo_io::{BinaryReader, BinaryWriter, IoResult, Serializable};

/// Maximum invocation script length.
pub const MAX_INVOCATION_SCRIPT: usize = 1024;
/// Maximum verification script length.
pub const MAX_VERIFICATION_SCRIPT: usize = 1024;

/// The executable proof attached to a signer: the invocation script pushes
/// signatures, the verification script consumes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Witness {
    pub invocation_script: Vec<u8>,
    pub verification_script: Vec<u8>,
}

impl Witness {
    /// Creates a witness from its two scripts.
    pub fn new(invocation_script: Vec<u8>, verification_script: Vec<u8>) -> Self {
        Self {
            invocation_script,
            verification_script,
        }
    }

    /// The script hash of the verification script.
    pub fn script_hash(&self) -> crate::UInt160 {
        crate::UInt160::from(neo_cryptography::hash160(&self.verification_script))
    }
}

impl Serializable for Witness {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_var_bytes(&self.invocation_script);
        writer.write_var_bytes(&self.verification_script);
        Ok(())
    }

    fn deserialize(reader: &mut BinaryReader<'_>) -> IoResult<Self> {
        let invocation_script = reader.read_var_bytes(MAX_INVOCATION_SCRIPT)?;
        let verification_script = reader.read_var_bytes(MAX_VERIFICATION_SCRIPT)?;
        Ok(Self {
            invocation_script,
            verification_script,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let witness = Witness::new(vec![0x0C, 0x01, 0xAA], vec![0x41]);
        let bytes = witness.to_bytes().unwrap();
        assert_eq!(Witness::from_bytes(&bytes).unwrap(), witness);
    }
}
