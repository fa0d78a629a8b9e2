//! Block and header.

use crate::transaction::Transaction;
use crate::witness::Witness;
use crate::{UInt160, UInt256};
use neo_config::MAX_TRANSACTIONS_PER_BLOCK;
use neo_cryptography::hash256;
use neo_io::{BinaryReader, BinaryWriter, IoResult, Serializable};

/// A block header. The hash covers the unsigned portion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_hash: UInt256,
    pub merkle_root: UInt256,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub nonce: u64,
    pub index: u32,
    pub primary_index: u8,
    pub next_consensus: UInt160,
    pub witness: Witness,
}

impl BlockHeader {
    /// Serializes the unsigned portion (everything but the witness).
    pub fn serialize_unsigned(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(self.version);
        self.prev_hash.serialize(writer)?;
        self.merkle_root.serialize(writer)?;
        writer.write_u64(self.timestamp);
        writer.write_u64(self.nonce);
        writer.write_u32(self.index);
        writer.write_u8(self.primary_index);
        self.next_consensus.serialize(writer)?;
        Ok(())
    }

    /// The block hash: double SHA-256 of the unsigned header.
    pub fn hash(&self) -> UInt256 {
        let mut writer = BinaryWriter::new();
        let _ = self.serialize_unsigned(&mut writer);
        UInt256::from(hash256(writer.as_bytes()))
    }
}

impl Serializable for BlockHeader {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.serialize_unsigned(writer)?;
        writer.write_var_int(1);
        self.witness.serialize(writer)?;
        Ok(())
    }

    fn deserialize(reader: &mut BinaryReader<'_>) -> IoResult<Self> {
        let version = reader.read_u32()?;
        let prev_hash = UInt256::deserialize(reader)?;
        let merkle_root = UInt256::deserialize(reader)?;
        let timestamp = reader.read_u64()?;
        let nonce = reader.read_u64()?;
        let index = reader.read_u32()?;
        let primary_index = reader.read_u8()?;
        let next_consensus = UInt160::deserialize(reader)?;
        let witness_count = reader.read_var_int(1)?;
        let witness = if witness_count == 1 {
            Witness::deserialize(reader)?
        } else {
            Witness::default()
        };
        Ok(Self {
            version,
            prev_hash,
            merkle_root,
            timestamp,
            nonce,
            index,
            primary_index,
            next_consensus,
            witness,
        })
    }
}

/// A full block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// The block hash (the header hash).
    pub fn hash(&self) -> UInt256 {
        self.header.hash()
    }

    /// The block height.
    pub fn index(&self) -> u32 {
        self.header.index
    }
}

impl Serializable for Block {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        self.header.serialize(writer)?;
        writer.write_serializable_list(&self.transactions)?;
        Ok(())
    }

    fn deserialize(reader: &mut BinaryReader<'_>) -> IoResult<Self> {
        let header = BlockHeader::deserialize(reader)?;
        let transactions =
            reader.read_serializable_list::<Transaction>(MAX_TRANSACTIONS_PER_BLOCK as usize)?;
        Ok(Self {
            header,
            transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_hash_ignores_witness() {
        let mut header = BlockHeader {
            index: 5,
            timestamp: 1_600_000_000_000,
            ..BlockHeader::default()
        };
        let hash = header.hash();
        header.witness.invocation_script = vec![1];
        assert_eq!(header.hash(), hash);
        header.index = 6;
        assert_ne!(header.hash(), hash);
    }

    #[test]
    fn block_round_trip() {
        let block = Block {
            header: BlockHeader {
                index: 1,
                primary_index: 3,
                ..BlockHeader::default()
            },
            transactions: Vec::new(),
        };
        let bytes = block.to_bytes().unwrap();
        assert_eq!(Block::from_bytes(&bytes).unwrap(), block);
    }
}
