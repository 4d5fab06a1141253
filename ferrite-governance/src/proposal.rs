//! Proposals request a payment to an address at a future superblock. Anyone
//! willing to pay the submission fee can create one; coin holders then vote
//! on it with their unspent outputs.

use crate::codec::{NetworkObject, Reader, Writer, NETWORK_VERSION, TYPE_PROPOSAL};
use crate::error::GovernanceError;
use ferrite_crypto::tagged_hash256;
use ferrite_shared_types::{Amount, Hash};
use serde::{Deserialize, Serialize};

/// Domain string for proposal identity digests.
const PROPOSAL_HASH_DOMAIN: &str = "ferrite governance proposal v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    version: u8,
    superblock: u64,
    amount: Amount,
    address: String,
    name: String,
    url: String,
    description: String,
    /// Height of the block this proposal was first seen in. Memory only,
    /// never serialized to the wire.
    block_number: u64,
}

impl Proposal {
    pub fn new(
        name: impl Into<String>,
        superblock: u64,
        amount: Amount,
        address: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Proposal {
            version: NETWORK_VERSION,
            superblock,
            amount,
            address: address.into(),
            name: name.into(),
            url: url.into(),
            description: description.into(),
            block_number: 0,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn superblock(&self) -> u64 {
        self.superblock
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub(crate) fn set_block_number(&mut self, height: u64) {
        self.block_number = height;
    }

    pub fn is_null(&self) -> bool {
        self.superblock == 0
    }

    /// Canonical wire bytes: `version, type, superblock, amount, address,
    /// name, url, description`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.put_u8(self.version);
        writer.put_u8(TYPE_PROPOSAL);
        writer.put_u32(self.superblock as u32);
        writer.put_i64(self.amount);
        writer.put_str(&self.address);
        writer.put_str(&self.name);
        writer.put_str(&self.url);
        writer.put_str(&self.description);
        writer.into_bytes()
    }

    /// Parses a proposal payload. `block_number` records the height of the
    /// containing block.
    pub fn deserialize(payload: &[u8], block_number: u64) -> Result<Self, GovernanceError> {
        let header = NetworkObject::parse(payload)?;
        if header.obj_type != TYPE_PROPOSAL {
            return Err(GovernanceError::Parse(format!(
                "expected proposal payload, got type {}",
                header.obj_type
            )));
        }
        let mut reader = Reader::new(payload);
        let version = reader.get_u8()?;
        let _obj_type = reader.get_u8()?;
        let superblock = reader.get_u32()? as u64;
        let amount = reader.get_i64()?;
        let address = reader.get_str()?;
        let name = reader.get_str()?;
        let url = reader.get_str()?;
        let description = reader.get_str()?;
        Ok(Proposal {
            version,
            superblock,
            amount,
            address,
            name,
            url,
            description,
            block_number,
        })
    }

    /// Proposal identity: digest of the serialized body. The memory-only
    /// `block_number` is excluded, so the same submission in different blocks
    /// has the same hash.
    pub fn hash(&self) -> Hash {
        tagged_hash256(PROPOSAL_HASH_DOMAIN, &self.serialize())
    }
}
