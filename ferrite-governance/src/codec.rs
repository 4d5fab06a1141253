//! Canonical byte-level encoding of governance payloads.
//!
//! The wire format and the hashing format are the same byte sequence:
//! integers are fixed-width little-endian, byte strings carry a compact-size
//! length prefix. Every payload opens with the two-byte network-object
//! header that dispatches parsing.

use crate::error::GovernanceError;
use ferrite_shared_types::{Hash, OutPoint};

/// Version byte every governance payload must carry.
pub const NETWORK_VERSION: u8 = 0x01;

/// Object type tag for proposals.
pub const TYPE_PROPOSAL: u8 = 1;
/// Object type tag for votes.
pub const TYPE_VOTE: u8 = 2;

/// The two-byte header of every governance payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkObject {
    pub version: u8,
    pub obj_type: u8,
}

impl NetworkObject {
    pub fn parse(payload: &[u8]) -> Result<Self, GovernanceError> {
        let mut reader = Reader::new(payload);
        Ok(NetworkObject {
            version: reader.get_u8()?,
            obj_type: reader.get_u8()?,
        })
    }

    /// True when the payload carries the version this node understands.
    pub fn is_valid(&self) -> bool {
        self.version == NETWORK_VERSION
    }
}

/// Serializer for the canonical layout.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Writer { buf: Vec::new() }
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_compact_size(&mut self, value: u64) {
        match value {
            0..=0xfc => self.buf.push(value as u8),
            0xfd..=0xffff => {
                self.buf.push(0xfd);
                self.buf.extend_from_slice(&(value as u16).to_le_bytes());
            }
            0x1_0000..=0xffff_ffff => {
                self.buf.push(0xfe);
                self.buf.extend_from_slice(&(value as u32).to_le_bytes());
            }
            _ => {
                self.buf.push(0xff);
                self.buf.extend_from_slice(&value.to_le_bytes());
            }
        }
    }

    /// Length-prefixed byte string.
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_compact_size(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_str(&mut self, value: &str) {
        self.put_bytes(value.as_bytes());
    }

    /// Raw bytes without a length prefix, for fixed-width fields.
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn put_hash(&mut self, hash: &Hash) {
        self.buf.extend_from_slice(hash);
    }

    pub fn put_outpoint(&mut self, outpoint: &OutPoint) {
        self.put_hash(&outpoint.txid);
        self.put_u32(outpoint.vout);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Deserializer for the canonical layout. All read failures surface as
/// `GovernanceError::Parse`, which callers treat as skip-this-output.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], GovernanceError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| GovernanceError::Parse("unexpected end of payload".to_string()))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn get_u8(&mut self) -> Result<u8, GovernanceError> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32, GovernanceError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn get_i64(&mut self) -> Result<i64, GovernanceError> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(buf))
    }

    pub fn get_compact_size(&mut self) -> Result<u64, GovernanceError> {
        let first = self.get_u8()?;
        let value = match first {
            0xfd => {
                let bytes = self.take(2)?;
                let v = u16::from_le_bytes([bytes[0], bytes[1]]) as u64;
                if v < 0xfd {
                    return Err(GovernanceError::Parse(
                        "non-canonical compact size".to_string(),
                    ));
                }
                v
            }
            0xfe => {
                let bytes = self.take(4)?;
                let v = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64;
                if v <= 0xffff {
                    return Err(GovernanceError::Parse(
                        "non-canonical compact size".to_string(),
                    ));
                }
                v
            }
            0xff => {
                let bytes = self.take(8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                let v = u64::from_le_bytes(buf);
                if v <= 0xffff_ffff {
                    return Err(GovernanceError::Parse(
                        "non-canonical compact size".to_string(),
                    ));
                }
                v
            }
            n => n as u64,
        };
        Ok(value)
    }

    pub fn get_bytes(&mut self) -> Result<Vec<u8>, GovernanceError> {
        let len = self.get_compact_size()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn get_str(&mut self) -> Result<String, GovernanceError> {
        let bytes = self.get_bytes()?;
        String::from_utf8(bytes)
            .map_err(|_| GovernanceError::Parse("invalid utf-8 in string field".to_string()))
    }

    pub fn get_raw(&mut self, n: usize) -> Result<&'a [u8], GovernanceError> {
        self.take(n)
    }

    pub fn get_hash(&mut self) -> Result<Hash, GovernanceError> {
        let bytes = self.take(32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn get_outpoint(&mut self) -> Result<OutPoint, GovernanceError> {
        let txid = self.get_hash()?;
        let vout = self.get_u32()?;
        Ok(OutPoint::new(txid, vout))
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_compact_size(value: u64) -> u64 {
        let mut writer = Writer::new();
        writer.put_compact_size(value);
        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes);
        let decoded = reader.get_compact_size().expect("decode");
        assert!(reader.is_empty());
        decoded
    }

    #[test]
    fn compact_size_roundtrips_at_boundaries() {
        for value in [0, 1, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, 0x1_0000_0000] {
            assert_eq!(roundtrip_compact_size(value), value);
        }
    }

    #[test]
    fn compact_size_rejects_non_canonical() {
        // 0xfd prefix encoding a value that fits in one byte.
        let bytes = [0xfd, 0x10, 0x00];
        let mut reader = Reader::new(&bytes);
        assert!(matches!(
            reader.get_compact_size(),
            Err(GovernanceError::Parse(_))
        ));
    }

    #[test]
    fn integers_are_little_endian() {
        let mut writer = Writer::new();
        writer.put_u32(0x0102_0304);
        writer.put_i64(-2);
        let bytes = writer.into_bytes();
        assert_eq!(&bytes[..4], &[0x04, 0x03, 0x02, 0x01]);

        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.get_u32().unwrap(), 0x0102_0304);
        assert_eq!(reader.get_i64().unwrap(), -2);
    }

    #[test]
    fn strings_roundtrip() {
        let mut writer = Writer::new();
        writer.put_str("proposal name");
        writer.put_str("");
        let bytes = writer.into_bytes();

        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.get_str().unwrap(), "proposal name");
        assert_eq!(reader.get_str().unwrap(), "");
        assert!(reader.is_empty());
    }

    #[test]
    fn reader_reports_truncation() {
        let mut reader = Reader::new(&[0x01]);
        assert!(matches!(reader.get_u32(), Err(GovernanceError::Parse(_))));
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let mut writer = Writer::new();
        writer.put_bytes(&[0xff, 0xfe]);
        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes);
        assert!(matches!(reader.get_str(), Err(GovernanceError::Parse(_))));
    }

    #[test]
    fn outpoint_roundtrips() {
        let outpoint = OutPoint::new([9u8; 32], 7);
        let mut writer = Writer::new();
        writer.put_outpoint(&outpoint);
        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes);
        assert_eq!(reader.get_outpoint().unwrap(), outpoint);
    }

    #[test]
    fn network_object_header_dispatch() {
        let header = NetworkObject::parse(&[NETWORK_VERSION, TYPE_PROPOSAL]).unwrap();
        assert!(header.is_valid());
        assert_eq!(header.obj_type, TYPE_PROPOSAL);

        let unknown = NetworkObject::parse(&[0x02, TYPE_VOTE]).unwrap();
        assert!(!unknown.is_valid());

        assert!(NetworkObject::parse(&[NETWORK_VERSION]).is_err());
    }
}
