use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::BasinError;

/// Widest year the fixed 4-digit key segment can carry.
pub const MAX_YEAR: u16 = 9_999;

const YEAR_WIDTH: usize = 4;
const SEPARATOR: u8 = b'_';

/// Composite row key addressing one (entity, year) observation in the
/// column store.
///
/// Layout: `reverse(entity_id) + "_" + zero_pad(year, 4)`. Zero-padding
/// makes string order match numeric year order within an entity, so range
/// scans stay bounded; reversing the entity id spreads sequentially
/// assigned ids across the key space instead of piling recent writes onto
/// one region.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey {
    bytes: SmallVec<[u8; 32]>,
}

impl RowKey {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes.into_vec()
    }
}

impl AsRef<[u8]> for RowKey {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Encodes an (entity, year) pair into its row key.
///
/// Entity ids must be non-empty ASCII without `_` (the separator) so that
/// `decode` is unambiguous; years must fit the fixed 4-digit segment.
pub fn encode(entity_id: &str, year: i32) -> Result<RowKey, BasinError> {
    validate_entity(entity_id)?;
    if year < 0 || year > MAX_YEAR as i32 {
        return Err(BasinError::InvalidKeyInput {
            message: format!("year {year} outside 0..={MAX_YEAR}"),
        });
    }
    Ok(encode_unchecked(entity_id, year as u16))
}

fn encode_unchecked(entity_id: &str, year: u16) -> RowKey {
    let mut bytes = SmallVec::<[u8; 32]>::new();
    bytes.extend(entity_id.bytes().rev());
    bytes.push(SEPARATOR);
    bytes.extend_from_slice(format!("{year:0width$}", width = YEAR_WIDTH).as_bytes());
    RowKey { bytes }
}

/// Inverse of `encode`. Fails on keys not produced by it.
pub fn decode(key: &RowKey) -> Result<(String, u16), BasinError> {
    let bytes = key.as_slice();
    if bytes.len() < YEAR_WIDTH + 2 {
        return Err(BasinError::Decode(format!(
            "row key too short: {} bytes",
            bytes.len()
        )));
    }
    let sep_at = bytes.len() - YEAR_WIDTH - 1;
    if bytes[sep_at] != SEPARATOR {
        return Err(BasinError::Decode("row key missing year separator".into()));
    }
    let year_bytes = &bytes[sep_at + 1..];
    if !year_bytes.iter().all(u8::is_ascii_digit) {
        return Err(BasinError::Decode("row key year segment not numeric".into()));
    }
    let year = year_bytes
        .iter()
        .fold(0u16, |acc, b| acc * 10 + (b - b'0') as u16);
    let entity: String = bytes[..sep_at].iter().rev().map(|b| *b as char).collect();
    validate_entity(&entity)
        .map_err(|_| BasinError::Decode("row key entity segment malformed".into()))?;
    Ok((entity, year))
}

/// Returns the `[start, stop)` byte range whose scan yields exactly the
/// keys for `entity_id` with year in `[year_start, year_end]`.
///
/// The store's scan contract treats the stop bound as exclusive, so the
/// stop is the key for `year_end + 1`. That off-by-one carries the whole
/// inclusive-range contract.
pub fn scan_bounds(
    entity_id: &str,
    year_start: i32,
    year_end: i32,
) -> Result<(RowKey, RowKey), BasinError> {
    if year_start > year_end {
        return Err(BasinError::InvalidKeyInput {
            message: format!("year range start {year_start} after end {year_end}"),
        });
    }
    let start = encode(entity_id, year_start)?;
    let stop = if year_end < MAX_YEAR as i32 {
        encode(entity_id, year_end + 1)?
    } else {
        // 10000 would pad to five digits and sort *before* "9999", so the
        // top of the key space uses the prefix successor instead.
        let last = encode(entity_id, MAX_YEAR as i32)?;
        prefix_successor(&last).ok_or_else(|| BasinError::InvalidKeyInput {
            message: "entity id has no key-space successor".into(),
        })?
    };
    Ok((start, stop))
}

/// Smallest key strictly greater than every key sharing `prefix`.
pub fn prefix_successor(prefix: &RowKey) -> Option<RowKey> {
    let mut next = prefix.bytes.clone();
    for i in (0..next.len()).rev() {
        if next[i] != 0xFF {
            next[i] += 1;
            next.truncate(i + 1);
            return Some(RowKey { bytes: next });
        }
    }
    None
}

/// Smallest key strictly greater than `key` itself. Used to resume a scan
/// after the last key of a fetched page.
pub fn key_successor(key: &[u8]) -> Vec<u8> {
    let mut next = Vec::with_capacity(key.len() + 1);
    next.extend_from_slice(key);
    next.push(0x00);
    next
}

fn validate_entity(entity_id: &str) -> Result<(), BasinError> {
    if entity_id.is_empty() {
        return Err(BasinError::InvalidKeyInput {
            message: "entity id is empty".into(),
        });
    }
    if !entity_id.is_ascii() || entity_id.bytes().any(|b| b == SEPARATOR) {
        return Err(BasinError::InvalidKeyInput {
            message: format!("entity id '{entity_id}' must be ASCII without '_'"),
        });
    }
    Ok(())
}
