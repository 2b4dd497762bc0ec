//! Binary persistence for per-symbol containers.
//!
//! A snapshot is a versioned sequence of container records:
//!
//! ```text
//! [b"STRA"][u16 version][u32 containers]
//!   { [u16 name len][name][u16 type len][type][u32 payload len][payload] } *
//! payload = [u32 count][default][count x value]
//! ```
//!
//! Every field after the magic is bincode with fixed-width little-endian
//! integers. The type descriptor is the structural slot type
//! (`vec<option<f32>>`), so a container is never decoded as a different
//! type than it was written with. The payload length lets a reader skip a
//! container it cannot apply.

use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{CorruptState, StrataError, StrataResult};
use crate::per_symbol::SymbolSlots;

pub const SNAPSHOT_MAGIC: &[u8; 4] = b"STRA";
pub const SNAPSHOT_VERSION: u16 = 1;

/// Encoding options shared by every snapshot field.
pub fn options() -> impl Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

/// Append one value.
pub fn encode_into<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> StrataResult<()> {
    options().serialize_into(out, value)?;
    Ok(())
}

/// Read one value, consuming at most `limit` bytes.
pub fn decode_from<R: Read, T: DeserializeOwned>(inp: &mut R, limit: u64) -> Result<T, CorruptState> {
    Ok(options().with_limit(limit).deserialize_from(inp)?)
}

/// Read exactly `len` bytes. The buffer grows with the data actually read,
/// so a corrupt length cannot reserve more than the input holds.
fn read_len<R: Read>(inp: &mut R, len: u64) -> Result<Vec<u8>, CorruptState> {
    let mut buf = Vec::new();
    inp.by_ref()
        .take(len)
        .read_to_end(&mut buf)
        .map_err(|e| CorruptState::Truncated(e.to_string()))?;
    if buf.len() as u64 != len {
        return Err(CorruptState::Truncated(format!(
            "expected {len} bytes, found {}",
            buf.len()
        )));
    }
    Ok(buf)
}

fn write_short_str<W: Write>(out: &mut W, s: &str) -> StrataResult<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| StrataError::Data(format!("name too long: {s}")))?;
    encode_into(out, &len)?;
    out.write_all(s.as_bytes())?;
    Ok(())
}

fn read_short_str<R: Read>(inp: &mut R) -> Result<String, CorruptState> {
    let len: u16 = decode_from(inp, 2)?;
    let raw = read_len(inp, u64::from(len))?;
    String::from_utf8(raw).map_err(|e| CorruptState::InvalidValue(e.to_string()))
}

/// Outcome of applying a snapshot: containers that loaded and those that
/// were rejected. Rejected containers keep their previous state.
#[derive(Debug, Default)]
pub struct SnapshotLoad {
    pub loaded: Vec<String>,
    pub rejected: Vec<(String, CorruptState)>,
}

impl SnapshotLoad {
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Write every container, in order, as one snapshot.
pub fn write_snapshot<W: Write>(mut out: W, containers: &[Arc<dyn SymbolSlots>]) -> StrataResult<()> {
    out.write_all(SNAPSHOT_MAGIC)?;
    encode_into(&mut out, &SNAPSHOT_VERSION)?;
    let count = u32::try_from(containers.len())
        .map_err(|_| StrataError::Data("too many containers".into()))?;
    encode_into(&mut out, &count)?;

    for c in containers {
        let payload = c.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| StrataError::Data(format!("container {} too large", c.name())))?;
        write_short_str(&mut out, c.name())?;
        write_short_str(&mut out, &c.slot_type())?;
        encode_into(&mut out, &len)?;
        out.write_all(&payload)?;
    }
    out.flush()?;
    debug!(containers = containers.len(), "snapshot written");
    Ok(())
}

/// Read a snapshot into the given containers, matched by name.
///
/// Header and framing problems abort the whole load. Per-container problems
/// (unknown name, slot type, element count, bad payload) reject only that
/// container.
pub fn read_snapshot<R: Read>(
    mut inp: R,
    containers: &[Arc<dyn SymbolSlots>],
) -> StrataResult<SnapshotLoad> {
    let magic = read_len(&mut inp, SNAPSHOT_MAGIC.len() as u64)?;
    if magic != SNAPSHOT_MAGIC {
        return Err(CorruptState::BadMagic.into());
    }
    let version: u16 = decode_from(&mut inp, 2)?;
    if version != SNAPSHOT_VERSION {
        return Err(CorruptState::UnsupportedVersion {
            found: version,
            expected: SNAPSHOT_VERSION,
        }
        .into());
    }

    let by_name: HashMap<&str, &Arc<dyn SymbolSlots>> =
        containers.iter().map(|c| (c.name(), c)).collect();

    let count: u32 = decode_from(&mut inp, 4)?;
    let mut outcome = SnapshotLoad::default();
    for _ in 0..count {
        let name = read_short_str(&mut inp)?;
        let slot_type = read_short_str(&mut inp)?;
        let len: u32 = decode_from(&mut inp, 4)?;
        let payload = read_len(&mut inp, u64::from(len))?;

        let Some(container) = by_name.get(name.as_str()) else {
            warn!(container = %name, "snapshot container not registered, skipped");
            outcome.rejected.push((
                name.clone(),
                CorruptState::NameMismatch {
                    expected: "<registered container>".into(),
                    found: name,
                },
            ));
            continue;
        };
        let expected = container.slot_type();
        if expected != slot_type {
            outcome.rejected.push((
                name.clone(),
                CorruptState::TypeMismatch {
                    name,
                    expected,
                    found: slot_type,
                },
            ));
            continue;
        }
        match container.decode_payload(&payload) {
            Ok(()) => outcome.loaded.push(name),
            Err(e) => {
                warn!(container = %name, error = %e, "snapshot container rejected");
                outcome.rejected.push((name, e));
            }
        }
    }

    if count as usize != containers.len() {
        warn!(
            found = count,
            expected = containers.len(),
            "snapshot container count differs from registry"
        );
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_little_endian() {
        let mut buf = Vec::new();
        encode_into(&mut buf, &3u32).unwrap();
        assert_eq!(buf, 3u32.to_le_bytes());

        let mut buf = Vec::new();
        encode_into(&mut buf, &vec![1.0f32, 2.0, 3.0]).unwrap();
        assert_eq!(buf.len(), 8 + 3 * 4);
        assert_eq!(&buf[..8], &3u64.to_le_bytes());
    }

    #[test]
    fn test_short_read_is_truncated() {
        let bytes = [1u8, 2];
        let err = decode_from::<_, u32>(&mut &bytes[..], 4).unwrap_err();
        assert!(matches!(err, CorruptState::Truncated(_)));
    }

    #[test]
    fn test_invalid_bool_byte() {
        let bytes = [7u8];
        let err = decode_from::<_, bool>(&mut &bytes[..], 1).unwrap_err();
        assert!(matches!(err, CorruptState::InvalidValue(_)));
    }

    #[test]
    fn test_read_len_does_not_trust_length() {
        let bytes = [1u8, 2, 3];
        let err = read_len(&mut &bytes[..], u64::from(u32::MAX)).unwrap_err();
        assert!(matches!(err, CorruptState::Truncated(_)));
    }

    #[test]
    fn test_short_str_roundtrip() {
        let mut buf = Vec::new();
        write_short_str(&mut buf, "orb.or_high").unwrap();
        assert_eq!(&buf[..2], &11u16.to_le_bytes());
        assert_eq!(read_short_str(&mut buf.as_slice()).unwrap(), "orb.or_high");
    }
}
