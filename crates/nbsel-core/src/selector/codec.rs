//! Byte encoding of selectors for shell pipelines
//!
//! Each `nbsel select` stage reads the previous stage's selector from stdin,
//! combines it with its own, and writes the result to stdout. The encoding is
//! a magic prefix followed by a bincode-encoded, versioned envelope. It is
//! only meant to be read back by the same build.

use super::Selector;
use crate::error::{NotebookError, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};

/// Prefix of every encoded selector
pub const MAGIC: &[u8; 6] = b"NBSEL\0";

/// Bumped whenever the shape of [`Selector`] changes
pub const SELECTOR_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    selector: &'a Selector,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    selector: Selector,
}

/// Encode a selector for a pipe
///
/// # Errors
///
/// `NotSerializable` when the tree holds a custom predicate.
pub fn encode(selector: &Selector) -> Result<Vec<u8>> {
    if !selector.is_portable() {
        return Err(NotebookError::NotSerializable);
    }
    let mut bytes = MAGIC.to_vec();
    bincode::serialize_into(
        &mut bytes,
        &EnvelopeRef {
            version: SELECTOR_FORMAT_VERSION,
            selector,
        },
    )?;
    Ok(bytes)
}

/// Decode bytes produced by [`encode`]. No partial decoding: any defect in
/// the input is an error.
///
/// # Errors
///
/// `SelectorCodec` for a missing prefix, a version mismatch, a malformed
/// payload or trailing bytes. Length prefixes larger than the remaining
/// input are rejected before anything is allocated.
pub fn decode(bytes: &[u8]) -> Result<Selector> {
    let payload = bytes
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| NotebookError::SelectorCodec("input is not an encoded selector".into()))?;

    let envelope: Envelope = bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(payload.len() as u64)
        .reject_trailing_bytes()
        .deserialize(payload)?;
    if envelope.version != SELECTOR_FORMAT_VERSION {
        return Err(NotebookError::SelectorCodec(format!(
            "selector format version mismatch: expected {}, got {}",
            SELECTOR_FORMAT_VERSION, envelope.version
        )));
    }
    Ok(envelope.selector)
}

impl Selector {
    /// See [`encode`]
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode(self)
    }

    /// See [`decode`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::ContainsQuery;

    #[test]
    fn test_rejects_custom_predicate() {
        let selector = Selector::is_code() & Selector::from_fn(|_| true);
        assert!(matches!(encode(&selector), Err(NotebookError::NotSerializable)));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            decode(b"not a selector"),
            Err(NotebookError::SelectorCodec(_))
        ));
        assert!(matches!(decode(b""), Err(NotebookError::SelectorCodec(_))));
    }

    #[test]
    fn test_rejects_truncated_and_trailing() {
        let selector = Selector::contains(ContainsQuery::new("x")).unwrap() | Selector::index(2);
        let bytes = encode(&selector).unwrap();

        let truncated = &bytes[..bytes.len() - 1];
        assert!(matches!(decode(truncated), Err(NotebookError::SelectorCodec(_))));

        let mut trailing = bytes.clone();
        trailing.push(0);
        assert!(matches!(decode(&trailing), Err(NotebookError::SelectorCodec(_))));
    }

    #[test]
    fn test_rejects_oversized_length_prefix() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&SELECTOR_FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes()); // Selector::Predicate
        bytes.extend_from_slice(&5u32.to_le_bytes()); // Predicate::Contains
        bytes.extend_from_slice(&(1u64 << 44).to_le_bytes());
        bytes.extend_from_slice(b"abc");
        assert!(matches!(
            Selector::from_bytes(&bytes),
            Err(NotebookError::SelectorCodec(_))
        ));
    }

    #[test]
    fn test_encoding_matches_fixed_width_layout() {
        let bytes = encode(&Selector::index(3)).unwrap();
        let payload = &bytes[MAGIC.len()..];
        assert_eq!(&payload[..4], &SELECTOR_FORMAT_VERSION.to_le_bytes());
        assert!(matches!(decode(&bytes), Ok(Selector::Predicate(_))));
    }

    #[test]
    fn test_rejects_other_version() {
        let mut bytes = MAGIC.to_vec();
        bincode::serialize_into(
            &mut bytes,
            &EnvelopeRef {
                version: SELECTOR_FORMAT_VERSION + 1,
                selector: &Selector::all(),
            },
        )
        .unwrap();
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("version mismatch"));
    }
}
