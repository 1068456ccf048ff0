//! Content digests used for change detection.

use sha2::{Digest, Sha256};

use crate::{error::Result, types::Regions};

/// Canonical JSON encoding of a region set.
///
/// `Regions` uses ordered maps, so equal content always produces identical
/// bytes regardless of insertion order.
pub fn canonical_payload(regions: &Regions) -> Result<String> {
    Ok(serde_json::to_string(regions)?)
}

/// Hex-encoded SHA-256 of the canonical payload.
pub fn regions_hash(regions: &Regions) -> Result<String> {
    let payload = canonical_payload(regions)?;
    Ok(digest_hex(payload.as_bytes()))
}

pub(crate) fn digest_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
