// src/engine/signature.rs
//
// Content signatures: BLAKE3 digests over *encoded* image bytes.
// The same bytes always address the same cache slot, on every host.

use crate::error::{RawImageError, Result};
use crate::ops::Operation;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Domain separator for signatures of transform results.
const DERIVE_CONTEXT: &[u8] = b"raw-image-cache/derive/v1";

/// 256-bit content fingerprint used as the cache key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentSignature([u8; 32]);

impl ContentSignature {
    /// Digest of encoded image bytes. Pure; any input (including empty) is accepted.
    pub fn compute(encoded: &[u8]) -> Self {
        Self(*blake3::hash(encoded).as_bytes())
    }

    /// Streaming digest, identical to [`compute`](Self::compute) over the same bytes.
    ///
    /// A read failure is fatal: returning a partial digest would address the wrong slot.
    pub fn compute_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut hasher = blake3::Hasher::new();
        std::io::copy(&mut reader, &mut hasher)
            .map_err(|e| RawImageError::signature_computation_failure(e.to_string()))?;
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    /// Signature for the result of running `ops` over the pixels addressed by `self`.
    ///
    /// Callers pass the optimized chain so that equivalent edits share a slot.
    pub fn derive(&self, ops: &[Operation]) -> Self {
        let mut key = Vec::with_capacity(16 * ops.len());
        for op in ops {
            op.encode_key(&mut key);
        }
        let mut hasher = blake3::Hasher::new();
        hasher.update(DERIVE_CONTEXT);
        hasher.update(&self.0);
        hasher.update(&(ops.len() as u64).to_le_bytes());
        hasher.update(&key);
        Self(*hasher.finalize().as_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }
}

impl fmt::Display for ContentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "ContentSignature({}…)", &hex[..12])
    }
}

impl FromStr for ContentSignature {
    type Err = RawImageError;

    fn from_str(s: &str) -> Result<Self> {
        blake3::Hash::from_hex(s)
            .map(|h| Self(*h.as_bytes()))
            .map_err(|_| RawImageError::invalid_signature(s.to_string()))
    }
}
