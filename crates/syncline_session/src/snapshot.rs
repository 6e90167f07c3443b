//! Durable session snapshot encoding.
//!
//! The session slot is written as a masked CBOR payload with an embedded
//! checksum. The mask is keyed obfuscation, not encryption: it keeps the
//! token out of casual view in storage dumps, nothing more. Transport
//! security is assumed elsewhere.
//!
//! Layout: 4-byte magic, then `mask(cbor(session) || sha256(cbor)[..8])`.

use sha2::{Digest, Sha256};
use syncline_store::{decode, encode, StoreError};

use crate::error::{SessionError, SessionResult};
use crate::session::Session;

const MAGIC: &[u8; 4] = b"SLS1";
const DIGEST_LEN: usize = 8;
const MASK_SEED: &[u8] = b"syncline-session-slot";

/// Serializes a session into slot bytes.
pub fn seal(session: &Session) -> SessionResult<Vec<u8>> {
    let mut payload = encode(session)?;
    let digest = Sha256::digest(&payload);
    payload.extend_from_slice(&digest[..DIGEST_LEN]);
    mask(&mut payload);

    let mut out = Vec::with_capacity(MAGIC.len() + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Deserializes slot bytes back into a session.
///
/// # Errors
///
/// Any structural problem reports as [`StoreError::Corrupted`] so the
/// caller can apply its empty-state reset policy.
pub fn open(bytes: &[u8]) -> SessionResult<Session> {
    let Some(body) = bytes.strip_prefix(MAGIC) else {
        return Err(corrupted("missing or unknown header"));
    };
    if body.len() < DIGEST_LEN {
        return Err(corrupted("truncated payload"));
    }

    let mut payload = body.to_vec();
    mask(&mut payload);

    let (plain, stored_digest) = payload.split_at(payload.len() - DIGEST_LEN);
    let digest = Sha256::digest(plain);
    if stored_digest != &digest[..DIGEST_LEN] {
        return Err(corrupted("checksum mismatch"));
    }

    Ok(decode("session", plain)?)
}

/// XORs the payload with a keystream derived from the mask seed.
///
/// Involutive: applying it twice restores the input.
fn mask(payload: &mut [u8]) {
    let mut counter: u64 = 0;
    let mut offset = 0;
    while offset < payload.len() {
        let mut hasher = Sha256::new();
        hasher.update(MASK_SEED);
        hasher.update(counter.to_be_bytes());
        let block = hasher.finalize();

        for (byte, key) in payload[offset..].iter_mut().zip(block.iter()) {
            *byte ^= key;
        }
        offset += block.len();
        counter += 1;
    }
}

fn corrupted(message: &str) -> SessionError {
    SessionError::Storage(StoreError::corrupted("session", message))
}
