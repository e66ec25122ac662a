//! Signed opaque tokens: `hex(payload) "." hex(ed25519 signature)`.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenError {
    Malformed,
    BadSignature,
}

pub(crate) fn seal(key: &SigningKey, payload: &[u8]) -> String {
    let signature = key.sign(payload);
    format!("{}.{}", hex::encode(payload), hex::encode(signature.to_bytes()))
}

pub(crate) fn open(key: &VerifyingKey, token: &str) -> Result<Vec<u8>, OpenError> {
    let (payload_hex, signature_hex) = token.split_once('.').ok_or(OpenError::Malformed)?;
    let payload = hex::decode(payload_hex).map_err(|_| OpenError::Malformed)?;
    let signature_bytes = hex::decode(signature_hex).map_err(|_| OpenError::Malformed)?;
    let signature = Signature::from_slice(&signature_bytes).map_err(|_| OpenError::Malformed)?;
    key.verify(&payload, &signature)
        .map_err(|_| OpenError::BadSignature)?;
    Ok(payload)
}
