//! Signed-message verification (Bitcoin-family `signmessage` scheme).
//!
//! Digest: `SHA256(SHA256(varint(len(magic)) || magic || varint(len(msg)) || msg))`.
//!
//! Signature: base64 of 65 bytes, `header || r || s`. The header encodes the
//! recovery id and the address kind the signer used:
//!
//! | header  | key          | address kind      |
//! |---------|--------------|-------------------|
//! | 27..=30 | uncompressed | P2PKH             |
//! | 31..=34 | compressed   | P2PKH             |
//! | 35..=38 | compressed   | P2SH-P2WPKH       |
//! | 39..=42 | compressed   | bech32 P2WPKH     |
//!
//! Wallets are inconsistent about which compressed header they emit for
//! segwit addresses, so any compressed header is accepted for any address
//! that commits to the recovered key.

use super::address::{hash160, p2sh_p2wpkh_script_hash, Address, NetworkParams};
use base64::{engine::general_purpose, Engine as _};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of a compact recoverable signature.
const COMPACT_SIGNATURE_LEN: usize = 65;

const HEADER_MIN: u8 = 27;
const HEADER_MAX: u8 = 42;

/// Which address encoding a signature header declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    Uncompressed,
    CompressedP2pkh,
    P2shP2wpkh,
    Bech32,
}

impl SignatureKind {
    fn header_offset(self) -> u8 {
        match self {
            SignatureKind::Uncompressed => 0,
            SignatureKind::CompressedP2pkh => 4,
            SignatureKind::P2shP2wpkh => 8,
            SignatureKind::Bech32 => 12,
        }
    }

    fn from_header(header: u8) -> Option<(Self, u8)> {
        if !(HEADER_MIN..=HEADER_MAX).contains(&header) {
            return None;
        }
        let flag = header - HEADER_MIN;
        let kind = match flag >> 2 {
            0 => SignatureKind::Uncompressed,
            1 => SignatureKind::CompressedP2pkh,
            2 => SignatureKind::P2shP2wpkh,
            _ => SignatureKind::Bech32,
        };
        Some((kind, flag & 3))
    }

    fn compressed(self) -> bool {
        !matches!(self, SignatureKind::Uncompressed)
    }
}

/// Reasons a signature fails verification.
///
/// Callers outside this module only see a boolean; the detail is for logs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signature: {0}")]
    Malformed(String),

    #[error("Public key recovery failed")]
    RecoveryFailed,

    #[error("Address could not be decoded: {0}")]
    BadAddress(String),

    #[error("Recovered key does not match address")]
    SignerMismatch,
}

/// Double-SHA256 digest of a message under the given magic prefix.
pub fn message_digest(magic: &str, message: &str) -> [u8; 32] {
    let mut buf = Vec::with_capacity(magic.len() + message.len() + 18);
    write_varint(&mut buf, magic.len() as u64);
    buf.extend_from_slice(magic.as_bytes());
    write_varint(&mut buf, message.len() as u64);
    buf.extend_from_slice(message.as_bytes());

    let first = Sha256::digest(&buf);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

fn write_varint(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

/// Verifies signed messages against collateral addresses.
///
/// Stateless apart from the network parameters; safe to share across tasks.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    params: NetworkParams,
}

impl SignatureVerifier {
    pub fn new(params: NetworkParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// True iff `signature` is a valid signature over `message` by the key
    /// behind `address`. Malformed input of any kind yields `false`.
    pub fn verify(&self, address: &str, message: &str, signature: &str) -> bool {
        match self.check(address, message, signature) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(address, error = %e, "signature rejected");
                false
            }
        }
    }

    /// Same as [`verify`](Self::verify) but reports why a signature was rejected.
    pub fn check(&self, address: &str, message: &str, signature: &str) -> Result<(), SignatureError> {
        let raw = general_purpose::STANDARD
            .decode(signature.trim())
            .map_err(|e| SignatureError::Malformed(e.to_string()))?;
        if raw.len() != COMPACT_SIGNATURE_LEN {
            return Err(SignatureError::Malformed(format!(
                "expected {} bytes, got {}",
                COMPACT_SIGNATURE_LEN,
                raw.len()
            )));
        }

        let (kind, recovery_byte) = SignatureKind::from_header(raw[0])
            .ok_or_else(|| SignatureError::Malformed(format!("header byte {}", raw[0])))?;
        let recovery_id = RecoveryId::from_byte(recovery_byte)
            .ok_or_else(|| SignatureError::Malformed("recovery id".to_string()))?;
        let sig = Signature::from_slice(&raw[1..])
            .map_err(|e| SignatureError::Malformed(e.to_string()))?;

        let digest = message_digest(&self.params.message_magic, message);
        let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
            .map_err(|_| SignatureError::RecoveryFailed)?;
        let key_hash = hash160(key.to_encoded_point(kind.compressed()).as_bytes());

        let address = Address::parse(address, &self.params)
            .map_err(|e| SignatureError::BadAddress(e.to_string()))?;

        let matches = match address {
            Address::P2pkh(hash) => hash == key_hash,
            Address::P2wpkh(hash) => kind.compressed() && hash == key_hash,
            Address::P2sh(hash) => kind.compressed() && hash == p2sh_p2wpkh_script_hash(&key_hash),
        };

        if matches {
            Ok(())
        } else {
            Err(SignatureError::SignerMismatch)
        }
    }
}

/// Produce a signature in the wallet's `signmessage` format.
///
/// Used by the operator tooling and the test suite to mint proofs.
pub fn sign_message(
    key: &SigningKey,
    magic: &str,
    message: &str,
    kind: SignatureKind,
) -> Result<String, SignatureError> {
    let digest = message_digest(magic, message);
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(&digest)
        .map_err(|e| SignatureError::Malformed(e.to_string()))?;

    let mut raw = Vec::with_capacity(COMPACT_SIGNATURE_LEN);
    raw.push(HEADER_MIN + kind.header_offset() + recovery_id.to_byte());
    raw.extend_from_slice(&sig.to_bytes());

    Ok(general_purpose::STANDARD.encode(raw))
}

/// Derive the address a signing key controls, in the requested encoding.
pub fn address_for_key(key: &SigningKey, kind: SignatureKind, params: &NetworkParams) -> Result<String, SignatureError> {
    let point = key.verifying_key().to_encoded_point(kind.compressed());
    let key_hash = hash160(point.as_bytes());
    let address = match kind {
        SignatureKind::Uncompressed | SignatureKind::CompressedP2pkh => Address::P2pkh(key_hash),
        SignatureKind::P2shP2wpkh => Address::P2sh(p2sh_p2wpkh_script_hash(&key_hash)),
        SignatureKind::Bech32 => Address::P2wpkh(key_hash),
    };
    address
        .encode(params)
        .map_err(|e| SignatureError::BadAddress(e.to_string()))
}
