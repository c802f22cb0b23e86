/// Cryptographic primitives for collateral ownership proofs
///
/// This module implements:
/// - Address decoding for the chain's P2PKH / P2SH / bech32 formats
/// - Signed-message verification (secp256k1 public key recovery)
pub mod address;
pub mod message_signing;

pub use address::{hash160, Address, AddressError, NetworkParams};
pub use message_signing::{
    address_for_key, message_digest, sign_message, SignatureError, SignatureKind,
    SignatureVerifier,
};
