//! Collateral address decoding for Syscoin-family chains.
//!
//! Supported encodings:
//! - Base58Check P2PKH (`S...` on mainnet)
//! - Base58Check P2SH (used for P2SH-wrapped segwit)
//! - Bech32 witness v0 P2WPKH (`sys1q...` on mainnet)
//!
//! Every variant reduces to a 20-byte HASH160 that the signed-message
//! verifier compares against the recovered public key.

use bech32::{Fe32, Hrp};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of a HASH160 digest.
pub const HASH160_LEN: usize = 20;

/// Address and message-signing parameters of a chain network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParams {
    pub name: String,
    pub p2pkh_version: u8,
    pub p2sh_version: u8,
    pub bech32_hrp: String,
    /// Prefix mixed into every signed-message digest.
    pub message_magic: String,
}

impl NetworkParams {
    pub fn mainnet() -> Self {
        Self {
            name: "mainnet".to_string(),
            p2pkh_version: 63,
            p2sh_version: 5,
            bech32_hrp: "sys".to_string(),
            message_magic: "Syscoin Signed Message:\n".to_string(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            name: "testnet".to_string(),
            p2pkh_version: 65,
            p2sh_version: 196,
            bech32_hrp: "tsys".to_string(),
            message_magic: "Syscoin Signed Message:\n".to_string(),
        }
    }

    /// Look up parameters by network name (`mainnet` or `testnet`).
    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Some(Self::mainnet()),
            "testnet" | "test" => Some(Self::testnet()),
            _ => None,
        }
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// Address decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("Wrong network: {0}")]
    WrongNetwork(String),

    #[error("Unsupported address type: {0}")]
    Unsupported(String),
}

/// A decoded address reduced to its 20-byte payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    P2pkh([u8; HASH160_LEN]),
    P2sh([u8; HASH160_LEN]),
    P2wpkh([u8; HASH160_LEN]),
}

impl Address {
    /// Decode an address string for the given network.
    pub fn parse(address: &str, params: &NetworkParams) -> Result<Self, AddressError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AddressError::InvalidEncoding("empty address".to_string()));
        }

        let hrp_prefix = format!("{}1", params.bech32_hrp);
        if address.to_ascii_lowercase().starts_with(&hrp_prefix) {
            return Self::parse_bech32(address, params);
        }

        Self::parse_base58(address, params)
    }

    fn parse_bech32(address: &str, params: &NetworkParams) -> Result<Self, AddressError> {
        let (hrp, version, program) = bech32::segwit::decode(address)
            .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;

        if hrp.to_lowercase() != params.bech32_hrp {
            return Err(AddressError::WrongNetwork(hrp.to_lowercase()));
        }
        if version != Fe32::Q {
            return Err(AddressError::Unsupported(format!(
                "witness version {}",
                version.to_u8()
            )));
        }
        let hash: [u8; HASH160_LEN] = program.as_slice().try_into().map_err(|_| {
            AddressError::Unsupported(format!("witness program of {} bytes", program.len()))
        })?;

        Ok(Address::P2wpkh(hash))
    }

    fn parse_base58(address: &str, params: &NetworkParams) -> Result<Self, AddressError> {
        let payload = bs58::decode(address)
            .with_check(None)
            .into_vec()
            .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;

        if payload.len() != HASH160_LEN + 1 {
            return Err(AddressError::InvalidEncoding(format!(
                "payload of {} bytes",
                payload.len()
            )));
        }

        let mut hash = [0u8; HASH160_LEN];
        hash.copy_from_slice(&payload[1..]);

        match payload[0] {
            v if v == params.p2pkh_version => Ok(Address::P2pkh(hash)),
            v if v == params.p2sh_version => Ok(Address::P2sh(hash)),
            v => Err(AddressError::WrongNetwork(format!("version byte {}", v))),
        }
    }

    /// Encode back to the network's string form.
    pub fn encode(&self, params: &NetworkParams) -> Result<String, AddressError> {
        match self {
            Address::P2pkh(hash) => Ok(base58check(params.p2pkh_version, hash)),
            Address::P2sh(hash) => Ok(base58check(params.p2sh_version, hash)),
            Address::P2wpkh(hash) => {
                let hrp = Hrp::parse(&params.bech32_hrp)
                    .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;
                bech32::segwit::encode(hrp, Fe32::Q, hash)
                    .map_err(|e| AddressError::InvalidEncoding(e.to_string()))
            }
        }
    }
}

fn base58check(version: u8, hash: &[u8; HASH160_LEN]) -> String {
    let mut payload = Vec::with_capacity(HASH160_LEN + 1);
    payload.push(version);
    payload.extend_from_slice(hash);
    bs58::encode(payload).with_check().into_string()
}

/// RIPEMD160(SHA256(data)).
pub fn hash160(data: &[u8]) -> [u8; HASH160_LEN] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; HASH160_LEN];
    out.copy_from_slice(&ripe);
    out
}

/// Script hash of the P2SH-P2WPKH redeem script `OP_0 <20-byte key hash>`.
pub fn p2sh_p2wpkh_script_hash(key_hash: &[u8; HASH160_LEN]) -> [u8; HASH160_LEN] {
    let mut script = Vec::with_capacity(HASH160_LEN + 2);
    script.push(0x00);
    script.push(HASH160_LEN as u8);
    script.extend_from_slice(key_hash);
    hash160(&script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash160_empty_input() {
        // Well-known HASH160 of the empty string
        assert_eq!(
            hex::encode(hash160(b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }

    #[test]
    fn test_p2pkh_encode_parse() {
        let params = NetworkParams::mainnet();
        let address = Address::P2pkh([7u8; 20]);
        let encoded = address.encode(&params).unwrap();

        assert!(encoded.starts_with('S'));
        assert_eq!(Address::parse(&encoded, &params).unwrap(), address);
    }

    #[test]
    fn test_p2wpkh_encode_parse() {
        let params = NetworkParams::mainnet();
        let address = Address::P2wpkh([9u8; 20]);
        let encoded = address.encode(&params).unwrap();

        assert!(encoded.starts_with("sys1q"));
        assert_eq!(Address::parse(&encoded, &params).unwrap(), address);
        assert_eq!(
            Address::parse(&encoded.to_uppercase(), &params).unwrap(),
            address
        );
    }

    #[test]
    fn test_wrong_network_rejected() {
        let testnet = NetworkParams::testnet();
        let mainnet = NetworkParams::mainnet();

        let p2pkh = Address::P2pkh([1u8; 20]).encode(&testnet).unwrap();
        assert!(matches!(
            Address::parse(&p2pkh, &mainnet),
            Err(AddressError::WrongNetwork(_))
        ));

        let bech = Address::P2wpkh([1u8; 20]).encode(&testnet).unwrap();
        assert!(Address::parse(&bech, &mainnet).is_err());
    }

    #[test]
    fn test_corrupted_checksum_rejected() {
        let params = NetworkParams::mainnet();
        let mut encoded = Address::P2pkh([3u8; 20]).encode(&params).unwrap();
        let last = encoded.pop().unwrap();
        encoded.push(if last == '1' { '2' } else { '1' });

        assert!(matches!(
            Address::parse(&encoded, &params),
            Err(AddressError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let params = NetworkParams::mainnet();
        assert!(Address::parse("", &params).is_err());
        assert!(Address::parse("not an address", &params).is_err());
        assert!(Address::parse("sys1qqqqq", &params).is_err());
    }

    #[test]
    fn test_network_by_name() {
        assert_eq!(NetworkParams::by_name("mainnet"), Some(NetworkParams::mainnet()));
        assert_eq!(NetworkParams::by_name(" TESTNET "), Some(NetworkParams::testnet()));
        assert_eq!(NetworkParams::by_name("regtest"), None);
    }
}
