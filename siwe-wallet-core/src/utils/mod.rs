mod hash;
pub use hash::{hash_message, keccak256};

/// Re-export hex
pub use hex;

use crate::types::Address;
use k256::ecdsa::{SigningKey, VerifyingKey};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Invalid address checksum")]
    InvalidAddressChecksum,
    #[error(transparent)]
    FromHexError(<Address as std::str::FromStr>::Err),
}

/// Hashes `message` with the EIP-191 prefix and renders the digest as `0x` followed by 64
/// lowercase hex characters. Total over any input, including the empty string.
pub fn message_hash_hex<T: AsRef<[u8]>>(message: T) -> String {
    format!("0x{}", hex::encode(hash_message(message)))
}

/// Converts a K256 SigningKey to an Ethereum Address
pub fn secret_key_to_address(secret_key: &SigningKey) -> Address {
    verifying_key_to_address(secret_key.verifying_key())
}

/// Converts a K256 VerifyingKey to an Ethereum Address
pub fn verifying_key_to_address(public_key: &VerifyingKey) -> Address {
    let public_key = public_key.to_encoded_point(/* compress = */ false);
    let public_key = public_key.as_bytes();
    debug_assert_eq!(public_key[0], 0x04);
    let hash = keccak256(&public_key[1..]);

    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::from(bytes)
}

/// Encodes an Ethereum address to its [EIP-55] checksum.
///
/// You can optionally specify an [EIP-155 chain ID] to encode the address using the [EIP-1191]
/// extension.
///
/// [EIP-55]: https://eips.ethereum.org/EIPS/eip-55
/// [EIP-155 chain ID]: https://eips.ethereum.org/EIPS/eip-155
/// [EIP-1191]: https://eips.ethereum.org/EIPS/eip-1191
pub fn to_checksum(addr: &Address, chain_id: Option<u8>) -> String {
    let prefixed_addr = match chain_id {
        Some(chain_id) => format!("{chain_id}0x{addr:x}"),
        None => format!("{addr:x}"),
    };
    let hash = hex::encode(keccak256(prefixed_addr));
    let hash = hash.as_bytes();

    let addr_hex = hex::encode(addr.as_bytes());
    let addr_hex = addr_hex.as_bytes();

    addr_hex.iter().zip(hash).fold("0x".to_owned(), |mut encoded, (addr, hash)| {
        encoded.push(if *hash >= 56 {
            addr.to_ascii_uppercase() as char
        } else {
            addr.to_ascii_lowercase() as char
        });
        encoded
    })
}

/// Parses an [EIP-1191](https://eips.ethereum.org/EIPS/eip-1191) checksum address.
///
/// Returns `Ok(address)` if the checksummed address is valid, `Err()` otherwise.
/// If `chain_id` is `None`, falls back to [EIP-55](https://eips.ethereum.org/EIPS/eip-55) address checksum method
pub fn parse_checksummed(addr: &str, chain_id: Option<u8>) -> Result<Address, ConversionError> {
    let addr = addr.strip_prefix("0x").unwrap_or(addr);
    let address: Address = addr.parse().map_err(ConversionError::FromHexError)?;
    let checksum_addr = to_checksum(&address, chain_id);

    if checksum_addr.strip_prefix("0x").unwrap_or(&checksum_addr) == addr {
        Ok(address)
    } else {
        Err(ConversionError::InvalidAddressChecksum)
    }
}

/// Returns whether `addr` is a well-formed Ethereum address: 40 hex characters with an optional
/// `0x` prefix. Single-case addresses carry no checksum and are accepted as-is; mixed-case
/// addresses must carry a valid EIP-55 checksum.
pub fn is_address(addr: &str) -> bool {
    let digits = addr.strip_prefix("0x").unwrap_or(addr);
    if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return false
    }

    let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
    if !(has_lower && has_upper) {
        return true
    }

    parse_checksummed(digits, None).is_ok()
}
