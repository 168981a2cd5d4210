use crate::{
    types::{Address, H256, U256},
    utils::{hash_message, verifying_key_to_address},
};
use k256::{
    ecdsa::{RecoveryId, Signature as RecoverableSignature, VerifyingKey},
    FieldBytes,
};
use std::{convert::TryFrom, fmt, str::FromStr};
use thiserror::Error;

/// An error involving a signature.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Invalid length, secp256k1 signatures are 65 bytes
    #[error("invalid signature length, got {0}, expected 65")]
    InvalidLength(usize),
    /// When parsing a signature from string to hex
    #[error(transparent)]
    DecodingError(#[from] hex::FromHexError),
    /// Thrown when signature verification failed (i.e. when the address that
    /// produced the signature did not match the expected address)
    #[error("Signature verification failed. Expected {0}, got {1}")]
    VerificationError(Address, Address),
    /// Internal error during signature recovery
    #[error(transparent)]
    K256Error(#[from] k256::ecdsa::Error),
    /// Error in recovering public key from signature
    #[error("Public key recovery error")]
    RecoveryError,
}

/// An ECDSA signature over secp256k1 in Ethereum's `r || s || v` layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    /// R value
    pub r: U256,
    /// S Value
    pub s: U256,
    /// V value
    pub v: u64,
}

impl Signature {
    /// Recovers the address which signed `message`. The message is hashed with the EIP-191
    /// prefix first, the same way `personal_sign` does it.
    pub fn recover<M: AsRef<[u8]>>(&self, message: M) -> Result<Address, SignatureError> {
        self.recover_from_hash(hash_message(message))
    }

    /// Recovers the address which signed the given prehashed message.
    pub fn recover_from_hash(&self, hash: H256) -> Result<Address, SignatureError> {
        let (signature, recovery_id) = self.as_signature()?;
        let verifying_key =
            VerifyingKey::recover_from_prehash(hash.as_bytes(), &signature, recovery_id)?;
        Ok(verifying_key_to_address(&verifying_key))
    }

    /// Verifies that `message` was signed by `address`.
    pub fn verify<M: AsRef<[u8]>>(&self, message: M, address: Address) -> Result<(), SignatureError> {
        let recovered = self.recover(message)?;
        if recovered != address {
            return Err(SignatureError::VerificationError(address, recovered))
        }
        Ok(())
    }

    fn as_signature(&self) -> Result<(RecoverableSignature, RecoveryId), SignatureError> {
        let mut r_bytes = [0u8; 32];
        let mut s_bytes = [0u8; 32];
        self.r.to_big_endian(&mut r_bytes);
        self.s.to_big_endian(&mut s_bytes);

        let signature = RecoverableSignature::from_scalars(
            FieldBytes::clone_from_slice(&r_bytes),
            FieldBytes::clone_from_slice(&s_bytes),
        )?;
        let recovery_id =
            RecoveryId::from_byte(self.recovery_id()?).ok_or(SignatureError::RecoveryError)?;
        Ok((signature, recovery_id))
    }

    /// Normalizes `v` to the 0/1 parity bit. Accepts raw, legacy (27/28) and EIP-155 values.
    fn recovery_id(&self) -> Result<u8, SignatureError> {
        match self.v {
            0 | 27 => Ok(0),
            1 | 28 => Ok(1),
            v if v >= 35 => Ok(((v - 35) % 2) as u8),
            _ => Err(SignatureError::RecoveryError),
        }
    }

    /// Copies and serializes `self` into a new `Vec` with the recovery id included
    pub fn to_vec(&self) -> Vec<u8> {
        self.into()
    }
}

impl<'a> TryFrom<&'a [u8]> for Signature {
    type Error = SignatureError;

    /// Parses a raw signature which is expected to be 65 bytes long where
    /// the first 32 bytes is the `r` value, the second 32 bytes the `s` value
    /// and the final byte is the `v` value in 'Electrum' notation.
    fn try_from(bytes: &'a [u8]) -> Result<Self, Self::Error> {
        if bytes.len() != 65 {
            return Err(SignatureError::InvalidLength(bytes.len()))
        }

        let v = bytes[64];
        let r = U256::from_big_endian(&bytes[0..32]);
        let s = U256::from_big_endian(&bytes[32..64]);

        Ok(Signature { r, s, v: v.into() })
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        Signature::try_from(&bytes[..])
    }
}

impl From<&Signature> for [u8; 65] {
    fn from(src: &Signature) -> [u8; 65] {
        let mut sig = [0u8; 65];
        src.r.to_big_endian(&mut sig[0..32]);
        src.s.to_big_endian(&mut sig[32..64]);
        // `v` is stored as u64 but only the low byte is meaningful for personal signatures
        sig[64] = src.v as u8;
        sig
    }
}

impl From<Signature> for [u8; 65] {
    fn from(src: Signature) -> [u8; 65] {
        <[u8; 65]>::from(&src)
    }
}

impl From<&Signature> for Vec<u8> {
    fn from(src: &Signature) -> Vec<u8> {
        <[u8; 65]>::from(src).to_vec()
    }
}

impl From<Signature> for Vec<u8> {
    fn from(src: Signature) -> Vec<u8> {
        <[u8; 65]>::from(&src).to_vec()
    }
}

/// Renders the signature the way wallets return it from `personal_sign`: `0x`-prefixed hex.
impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sig = <[u8; 65]>::from(self);
        write!(f, "0x{}", hex::encode(&sig[..]))
    }
}
