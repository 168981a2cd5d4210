use crate::Signer;
use async_trait::async_trait;
use siwe_wallet_core::{
    k256::ecdsa::{self, SigningKey},
    types::{Address, Signature, H256, U256},
    utils::{hash_message, secret_key_to_address},
};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Error thrown while loading a key or signing with it
#[derive(Error, Debug)]
pub enum WalletError {
    #[error(transparent)]
    EcdsaError(#[from] ecdsa::Error),
    /// Error propagated from the hex crate.
    #[error(transparent)]
    HexError(#[from] hex::FromHexError),
    #[error("private key must be 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// A secp256k1 key held in memory, signing the way an injected wallet answers `personal_sign`.
///
/// ```
/// use siwe_wallet_signers::{LocalWallet, Signer};
///
/// # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
/// let wallet: LocalWallet =
///     "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d".parse()?;
///
/// let signature = wallet.sign_message("hello").await?;
/// assert_eq!(signature.recover("hello")?, wallet.address());
/// assert_eq!(wallet.personal_sign("hello")?, signature.to_string());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalWallet {
    key: SigningKey,
    address: Address,
}

impl LocalWallet {
    /// Loads a wallet from a big endian secret scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        if bytes.len() != 32 {
            return Err(WalletError::InvalidKeyLength(bytes.len()))
        }
        Ok(SigningKey::from_bytes(bytes.into())?.into())
    }

    /// Signs a prehashed message. `v` is 27 or 28.
    pub fn sign_hash(&self, hash: H256) -> Result<Signature, WalletError> {
        let (signature, recovery_id) = self.key.sign_prehash_recoverable(hash.as_bytes())?;
        let bytes = signature.to_bytes();

        Ok(Signature {
            r: U256::from_big_endian(&bytes[..32]),
            s: U256::from_big_endian(&bytes[32..]),
            v: u64::from(recovery_id.to_byte()) + 27,
        })
    }

    /// Signs `message` with the EIP-191 prefix and returns the `0x`-prefixed 65 byte signature.
    pub fn personal_sign(&self, message: &str) -> Result<String, WalletError> {
        Ok(self.sign_hash(hash_message(message))?.to_string())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Signer for LocalWallet {
    type Error = WalletError;

    async fn sign_message<S: Send + Sync + AsRef<[u8]>>(
        &self,
        message: S,
    ) -> Result<Signature, Self::Error> {
        self.sign_hash(hash_message(message))
    }

    fn address(&self) -> Address {
        self.address
    }
}

impl From<SigningKey> for LocalWallet {
    fn from(key: SigningKey) -> Self {
        let address = secret_key_to_address(&key);
        Self { key, address }
    }
}

impl FromStr for LocalWallet {
    type Err = WalletError;

    /// Parses a hex encoded private key, with or without the `0x` prefix.
    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let src = src.strip_prefix("0x").or_else(|| src.strip_prefix("0X")).unwrap_or(src);
        Self::from_bytes(&hex::decode(src)?)
    }
}

impl PartialEq for LocalWallet {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for LocalWallet {}

// the key stays out of logs
impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet").field("address", &self.address).finish_non_exhaustive()
    }
}
