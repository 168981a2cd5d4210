use serde::{Deserialize, Serialize};
use siwe_wallet_core::types::SignatureError;
use thiserror::Error;

/// [EIP-1193] code a wallet answers with when the user dismisses its prompt.
///
/// [EIP-1193]: https://eips.ethereum.org/EIPS/eip-1193#provider-errors
pub const USER_REJECTED_REQUEST: i64 = 4001;

/// JSON-RPC internal error code, used for failures that carry no code of their own.
pub const INTERNAL_ERROR: i64 = -32603;

/// An error reported by a wallet provider, in the `{ code, message }` shape of EIP-1193.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("provider error (code {code:?}): {message}")]
pub struct ProviderError {
    /// The numeric code, absent when the provider threw something unstructured
    pub code: Option<i64>,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code: Some(code), message: message.into() }
    }

    /// An error without a code
    pub fn other(message: impl Into<String>) -> Self {
        Self { code: None, message: message.into() }
    }

    /// The error a provider raises when the user rejects its prompt
    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED_REQUEST, "User rejected the request.")
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == Some(USER_REJECTED_REQUEST)
    }
}

/// Failures of the SIWE codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The text is not an EIP-4361 message
    #[error("{0}")]
    Parse(String),
    /// The signature is not a 65 byte hex string
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("message domain {actual} does not match {expected}")]
    DomainMismatch { expected: String, actual: String },
    #[error("message nonce does not match")]
    NonceMismatch,
    /// Outside the `Not Before` / `Expiration Time` window
    #[error("message is not currently valid")]
    NotCurrentlyValid,
    #[error("signature verification failed: {0}")]
    Verification(String),
}

/// Every way connecting to a wallet or signing with it can fail.
///
/// Provider causes are kept as the error source but never rendered, the UI shows the
/// guidance text only.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No Ethereum provider found. Please install MetaMask or another wallet")]
    NoProvider,
    #[error("Connection rejected. Please approve the connection request in your wallet.")]
    ConnectionRejected,
    #[error("Failed to connect to wallet. Please try again.")]
    ConnectionFailed(#[source] ProviderError),
    #[error("No wallet connected. Please connect a wallet first.")]
    NotConnected,
    #[error("Invalid SIWE message format: {0}")]
    InvalidMessageFormat(String),
    /// The message names a different account than the connected one, the user has to switch
    /// accounts rather than edit the message
    #[error(
        "The Ethereum address in the message ({message}) does not match your connected wallet address ({signer})."
    )]
    AddressMismatch { message: String, signer: String },
    #[error("Signature request rejected. Please approve the signature request in your wallet.")]
    SignatureRejected,
    #[error("Failed to sign message. Please try again.")]
    SigningFailed(#[source] ProviderError),
}

impl SessionError {
    /// The key of the localized message the UI shows for this error.
    pub fn i18n_key(&self) -> &'static str {
        match self {
            SessionError::NoProvider |
            SessionError::ConnectionRejected |
            SessionError::ConnectionFailed(_) => "errors.failedToConnect",
            SessionError::InvalidMessageFormat(_) => "errors.invalidMessage",
            SessionError::AddressMismatch { .. } => "errors.invalidAddress",
            SessionError::NotConnected |
            SessionError::SignatureRejected |
            SessionError::SigningFailed(_) => "errors.failedToSign",
        }
    }

    /// Whether the user declined a wallet prompt, which they can simply retry.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, SessionError::ConnectionRejected | SessionError::SignatureRejected)
    }
}
