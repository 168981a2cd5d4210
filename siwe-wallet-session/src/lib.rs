#![doc = include_str!("../README.md")]
#![deny(unsafe_code, rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
pub use error::{CodecError, ProviderError, SessionError, INTERNAL_ERROR, USER_REJECTED_REQUEST};

/// The capability contract an injected wallet satisfies
pub mod provider;
pub use provider::{ProviderSigner, ProviderSource, WalletProvider};

pub mod codec;
pub use codec::{Eip4361Codec, ParsedSiweFields, SiweCodec, VerifyOptions};

mod session;
pub use session::{SignResult, WalletSession};

/// A [`WalletProvider`] over a local private key
mod local;
pub use local::{LocalProvider, LocalSigner};

#[cfg(target_arch = "wasm32")]
#[cfg_attr(docsrs, doc(cfg(target_arch = "wasm32")))]
mod browser;
#[cfg(target_arch = "wasm32")]
pub use browser::{BrowserProvider, BrowserSigner, BrowserWindow};
