#![doc = include_str!("../../README.md")]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[doc(inline)]
pub use siwe_wallet_core as core;

#[doc(inline)]
pub use siwe_wallet_session as session;

#[doc(inline)]
pub use siwe_wallet_signers as signers;

/// Easy imports of frequently used type definitions and traits.
#[doc(hidden)]
pub mod prelude {
    pub use super::core::{
        types::*,
        utils::message_hash_hex,
        validate::{
            is_valid_address, is_valid_chain_id, is_valid_iso_date, is_valid_uri,
            validate_field, Field,
        },
    };

    pub use super::session::*;

    pub use super::signers::*;
}
