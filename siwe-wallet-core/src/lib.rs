#![doc = include_str!("../README.md")]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Various utilities
pub mod utils;

pub mod types;

/// Validators for the user-editable fields of a Sign-In with Ethereum message
pub mod validate;

// re-export k256
pub extern crate k256;
