//! Every validator is total: malformed or empty input yields `false`, never a panic or an error.
//!
//! ```
//! use siwe_wallet_core::validate::{validate_field, Field};
//!
//! assert!(validate_field(Field::ChainId, "1"));
//! assert!(!validate_field(Field::IssuedAt, "2023-01-01"));
//! ```

use crate::utils::is_address;
use chrono::{DateTime, NaiveDateTime};
use std::fmt;
use url::Url;

/// A validated field of a Sign-In with Ethereum message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Address,
    ChainId,
    Uri,
    IssuedAt,
}

impl Field {
    /// The key of the localized message shown when this field fails validation.
    pub fn i18n_key(&self) -> &'static str {
        match self {
            Field::Address => "errors.invalidAddress",
            Field::ChainId => "errors.invalidChainId",
            Field::Uri => "errors.invalidUri",
            Field::IssuedAt => "errors.invalidDate",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Address => "Ethereum address",
            Field::ChainId => "Chain ID",
            Field::Uri => "URI",
            Field::IssuedAt => "date",
        };
        f.write_str(name)
    }
}

/// Runs the validator matching `field` over `value`.
pub fn validate_field(field: Field, value: &str) -> bool {
    match field {
        Field::Address => is_valid_address(value),
        Field::ChainId => is_valid_chain_id(value),
        Field::Uri => is_valid_uri(value),
        Field::IssuedAt => is_valid_iso_date(value),
    }
}

/// Validates an Ethereum address, see [`is_address`].
pub fn is_valid_address(address: &str) -> bool {
    is_address(address)
}

/// A chain id is a strictly positive base-10 integer written with ASCII digits only.
pub fn is_valid_chain_id(chain_id: &str) -> bool {
    if !chain_id.bytes().all(|b| b.is_ascii_digit()) {
        return false
    }
    matches!(chain_id.parse::<u64>(), Ok(id) if id > 0)
}

/// Accepts absolute URIs that carry an authority, so `http://` alone is rejected.
pub fn is_valid_uri(uri: &str) -> bool {
    Url::parse(uri).map(|url| url.has_host()).unwrap_or(false)
}

/// Accepts ISO-8601 date-times. A date without a time component is rejected even though it names
/// a valid calendar day.
pub fn is_valid_iso_date(date: &str) -> bool {
    if !date.contains('T') {
        return false
    }

    DateTime::parse_from_rfc3339(date).is_ok() ||
        DateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%.f%z").is_ok() ||
        DateTime::parse_from_str(date, "%Y-%m-%dT%H:%M%z").is_ok() ||
        NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%.f").is_ok() ||
        NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S").is_ok() ||
        NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M").is_ok()
}
