//! The EIP-4361 message codec the session delegates parsing and verification to.

use crate::CodecError;
use serde::{Deserialize, Serialize};
use siwe::{Message, Version};
use siwe_wallet_core::{
    types::{Address, Signature},
    utils::to_checksum,
};
use std::fmt::Debug;

/// The fields of a Sign-In with Ethereum message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSiweFields {
    pub domain: String,
    /// EIP-55 checksummed
    pub address: String,
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: String,
    pub expiration_time: Option<String>,
    pub not_before: Option<String>,
    pub request_id: Option<String>,
    #[serde(default)]
    pub resources: Vec<String>,
}

impl From<&Message> for ParsedSiweFields {
    fn from(message: &Message) -> Self {
        let version = match message.version {
            Version::V1 => "1",
        };

        Self {
            domain: message.domain.to_string(),
            address: to_checksum(&Address::from(message.address), None),
            statement: message.statement.clone(),
            uri: message.uri.to_string(),
            version: version.to_owned(),
            chain_id: message.chain_id,
            nonce: message.nonce.clone(),
            issued_at: message.issued_at.to_string(),
            expiration_time: message.expiration_time.as_ref().map(ToString::to_string),
            not_before: message.not_before.as_ref().map(ToString::to_string),
            request_id: message.request_id.clone(),
            resources: message.resources.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Optional checks applied on top of signature verification.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOptions {
    /// Expected `domain`, compared case-insensitively
    pub domain: Option<String>,
    pub nonce: Option<String>,
}

/// Parses and verifies Sign-In with Ethereum messages.
pub trait SiweCodec: Debug {
    /// Decomposes `message`, failing when it is not a well-formed EIP-4361 message.
    fn parse(&self, message: &str) -> Result<ParsedSiweFields, CodecError>;

    /// Checks that `signature` over `message` was produced by the message's address and that
    /// the message is currently valid.
    fn verify(
        &self,
        message: &str,
        signature: &str,
        opts: &VerifyOptions,
    ) -> Result<(), CodecError>;
}

/// [EIP-4361] codec backed by the `siwe` crate. Only EOA (`personal_sign`) signatures are
/// verified.
///
/// [EIP-4361]: https://eips.ethereum.org/EIPS/eip-4361
#[derive(Clone, Copy, Debug, Default)]
pub struct Eip4361Codec;

impl Eip4361Codec {
    fn decode(message: &str) -> Result<Message, CodecError> {
        message.parse::<Message>().map_err(|err| CodecError::Parse(err.to_string()))
    }
}

impl SiweCodec for Eip4361Codec {
    fn parse(&self, message: &str) -> Result<ParsedSiweFields, CodecError> {
        Self::decode(message).map(|message| ParsedSiweFields::from(&message))
    }

    fn verify(
        &self,
        message: &str,
        signature: &str,
        opts: &VerifyOptions,
    ) -> Result<(), CodecError> {
        let message = Self::decode(message)?;
        let signature: [u8; 65] = signature.parse::<Signature>()?.into();

        if let Some(domain) = &opts.domain {
            let actual = message.domain.as_str();
            if !actual.eq_ignore_ascii_case(domain) {
                return Err(CodecError::DomainMismatch {
                    expected: domain.clone(),
                    actual: actual.to_owned(),
                })
            }
        }
        if let Some(nonce) = &opts.nonce {
            if &message.nonce != nonce {
                return Err(CodecError::NonceMismatch)
            }
        }
        if !message.valid_now() {
            return Err(CodecError::NotCurrentlyValid)
        }

        message
            .verify_eip191(&signature)
            .map(|_| ())
            .map_err(|err| CodecError::Verification(err.to_string()))
    }
}
