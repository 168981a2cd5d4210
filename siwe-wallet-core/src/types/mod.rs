//! Ethereum data types.

// Re-export common ethereum datatypes with more specific names

pub use ethabi::ethereum_types::{Address, H160, H256, U256};

mod signature;
pub use signature::*;
