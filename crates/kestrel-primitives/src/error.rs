//! Common error types for primitives

use crate::address::AddressError;
use crate::hash::HashError;
use crate::public_key::PublicKeyError;
use thiserror::Error;

/// Primitive operation error
#[derive(Debug, Error)]
pub enum PrimitiveError {
    /// Address error
    #[error("address error: {0}")]
    Address(#[from] AddressError),

    /// Hash error
    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    /// Public key error
    #[error("public key error: {0}")]
    PublicKey(#[from] PublicKeyError),
}
