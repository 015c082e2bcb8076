//! # kestrel-primitives
//!
//! Primitive types shared by the Kestrel finality crates.
//!
//! - [`Address`]: 20-byte validator account address
//! - [`H256`]: 32-byte block identifier
//! - [`PublicKey`]: 32-byte block generator key

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod hash;
mod public_key;

pub use address::{Address, AddressError};
pub use error::PrimitiveError;
pub use hash::{BlockId, HashError, H256};
pub use public_key::{PublicKey, PublicKeyError};

/// Block height type
pub type BlockHeight = u32;
