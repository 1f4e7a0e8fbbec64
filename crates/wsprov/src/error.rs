//! Error types for workspace provisioning.
//!
//! Allocation has a single runtime failure, [`Error::PoolExhausted`]. Token
//! generation can only fail once its bounded retry budget is spent, which is
//! not reachable in practice. The remaining variants are raised while building
//! a pool or registry from configuration or from previously persisted state.
//!
//! ## Error Cases
//! - `PoolExhausted`: every address in the pool is in use.
//! - `Token`: a subdomain token could not be issued or parsed.
//! - `Config`: the configured address ranges are unusable.
//! - `Reconcile`: persisted state contradicts itself or the configuration.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::token::Token;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Unified error type for the provisioning core.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// No address is available. Terminal for the call; the pool never waits
    /// for an address to be released.
    #[error("address pool exhausted")]
    PoolExhausted,

    /// A subdomain token could not be issued or parsed.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The address space configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Persisted allocations could not be restored.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// Errors produced by [`Token`] parsing and [`TokenRegistry`] issuance.
///
/// [`TokenRegistry`]: crate::TokenRegistry
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TokenError {
    /// Every sampled token in a single call collided with an issued one.
    #[error("no unused token found after {attempts} attempts")]
    Exhausted { attempts: usize },

    /// The input does not have exactly [`TOKEN_LEN`](crate::TOKEN_LEN) bytes.
    #[error("invalid token length: {len}")]
    InvalidLength { len: usize },

    /// The input contains a byte outside the token alphabet.
    #[error("invalid token byte {byte:#04x} at index {index}")]
    InvalidSymbol { byte: u8, index: usize },
}

/// Errors produced while validating a [`PoolConfig`](crate::PoolConfig).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// No address range was configured.
    #[error("at least one address range is required")]
    NoRanges,

    /// Two configured ranges share addresses.
    #[error("address ranges {0} and {1} overlap")]
    OverlappingRanges(Ipv4Net, Ipv4Net),

    /// The ranges hold more addresses than the pool will enumerate.
    #[error("address ranges hold {size} addresses (max = {max})")]
    PoolTooLarge { size: u64, max: u64 },
}

/// Errors produced while restoring allocations from persisted state.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ReconcileError {
    /// A persisted address lies outside every configured range.
    #[error("persisted address {0} is outside the configured ranges")]
    UnknownAddress(Ipv4Addr),

    /// The same address is recorded as in use more than once.
    #[error("address {0} is recorded as in use more than once")]
    DuplicateAddress(Ipv4Addr),

    /// The same token is recorded more than once.
    #[error("token {0} is recorded more than once")]
    DuplicateToken(Token),
}
