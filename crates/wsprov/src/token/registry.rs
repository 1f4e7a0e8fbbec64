use core::fmt;
use std::collections::HashSet;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    RandSource, ReconcileError, ThreadRandom, Token, TokenError,
    sync::{Locked, locked},
    token::TOKEN_SPACE,
};

/// Default number of samples [`TokenRegistry::generate`] draws before giving
/// up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 64;

/// Issues subdomain [`Token`]s that are unique for the life of the registry.
///
/// Every issued token is remembered. Tokens are never released, so a token
/// that belonged to a deleted workspace is never handed out again.
///
/// ## Features
/// - ✅ Thread-safe: sampling, the uniqueness check and the insert happen
///   under one lock, so two callers can never claim the same token
/// - ✅ Bounded: each call draws at most `max_attempts` samples
///
/// With 36^8 possible tokens a collision is already rare; running out of
/// attempts requires `max_attempts` collisions in a row.
///
/// # Example
/// ```
/// use wsprov::TokenRegistry;
///
/// let registry = TokenRegistry::new();
/// let a = registry.generate().unwrap();
/// let b = registry.generate().unwrap();
/// assert_ne!(a, b);
/// assert_eq!(registry.len(), 2);
/// ```
pub struct TokenRegistry<R = ThreadRandom>
where
    R: RandSource<u64>,
{
    pub(crate) issued: Locked<HashSet<Token>>,
    pub(crate) rng: R,
    pub(crate) max_attempts: usize,
}

impl TokenRegistry<ThreadRandom> {
    /// Creates an empty registry backed by the thread-local RNG.
    pub fn new() -> Self {
        Self::with_rng(ThreadRandom)
    }
}

impl Default for TokenRegistry<ThreadRandom> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> TokenRegistry<R>
where
    R: RandSource<u64>,
{
    /// Creates an empty registry that samples tokens from `rng`.
    pub fn with_rng(rng: R) -> Self {
        Self {
            issued: locked(HashSet::new()),
            rng,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets how many samples a single [`Self::generate`] call may draw.
    ///
    /// Values below one are raised to one.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Marks every token in `tokens` as issued.
    ///
    /// Used at startup to reload tokens that were persisted by a previous
    /// process, so they are never issued twice.
    ///
    /// # Errors
    /// - [`ReconcileError::DuplicateToken`] if a token appears twice, or is
    ///   already issued by this registry.
    pub fn restore<I>(self, tokens: I) -> Result<Self, ReconcileError>
    where
        I: IntoIterator<Item = Token>,
    {
        {
            let mut issued = self.issued.lock();
            for token in tokens {
                if !issued.insert(token) {
                    return Err(ReconcileError::DuplicateToken(token));
                }
            }
        }
        Ok(self)
    }

    /// Issues a new token that has never been issued by this registry.
    ///
    /// Samples uniformly from the token space until an unused token is found
    /// or `max_attempts` samples have collided.
    ///
    /// # Errors
    /// - [`TokenError::Exhausted`] if every sample collided. Nothing is
    ///   recorded in that case.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn generate(&self) -> Result<Token, TokenError> {
        let mut issued = self.issued.lock();

        for _attempt in 1..=self.max_attempts {
            let token = Token::from_index(self.rng.rand_below(TOKEN_SPACE));
            if issued.insert(token) {
                return Ok(token);
            }
            #[cfg(feature = "tracing")]
            tracing::debug!(attempt = _attempt, %token, "token collision, resampling");
        }

        Err(self.cold_exhausted(issued.len()))
    }

    #[cold]
    #[inline(never)]
    fn cold_exhausted(&self, _issued: usize) -> TokenError {
        #[cfg(feature = "tracing")]
        tracing::error!(
            attempts = self.max_attempts,
            issued = _issued,
            "unable to find an unused token"
        );
        TokenError::Exhausted {
            attempts: self.max_attempts,
        }
    }

    /// Records `token` as issued without generating it.
    ///
    /// Returns `false` if the token was already issued.
    pub fn reserve(&self, token: Token) -> bool {
        self.issued.lock().insert(token)
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.issued.lock().contains(token)
    }

    /// Number of tokens issued or reserved so far.
    pub fn len(&self) -> usize {
        self.issued.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

impl<R> fmt::Debug for TokenRegistry<R>
where
    R: RandSource<u64>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRegistry")
            .field("issued", &self.len())
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
