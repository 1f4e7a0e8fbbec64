use core::fmt;
use std::{net::Ipv4Addr, sync::Arc};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    AddressPool, DEFAULT_MAX_ATTEMPTS, PoolConfig, RandSource, Result, ThreadRandom, Token,
    TokenRegistry, WorkspaceRecord,
};

/// Settings for a [`Provisioner`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProvisionConfig {
    /// Address ranges handed out by the pool.
    pub pool: PoolConfig,
    /// Samples a single token generation may draw.
    pub max_token_attempts: usize,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            max_token_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// The resources issued to one new workspace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Provision {
    pub subdomain: Token,
    pub address: Ipv4Addr,
}

/// Issues and reclaims workspace resources.
///
/// A `Provisioner` is a handle over one shared [`AddressPool`] and one shared
/// [`TokenRegistry`]. Cloning it is cheap and every clone sees the same
/// state, so construct one at startup and hand clones to request handlers.
/// It keeps no state of its own.
///
/// # Example
/// ```
/// use std::net::Ipv4Addr;
/// use wsprov::Provisioner;
///
/// let provisioner = Provisioner::new();
/// let provision = provisioner.provision().unwrap();
/// assert_eq!(provision.address, Ipv4Addr::new(10, 0, 0, 0));
///
/// // ... persist `provision`, later delete the workspace ...
/// assert_eq!(provisioner.release_many([provision.address]), 1);
/// ```
pub struct Provisioner<R = ThreadRandom>
where
    R: RandSource<u64>,
{
    pool: Arc<AddressPool>,
    tokens: Arc<TokenRegistry<R>>,
}

impl Provisioner<ThreadRandom> {
    /// Creates a provisioner over the default address universe.
    pub fn new() -> Self {
        Self::with_config(ProvisionConfig::default())
    }

    pub fn with_config(config: ProvisionConfig) -> Self {
        let tokens = TokenRegistry::new().with_max_attempts(config.max_token_attempts);
        Self::from_parts(
            Arc::new(AddressPool::from_config(config.pool)),
            Arc::new(tokens),
        )
    }

    /// Creates a provisioner that already knows about `records`.
    ///
    /// Every recorded address is marked in use and every recorded subdomain
    /// is marked issued, so a restarted process never hands out a resource
    /// that still belongs to a live workspace.
    ///
    /// # Errors
    /// - [`Error::Reconcile`] if the records reference an address outside
    ///   the configured ranges, or repeat an address or subdomain.
    ///
    /// [`Error::Reconcile`]: crate::Error::Reconcile
    pub fn restore(config: ProvisionConfig, records: &[WorkspaceRecord]) -> Result<Self> {
        Self::restore_with_released(config, records, &[])
    }

    /// Like [`Self::restore`], and additionally queues `released` behind
    /// every other available address, oldest release first.
    ///
    /// A caller that records each address it releases (and forgets it once
    /// the address is allocated again) can rebuild the exact reuse order of
    /// the pool it persisted from.
    ///
    /// # Errors
    /// - [`Error::Reconcile`] as for [`Self::restore`], or if a released
    ///   address also belongs to a record.
    ///
    /// [`Error::Reconcile`]: crate::Error::Reconcile
    pub fn restore_with_released(
        config: ProvisionConfig,
        records: &[WorkspaceRecord],
        released: &[Ipv4Addr],
    ) -> Result<Self> {
        let pool = AddressPool::restore_with_released(
            config.pool,
            records.iter().flat_map(|record| record.ips.iter().copied()),
            released.iter().copied(),
        )?;
        let tokens = TokenRegistry::new()
            .with_max_attempts(config.max_token_attempts)
            .restore(records.iter().map(|record| record.subdomain))?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            workspaces = records.len(),
            addresses_in_use = pool.in_use(),
            addresses_available = pool.available(),
            "restored provisioning state"
        );

        Ok(Self::from_parts(Arc::new(pool), Arc::new(tokens)))
    }
}

impl Default for Provisioner<ThreadRandom> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Provisioner<R>
where
    R: RandSource<u64>,
{
    pub fn from_parts(pool: Arc<AddressPool>, tokens: Arc<TokenRegistry<R>>) -> Self {
        Self { pool, tokens }
    }

    /// Issues a subdomain token, then allocates an address.
    ///
    /// If allocation fails the token is *not* returned to the registry; it
    /// stays consumed and only the allocation error is reported.
    ///
    /// # Errors
    /// - [`Error::Token`] if no unused token could be found.
    /// - [`Error::PoolExhausted`] if every address is in use.
    ///
    /// [`Error::Token`]: crate::Error::Token
    /// [`Error::PoolExhausted`]: crate::Error::PoolExhausted
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn provision(&self) -> Result<Provision> {
        let subdomain = self.tokens.generate()?;

        let address = match self.pool.allocate() {
            Ok(address) => address,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%subdomain, error = %e, "allocation failed after token was issued");
                return Err(e);
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(%subdomain, %address, "provisioned workspace resources");
        Ok(Provision { subdomain, address })
    }

    /// Releases every address in `addrs` back to the pool.
    ///
    /// Addresses that are not in use are skipped. Returns how many addresses
    /// were actually released.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
    pub fn release_many<I>(&self, addrs: I) -> usize
    where
        I: IntoIterator<Item = Ipv4Addr>,
    {
        let mut released = 0;
        for addr in addrs {
            if self.pool.release(addr) {
                released += 1;
            } else {
                #[cfg(feature = "tracing")]
                tracing::debug!(%addr, "address was not in use, skipping");
            }
        }
        released
    }

    /// Releases the addresses of a deleted workspace.
    ///
    /// The subdomain stays issued.
    pub fn release_record(&self, record: &WorkspaceRecord) -> usize {
        self.release_many(record.ips.iter().copied())
    }

    pub fn pool(&self) -> &AddressPool {
        &self.pool
    }

    pub fn tokens(&self) -> &TokenRegistry<R> {
        &self.tokens
    }
}

impl<R> Clone for Provisioner<R>
where
    R: RandSource<u64>,
{
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            tokens: Arc::clone(&self.tokens),
        }
    }
}

impl<R> fmt::Debug for Provisioner<R>
where
    R: RandSource<u64>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioner")
            .field("pool", &self.pool)
            .field("tokens", &self.tokens)
            .finish()
    }
}
