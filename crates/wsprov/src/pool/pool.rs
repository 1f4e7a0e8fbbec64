use core::fmt;
use std::{
    collections::{HashSet, VecDeque},
    net::Ipv4Addr,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, PoolConfig, ReconcileError, Result,
    sync::{Locked, locked},
};

struct PoolState {
    /// Free addresses, allocated from the front and released to the back.
    available: VecDeque<Ipv4Addr>,
    in_use: HashSet<Ipv4Addr>,
}

/// A snapshot of pool occupancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    pub capacity: usize,
    pub available: usize,
    pub in_use: usize,
}

/// A FIFO pool of IPv4 addresses shared between threads.
///
/// Every address of the configured universe is either *available* or *in
/// use*, never both. Allocation takes the oldest available address;
/// release appends the address to the back of the queue, so a released
/// address is only reused after everything that was available before it.
///
/// All state sits behind one mutex. Both operations are O(1) and never block
/// on anything but that lock: when the pool is empty, [`Self::allocate`]
/// fails immediately with [`Error::PoolExhausted`] instead of waiting.
///
/// ## Recommended When
/// - Many request handlers allocate and release concurrently
/// - Reuse of released addresses should be delayed as long as possible
///
/// # Example
/// ```
/// use std::net::Ipv4Addr;
/// use wsprov::AddressPool;
///
/// let pool = AddressPool::new();
/// assert_eq!(pool.allocate().unwrap(), Ipv4Addr::new(10, 0, 0, 0));
/// assert_eq!(pool.allocate().unwrap(), Ipv4Addr::new(172, 16, 0, 0));
///
/// assert!(pool.release(Ipv4Addr::new(10, 0, 0, 0)));
/// // releasing twice is a no-op
/// assert!(!pool.release(Ipv4Addr::new(10, 0, 0, 0)));
/// ```
pub struct AddressPool {
    state: Locked<PoolState>,
    config: PoolConfig,
    capacity: usize,
}

impl AddressPool {
    /// Creates a pool over the default universe (`10.0.0.0/16` and
    /// `172.16.0.0/16`) with every address available.
    pub fn new() -> Self {
        Self::from_config(PoolConfig::default())
    }

    /// Creates a pool over `config` with every address available.
    pub fn from_config(config: PoolConfig) -> Self {
        let available: VecDeque<Ipv4Addr> = config.enumerate().collect();
        let capacity = available.len();

        Self {
            state: locked(PoolState {
                available,
                in_use: HashSet::new(),
            }),
            config,
            capacity,
        }
    }

    /// Creates a pool over `config` where the addresses in `in_use` are
    /// already allocated.
    ///
    /// This is how a restarted process picks up allocations that were
    /// persisted before it went down. The remaining addresses keep their
    /// enumeration order.
    ///
    /// # Errors
    /// - [`ReconcileError::UnknownAddress`] if an address is outside `config`.
    /// - [`ReconcileError::DuplicateAddress`] if an address is listed twice.
    pub fn restore<I>(config: PoolConfig, in_use: I) -> Result<Self, ReconcileError>
    where
        I: IntoIterator<Item = Ipv4Addr>,
    {
        Self::restore_with_released(config, in_use, core::iter::empty::<Ipv4Addr>())
    }

    /// Like [`Self::restore`], but also replays the order of earlier
    /// releases.
    ///
    /// `released` lists addresses that were released and not allocated
    /// since, oldest release first. They are queued behind every other
    /// available address, in that order, exactly where [`Self::release`]
    /// left them.
    ///
    /// # Errors
    /// - [`ReconcileError::UnknownAddress`] if an address is outside `config`.
    /// - [`ReconcileError::DuplicateAddress`] if an address is listed twice,
    ///   in either list or across both.
    pub fn restore_with_released<I, J>(
        config: PoolConfig,
        in_use: I,
        released: J,
    ) -> Result<Self, ReconcileError>
    where
        I: IntoIterator<Item = Ipv4Addr>,
        J: IntoIterator<Item = Ipv4Addr>,
    {
        let mut seen = HashSet::new();
        let mut check = |addr: Ipv4Addr| {
            if !config.contains(&addr) {
                return Err(ReconcileError::UnknownAddress(addr));
            }
            if !seen.insert(addr) {
                return Err(ReconcileError::DuplicateAddress(addr));
            }
            Ok(addr)
        };

        let taken = in_use
            .into_iter()
            .map(&mut check)
            .collect::<Result<HashSet<_>, _>>()?;
        let tail = released
            .into_iter()
            .map(&mut check)
            .collect::<Result<Vec<_>, _>>()?;

        let mut available: VecDeque<Ipv4Addr> = config
            .enumerate()
            .filter(|addr| !seen.contains(addr))
            .collect();
        available.extend(tail);
        let capacity = available.len() + taken.len();

        Ok(Self {
            state: locked(PoolState {
                available,
                in_use: taken,
            }),
            config,
            capacity,
        })
    }

    /// Allocates the address at the head of the available queue.
    ///
    /// # Errors
    /// - [`Error::PoolExhausted`] if no address is available.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn allocate(&self) -> Result<Ipv4Addr> {
        let mut state = self.state.lock();

        let Some(addr) = state.available.pop_front() else {
            return Err(self.cold_exhausted());
        };
        state.in_use.insert(addr);

        debug_assert_eq!(state.available.len() + state.in_use.len(), self.capacity);
        Ok(addr)
    }

    #[cold]
    #[inline(never)]
    fn cold_exhausted(&self) -> Error {
        #[cfg(feature = "tracing")]
        tracing::warn!(capacity = self.capacity, "address pool exhausted");
        Error::PoolExhausted
    }

    /// Returns `addr` to the back of the available queue.
    ///
    /// Returns `true` if `addr` was in use. Addresses that were never
    /// allocated, were already released, or are not part of the pool are
    /// ignored and `false` is returned.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn release(&self, addr: Ipv4Addr) -> bool {
        let mut state = self.state.lock();

        if !state.in_use.remove(&addr) {
            return false;
        }
        state.available.push_back(addr);

        debug_assert_eq!(state.available.len() + state.in_use.len(), self.capacity);
        true
    }

    /// Total number of addresses the pool manages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.state.lock().available.len()
    }

    pub fn in_use(&self) -> usize {
        self.state.lock().in_use.len()
    }

    pub fn is_in_use(&self, addr: &Ipv4Addr) -> bool {
        self.state.lock().in_use.contains(addr)
    }

    /// Returns `true` if `addr` belongs to the pool's universe, whatever its
    /// current state.
    pub fn contains(&self, addr: &Ipv4Addr) -> bool {
        self.config.contains(addr)
    }

    /// Reads both counters under a single lock acquisition.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            capacity: self.capacity,
            available: state.available.len(),
            in_use: state.in_use.len(),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl Default for AddressPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AddressPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressPool")
            .field("ranges", &self.config.ranges())
            .field("stats", &self.stats())
            .finish()
    }
}
