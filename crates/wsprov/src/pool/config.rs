use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::ConfigError;

/// Largest number of addresses a pool will enumerate (a /8 worth).
///
/// The pool keeps every available address in memory, so the universe has to
/// stay small enough to materialize up front.
pub const MAX_POOL_SIZE: u64 = 1 << 24;

/// The default address universe: `10.0.0.0/16` and `172.16.0.0/16`.
pub const DEFAULT_RANGES: [Ipv4Net; 2] = [
    Ipv4Net::new_assert(Ipv4Addr::new(10, 0, 0, 0), 16),
    Ipv4Net::new_assert(Ipv4Addr::new(172, 16, 0, 0), 16),
];

/// Number of addresses in the default universe.
pub const DEFAULT_POOL_SIZE: usize = 131_072;

/// The set of address ranges an [`AddressPool`] allocates from.
///
/// Ranges are kept in the order they were configured, which decides the
/// enumeration order of the pool: addresses are emitted round-robin by host
/// offset, so the first address of every range comes before the second
/// address of any range. With the default ranges this yields `10.0.0.0`,
/// `172.16.0.0`, `10.0.0.1`, `172.16.0.1`, ...
///
/// # Example
/// ```
/// use wsprov::PoolConfig;
///
/// let config = PoolConfig::new(vec![
///     "192.168.0.0/24".parse().unwrap(),
///     "192.168.8.0/23".parse().unwrap(),
/// ])
/// .unwrap();
/// assert_eq!(config.size(), 256 + 512);
///
/// assert!(PoolConfig::new(vec![
///     "10.0.0.0/8".parse().unwrap(),
///     "10.1.0.0/16".parse().unwrap(),
/// ])
/// .is_err());
/// ```
///
/// [`AddressPool`]: crate::AddressPool
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<Ipv4Net>", into = "Vec<Ipv4Net>")
)]
pub struct PoolConfig {
    ranges: Vec<Ipv4Net>,
}

impl PoolConfig {
    /// Validates `ranges` and builds a configuration from them.
    ///
    /// Host bits are truncated, so `10.0.0.5/16` is read as `10.0.0.0/16`.
    ///
    /// # Errors
    /// - [`ConfigError::NoRanges`] if `ranges` is empty.
    /// - [`ConfigError::OverlappingRanges`] if two ranges share an address.
    /// - [`ConfigError::PoolTooLarge`] if the ranges hold more than
    ///   [`MAX_POOL_SIZE`] addresses.
    pub fn new(ranges: Vec<Ipv4Net>) -> Result<Self, ConfigError> {
        if ranges.is_empty() {
            return Err(ConfigError::NoRanges);
        }

        let ranges: Vec<Ipv4Net> = ranges.iter().map(Ipv4Net::trunc).collect();

        for (i, a) in ranges.iter().enumerate() {
            for b in &ranges[i + 1..] {
                if a.contains(&b.network()) || b.contains(&a.network()) {
                    return Err(ConfigError::OverlappingRanges(*a, *b));
                }
            }
        }

        let size: u64 = ranges.iter().map(range_size).sum();
        if size > MAX_POOL_SIZE {
            return Err(ConfigError::PoolTooLarge {
                size,
                max: MAX_POOL_SIZE,
            });
        }

        Ok(Self { ranges })
    }

    pub fn ranges(&self) -> &[Ipv4Net] {
        &self.ranges
    }

    /// Total number of addresses across all ranges.
    pub fn size(&self) -> usize {
        // bounded by MAX_POOL_SIZE
        self.ranges.iter().map(range_size).sum::<u64>() as usize
    }

    /// Returns `true` if `addr` falls inside one of the ranges.
    pub fn contains(&self, addr: &Ipv4Addr) -> bool {
        self.ranges.iter().any(|net| net.contains(addr))
    }

    /// Enumerates every address in pool order.
    pub(crate) fn enumerate(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        let longest = self.ranges.iter().map(range_size).max().unwrap_or(0);
        (0..longest).flat_map(move |offset| {
            self.ranges
                .iter()
                .filter(move |net| offset < range_size(net))
                .map(move |net| Ipv4Addr::from(u32::from(net.network()) + offset as u32))
        })
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            ranges: DEFAULT_RANGES.to_vec(),
        }
    }
}

impl TryFrom<Vec<Ipv4Net>> for PoolConfig {
    type Error = ConfigError;

    fn try_from(ranges: Vec<Ipv4Net>) -> Result<Self, Self::Error> {
        Self::new(ranges)
    }
}

impl From<PoolConfig> for Vec<Ipv4Net> {
    fn from(config: PoolConfig) -> Self {
        config.ranges
    }
}

fn range_size(net: &Ipv4Net) -> u64 {
    1_u64 << (32 - net.prefix_len())
}
