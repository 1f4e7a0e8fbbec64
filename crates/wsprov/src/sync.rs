use parking_lot::Mutex;

/// Lock wrapping the shared state of a pool or registry.
///
/// With `cache-padded`, the mutex is aligned to its own cache line so that
/// the pool and registry locks do not false-share when hammered from many
/// threads.
#[cfg(feature = "cache-padded")]
pub(crate) type Locked<T> = crossbeam_utils::CachePadded<Mutex<T>>;
#[cfg(not(feature = "cache-padded"))]
pub(crate) type Locked<T> = Mutex<T>;

pub(crate) fn locked<T>(value: T) -> Locked<T> {
    #[cfg(feature = "cache-padded")]
    {
        crossbeam_utils::CachePadded::new(Mutex::new(value))
    }
    #[cfg(not(feature = "cache-padded"))]
    {
        Mutex::new(value)
    }
}
