use crate::{
    AddressPool, ConfigError, DEFAULT_POOL_SIZE, Error, MAX_POOL_SIZE, PoolConfig, PoolStats,
    ReconcileError,
};
use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::thread::scope;

fn net(s: &str) -> Ipv4Net {
    s.parse().unwrap()
}

fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

/// Two /30s: eight addresses, interleaved `a0 b0 a1 b1 ...`.
fn small_config() -> PoolConfig {
    PoolConfig::new(vec![net("192.168.1.0/30"), net("192.168.2.0/30")]).unwrap()
}

fn drain(pool: &AddressPool) -> Vec<Ipv4Addr> {
    let mut out = Vec::new();
    while let Ok(addr) = pool.allocate() {
        out.push(addr);
    }
    out
}

fn assert_partition(pool: &AddressPool) {
    let stats = pool.stats();
    assert_eq!(stats.available + stats.in_use, stats.capacity);
}

#[test]
fn default_pool_starts_fully_available() {
    let pool = AddressPool::new();
    assert_eq!(pool.capacity(), DEFAULT_POOL_SIZE);
    assert_eq!(
        pool.stats(),
        PoolStats {
            capacity: DEFAULT_POOL_SIZE,
            available: DEFAULT_POOL_SIZE,
            in_use: 0,
        }
    );
}

#[test]
fn first_allocations_follow_interleaved_order() {
    let pool = AddressPool::new();
    assert_eq!(pool.allocate().unwrap(), ip("10.0.0.0"));
    assert_eq!(pool.allocate().unwrap(), ip("172.16.0.0"));
    assert_eq!(pool.allocate().unwrap(), ip("10.0.0.1"));
    assert_eq!(pool.allocate().unwrap(), ip("172.16.0.1"));
}

#[test]
fn enumeration_carries_into_third_octet() {
    let pool = AddressPool::new();
    let first: Vec<Ipv4Addr> = (0..514).map(|_| pool.allocate().unwrap()).collect();
    assert_eq!(first[510], ip("10.0.0.255"));
    assert_eq!(first[511], ip("172.16.0.255"));
    assert_eq!(first[512], ip("10.0.1.0"));
    assert_eq!(first[513], ip("172.16.1.0"));
}

#[test]
fn exhausting_default_pool_yields_distinct_addresses() {
    let pool = AddressPool::new();
    let all = drain(&pool);

    assert_eq!(all.len(), DEFAULT_POOL_SIZE);
    let distinct: HashSet<_> = all.iter().copied().collect();
    assert_eq!(distinct.len(), DEFAULT_POOL_SIZE);
    assert!(all.iter().all(|addr| pool.contains(addr)));

    assert_eq!(pool.allocate(), Err(Error::PoolExhausted));
    assert_eq!(pool.available(), 0);
    assert_eq!(pool.in_use(), DEFAULT_POOL_SIZE);
}

#[test]
fn released_address_is_reused_after_exhaustion() {
    let pool = AddressPool::new();
    let all = drain(&pool);
    assert_eq!(pool.allocate(), Err(Error::PoolExhausted));

    let victim = all[77_777];
    assert!(pool.release(victim));
    assert_eq!(pool.allocate(), Ok(victim));
    assert_eq!(pool.allocate(), Err(Error::PoolExhausted));
}

#[test]
fn release_of_unallocated_address_is_noop() {
    let pool = AddressPool::from_config(small_config());
    let before = pool.stats();

    assert!(!pool.release(ip("192.168.1.3")));
    assert!(!pool.release(ip("8.8.8.8")));
    assert_eq!(pool.stats(), before);

    // the queue order is untouched
    assert_eq!(pool.allocate().unwrap(), ip("192.168.1.0"));
    assert_eq!(pool.allocate().unwrap(), ip("192.168.2.0"));
}

#[test]
fn double_release_is_noop() {
    let pool = AddressPool::from_config(small_config());
    let addr = pool.allocate().unwrap();

    assert!(pool.release(addr));
    let after_first = pool.stats();
    assert!(!pool.release(addr));
    assert_eq!(pool.stats(), after_first);
    assert!(!pool.is_in_use(&addr));
}

#[test]
fn released_address_goes_to_tail_of_queue() {
    let pool = AddressPool::from_config(small_config());
    let a0 = pool.allocate().unwrap();
    let _b0 = pool.allocate().unwrap();
    let _a1 = pool.allocate().unwrap();

    assert!(pool.release(a0));

    // everything available at release time comes out first
    let next: Vec<Ipv4Addr> = (0..5).map(|_| pool.allocate().unwrap()).collect();
    assert_eq!(
        next,
        vec![
            ip("192.168.2.1"),
            ip("192.168.1.2"),
            ip("192.168.2.2"),
            ip("192.168.1.3"),
            ip("192.168.2.3"),
        ]
    );
    assert!(!next.contains(&a0));
    assert_eq!(pool.allocate(), Ok(a0));
    assert_eq!(pool.allocate(), Err(Error::PoolExhausted));
}

#[test]
fn releases_are_reused_in_release_order() {
    let pool = AddressPool::from_config(small_config());
    let all = drain(&pool);

    for addr in [all[5], all[1], all[3]] {
        assert!(pool.release(addr));
    }
    assert_eq!(pool.allocate(), Ok(all[5]));
    assert_eq!(pool.allocate(), Ok(all[1]));
    assert_eq!(pool.allocate(), Ok(all[3]));
}

#[test]
fn partition_holds_across_mixed_operations() {
    let pool = AddressPool::from_config(small_config());
    let mut held = Vec::new();

    for round in 0..32 {
        if round % 3 == 2 {
            if let Some(addr) = held.pop() {
                assert!(pool.release(addr));
            }
        } else if let Ok(addr) = pool.allocate() {
            held.push(addr);
        }
        assert_partition(&pool);
        assert_eq!(pool.in_use(), held.len());
    }
}

#[test]
fn uneven_ranges_interleave_until_shorter_runs_out() {
    let config = PoolConfig::new(vec![net("10.9.0.0/31"), net("10.8.0.0/30")]).unwrap();
    let pool = AddressPool::from_config(config);

    assert_eq!(
        drain(&pool),
        vec![
            ip("10.9.0.0"),
            ip("10.8.0.0"),
            ip("10.9.0.1"),
            ip("10.8.0.1"),
            ip("10.8.0.2"),
            ip("10.8.0.3"),
        ]
    );
}

#[test]
fn restore_marks_addresses_in_use() {
    let in_use = [ip("192.168.1.0"), ip("192.168.2.1")];
    let pool = AddressPool::restore(small_config(), in_use).unwrap();

    assert_eq!(pool.capacity(), 8);
    assert_eq!(pool.in_use(), 2);
    assert!(pool.is_in_use(&ip("192.168.1.0")));
    assert_partition(&pool);

    assert_eq!(
        drain(&pool),
        vec![
            ip("192.168.2.0"),
            ip("192.168.1.1"),
            ip("192.168.1.2"),
            ip("192.168.2.2"),
            ip("192.168.1.3"),
            ip("192.168.2.3"),
        ]
    );

    // restored addresses can be released like any other
    assert!(pool.release(ip("192.168.2.1")));
    assert_eq!(pool.allocate(), Ok(ip("192.168.2.1")));
}

#[test]
fn restore_with_released_keeps_release_order_at_tail() {
    let in_use = [ip("192.168.1.1")];
    let released = [ip("192.168.2.0"), ip("192.168.1.0")];
    let pool = AddressPool::restore_with_released(small_config(), in_use, released).unwrap();

    assert_eq!(pool.in_use(), 1);
    assert_eq!(pool.available(), 7);
    assert_partition(&pool);

    assert_eq!(
        drain(&pool),
        vec![
            ip("192.168.2.1"),
            ip("192.168.1.2"),
            ip("192.168.2.2"),
            ip("192.168.1.3"),
            ip("192.168.2.3"),
            ip("192.168.2.0"),
            ip("192.168.1.0"),
        ]
    );
}

#[test]
fn restored_pool_matches_live_pool_queue() {
    let live = AddressPool::from_config(small_config());
    let all = drain(&live);
    assert!(live.release(all[0]));
    assert!(live.release(all[2]));
    let held: Vec<Ipv4Addr> = all[1..].iter().copied().filter(|a| *a != all[2]).collect();

    let restored =
        AddressPool::restore_with_released(small_config(), held, [all[0], all[2]]).unwrap();
    assert_eq!(restored.stats(), live.stats());
    assert_eq!(drain(&restored), drain(&live));
}

#[test]
fn restore_rejects_address_both_released_and_in_use() {
    let addr = ip("192.168.2.2");
    let err = AddressPool::restore_with_released(small_config(), [addr], [addr]).unwrap_err();
    assert_eq!(err, ReconcileError::DuplicateAddress(addr));

    let err = AddressPool::restore_with_released(small_config(), Vec::new(), [ip("10.0.0.1")])
        .unwrap_err();
    assert_eq!(err, ReconcileError::UnknownAddress(ip("10.0.0.1")));
}

#[test]
fn restore_rejects_unknown_address() {
    let err = AddressPool::restore(small_config(), [ip("10.0.0.1")]).unwrap_err();
    assert_eq!(err, ReconcileError::UnknownAddress(ip("10.0.0.1")));
}

#[test]
fn restore_rejects_duplicate_address() {
    let addr = ip("192.168.1.2");
    let err = AddressPool::restore(small_config(), [addr, addr]).unwrap_err();
    assert_eq!(err, ReconcileError::DuplicateAddress(addr));
}

#[test]
fn config_rejects_empty_ranges() {
    assert_eq!(PoolConfig::new(vec![]), Err(ConfigError::NoRanges));
}

#[test]
fn config_rejects_overlapping_ranges() {
    let err = PoolConfig::new(vec![
        net("10.0.0.0/16"),
        net("172.16.0.0/16"),
        net("10.0.128.0/24"),
    ])
    .unwrap_err();
    assert_eq!(
        err,
        ConfigError::OverlappingRanges(net("10.0.0.0/16"), net("10.0.128.0/24"))
    );
}

#[test]
fn config_rejects_oversized_universe() {
    let err = PoolConfig::new(vec![net("10.0.0.0/7")]).unwrap_err();
    assert_eq!(
        err,
        ConfigError::PoolTooLarge {
            size: 1 << 25,
            max: MAX_POOL_SIZE,
        }
    );
    assert!(PoolConfig::new(vec![net("10.0.0.0/8")]).is_ok());
}

#[test]
fn config_truncates_host_bits() {
    let config = PoolConfig::new(vec![net("10.0.0.5/16")]).unwrap();
    assert_eq!(config.ranges(), &[net("10.0.0.0/16")]);
    assert!(config.contains(&ip("10.0.255.255")));
    assert!(!config.contains(&ip("10.1.0.0")));
}

#[test]
fn default_config_matches_default_universe() {
    let config = PoolConfig::default();
    assert_eq!(config.ranges(), &[net("10.0.0.0/16"), net("172.16.0.0/16")]);
    assert_eq!(config.size(), DEFAULT_POOL_SIZE);
}

#[test]
fn pool_threaded_allocations_are_unique() {
    let threads = num_cpus::get().clamp(2, 8);
    let config = PoolConfig::new(vec![net("10.0.0.0/20"), net("172.16.0.0/20")]).unwrap();
    let pool = Arc::new(AddressPool::from_config(config));
    let seen = Arc::new(Mutex::new(HashSet::with_capacity(pool.capacity())));

    scope(|s| {
        for _ in 0..threads {
            let pool = Arc::clone(&pool);
            let seen = Arc::clone(&seen);

            s.spawn(move || {
                loop {
                    match pool.allocate() {
                        Ok(addr) => assert!(seen.lock().unwrap().insert(addr)),
                        Err(Error::PoolExhausted) => break,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            });
        }
    });

    assert_eq!(seen.lock().unwrap().len(), pool.capacity());
    assert_eq!(pool.available(), 0);
}

#[test]
fn pool_threaded_churn_keeps_partition() {
    let threads = num_cpus::get().clamp(2, 8);
    const ROUNDS: usize = 5_000;

    let pool = Arc::new(AddressPool::from_config(small_config()));

    scope(|s| {
        for _ in 0..threads {
            let pool = Arc::clone(&pool);

            s.spawn(move || {
                for _ in 0..ROUNDS {
                    if let Ok(addr) = pool.allocate() {
                        assert!(pool.is_in_use(&addr));
                        assert!(pool.release(addr));
                    }
                }
            });
        }
    });

    assert_eq!(pool.in_use(), 0);
    assert_eq!(pool.available(), pool.capacity());
}

#[cfg(feature = "serde")]
#[test]
fn config_serializes_as_range_list() {
    let json = serde_json::to_string(&PoolConfig::default()).unwrap();
    assert_eq!(json, r#"["10.0.0.0/16","172.16.0.0/16"]"#);

    let back: PoolConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, PoolConfig::default());

    assert!(serde_json::from_str::<PoolConfig>("[]").is_err());
    assert!(serde_json::from_str::<PoolConfig>(r#"["10.0.0.0/8","10.1.0.0/16"]"#).is_err());
}
