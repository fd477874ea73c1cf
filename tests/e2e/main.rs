//! End-to-end tests over an in-process two-host topology
//!
//! Run with: cargo test --test e2e

mod topology;

use netcache::kv::LookupResult;
use topology::{data, SingleSwitch, H1, H2};

#[test]
fn test_cached_key_answered_without_backend() {
    let switch = SingleSwitch::provisioned();

    assert_eq!(switch.client_get(1), LookupResult::Value(11));
    assert_eq!(switch.metrics.cache_hits.get(), 1);
    assert_eq!(switch.metrics.replies_sent.get(), 1);
    assert_eq!(switch.metrics.packets_forwarded.get(), 0);
}

#[test]
fn test_uncached_key_falls_through_to_backend() {
    let switch = SingleSwitch::provisioned();

    assert_eq!(switch.client_get(4), LookupResult::Value(44));
    assert_eq!(switch.metrics.cache_misses.get(), 1);
    // request to h1, answer back to h2
    assert_eq!(switch.metrics.packets_forwarded.get(), 2);
}

#[test]
fn test_missing_key_reports_not_found() {
    let switch = SingleSwitch::provisioned();
    assert_eq!(switch.client_get(250), LookupResult::NotFound);
}

#[test]
fn test_other_traffic_times_out() {
    let switch = SingleSwitch::provisioned();

    assert!(switch.pipeline.tables().lookup_route(H1.ip).is_some());
    assert!(!switch.other_traffic());
    assert_eq!(switch.metrics.dropped_unrecognized.get(), 1);
}

#[test]
fn test_full_sweep_twice_without_drift() {
    let switch = SingleSwitch::provisioned();
    let store = data();

    let mut runs = Vec::new();
    for _ in 0..2 {
        let mut observed = Vec::new();
        for (key, value) in store.iter() {
            let result = switch.client_get(key);
            assert_eq!(result, LookupResult::Value(value), "key {}", key);
            observed.push(result);
        }
        assert!(!switch.other_traffic());
        observed.push(switch.client_get(250));
        assert_eq!(observed.last(), Some(&LookupResult::NotFound));
        runs.push(observed);
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(switch.pipeline.tables().cache().len(), 3);
    assert_eq!(switch.pipeline.tables().forwarding().len(), 2);
    assert_eq!(switch.metrics.cache_hits.get(), 6);
    assert_eq!(switch.metrics.cache_misses.get(), 2 * 198);
}

#[test]
fn test_empty_tables_time_out() {
    let switch = SingleSwitch::new();

    assert_eq!(switch.client_get(1), LookupResult::Timeout);
    assert_eq!(switch.metrics.dropped_no_route.get(), 1);
}

#[test]
fn test_cache_install_takes_effect_immediately() {
    let switch = SingleSwitch::provisioned();
    assert_eq!(switch.client_get(4), LookupResult::Value(44));

    // Cache now disagrees with the backend: the switch answers first
    switch.control.install_cache_entry(4, 4000);
    assert_eq!(switch.client_get(4), LookupResult::Value(4000));
}

#[test]
fn test_route_to_client_required_for_fallthrough() {
    let switch = SingleSwitch::new();
    switch
        .control
        .install_forwarding_entry(format!("{}/32", H1.ip).parse().unwrap(), H1.mac, H1.port);
    switch.control.install_cache_entry(1, 11);

    // Hits never need a route back
    assert_eq!(switch.client_get(1), LookupResult::Value(11));
    // Backend answer has nowhere to go
    assert_eq!(switch.client_get(4), LookupResult::Timeout);
    assert_eq!(switch.metrics.dropped_no_route.get(), 1);

    switch
        .control
        .install_forwarding_entry("10.0.0.0/24".parse().unwrap(), H2.mac, H2.port);
    assert_eq!(switch.client_get(4), LookupResult::Value(44));
}
