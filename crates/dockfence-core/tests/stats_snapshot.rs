#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use dockfence_core::model::{StatsSnapshot, UsageSample};

#[test]
fn cpu_percent_scales_by_online_cpus() {
    let sample = UsageSample {
        cpu_total: 300,
        precpu_total: 100,
        system_cpu: 2_000,
        presystem_cpu: 1_000,
        online_cpus: 4,
        memory_usage: 256,
        memory_limit: 1024,
        network_rx_bytes: 10,
        network_tx_bytes: 20,
    };
    let snap = StatsSnapshot::from_sample("abc", &sample);
    assert_eq!(snap.cpu_percent, 80.0);
    assert_eq!(snap.memory_percent, 25.0);
    assert_eq!(snap.network_rx_bytes, 10);
    assert_eq!(snap.network_tx_bytes, 20);
}

#[test]
fn first_sample_without_deltas_is_zero() {
    let sample = UsageSample {
        cpu_total: 500,
        precpu_total: 0,
        system_cpu: 0,
        presystem_cpu: 0,
        online_cpus: 0,
        ..Default::default()
    };
    let snap = StatsSnapshot::from_sample("abc", &sample);
    assert_eq!(snap.cpu_percent, 0.0);
    assert_eq!(snap.memory_percent, 0.0);
}

#[test]
fn percentages_round_to_two_decimals() {
    let sample = UsageSample {
        memory_usage: 1,
        memory_limit: 3,
        ..Default::default()
    };
    let snap = StatsSnapshot::from_sample("abc", &sample);
    assert_eq!(snap.memory_percent, 33.33);
}
