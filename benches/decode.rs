//! Benchmarks for the advertisement hot path: decoding and recording.
//!
//! Every advertisement received during an interval goes through the fleet
//! lookup and, for configured devices, a decode.

use bt_temp_webhook::decode::GOVEE_SERVICE_UUID;
use bt_temp_webhook::{
    Advertisement, DeviceConfig, DeviceRegistry, FleetState, MacAddress, Model, decode, identify,
};
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;

const GOVEE_MAC: MacAddress = MacAddress([0xA4, 0xC1, 0x38, 0x01, 0x02, 0x03]);
const INKBIRD_MAC: MacAddress = MacAddress([0x49, 0x42, 0x08, 0x00, 0x12, 0x34]);
const OTHER_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// -2.3 °C, 88.9 %, battery 100
fn govee() -> Advertisement {
    Advertisement {
        mac: GOVEE_MAC,
        manufacturer_data: vec![0x88, 0xec, 0x00, 0x80, 0x5d, 0x51, 0x64, 0x00],
        service_uuids: vec![GOVEE_SERVICE_UUID],
        rssi: -60,
        name: "GVH5075_0203".to_string(),
    }
}

/// 21.5 °C, 45.0 %, battery 77
fn inkbird() -> Advertisement {
    Advertisement {
        mac: INKBIRD_MAC,
        manufacturer_data: vec![0x66, 0x08, 0x94, 0x11, 0x00, 0x00, 0x00, 0x4d, 0x08],
        rssi: -70,
        name: "sps".to_string(),
        ..Default::default()
    }
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Elements(1));

    let ad = govee();
    group.bench_function("gvh5075", |b| {
        b.iter(|| black_box(decode(Model::Gvh5075, black_box(&ad))))
    });

    let ad = inkbird();
    group.bench_function("ibsth2", |b| {
        b.iter(|| black_box(decode(Model::Ibsth2, black_box(&ad))))
    });

    // Not applicable: the common case for unrelated devices in range
    let ad = Advertisement {
        manufacturer_data: vec![0x4c, 0x00, 0x02, 0x15],
        ..inkbird()
    };
    group.bench_function("ibsth2_rejected", |b| {
        b.iter(|| black_box(decode(Model::Ibsth2, black_box(&ad))))
    });

    group.finish();
}

fn bench_identify(c: &mut Criterion) {
    let mut group = c.benchmark_group("identify");
    group.throughput(Throughput::Elements(1));

    let ad = govee();
    group.bench_function("match", |b| b.iter(|| black_box(identify(black_box(&ad)))));

    let ad = Advertisement {
        mac: OTHER_MAC,
        ..govee()
    };
    group.bench_function("miss", |b| b.iter(|| black_box(identify(black_box(&ad)))));

    group.finish();
}

/// Fleet of 100 configured devices, as a large installation would have
fn bench_fleet_observe(c: &mut Criterion) {
    let mut group = c.benchmark_group("fleet_observe");
    group.throughput(Throughput::Elements(1));

    let devices = (0..99u8)
        .map(|i| DeviceConfig::new(MacAddress([0xA4, 0xC1, 0x38, 0x00, 0x00, i]), Model::Gvh5075))
        .chain([DeviceConfig::new(GOVEE_MAC, Model::Gvh5075)]);
    let fleet = FleetState::new(Arc::new(DeviceRegistry::new(devices)));

    let ad = govee();
    let mut observed = 0u32;
    group.bench_function("configured", |b| {
        b.iter(|| {
            black_box(fleet.observe(black_box(&ad)));
            // Keep the window from growing without bound
            observed += 1;
            if observed % 10_000 == 0 {
                fleet.drain_and_reset();
            }
        })
    });

    let ad = Advertisement {
        mac: OTHER_MAC,
        ..govee()
    };
    group.bench_function("unknown", |b| b.iter(|| black_box(fleet.observe(black_box(&ad)))));

    group.finish();
}

criterion_group!(benches, bench_decode, bench_identify, bench_fleet_observe);
criterion_main!(benches);
