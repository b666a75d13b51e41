/*
 * Created on Sun Mar 03 2024
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! End-to-end scenarios over the public [`critnib::CritnibIndex`] surface.
//! Each test below is a concrete scenario, not a property sweep: it pins
//! exact expected values the way a regression suite should, rather than
//! reimplementing the index to check against.

use critnib::CritnibIndex;
use rand::Rng;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    thread,
    time::{Duration, Instant},
};

#[test]
fn smoke() {
    let idx = CritnibIndex::new();
    idx.insert(123, 0xAAAA).unwrap();
    assert_eq!(idx.get(123), 0xAAAA);
    assert_eq!(idx.get(124), 0);
}

#[test]
fn dense_range() {
    let idx = CritnibIndex::new();
    for i in 0u64..1000 {
        idx.insert(i, i as usize + 1).unwrap();
    }
    for i in 0u64..1000 {
        assert_eq!(idx.get(i), i as usize + 1);
    }
}

/// bitwise-complement of `key`, steered away from 0 -- which this index
/// reserves to mean "absent" -- since `!u64::MAX` is itself 0.
fn boundary_value(key: u64) -> usize {
    match !key {
        0 => usize::MAX,
        v => v as usize,
    }
}

#[test]
fn boundary_keys() {
    const KEYS: [u64; 7] = [
        0,
        0x7fff_ffff,
        0x8000_0000,
        0xffff_ffff,
        0x7fff_ffff_ffff_ffff,
        0x8000_0000_0000_0000,
        0xffff_ffff_ffff_ffff,
    ];
    let idx = CritnibIndex::new();
    for &k in &KEYS {
        idx.insert(k, boundary_value(k)).unwrap();
    }
    for &k in &KEYS {
        assert_eq!(idx.get(k), boundary_value(k));
    }
    for &k in &KEYS {
        assert_eq!(idx.remove(k), boundary_value(k));
    }
    for &k in &KEYS {
        assert_eq!(idx.get(k), 0);
    }
}

#[test]
fn key_zero_and_scatter() {
    let idx = CritnibIndex::new();
    idx.insert(1, 111).unwrap();
    idx.insert(0, 222).unwrap();
    idx.insert(65536, 333).unwrap();
    assert_eq!(idx.remove(1), 111);
    assert_eq!(idx.remove(0), 222);
    assert_eq!(idx.remove(65536), 333);
    assert_eq!(idx.get(1), 0);
    assert_eq!(idx.get(0), 0);
    assert_eq!(idx.get(65536), 0);
}

/// Values are `key + 1` throughout, never the bare key: key `0` would
/// otherwise map to value `0`, which this index treats as "no entry" and
/// silently refuses to store (`insert`'s no-op-on-null-value rule).
#[test]
fn predecessor() {
    let idx = CritnibIndex::new();
    for k in [1u64, 2, 3, 4, 15, 14, 17, 18, 32, 0] {
        idx.insert(k, k as usize + 1).unwrap();
    }
    assert_eq!(idx.find_le(1), 2); // key 1
    assert_eq!(idx.find_le(2), 3); // key 2
    assert_eq!(idx.find_le(5), 5); // key 4
    assert_eq!(idx.find_le(6), 5); // key 4
    assert_eq!(idx.find_le(17), 18); // key 17
    assert_eq!(idx.find_le(21), 19); // key 18
    assert_eq!(idx.find_le(1 << 28), 33); // key 32
}

#[test]
fn churn_at_scale() {
    let idx = CritnibIndex::new();
    for i in 0u64..(1 << 20) {
        assert_eq!(idx.get(i), 0);
        idx.insert(i, i as usize + 1).unwrap();
        assert_eq!(idx.get(i), i as usize + 1);
        assert_eq!(idx.remove(i), i as usize + 1);
        assert_eq!(idx.get(i), 0);
    }
}

const STRESS_READ_KEYS: usize = 1000;
const STRESS_READERS: usize = 4;
const STRESS_DURATION: Duration = Duration::from_secs(1);

/// One writer continually inserts-then-removes an unrelated key range
/// while several readers spin on a fixed, always-present key set. Modeled
/// on the reference engine's hash-trie `multispam_insert` harness: a
/// `RwLock` gate holds every thread at the start line so the race is on
/// from the first instruction, not staggered by spawn order.
#[test]
fn concurrent_read_write_stress() {
    let _ = env_logger::builder().is_test(true).try_init();
    let idx = Arc::new(CritnibIndex::new());
    let mut rng = rand::thread_rng();
    let mut seen = HashSet::with_capacity(STRESS_READ_KEYS);
    let preload: Vec<(u64, usize)> = (0..STRESS_READ_KEYS)
        .map(|i| {
            let k = loop {
                let k: u64 = rng.gen();
                if k != 0 && seen.insert(k) {
                    break k;
                }
            };
            (k, i + 1)
        })
        .collect();
    for &(k, v) in &preload {
        idx.insert(k, v).unwrap();
    }

    let gate = Arc::new(RwLock::new(()));
    let hold = gate.write();
    let stop = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..STRESS_READERS)
        .map(|tid| {
            let idx = Arc::clone(&idx);
            let gate = Arc::clone(&gate);
            let stop = Arc::clone(&stop);
            let preload = preload.clone();
            thread::Builder::new()
                .name(format!("reader-{tid}"))
                .spawn(move || {
                    let _g = gate.read();
                    while !stop.load(Ordering::Relaxed) {
                        for &(k, v) in &preload {
                            assert_eq!(idx.get(k), v);
                        }
                    }
                })
                .unwrap()
        })
        .collect();

    let writer = {
        let idx = Arc::clone(&idx);
        let gate = Arc::clone(&gate);
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("writer".into())
            .spawn(move || {
                let _g = gate.read();
                let mut rng = rand::thread_rng();
                while !stop.load(Ordering::Relaxed) {
                    // an unrelated key range, well clear of the preloaded one
                    let k = (1u64 << 40) | (rng.gen::<u64>() & ((1 << 16) - 1));
                    idx.insert(k, 1).ok();
                    idx.remove(k);
                }
            })
            .unwrap()
    };

    drop(hold); // release every thread at once
    let deadline = Instant::now() + STRESS_DURATION;
    while Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    stop.store(true, Ordering::Relaxed);

    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }

    for &(k, v) in &preload {
        assert_eq!(idx.get(k), v);
    }
}
