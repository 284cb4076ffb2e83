// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::panic)]
//! Concurrency and key-stability tests for the payload cache.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use std::time::Duration;

use duality_cache::{
    CacheStore, DataCache, FetchError, FetchOutcome, FsStore, Lookup, ProviderIdentity, SnapshotValue,
};
use proptest::prelude::*;

const WAIT: Duration = Duration::from_secs(10);

#[test]
fn racing_requesters_trigger_one_fetch() {
    const THREADS: usize = 16;
    let cache = DataCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));
    let identity = ProviderIdentity::download("scene", "mesh.g3d");

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            let identity = identity.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut handle = cache.get_or_fetch(&identity, move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Ok(vec![9; 64])
                });
                handle.wait_timeout(WAIT)
            })
        })
        .collect();

    let payloads: Vec<Arc<[u8]>> = workers
        .into_iter()
        .map(|w| match w.join().unwrap() {
            Some(FetchOutcome::Ready(payload)) => payload,
            other => panic!("expected payload, got {other:?}"),
        })
        .collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(payloads.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(cache.stats().fetches_started, 1);
}

#[test]
fn distinct_snapshots_fetch_independently() {
    let cache = DataCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();

    for iso in [0.25_f32, 0.5, 0.75] {
        let identity = ProviderIdentity::parametrized(
            "scene",
            "gen.py",
            vec![("iso".into(), SnapshotValue::Float(iso))],
        );
        let calls = Arc::clone(&calls);
        let lookup = cache.request(&identity, tx.clone(), move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(iso.to_le_bytes().to_vec())
        });
        assert_eq!(lookup, Lookup::Pending);
    }

    for _ in 0..3 {
        let event = rx.recv_timeout(WAIT).unwrap();
        assert!(matches!(event.outcome, FetchOutcome::Ready(_)));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(cache.stats().ready, 3);
}

#[test]
fn failure_reaches_every_waiter() {
    let cache = DataCache::new();
    let identity = ProviderIdentity::download("scene", "gone.g3d");
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let first = cache.get_or_fetch(&identity, move || {
        let _ = release_rx.recv_timeout(WAIT);
        Err(FetchError::Remote("socket closed".into()))
    });
    let second = cache.get_or_fetch(&identity, || Ok(vec![1]));
    release_tx.send(()).unwrap();

    let expected = FetchOutcome::Failed(FetchError::Remote("socket closed".into()));
    assert_eq!(first.wait(), expected);
    assert_eq!(second.wait(), expected);
    assert!(cache.peek(&identity).is_none());
}

#[test]
fn filesystem_tier_serves_a_fresh_cache() {
    let dir = tempfile::tempdir().unwrap();
    let identity = ProviderIdentity::download("scene", "volume.i3m");

    let first = DataCache::with_store(Arc::new(FsStore::new(dir.path()).unwrap()));
    match first.get_or_fetch(&identity, || Ok(b"voxels".to_vec())).wait() {
        FetchOutcome::Ready(payload) => assert_eq!(&*payload, b"voxels"),
        other => panic!("expected payload, got {other:?}"),
    }

    // Persisting runs on the worker right after publication.
    let store = FsStore::new(dir.path()).unwrap();
    let deadline = std::time::Instant::now() + WAIT;
    while !matches!(store.load(&identity), Ok(Some(_))) && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }

    let second = DataCache::with_store(Arc::new(store));
    match second
        .get_or_fetch(&identity, || panic!("persisted payload must not be refetched"))
        .wait()
    {
        FetchOutcome::Ready(payload) => assert_eq!(&*payload, b"voxels"),
        other => panic!("expected payload, got {other:?}"),
    }
}

proptest! {
    #[test]
    fn key_is_a_function_of_the_identity(
        scene in "[a-z]{1,8}",
        file in "[a-z]{1,8}\\.py",
        values in prop::collection::vec(-1000.0f32..1000.0, 0..6),
    ) {
        let snapshot: Vec<_> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("v{i}"), SnapshotValue::Float(*v)))
            .collect();
        let a = ProviderIdentity::parametrized(scene.clone(), file.clone(), snapshot.clone());
        let b = ProviderIdentity::parametrized(scene, file, snapshot);
        prop_assert_eq!(a.key(), b.key());
        prop_assert_eq!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn editing_one_value_changes_the_key(
        values in prop::collection::vec(-1000.0f32..1000.0, 1..6),
        index in any::<prop::sample::Index>(),
        delta in 0.5f32..10.0,
    ) {
        let snapshot = |vals: &[f32]| -> Vec<(String, SnapshotValue)> {
            vals.iter()
                .enumerate()
                .map(|(i, v)| (format!("v{i}"), SnapshotValue::Float(*v)))
                .collect()
        };
        let mut edited = values.clone();
        let at = index.index(edited.len());
        edited[at] += delta;
        let a = ProviderIdentity::parametrized("s", "f.py", snapshot(&values));
        let b = ProviderIdentity::parametrized("s", "f.py", snapshot(&edited));
        prop_assert_ne!(a.key(), b.key());
    }
}
