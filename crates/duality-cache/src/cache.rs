// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-flight deduplicating payload cache.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{CacheStore, FetchError, IdentityKey, ProviderIdentity};

/// Result of a fetch as seen by one observer.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The payload is available.
    Ready(Arc<[u8]>),
    /// The provider failed; nothing was cached.
    Failed(FetchError),
    /// The entry was dropped (clear, invalidate) before or after completing.
    Invalidated,
}

/// Notification sent to a waiter or subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEvent {
    /// Key of the identity the event concerns.
    pub key: IdentityKey,
    /// What happened.
    pub outcome: FetchOutcome,
}

/// Immediate answer of [`DataCache::request`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The payload was already cached; no event will follow.
    Hit(Arc<[u8]>),
    /// A fetch is running (started now or earlier); exactly one event follows.
    Pending,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries with a payload.
    pub ready: usize,
    /// Entries whose fetch is still running.
    pub in_flight: usize,
    /// Bytes held by ready entries.
    pub ready_bytes: usize,
    /// Provider fetches started since creation.
    pub fetches_started: u64,
}

enum Entry {
    InFlight {
        generation: u64,
        waiters: Vec<Sender<CacheEvent>>,
    },
    Ready(Arc<[u8]>),
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<IdentityKey, Entry>,
    subscribers: HashMap<IdentityKey, Vec<Sender<CacheEvent>>>,
    next_generation: u64,
    ready_bytes: usize,
    fetches_started: u64,
}

struct Shared {
    state: Mutex<CacheState>,
    store: Option<Arc<dyn CacheStore>>,
    max_bytes: Option<usize>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Payload cache keyed by [`ProviderIdentity`].
///
/// Cloning yields another handle to the same cache.
///
/// # Invariants
///
/// - At most one provider fetch runs per identity key at any time.
/// - Events are sent only after the internal lock is released.
/// - A completion for an entry that was cleared or invalidated meanwhile is
///   discarded (generation check), never published.
/// - Failed fetches leave no entry behind.
/// - The persistent tier is written and wiped only under the state lock, so
///   a dropped entry is never written back to it.
#[derive(Clone)]
pub struct DataCache {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for DataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCache")
            .field("stats", &self.stats())
            .field("persistent", &self.shared.store.is_some())
            .finish()
    }
}

impl Default for DataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DataCache {
    /// Memory-only cache with no byte budget.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Cache backed by a persistent tier.
    pub fn with_store(store: Arc<dyn CacheStore>) -> Self {
        Self::build(Some(store), None)
    }

    /// Cache with an optional persistent tier and an advisory byte budget.
    ///
    /// The budget never rejects a payload; it is only reported through
    /// [`is_over_budget`](DataCache::is_over_budget).
    pub fn build(store: Option<Arc<dyn CacheStore>>, max_bytes: Option<usize>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CacheState::default()),
                store,
                max_bytes,
            }),
        }
    }

    /// Return the cached payload or start (or join) a fetch for `identity`.
    ///
    /// On a miss `fetch` runs on a worker thread unless a fetch for the same
    /// key is already running, in which case `fetch` is dropped unused and
    /// `notify` joins the running one. Every `Pending` answer is followed by
    /// exactly one event on `notify`, unless the observer is dropped by
    /// [`clear_observers`](DataCache::clear_observers).
    pub fn request<F>(&self, identity: &ProviderIdentity, notify: Sender<CacheEvent>, fetch: F) -> Lookup
    where
        F: FnOnce() -> Result<Vec<u8>, FetchError> + Send + 'static,
    {
        let key = identity.key();
        let generation = {
            let mut state = self.shared.lock();
            match state.entries.get_mut(&key) {
                Some(Entry::Ready(payload)) => return Lookup::Hit(Arc::clone(payload)),
                Some(Entry::InFlight { waiters, .. }) => {
                    waiters.push(notify);
                    debug!(%identity, "joined in-flight fetch");
                    return Lookup::Pending;
                }
                None => {}
            }
            let generation = state.next_generation;
            state.next_generation += 1;
            state.fetches_started += 1;
            state.entries.insert(
                key,
                Entry::InFlight {
                    generation,
                    waiters: vec![notify],
                },
            );
            generation
        };

        debug!(%identity, %key, "starting fetch");
        let shared = Arc::clone(&self.shared);
        let worker_identity = identity.clone();
        let spawned = thread::Builder::new()
            .name("duality-fetch".into())
            .spawn(move || {
                let (result, from_store) = load_or_fetch(&shared, &worker_identity, fetch);
                let persist_as = (!from_store).then_some(&worker_identity);
                complete(&shared, key, generation, result, persist_as);
            });
        if let Err(err) = spawned {
            complete(
                &self.shared,
                key,
                generation,
                Err(FetchError::Remote(format!("could not start fetch worker: {err}"))),
                None,
            );
        }
        Lookup::Pending
    }

    /// Convenience wrapper around [`request`](DataCache::request) with a
    /// private channel.
    pub fn get_or_fetch<F>(&self, identity: &ProviderIdentity, fetch: F) -> FetchHandle
    where
        F: FnOnce() -> Result<Vec<u8>, FetchError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let key = identity.key();
        match self.request(identity, tx, fetch) {
            Lookup::Hit(payload) => FetchHandle {
                key,
                rx,
                ready: Some(FetchOutcome::Ready(payload)),
            },
            Lookup::Pending => FetchHandle {
                key,
                rx,
                ready: None,
            },
        }
    }

    /// Cached payload for `identity`, without fetching.
    pub fn peek(&self, identity: &ProviderIdentity) -> Option<Arc<[u8]>> {
        match self.shared.lock().entries.get(&identity.key()) {
            Some(Entry::Ready(payload)) => Some(Arc::clone(payload)),
            _ => None,
        }
    }

    /// Register interest in `identity`.
    ///
    /// Fires once: immediately if the entry is ready, otherwise when it
    /// completes, fails, or is invalidated.
    pub fn subscribe(&self, identity: &ProviderIdentity, notify: Sender<CacheEvent>) {
        let key = identity.key();
        let ready = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            if let Some(Entry::Ready(payload)) = state.entries.get(&key) {
                Some((notify, Arc::clone(payload)))
            } else {
                state.subscribers.entry(key).or_default().push(notify);
                None
            }
        };
        if let Some((notify, payload)) = ready {
            let _ = notify.send(CacheEvent {
                key,
                outcome: FetchOutcome::Ready(payload),
            });
        }
    }

    /// Drop one entry, notifying its observers with `Invalidated`.
    ///
    /// A running fetch for the entry keeps going but its result is discarded.
    pub fn invalidate(&self, identity: &ProviderIdentity) {
        let key = identity.key();
        let observers = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            let mut observers = Vec::new();
            match state.entries.remove(&key) {
                Some(Entry::InFlight { waiters, .. }) => observers.extend(waiters),
                Some(Entry::Ready(payload)) => {
                    state.ready_bytes = state.ready_bytes.saturating_sub(payload.len());
                }
                None => {}
            }
            observers.extend(state.subscribers.remove(&key).unwrap_or_default());
            if let Some(store) = &self.shared.store {
                if let Err(err) = store.remove(&key) {
                    warn!(%identity, ?err, "failed to drop persisted record");
                }
            }
            observers
        };
        debug!(%identity, observers = observers.len(), "invalidated cache entry");
        notify_all(observers.into_iter().map(|tx| (key, tx)), &FetchOutcome::Invalidated);
    }

    /// Drop every entry and observer, including the persistent tier.
    ///
    /// Every waiter and subscriber receives `Invalidated`; fetches still
    /// running finish but their results are discarded.
    pub fn clear(&self) {
        let observers = {
            let mut guard = self.shared.lock();
            let state = &mut *guard;
            let mut observers = Vec::new();
            for (key, entry) in state.entries.drain() {
                if let Entry::InFlight { waiters, .. } = entry {
                    observers.extend(waiters.into_iter().map(|tx| (key, tx)));
                }
            }
            for (key, subs) in state.subscribers.drain() {
                observers.extend(subs.into_iter().map(|tx| (key, tx)));
            }
            state.ready_bytes = 0;
            if let Some(store) = &self.shared.store {
                if let Err(err) = store.clear() {
                    warn!(?err, "failed to clear persistent cache tier");
                }
            }
            observers
        };
        info!(observers = observers.len(), "cache cleared");
        notify_all(observers, &FetchOutcome::Invalidated);
    }

    /// Drop every subscriber and waiter without touching entries.
    ///
    /// Running fetches still complete and populate the cache; nobody is told.
    pub fn clear_observers(&self) {
        let mut state = self.shared.lock();
        state.subscribers.clear();
        for entry in state.entries.values_mut() {
            if let Entry::InFlight { waiters, .. } = entry {
                waiters.clear();
            }
        }
        debug!("cache observers cleared");
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let state = self.shared.lock();
        let in_flight = state
            .entries
            .values()
            .filter(|entry| matches!(entry, Entry::InFlight { .. }))
            .count();
        CacheStats {
            ready: state.entries.len() - in_flight,
            in_flight,
            ready_bytes: state.ready_bytes,
            fetches_started: state.fetches_started,
        }
    }

    /// Returns `true` if ready bytes exceed the configured budget.
    pub fn is_over_budget(&self) -> bool {
        let bytes = self.shared.lock().ready_bytes;
        self.shared.max_bytes.is_some_and(|max| bytes > max)
    }
}

/// Receiving end of [`DataCache::get_or_fetch`].
#[derive(Debug)]
pub struct FetchHandle {
    key: IdentityKey,
    rx: Receiver<CacheEvent>,
    ready: Option<FetchOutcome>,
}

impl FetchHandle {
    /// Key of the requested identity.
    pub fn key(&self) -> IdentityKey {
        self.key
    }

    /// Non-blocking poll.
    pub fn try_outcome(&mut self) -> Option<FetchOutcome> {
        if let Some(outcome) = self.ready.take() {
            return Some(outcome);
        }
        match self.rx.try_recv() {
            Ok(event) => Some(event.outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(FetchOutcome::Invalidated),
        }
    }

    /// Block until the outcome arrives.
    ///
    /// A handle whose observer was dropped by the cache reports
    /// `Invalidated`.
    pub fn wait(self) -> FetchOutcome {
        if let Some(outcome) = self.ready {
            return outcome;
        }
        self.rx
            .recv()
            .map_or(FetchOutcome::Invalidated, |event| event.outcome)
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<FetchOutcome> {
        if let Some(outcome) = self.ready.take() {
            return Some(outcome);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event.outcome),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(FetchOutcome::Invalidated),
        }
    }
}

fn load_or_fetch<F>(
    shared: &Shared,
    identity: &ProviderIdentity,
    fetch: F,
) -> (Result<Vec<u8>, FetchError>, bool)
where
    F: FnOnce() -> Result<Vec<u8>, FetchError>,
{
    if let Some(store) = &shared.store {
        match store.load(identity) {
            Ok(Some(payload)) => {
                debug!(%identity, "served from persistent tier");
                return (Ok(payload), true);
            }
            Ok(None) => {}
            Err(err) => warn!(%identity, ?err, "persistent record rejected; refetching"),
        }
    }
    (fetch(), false)
}

/// Publish a fetch result, first saving it to the persistent tier as
/// `persist_as` when given.
///
/// Saving happens under the state lock after the generation check, so a
/// `clear` or `invalidate` either wipes the record or discards the result.
/// Returns `false` if the entry was dropped meanwhile.
fn complete(
    shared: &Shared,
    key: IdentityKey,
    generation: u64,
    result: Result<Vec<u8>, FetchError>,
    persist_as: Option<&ProviderIdentity>,
) -> bool {
    let (observers, outcome) = {
        let mut guard = shared.lock();
        let state = &mut *guard;
        let current = matches!(
            state.entries.get(&key),
            Some(Entry::InFlight { generation: g, .. }) if *g == generation
        );
        if !current {
            debug!(%key, generation, "discarding completion for dropped entry");
            return false;
        }
        let mut observers = match state.entries.remove(&key) {
            Some(Entry::InFlight { waiters, .. }) => waiters,
            _ => Vec::new(),
        };
        observers.extend(state.subscribers.remove(&key).unwrap_or_default());
        let outcome = match result {
            Ok(bytes) => {
                if let (Some(store), Some(identity)) = (&shared.store, persist_as) {
                    if let Err(err) = store.save(identity, &bytes) {
                        warn!(%identity, ?err, "failed to persist payload");
                    }
                }
                let payload: Arc<[u8]> = Arc::from(bytes);
                state.ready_bytes += payload.len();
                state.entries.insert(key, Entry::Ready(Arc::clone(&payload)));
                FetchOutcome::Ready(payload)
            }
            Err(err) => {
                warn!(%key, %err, "fetch failed");
                FetchOutcome::Failed(err)
            }
        };
        (observers, outcome)
    };
    notify_all(observers.into_iter().map(|tx| (key, tx)), &outcome);
    true
}

fn notify_all<I>(observers: I, outcome: &FetchOutcome)
where
    I: IntoIterator<Item = (IdentityKey, Sender<CacheEvent>)>,
{
    for (key, tx) in observers {
        // A dropped receiver means the observer lost interest.
        let _ = tx.send(CacheEvent {
            key,
            outcome: outcome.clone(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{MemoryStore, SnapshotValue};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Condvar;

    const WAIT: Duration = Duration::from_secs(5);

    /// Blocks fetch closures until opened.
    #[derive(Clone, Default)]
    struct Gate(Arc<(Mutex<bool>, Condvar)>);

    impl Gate {
        fn wait(&self) {
            let (lock, cvar) = &*self.0;
            let mut open = lock.lock().unwrap();
            while !*open {
                open = cvar.wait(open).unwrap();
            }
        }

        fn open(&self) {
            let (lock, cvar) = &*self.0;
            *lock.lock().unwrap() = true;
            cvar.notify_all();
        }
    }

    fn id(file: &str) -> ProviderIdentity {
        ProviderIdentity::download("scene", file)
    }

    fn expect_ready(outcome: Option<FetchOutcome>) -> Arc<[u8]> {
        match outcome {
            Some(FetchOutcome::Ready(payload)) => payload,
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn miss_then_hit_without_second_fetch() {
        let cache = DataCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let mut handle = cache.get_or_fetch(&id("a"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(b"payload".to_vec())
        });
        let first = expect_ready(handle.wait_timeout(WAIT));

        let (tx, _rx) = mpsc::channel();
        match cache.request(&id("a"), tx, || panic!("hit must not fetch")) {
            Lookup::Hit(payload) => assert!(Arc::ptr_eq(&payload, &first)),
            Lookup::Pending => panic!("expected a hit"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().ready_bytes, 7);
    }

    #[test]
    fn joiners_share_one_fetch() {
        let cache = DataCache::new();
        let gate = Gate::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let gate = gate.clone();
            let counter = Arc::clone(&calls);
            handles.push(cache.get_or_fetch(&id("a"), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                gate.wait();
                Ok(vec![42; 16])
            }));
        }
        assert_eq!(cache.stats().in_flight, 1);
        gate.open();

        let payloads: Vec<_> = handles
            .iter_mut()
            .map(|h| expect_ready(h.wait_timeout(WAIT)))
            .collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(payloads.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.stats().fetches_started, 1);
    }

    #[test]
    fn failure_is_delivered_and_not_cached() {
        let cache = DataCache::new();
        let mut handle =
            cache.get_or_fetch(&id("missing"), || Err(FetchError::NotFound("missing".into())));
        assert_eq!(
            handle.wait_timeout(WAIT),
            Some(FetchOutcome::Failed(FetchError::NotFound("missing".into())))
        );
        assert_eq!(cache.stats(), CacheStats {
            fetches_started: 1,
            ..CacheStats::default()
        });

        let mut retry = cache.get_or_fetch(&id("missing"), || Ok(vec![1]));
        expect_ready(retry.wait_timeout(WAIT));
        assert_eq!(cache.stats().fetches_started, 2);
    }

    #[test]
    fn clear_invalidates_pending_observers_and_discards_late_result() {
        let cache = DataCache::new();
        let gate = Gate::default();
        let worker_gate = gate.clone();
        let mut handle = cache.get_or_fetch(&id("slow"), move || {
            worker_gate.wait();
            Ok(b"stale".to_vec())
        });
        let (sub_tx, sub_rx) = mpsc::channel();
        cache.subscribe(&id("slow"), sub_tx);

        cache.clear();
        assert_eq!(handle.wait_timeout(WAIT), Some(FetchOutcome::Invalidated));
        assert_eq!(sub_rx.recv_timeout(WAIT).unwrap().outcome, FetchOutcome::Invalidated);

        gate.open();
        // Give the worker a chance to complete; its result must be dropped.
        let (probe_tx, probe_rx) = mpsc::channel();
        let probe = cache.request(&id("slow"), probe_tx, || Ok(b"fresh".to_vec()));
        assert_eq!(probe, Lookup::Pending);
        let event = probe_rx.recv_timeout(WAIT).unwrap();
        match event.outcome {
            FetchOutcome::Ready(payload) => assert_eq!(&*payload, b"fresh"),
            other => panic!("expected fresh payload, got {other:?}"),
        }
        assert!(sub_rx.try_recv().is_err());
    }

    #[test]
    fn invalidate_drops_single_entry() {
        let cache = DataCache::new();
        expect_ready(cache.get_or_fetch(&id("a"), || Ok(vec![1])).wait_timeout(WAIT));
        expect_ready(cache.get_or_fetch(&id("b"), || Ok(vec![2, 2])).wait_timeout(WAIT));

        cache.invalidate(&id("a"));
        assert!(cache.peek(&id("a")).is_none());
        assert!(cache.peek(&id("b")).is_some());
        assert_eq!(cache.stats().ready_bytes, 2);
    }

    #[test]
    fn subscribe_on_ready_entry_fires_immediately() {
        let cache = DataCache::new();
        expect_ready(cache.get_or_fetch(&id("a"), || Ok(vec![7])).wait_timeout(WAIT));
        let (tx, rx) = mpsc::channel();
        cache.subscribe(&id("a"), tx);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.key, id("a").key());
        assert_eq!(event.outcome, FetchOutcome::Ready(Arc::from(vec![7u8])));
    }

    #[test]
    fn clear_observers_keeps_entries() {
        let cache = DataCache::new();
        let gate = Gate::default();
        let worker_gate = gate.clone();
        let (tx, rx) = mpsc::channel();
        let lookup = cache.request(&id("a"), tx, move || {
            worker_gate.wait();
            Ok(vec![3])
        });
        assert_eq!(lookup, Lookup::Pending);
        cache.clear_observers();
        gate.open();

        // The sender was dropped by the cache: the channel disconnects.
        assert!(rx.recv_timeout(WAIT).is_err());
        let deadline = std::time::Instant::now() + WAIT;
        while cache.peek(&id("a")).is_none() && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(cache.peek(&id("a")).is_some());
    }

    #[test]
    fn persistent_tier_short_circuits_fetch() {
        let store = Arc::new(MemoryStore::new());
        let identity = ProviderIdentity::parametrized(
            "scene",
            "gen.py",
            vec![("iso".into(), SnapshotValue::Float(0.5))],
        );
        store.save(&identity, b"from disk").unwrap();

        let cache = DataCache::with_store(store);
        let payload = expect_ready(
            cache
                .get_or_fetch(&identity, || panic!("store hit must not fetch"))
                .wait_timeout(WAIT),
        );
        assert_eq!(&*payload, b"from disk");
    }

    #[test]
    fn fetched_payload_is_persisted() {
        let store = Arc::new(MemoryStore::new());
        let cache = DataCache::with_store(Arc::clone(&store) as Arc<dyn CacheStore>);
        expect_ready(cache.get_or_fetch(&id("a"), || Ok(vec![5; 3])).wait_timeout(WAIT));

        // Saved before publication.
        assert_eq!(store.load(&id("a")).unwrap().unwrap(), vec![5; 3]);

        cache.clear();
        assert!(store.is_empty());
    }

    /// Memory store whose `save` announces itself and then blocks on a gate.
    struct GatedStore {
        inner: MemoryStore,
        gate: Gate,
        entered: Mutex<Sender<()>>,
    }

    impl CacheStore for GatedStore {
        fn load(&self, identity: &ProviderIdentity) -> Result<Option<Vec<u8>>, crate::StoreError> {
            self.inner.load(identity)
        }

        fn save(&self, identity: &ProviderIdentity, payload: &[u8]) -> Result<(), crate::StoreError> {
            let _ = self.entered.lock().unwrap().send(());
            self.gate.wait();
            self.inner.save(identity, payload)
        }

        fn remove(&self, key: &IdentityKey) -> Result<(), crate::StoreError> {
            self.inner.remove(key)
        }

        fn clear(&self) -> Result<(), crate::StoreError> {
            self.inner.clear()
        }
    }

    #[test]
    fn clear_during_save_leaves_no_record_behind() {
        let gate = Gate::default();
        let (entered_tx, entered_rx) = mpsc::channel();
        let store = Arc::new(GatedStore {
            inner: MemoryStore::new(),
            gate: gate.clone(),
            entered: Mutex::new(entered_tx),
        });
        let cache = DataCache::with_store(Arc::clone(&store) as Arc<dyn CacheStore>);

        let mut handle = cache.get_or_fetch(&id("a"), || Ok(b"old".to_vec()));
        entered_rx.recv_timeout(WAIT).unwrap();
        // Not published while the save is still running.
        assert_eq!(handle.try_outcome(), None);

        let clearing = {
            let cache = cache.clone();
            thread::spawn(move || cache.clear())
        };
        thread::sleep(Duration::from_millis(20));
        gate.open();
        clearing.join().unwrap();

        assert!(matches!(
            handle.wait_timeout(WAIT),
            Some(FetchOutcome::Ready(_) | FetchOutcome::Invalidated)
        ));
        assert!(store.inner.is_empty());
        assert!(cache.peek(&id("a")).is_none());

        let fresh = expect_ready(cache.get_or_fetch(&id("a"), || Ok(b"new".to_vec())).wait_timeout(WAIT));
        assert_eq!(&*fresh, b"new");
    }

    #[test]
    fn invalidate_removes_the_saved_record() {
        let store = Arc::new(MemoryStore::new());
        let cache = DataCache::with_store(Arc::clone(&store) as Arc<dyn CacheStore>);
        expect_ready(cache.get_or_fetch(&id("a"), || Ok(vec![1])).wait_timeout(WAIT));
        assert!(!store.is_empty());

        cache.invalidate(&id("a"));
        assert!(store.is_empty());
        let fresh = expect_ready(cache.get_or_fetch(&id("a"), || Ok(vec![2])).wait_timeout(WAIT));
        assert_eq!(&*fresh, &[2]);
    }

    #[test]
    fn budget_is_advisory() {
        let cache = DataCache::build(None, Some(4));
        expect_ready(cache.get_or_fetch(&id("a"), || Ok(vec![0; 3])).wait_timeout(WAIT));
        assert!(!cache.is_over_budget());
        expect_ready(cache.get_or_fetch(&id("b"), || Ok(vec![0; 3])).wait_timeout(WAIT));
        assert!(cache.is_over_budget());
        assert_eq!(cache.stats().ready, 2);
    }
}
