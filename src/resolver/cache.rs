//! Process-scoped resolution memoization.
//!
//! The cache maps a `(groupId, artifactId)` key to the winning artifact and
//! its raw direct dependencies. It enforces single-flight per key: while one
//! walker task resolves a coordinate, concurrent requesters for the same key
//! await its completion instead of fetching the same POM again. Collisions
//! follow newest-wins: `publish_if_newer` only replaces an entry with a
//! strictly higher version.
//!
//! No lock is held across I/O; the internal mutex only guards slot
//! transitions.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::debug;

use crate::artifact::version::compare_versions;
use crate::artifact::Artifact;

/// キャッシュと競合解決のキー。分類子は含まない。
pub type GaKey = (String, String);

/// 1座標ぶんの解決結果。`dependencies` はスコープフィルタ適用済み・
/// 継承除外の適用前の直接依存。
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub artifact: Artifact,
    pub dependencies: Vec<Artifact>,
}

impl CacheEntry {
    /// 解決不能な座標を記録するエントリ。再試行させない。
    pub fn unresolvable(artifact: Artifact) -> Self {
        Self {
            artifact,
            dependencies: Vec::new(),
        }
    }
}

enum Slot {
    Ready(CacheEntry),
    InFlight(watch::Receiver<bool>),
}

/// 単一飛行を保証する解決キャッシュ。
pub struct ResolutionCache {
    slots: Mutex<HashMap<GaKey, Slot>>,
}

/// `lookup` の結果。`Miss` を受け取ったタスクがそのキーの解決責任を負う。
pub enum CacheLookup {
    Hit(CacheEntry),
    Miss(ResolveTicket),
}

/// The in-flight claim on a cache key. Publishing installs the entry and
/// wakes every waiter; dropping without publishing clears the slot so
/// waiters retry the lookup.
pub struct ResolveTicket {
    key: GaKey,
    cache: Arc<ResolutionCache>,
    tx: watch::Sender<bool>,
    published: bool,
}

impl ResolveTicket {
    pub fn publish(mut self, entry: CacheEntry) {
        self.published = true;
        self.cache.install(&self.key, entry);
        let _ = self.tx.send(true);
    }
}

impl Drop for ResolveTicket {
    fn drop(&mut self) {
        if !self.published {
            self.cache.clear_in_flight(&self.key);
            // Dropping the sender wakes waiters with an error; they re-enter
            // the lookup loop and find the slot vacant.
        }
    }
}

impl ResolutionCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(HashMap::new()),
        })
    }

    /// Reads the key, waiting out any in-flight resolution. Returns `Miss`
    /// with a ticket when this caller should resolve the key itself.
    pub async fn lookup(self: &Arc<Self>, key: &GaKey) -> CacheLookup {
        loop {
            let mut rx = {
                let mut slots = self.slots.lock().expect("resolution cache lock");
                match slots.get(key) {
                    Some(Slot::Ready(entry)) => return CacheLookup::Hit(entry.clone()),
                    Some(Slot::InFlight(rx)) => rx.clone(),
                    None => {
                        let (tx, rx) = watch::channel(false);
                        slots.insert(key.clone(), Slot::InFlight(rx));
                        return CacheLookup::Miss(ResolveTicket {
                            key: key.clone(),
                            cache: Arc::clone(self),
                            tx,
                            published: false,
                        });
                    }
                }
            };

            debug!(group = %key.0, artifact = %key.1, "別タスクの解決完了を待機");
            if rx.changed().await.is_err() {
                // The resolver died without publishing. Clear the stale slot
                // (publish may still have happened between the error and this
                // lock, in which case the slot is Ready and stays).
                let mut slots = self.slots.lock().expect("resolution cache lock");
                if matches!(slots.get(key), Some(Slot::InFlight(_))) {
                    slots.remove(key);
                }
            }
        }
    }

    /// 現在の勝者を覗く（待機しない）。
    pub fn get(&self, key: &GaKey) -> Option<CacheEntry> {
        let slots = self.slots.lock().expect("resolution cache lock");
        match slots.get(key) {
            Some(Slot::Ready(entry)) => Some(entry.clone()),
            _ => None,
        }
    }

    /// Installs the entry unless a strictly newer version is already
    /// published. Used when a walker re-resolves a key it found dominated by
    /// an older cached version.
    pub fn publish_if_newer(&self, entry: CacheEntry) {
        let key = entry.artifact.ga_key();
        let mut slots = self.slots.lock().expect("resolution cache lock");
        match slots.get(&key) {
            Some(Slot::Ready(existing)) => {
                let cmp =
                    compare_versions(entry.artifact.version(), existing.artifact.version());
                if cmp == Ordering::Greater {
                    slots.insert(key, Slot::Ready(entry));
                }
            }
            Some(Slot::InFlight(_)) => {
                // The in-flight owner publishes through its ticket; the final
                // reconciliation pass absorbs any version race.
            }
            None => {
                slots.insert(key, Slot::Ready(entry));
            }
        }
    }

    fn install(&self, key: &GaKey, entry: CacheEntry) {
        let mut slots = self.slots.lock().expect("resolution cache lock");
        match slots.get(key) {
            Some(Slot::Ready(existing)) => {
                let cmp =
                    compare_versions(entry.artifact.version(), existing.artifact.version());
                if cmp == Ordering::Greater {
                    slots.insert(key.clone(), Slot::Ready(entry));
                }
            }
            _ => {
                slots.insert(key.clone(), Slot::Ready(entry));
            }
        }
    }

    fn clear_in_flight(&self, key: &GaKey) {
        let mut slots = self.slots.lock().expect("resolution cache lock");
        if matches!(slots.get(key), Some(Slot::InFlight(_))) {
            slots.remove(key);
        }
    }
}
