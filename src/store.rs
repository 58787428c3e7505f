//! Thread-safe override stores keyed by best-match lookup.
//!
//! An [`OverrideStore`] holds `(descriptor, value)` entries and answers
//! "which value applies to this concrete assembly?" by scoring every stored
//! [`AssemblyDescriptor`] against the identity and returning the value of the
//! highest scorer. Two instantiations exist:
//!
//! - [`DebugModeStore`]: `bool` flag controlling diagnostic detail
//! - [`FacilityOverrideStore`]: [`FacilityId`] replacing an assembly's facility
//!
//! # Design Principles
//!
//! - **Read-heavy**: lookups run on error paths, often concurrently
//! - **RwLock-based**: concurrent readers, exclusive writers
//! - **Insertion order matters**: equal scores resolve to the earliest entry
//! - **Upsert by equality**: a duplicate descriptor replaces the value in place
//! - **Notifications outside the lock**: observers run after the write lock
//!   is released
//!
//! # Example
//!
//! ```rust
//! use facility_overrides::{AssemblyDescriptor, AssemblyIdentity, FacilityId,
//!     FacilityOverrideStore, Version};
//!
//! let store = FacilityOverrideStore::new();
//! store.add(AssemblyDescriptor::named("Acme.Widgets"), FacilityId::new(42)).unwrap();
//! store.add(AssemblyDescriptor::any(), FacilityId::new(1)).unwrap();
//!
//! let widgets = AssemblyIdentity::new("Acme.Widgets", Version::new(3, 0, 0, 0));
//! let other = AssemblyIdentity::new("Other.Lib", Version::new(1, 0, 0, 0));
//!
//! assert_eq!(store.try_get_best_match(&widgets).unwrap(), Some(FacilityId::new(42)));
//! assert_eq!(store.try_get_best_match(&other).unwrap(), Some(FacilityId::new(1)));
//! ```
//!
//! # Observers
//!
//! Callbacks registered with [`OverrideStore::subscribe`] are invoked
//! synchronously on the mutating thread once the mutation is complete. No
//! store lock is held at that point, but a subscriber that mutates the same
//! store from inside its callback will trigger another notification; such
//! subscribers must guard against unbounded recursion themselves.

use crate::codes::FacilityId;
use crate::error::{OverrideError, Result};
use crate::identity::{AssemblyDescriptor, AssemblyIdentity, MAX_SCORE, MatchOutcome};
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Store of per-assembly debug-mode flags.
pub type DebugModeStore = OverrideStore<bool>;

/// Store of per-assembly facility id overrides.
pub type FacilityOverrideStore = OverrideStore<FacilityId>;

// ============================================================================
// Entries
// ============================================================================

/// One `(descriptor, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideEntry<V> {
    pub descriptor: AssemblyDescriptor,
    pub value: V,
}

impl<V> OverrideEntry<V> {
    #[inline]
    pub fn new(descriptor: AssemblyDescriptor, value: V) -> Self {
        Self { descriptor, value }
    }
}

// ============================================================================
// Observers
// ============================================================================

/// Handle returned by [`OverrideStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Notifier {
    observers: SmallVec<[(SubscriptionId, Callback); 4]>,
    batch_depth: usize,
    pending: bool,
}

// ============================================================================
// Store
// ============================================================================

/// Mutable collection of override entries with best-match lookup.
///
/// All operations fail with [`OverrideError::Disposed`] once
/// [`dispose`](Self::dispose) has been called.
pub struct OverrideStore<V> {
    entries: RwLock<Vec<OverrideEntry<V>>>,
    notifier: Mutex<Notifier>,
    next_subscription: AtomicU64,
    disposed: AtomicBool,
}

impl<V> OverrideStore<V> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            notifier: Mutex::new(Notifier::default()),
            next_subscription: AtomicU64::new(1),
            disposed: AtomicBool::new(false),
        }
    }

    #[inline]
    fn read_entries(&self) -> Result<RwLockReadGuard<'_, Vec<OverrideEntry<V>>>> {
        let guard = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Checked under the lock so a racing dispose is either fully visible or not at all.
        self.ensure_live()?;
        Ok(guard)
    }

    #[inline]
    fn write_entries(&self) -> Result<RwLockWriteGuard<'_, Vec<OverrideEntry<V>>>> {
        let guard = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.ensure_live()?;
        Ok(guard)
    }

    #[inline]
    fn lock_notifier(&self) -> MutexGuard<'_, Notifier> {
        match self.notifier.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[inline]
    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(OverrideError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Insert or replace one entry.
    ///
    /// If an entry with an equal descriptor exists its value is replaced in
    /// place, keeping its position for tie-breaking. Otherwise the entry is
    /// appended.
    pub fn add(&self, descriptor: AssemblyDescriptor, value: V) -> Result<()> {
        {
            let mut entries = self.write_entries()?;
            upsert(&mut entries, OverrideEntry::new(descriptor, value));
        }
        self.notify();
        Ok(())
    }

    /// Insert or replace one entry.
    #[inline]
    pub fn add_entry(&self, entry: OverrideEntry<V>) -> Result<()> {
        self.add(entry.descriptor, entry.value)
    }

    /// Upsert many entries under a single write lock, then notify once.
    ///
    /// Returns the number of entries processed. An empty input does not
    /// notify.
    pub fn add_range<I>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = OverrideEntry<V>>,
    {
        let applied = {
            let mut current = self.write_entries()?;
            let mut applied = 0usize;
            for entry in entries {
                upsert(&mut current, entry);
                applied += 1;
            }
            applied
        };

        if applied > 0 {
            tracing::debug!(applied, "override batch applied");
            self.notify();
        }
        Ok(applied)
    }

    /// Remove the entry whose descriptor equals `descriptor`.
    ///
    /// Returns `false` (and does not notify) if there was none.
    pub fn remove(&self, descriptor: &AssemblyDescriptor) -> Result<bool> {
        let removed = {
            let mut entries = self.write_entries()?;
            match entries.iter().position(|e| e.descriptor == *descriptor) {
                Some(index) => {
                    entries.remove(index);
                    true
                }
                None => false,
            }
        };

        if removed {
            tracing::trace!(%descriptor, "override removed");
            self.notify();
        }
        Ok(removed)
    }

    /// Remove every entry. Always notifies, even when already empty.
    pub fn clear(&self) -> Result<()> {
        {
            let mut entries = self.write_entries()?;
            entries.clear();
        }
        tracing::debug!("override store cleared");
        self.notify();
        Ok(())
    }

    /// Number of entries.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read_entries()?.is_empty())
    }

    /// Snapshot of all entries in insertion order.
    pub fn entries(&self) -> Result<Vec<OverrideEntry<V>>>
    where
        V: Clone,
    {
        Ok(self.read_entries()?.clone())
    }

    /// Value of the best-matching entry, if any entry matches.
    ///
    /// The entry with the strictly highest non-negative score wins; ties
    /// keep the first-inserted entry. A wildcard entry (score 0) is a valid
    /// fallback result.
    pub fn try_get_best_match(&self, identity: &AssemblyIdentity) -> Result<Option<V>>
    where
        V: Clone,
    {
        let entries = self.read_entries()?;
        let mut best: Option<(u8, &OverrideEntry<V>)> = None;

        for entry in entries.iter() {
            let MatchOutcome::Matched(score) = entry.descriptor.evaluate(identity) else {
                continue;
            };
            if best.is_none_or(|(top, _)| score > top) {
                best = Some((score, entry));
                if score == MAX_SCORE {
                    break;
                }
            }
        }

        Ok(best.map(|(_, entry)| entry.value.clone()))
    }

    // ------------------------------------------------------------------------
    // Change notification
    // ------------------------------------------------------------------------

    /// Register a change callback.
    pub fn subscribe<F>(&self, callback: F) -> Result<SubscriptionId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.ensure_live()?;
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.lock_notifier().observers.push((id, Arc::new(callback)));
        Ok(id)
    }

    /// Unregister a change callback. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        self.ensure_live()?;
        let mut notifier = self.lock_notifier();
        match notifier.observers.iter().position(|(sub, _)| *sub == id) {
            Some(index) => {
                notifier.observers.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Suppress notifications until the matching [`end_batch`](Self::end_batch).
    ///
    /// Batches nest; only the outermost `end_batch` can deliver.
    pub fn begin_batch(&self) -> Result<()> {
        self.ensure_live()?;
        self.lock_notifier().batch_depth += 1;
        Ok(())
    }

    /// End a batch, delivering one notification if anything changed during it.
    pub fn end_batch(&self) -> Result<()> {
        self.ensure_live()?;
        let flush = {
            let mut notifier = self.lock_notifier();
            if notifier.batch_depth == 0 {
                return Err(OverrideError::NoActiveBatch);
            }
            notifier.batch_depth -= 1;
            if notifier.batch_depth == 0 && notifier.pending {
                notifier.pending = false;
                Some(snapshot_callbacks(&notifier))
            } else {
                None
            }
        };

        if let Some(callbacks) = flush {
            tracing::debug!("delivering coalesced override notification");
            invoke(&callbacks);
        }
        Ok(())
    }

    /// Scoped batch: notifications are coalesced until the guard drops.
    pub fn batch(&self) -> Result<BatchGuard<'_, V>> {
        self.begin_batch()?;
        Ok(BatchGuard { store: self })
    }

    fn notify(&self) {
        let callbacks = {
            let mut notifier = self.lock_notifier();
            if notifier.batch_depth > 0 {
                notifier.pending = true;
                return;
            }
            snapshot_callbacks(&notifier)
        };
        invoke(&callbacks);
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Dispose the store: entries and observers are dropped and every later
    /// operation fails with [`OverrideError::Disposed`].
    ///
    /// Idempotent. Serialized through the write lock, so a concurrent reader
    /// sees either its full result or `Disposed`.
    pub fn dispose(&self) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        entries.clear();
        entries.shrink_to_fit();
        drop(entries);

        let mut notifier = self.lock_notifier();
        notifier.observers.clear();
        notifier.batch_depth = 0;
        notifier.pending = false;
        tracing::debug!("override store disposed");
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl<V> Default for OverrideStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for OverrideStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = match self.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        f.debug_struct("OverrideStore")
            .field("entries", &len)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Guard returned by [`OverrideStore::batch`]; ends the batch on drop.
#[must_use = "the batch ends as soon as the guard is dropped"]
pub struct BatchGuard<'a, V> {
    store: &'a OverrideStore<V>,
}

impl<V> Drop for BatchGuard<'_, V> {
    fn drop(&mut self) {
        // Only fails if the store was disposed mid-batch; nothing left to flush then.
        let _ = self.store.end_batch();
    }
}

fn upsert<V>(entries: &mut Vec<OverrideEntry<V>>, entry: OverrideEntry<V>) {
    match entries.iter_mut().find(|e| e.descriptor == entry.descriptor) {
        Some(existing) => {
            tracing::trace!(descriptor = %existing.descriptor, "override replaced");
            existing.value = entry.value;
        }
        None => {
            tracing::trace!(descriptor = %entry.descriptor, "override added");
            entries.push(entry);
        }
    }
}

#[inline]
fn snapshot_callbacks(notifier: &Notifier) -> SmallVec<[Callback; 4]> {
    notifier.observers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
}

#[inline]
fn invoke(callbacks: &[Callback]) {
    for callback in callbacks {
        callback();
    }
}

// ============================================================================
// Typed Stores & Global Instances
// ============================================================================

impl OverrideStore<bool> {
    /// Process-wide debug-mode store.
    ///
    /// Created on first access and never disposed automatically. Code that
    /// needs isolation (tests, embedded hosts) should own a store instead.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<DebugModeStore> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Whether debug mode applies to `identity`; `false` when nothing matches.
    pub fn is_debug_enabled(&self, identity: &AssemblyIdentity) -> Result<bool> {
        Ok(self.try_get_best_match(identity)?.unwrap_or(false))
    }
}

impl OverrideStore<FacilityId> {
    /// Process-wide facility override store.
    ///
    /// Created on first access and never disposed automatically.
    pub fn global() -> &'static Self {
        static GLOBAL: OnceLock<FacilityOverrideStore> = OnceLock::new();
        GLOBAL.get_or_init(Self::new)
    }

    /// Facility for `identity`, or `default` when no entry matches.
    pub fn resolve_facility(
        &self,
        identity: &AssemblyIdentity,
        default: FacilityId,
    ) -> Result<FacilityId> {
        Ok(self.try_get_best_match(identity)?.unwrap_or(default))
    }
}
