//! Multi-account, multi-region state management.
//!
//! Provides [`AccountRegionStore`], a thread-safe store that partitions service
//! state by AWS account ID and region. Each partition is created lazily on first
//! access and lives for the rest of the process.

use std::sync::Arc;

use dashmap::DashMap;

use crate::types::{AccountId, AwsRegion};

/// Thread-safe, multi-account, multi-region state store.
///
/// Each (account, region) pair gets its own isolated state instance of type `T`.
///
/// # Examples
///
/// ```
/// use rustack_core::{AccountRegionStore, AccountId, AwsRegion};
///
/// #[derive(Debug, Default)]
/// struct MyServiceState {
///     counter: std::sync::atomic::AtomicU64,
/// }
///
/// let store = AccountRegionStore::<MyServiceState>::new();
/// let state = store.get_or_create(&AccountId::default(), &AwsRegion::default());
/// state.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
/// ```
#[derive(Debug)]
pub struct AccountRegionStore<T: Default + Send + Sync> {
    inner: DashMap<(AccountId, AwsRegion), Arc<T>>,
}

impl<T: Default + Send + Sync> AccountRegionStore<T> {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Get or create the state for the given account and region.
    ///
    /// Creation is atomic: concurrent first accesses observe the same instance.
    #[must_use]
    pub fn get_or_create(&self, account: &AccountId, region: &AwsRegion) -> Arc<T> {
        Arc::clone(
            self.inner
                .entry((account.clone(), region.clone()))
                .or_insert_with(|| Arc::new(T::default()))
                .value(),
        )
    }

    /// Get the state for the given account and region without creating it.
    #[must_use]
    pub fn get(&self, account: &AccountId, region: &AwsRegion) -> Option<Arc<T>> {
        self.inner
            .get(&(account.clone(), region.clone()))
            .map(|v| Arc::clone(v.value()))
    }

    /// Drop all state in the store.
    pub fn reset(&self) {
        self.inner.clear();
    }

    /// Number of (account, region) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<T: Default + Send + Sync> Default for AccountRegionStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
