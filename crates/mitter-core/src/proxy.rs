//! Cached accessor over a remotely fetched aggregate.
//!
//! A [`LazyRemote`] wraps a fetch function and a [`CacheState`]. Reads through
//! [`LazyRemote::proxy`] are served from the cache when it is populated and
//! fetch otherwise. Concurrent uncached reads on the same handle share one
//! fetch. [`LazyRemote::sync`] always fetches. A failed fetch never touches the
//! cached value.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{Arc, PoisonError, RwLock},
};

use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::error::MitterError;

type FetchFuture<U> = Pin<Box<dyn Future<Output = Result<U, MitterError>> + Send>>;
type FetchFn<U> = Arc<dyn Fn() -> FetchFuture<U> + Send + Sync>;

/// When the remote value is first fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// On first read.
    #[default]
    Lazy,
    /// In the background at construction, best-effort.
    Eager,
}

/// Cache slot. A cached value is authoritative until the next `sync` or `set_ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheState<U> {
    Uncached,
    Cached(U),
}

struct Shared<U> {
    cache: RwLock<CacheState<U>>,
    fetch: FetchFn<U>,
    // Serialises fetches so concurrent uncached reads coalesce.
    gate: Mutex<()>,
}

impl<U: Clone + Send + Sync + 'static> Shared<U> {
    fn read_with<R, F: FnOnce(&U) -> R>(&self, f: F) -> Result<R, F> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        match &*cache {
            CacheState::Cached(value) => Ok(f(value)),
            CacheState::Uncached => Err(f),
        }
    }

    fn store(&self, value: U) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = CacheState::Cached(value);
    }

    /// Cache `fetched` unless a value was pushed through `set_ref` while the
    /// fetch ran; that value is fresher. Returns whichever value is now cached.
    fn fill_if_uncached(&self, fetched: U) -> U {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        match &*cache {
            CacheState::Cached(pushed) => {
                trace!("keeping value pushed during fetch");
                pushed.clone()
            }
            CacheState::Uncached => {
                *cache = CacheState::Cached(fetched.clone());
                fetched
            }
        }
    }

    async fn fetch(&self) -> Result<U, MitterError> {
        (self.fetch)().await.map_err(MitterError::into_stale_proxy_fetch)
    }

    async fn warm(&self) {
        let _gate = self.gate.lock().await;
        if self.read_with(|_| ()).is_ok() {
            return;
        }
        match self.fetch().await {
            Ok(value) => {
                self.fill_if_uncached(value);
            }
            Err(error) => debug!(%error, "eager warm-up fetch failed"),
        }
    }
}

/// Handle over a remote value of type `U`. Clones share the cache.
pub struct LazyRemote<U> {
    shared: Arc<Shared<U>>,
    mode: FetchMode,
}

impl<U> Clone for LazyRemote<U> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            mode: self.mode,
        }
    }
}

impl<U: fmt::Debug> fmt::Debug for LazyRemote<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cache = self.shared.cache.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("LazyRemote")
            .field("mode", &self.mode)
            .field("cache", &*cache)
            .finish_non_exhaustive()
    }
}

impl<U: Clone + Send + Sync + 'static> LazyRemote<U> {
    /// Bind `fetch` once. In [`FetchMode::Eager`] a warm-up fetch is spawned on
    /// the current tokio runtime without blocking; its failure is only logged.
    pub fn new<F, Fut>(fetch: F, mode: FetchMode) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<U, MitterError>> + Send + 'static,
    {
        let fetch: FetchFn<U> = Arc::new(move || Box::pin(fetch()) as FetchFuture<U>);
        let remote = Self {
            shared: Arc::new(Shared {
                cache: RwLock::new(CacheState::Uncached),
                fetch,
                gate: Mutex::new(()),
            }),
            mode,
        };

        if mode == FetchMode::Eager {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let shared = remote.shared.clone();
                    handle.spawn(async move { shared.warm().await });
                }
                Err(_) => warn!("no tokio runtime available, skipping eager warm-up"),
            }
        }
        remote
    }

    /// Handle pre-populated with a known value.
    pub fn with_value<F, Fut>(value: U, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<U, MitterError>> + Send + 'static,
    {
        let remote = Self::new(fetch, FetchMode::Lazy);
        remote.set_ref(value);
        remote
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Fetch unconditionally and replace the cache with the result.
    pub async fn sync(&self) -> Result<U, MitterError> {
        let _gate = self.shared.gate.lock().await;
        let value = self.shared.fetch().await?;
        self.shared.store(value.clone());
        trace!("remote value re-synced");
        Ok(value)
    }

    /// Overwrite the cache with a value obtained elsewhere.
    pub fn set_ref(&self, value: U) {
        self.shared.store(value);
    }

    /// Read a projection of the value, fetching first if nothing is cached.
    pub async fn proxy<R>(&self, f: impl FnOnce(&U) -> R) -> Result<R, MitterError> {
        let f = match self.shared.read_with(f) {
            Ok(hit) => return Ok(hit),
            Err(f) => f,
        };

        let _gate = self.shared.gate.lock().await;
        // Another reader may have filled the cache while this one waited.
        let f = match self.shared.read_with(f) {
            Ok(hit) => return Ok(hit),
            Err(f) => f,
        };

        let fetched = self.shared.fetch().await?;
        let value = self.shared.fill_if_uncached(fetched);
        Ok(f(&value))
    }

    /// Full value, fetching first if nothing is cached.
    pub async fn get(&self) -> Result<U, MitterError> {
        self.proxy(U::clone).await
    }

    /// Cached value without fetching.
    pub fn cached(&self) -> Option<U> {
        self.shared.read_with(U::clone).ok()
    }

    pub fn is_cached(&self) -> bool {
        self.shared.read_with(|_| ()).is_ok()
    }

    pub fn cache_state(&self) -> CacheState<U> {
        self.shared
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use tokio::time::timeout;

    use super::*;
    use crate::error::MitterErrorCategory;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Profile {
        name: String,
        avatar: String,
    }

    fn profile(name: &str) -> Profile {
        Profile {
            name: name.to_owned(),
            avatar: format!("{name}.png"),
        }
    }

    fn counting(name: &'static str) -> (LazyRemote<Profile>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let remote = LazyRemote::new(
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(profile(name))
                }
            },
            FetchMode::Lazy,
        );
        (remote, calls)
    }

    #[tokio::test]
    async fn lazy_proxy_fetches_once_and_caches_whole_value() {
        let (remote, calls) = counting("alice");
        assert!(!remote.is_cached());

        let name = remote.proxy(|p| p.name.clone()).await.expect("proxy");
        assert_eq!(name, "alice");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let avatar = remote.proxy(|p| p.avatar.clone()).await.expect("proxy");
        assert_eq!(avatar, "alice.png");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(remote.cache_state(), CacheState::Cached(profile("alice")));
    }

    #[tokio::test]
    async fn sync_always_fetches() {
        let (remote, calls) = counting("bob");
        remote.get().await.expect("get");
        remote.sync().await.expect("sync");
        remote.sync().await.expect("sync");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn set_ref_avoids_fetch() {
        let (remote, calls) = counting("carol");
        remote.set_ref(profile("pushed"));

        let name = remote.proxy(|p| p.name.clone()).await.expect("proxy");
        assert_eq!(name, "pushed");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn value_pushed_during_fetch_wins_over_fetched_one() {
        let release = Arc::new(tokio::sync::Notify::new());
        let started = Arc::new(tokio::sync::Notify::new());
        let remote = LazyRemote::new(
            {
                let release = release.clone();
                let started = started.clone();
                move || {
                    let release = release.clone();
                    let started = started.clone();
                    async move {
                        started.notify_one();
                        release.notified().await;
                        Ok(profile("stale"))
                    }
                }
            },
            FetchMode::Lazy,
        );

        let reader = tokio::spawn({
            let remote = remote.clone();
            async move { remote.proxy(|p| p.name.clone()).await }
        });
        timeout(Duration::from_secs(2), started.notified())
            .await
            .expect("fetch should start");

        remote.set_ref(profile("pushed"));
        release.notify_one();

        let name = timeout(Duration::from_secs(2), reader)
            .await
            .expect("reader should finish")
            .expect("task should not panic")
            .expect("proxy");
        assert_eq!(name, "pushed");
        assert_eq!(remote.cached(), Some(profile("pushed")));
    }

    #[tokio::test]
    async fn failed_sync_keeps_previous_value() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let remote = LazyRemote::new(
            move || {
                let attempt = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Ok(profile("first"))
                    } else {
                        Err(MitterError::transport("offline"))
                    }
                }
            },
            FetchMode::Lazy,
        );

        remote.get().await.expect("first fetch");
        let err = remote.sync().await.expect_err("second fetch fails");
        assert_eq!(err.category, MitterErrorCategory::StaleProxyFetch);
        assert_eq!(remote.cached(), Some(profile("first")));
    }

    #[tokio::test]
    async fn failed_proxy_leaves_cache_unset() {
        let remote: LazyRemote<Profile> = LazyRemote::new(
            || async { Err(MitterError::transport("offline")) },
            FetchMode::Lazy,
        );
        let err = remote
            .proxy(|p| p.name.clone())
            .await
            .expect_err("fetch fails");
        assert_eq!(err.category, MitterErrorCategory::StaleProxyFetch);
        assert_eq!(remote.cache_state(), CacheState::Uncached);
    }

    #[tokio::test]
    async fn concurrent_uncached_reads_share_one_fetch() {
        let (remote, calls) = counting("dave");
        let (a, b, c) = tokio::join!(
            remote.proxy(|p| p.name.clone()),
            remote.proxy(|p| p.avatar.clone()),
            remote.get(),
        );
        assert_eq!(a.expect("a"), "dave");
        assert_eq!(b.expect("b"), "dave.png");
        assert_eq!(c.expect("c"), profile("dave"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_tasks_reading_uncached_value_share_one_fetch() {
        let (remote, calls) = counting("hugo");
        let readers = (0..16).map(|_| {
            let remote = remote.clone();
            tokio::spawn(async move { remote.proxy(|p| p.name.clone()).await })
        });

        for joined in futures::future::join_all(readers).await {
            let name = joined.expect("task should not panic").expect("proxy");
            assert_eq!(name, "hugo");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn eager_mode_warms_cache_in_background() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let remote = LazyRemote::new(
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(profile("erin"))
                }
            },
            FetchMode::Eager,
        );

        timeout(Duration::from_secs(2), async {
            while !remote.is_cached() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("warm-up should complete");

        remote.proxy(|p| p.name.clone()).await.expect("proxy");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn eager_failure_is_swallowed() {
        let remote: LazyRemote<Profile> = LazyRemote::new(
            || async { Err(MitterError::transport("offline")) },
            FetchMode::Eager,
        );
        tokio::task::yield_now().await;
        assert!(!remote.is_cached());
        assert_eq!(remote.mode(), FetchMode::Eager);
    }

    #[test]
    fn eager_without_runtime_skips_warm_up() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let remote = LazyRemote::new(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(profile("frank")) }
            },
            FetchMode::Eager,
        );
        assert!(!remote.is_cached());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn with_value_starts_cached() {
        let remote = LazyRemote::with_value(profile("gina"), || async {
            Err(MitterError::transport("unused"))
        });
        assert_eq!(remote.cached(), Some(profile("gina")));
    }
}
