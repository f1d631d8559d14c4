//! Data-fetch loaders for site content.
//!
//! A loader activation returns a [`FetchHandle`] whose state moves once from
//! `loading` to either data or error. Homepage and board-member loaders are
//! backed by the shared [`CacheService`]: a fresh entry is returned
//! immediately without spawning anything, and concurrent misses for the same
//! key share one fetch.
//!
//! Failures never escape a loader. The raw error is logged and the consumer
//! sees a generic message, together with the previous cached value when one
//! exists.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use sahakari_core::model::{
    Announcement, BoardMember, HomepageData, IntroductionSection, NewsItem, StaffMember,
};

use crate::cache::{CacheLookup, CacheService, CacheStatus};
use crate::query;
use crate::source::{ContentError, ContentSource};

/// Cache keys for cache-backed loaders.
pub mod keys {
    pub const HOMEPAGE: &str = "homepage";
    pub const BOARD_MEMBERS: &str = "board_members";
}

/// State of one loader activation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
    /// Whether the data came from the cache. `None` for uncached loaders
    /// and while loading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStatus>,
}

impl<T> FetchState<T> {
    pub fn loading() -> Self {
        Self {
            data: None,
            loading: true,
            error: None,
            cache: None,
        }
    }

    pub fn ready(data: T, cache: Option<CacheStatus>) -> Self {
        Self {
            data: Some(data),
            loading: false,
            error: None,
            cache,
        }
    }

    pub fn failed(message: impl Into<String>, previous: Option<T>) -> Self {
        Self {
            data: previous,
            loading: false,
            error: Some(message.into()),
            cache: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        !self.loading
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchState<U> {
        FetchState {
            data: self.data.map(f),
            loading: self.loading,
            error: self.error,
            cache: self.cache,
        }
    }
}

/// Consumer side of a loader activation.
///
/// Dropping the handle, or calling [`FetchHandle::cancel`], aborts the
/// in-flight query. A cancelled handle keeps the snapshot it had when it was
/// cancelled and never observes a later update.
#[derive(Debug)]
pub struct FetchHandle<T> {
    rx: watch::Receiver<FetchState<T>>,
    task: Option<AbortHandle>,
    cancelled: Option<FetchState<T>>,
}

impl<T> FetchHandle<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A handle that is already settled. No task is spawned.
    fn settled_with(state: FetchState<T>) -> Self {
        let (_tx, rx) = watch::channel(state);
        Self {
            rx,
            task: None,
            cancelled: None,
        }
    }

    /// Start `fetch` in the background; the handle begins in the loading state.
    fn spawn<F>(fetch: F) -> Self
    where
        F: Future<Output = FetchState<T>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(FetchState::loading());
        let task = tokio::spawn(async move {
            let state = fetch.await;
            // The consumer may be gone; that is fine.
            let _ = tx.send(state);
        });
        Self {
            rx,
            task: Some(task.abort_handle()),
            cancelled: None,
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> FetchState<T> {
        match &self.cancelled {
            Some(state) => state.clone(),
            None => self.rx.borrow().clone(),
        }
    }

    /// Wait for the next transition.
    ///
    /// Returns `None` once no further transition can happen.
    pub async fn changed(&mut self) -> Option<FetchState<T>> {
        if self.cancelled.is_some() {
            return None;
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the activation leaves the loading state.
    ///
    /// A cancelled or aborted activation resolves to its last snapshot.
    pub async fn settled(&mut self) -> FetchState<T> {
        loop {
            let current = self.state();
            if current.is_settled() || self.cancelled.is_some() {
                return current;
            }
            if self.rx.changed().await.is_err() {
                return self.state();
            }
        }
    }

    /// Abort the in-flight query, if any, and freeze the current snapshot.
    pub fn cancel(&mut self) {
        if self.cancelled.is_none() {
            self.cancelled = Some(self.rx.borrow().clone());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_some()
    }
}

impl<T> Drop for FetchHandle<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Loaders for every kind of site content.
#[derive(Clone)]
pub struct ContentLoaders {
    source: Arc<dyn ContentSource>,
    cache: Arc<CacheService>,
}

impl std::fmt::Debug for ContentLoaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentLoaders")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ContentLoaders {
    pub fn new(source: Arc<dyn ContentSource>, cache: Arc<CacheService>) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &Arc<CacheService> {
        &self.cache
    }

    /// Settings, introduction and latest news as one cached unit.
    pub fn homepage(&self) -> FetchHandle<HomepageData> {
        self.cached(keys::HOMEPAGE, |source| async move {
            query::fetch_homepage(source.as_ref()).await
        })
    }

    pub fn board_members(&self) -> FetchHandle<Vec<BoardMember>> {
        self.cached(keys::BOARD_MEMBERS, |source| async move {
            query::fetch_board_members(source.as_ref()).await
        })
    }

    pub fn announcements(&self) -> FetchHandle<Vec<Announcement>> {
        self.uncached("announcements", |source| async move {
            query::fetch_announcements(source.as_ref()).await
        })
    }

    pub fn introduction(&self) -> FetchHandle<Option<IntroductionSection>> {
        self.uncached("introduction", |source| async move {
            query::fetch_introduction(source.as_ref()).await
        })
    }

    pub fn staff_members(&self) -> FetchHandle<Vec<StaffMember>> {
        self.uncached("staff_members", |source| async move {
            query::fetch_staff_members(source.as_ref()).await
        })
    }

    /// A single article; `Some(None)` data means no article has that slug.
    pub fn news_article(&self, slug: &str) -> FetchHandle<Option<NewsItem>> {
        let slug = slug.to_string();
        self.uncached("news_article", move |source| async move {
            query::fetch_news_by_slug(source.as_ref(), &slug).await
        })
    }

    fn cached<T, F, Fut>(&self, key: &'static str, fetch: F) -> FetchHandle<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Arc<dyn ContentSource>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ContentError>> + Send + 'static,
    {
        if let CacheLookup::Fresh(entry) = self.cache.lookup::<T>(key) {
            metrics::counter!("content_cache_hits_total", "key" => key).increment(1);
            tracing::debug!(key, cached_at = %entry.cached_at, "serving fresh cache entry");
            return FetchHandle::settled_with(FetchState::ready(
                entry.value,
                Some(CacheStatus::Hit),
            ));
        }

        let source = self.source.clone();
        let cache = self.cache.clone();
        FetchHandle::spawn(async move {
            let started = Instant::now();
            let result = cache
                .get_or_fetch(key, || async move {
                    metrics::counter!("content_cache_misses_total", "key" => key).increment(1);
                    fetch(source).await
                })
                .await;
            observe_duration(key, started);

            match result {
                Ok((data, status)) => FetchState::ready(data, Some(status)),
                Err(err) => {
                    let previous = cache.get::<T>(key).map(|entry| entry.value);
                    tracing::error!(
                        key,
                        error = %err,
                        has_previous = previous.is_some(),
                        "content fetch failed"
                    );
                    metrics::counter!("content_fetch_errors_total", "key" => key).increment(1);
                    FetchState::failed(failure_message(key), previous)
                }
            }
        })
    }

    fn uncached<T, F, Fut>(&self, key: &'static str, fetch: F) -> FetchHandle<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(Arc<dyn ContentSource>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ContentError>> + Send + 'static,
    {
        let source = self.source.clone();
        FetchHandle::spawn(async move {
            let started = Instant::now();
            let result = fetch(source).await;
            observe_duration(key, started);

            match result {
                Ok(data) => FetchState::ready(data, None),
                Err(err) => {
                    tracing::error!(key, error = %err, "content fetch failed");
                    metrics::counter!("content_fetch_errors_total", "key" => key).increment(1);
                    FetchState::failed(failure_message(key), None)
                }
            }
        })
    }
}

fn observe_duration(key: &'static str, started: Instant) {
    metrics::histogram!("content_fetch_duration_seconds", "key" => key)
        .record(started.elapsed().as_secs_f64());
}

/// User-facing message for a failed loader. Never includes upstream detail.
pub fn failure_message(key: &str) -> &'static str {
    match key {
        keys::HOMEPAGE => "Failed to load homepage content",
        keys::BOARD_MEMBERS => "Failed to load board members",
        "announcements" => "Failed to load announcements",
        "introduction" => "Failed to load introduction",
        "staff_members" => "Failed to load staff members",
        "news_article" => "Failed to load news article",
        _ => "Failed to load content",
    }
}
