//! Traits at the seams of the cache layer.
//!
//! [`Fetcher`] is the only outward dependency: the networking collaborator
//! implements it, the cache calls it. [`CachePayload`] is the marker every
//! cached value carries so eviction can weigh it.

use crate::error::FetchError;
use crate::{ReportCode, SubScope};
use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;
use std::mem::size_of;

/// Performs the actual remote call for one report context.
///
/// The cache treats it as opaque: it resolves with `T` or fails with a
/// [`FetchError`]. Timeouts, retries and auth belong to the implementation.
#[async_trait]
pub trait Fetcher<T: Send + 'static>: Send + Sync {
    async fn fetch(&self, report: &ReportCode, sub_scope: SubScope) -> Result<T, FetchError>;
}

/// Marker trait for values that can live in a domain table.
///
/// `estimated_size` feeds the per-domain byte budget. The default counts the
/// inline size only; types owning heap data should override it.
pub trait CachePayload: Send + Sync + 'static {
    fn estimated_size(&self) -> usize
    where
        Self: Sized,
    {
        size_of::<Self>()
    }
}

impl CachePayload for String {
    fn estimated_size(&self) -> usize {
        size_of::<String>() + self.capacity()
    }
}

impl<T: CachePayload> CachePayload for Vec<T> {
    fn estimated_size(&self) -> usize {
        size_of::<Vec<T>>()
            + self.iter().map(CachePayload::estimated_size).sum::<usize>()
            + (self.capacity() - self.len()) * size_of::<T>()
    }
}

impl CachePayload for serde_json::Value {
    fn estimated_size(&self) -> usize {
        use serde_json::Value;

        let nested = match self {
            Value::Null | Value::Bool(_) | Value::Number(_) => 0,
            Value::String(s) => s.len(),
            Value::Array(items) => items.iter().map(CachePayload::estimated_size).sum(),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| k.len() + v.estimated_size())
                .sum(),
        };
        size_of::<Value>() + nested
    }
}

/// Adapts an async closure into a [`Fetcher`].
///
/// ```
/// use fightcache_core::{fetcher_fn, FetchError, Fetcher, ReportCode, SubScope};
///
/// let fetcher = fetcher_fn(|report: ReportCode, _scope: SubScope| async move {
///     Ok::<_, FetchError>(report.as_str().len())
/// });
/// # let _ = &fetcher;
/// ```
pub struct FnFetcher<F, T> {
    f: F,
    _payload: PhantomData<fn() -> T>,
}

/// Wrap `f(report, sub_scope)` as a fetcher.
pub fn fetcher_fn<F, Fut, T>(f: F) -> FnFetcher<F, T>
where
    F: Fn(ReportCode, SubScope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, FetchError>> + Send,
    T: Send + 'static,
{
    FnFetcher {
        f,
        _payload: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, T> Fetcher<T> for FnFetcher<F, T>
where
    F: Fn(ReportCode, SubScope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, FetchError>> + Send,
    T: Send + 'static,
{
    async fn fetch(&self, report: &ReportCode, sub_scope: SubScope) -> Result<T, FetchError> {
        (self.f)(report.clone(), sub_scope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FightId;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_fetcher_passes_context() {
        let fetcher = fetcher_fn(|report: ReportCode, scope: SubScope| async move {
            Ok::<_, FetchError>(format!("{}:{}", report, scope))
        });

        let out = fetcher
            .fetch(&ReportCode::new("abc"), SubScope::Fight(FightId::new(4)))
            .await
            .unwrap();
        assert_eq!(out, "abc:fight 4");
    }

    #[tokio::test]
    async fn test_fn_fetcher_propagates_error() {
        let fetcher = fetcher_fn(|_report: ReportCode, _scope: SubScope| async move {
            Err::<String, _>(FetchError::Unauthorized)
        });
        let err = fetcher
            .fetch(&ReportCode::new("abc"), SubScope::All)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Unauthorized);
    }

    #[test]
    fn test_default_size_is_inline_size() {
        struct Marker {
            _count: u64,
            _flag: bool,
        }
        impl CachePayload for Marker {}

        let marker = Marker {
            _count: 3,
            _flag: true,
        };
        assert_eq!(marker.estimated_size(), size_of::<Marker>());
        assert_eq!(
            vec![marker].estimated_size(),
            size_of::<Vec<Marker>>() + size_of::<Marker>()
        );
    }

    #[test]
    fn test_string_size_counts_heap() {
        let s = String::from("0123456789");
        assert!(s.estimated_size() >= size_of::<String>() + 10);
    }

    #[test]
    fn test_json_size_grows_with_content() {
        let small = json!({"type": "damage"});
        let large = json!({"type": "damage", "events": vec![json!({"amount": 12345}); 50]});
        assert!(large.estimated_size() > small.estimated_size());
    }
}
