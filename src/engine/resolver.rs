//! Identity resolution
//!
//! Finds the one remote object a partial identity refers to. A known id is
//! checked directly. Otherwise the collection is scanned entry by entry, each
//! entry's detail fetched and matched on the secondary key, because list
//! endpoints cannot filter on it.
//!
//! Resolution is read-only. "Not found" is an answer (`Ok(None)`), not an error.
//! A listing that broke off before a match is an error: the object may sit on
//! a page that was never read.

use super::api::{Detail, Summary};
use super::equivalence::Equivalence;
use super::error::ApiError;
use futures::{Stream, StreamExt};
use std::future::Future;

/// What to match a detail's secondary key against
#[derive(Debug, Clone, Copy)]
pub struct KeyMatch<'a> {
    /// Dotted path of the key field in the detail
    pub field: &'a str,
    pub want: &'a str,
    pub equivalence: Equivalence,
}

impl KeyMatch<'_> {
    pub fn matches(&self, detail: &Detail) -> bool {
        detail
            .field_str(self.field)
            .is_some_and(|have| self.equivalence.is_equivalent(self.want, &have))
    }
}

/// Resolve one object by id. Errors other than "not found" are surfaced,
/// since there is no other candidate to fall back on.
pub async fn resolve_by_id<G, Fut>(id: &str, mut get_by_id: G) -> Result<Option<Detail>, ApiError>
where
    G: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Option<Detail>, ApiError>>,
{
    match get_by_id(id.to_string()).await {
        Ok(found) => Ok(found.filter(|d| !d.fields().is_empty())),
        Err(ApiError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Resolve one object out of a collection.
///
/// With a non-empty `want_id` the collection is searched for that id and the
/// match fetched. Without one, every entry's detail is fetched in order until
/// one matches `want_key`; a failing fetch skips that entry. A listing error
/// reached before any match is returned.
pub async fn resolve<S, G, Fut>(
    collection: S,
    want_id: &str,
    want_key: Option<KeyMatch<'_>>,
    mut get_by_id: G,
) -> Result<Option<Detail>, ApiError>
where
    S: Stream<Item = Result<Summary, ApiError>>,
    G: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Option<Detail>, ApiError>>,
{
    let mut collection = std::pin::pin!(collection);

    if !want_id.is_empty() {
        while let Some(entry) = collection.next().await {
            let entry = entry.inspect_err(|e| {
                tracing::warn!("Listing failed before id {} was seen: {}", want_id, e);
            })?;
            if entry.id == want_id {
                return resolve_by_id(want_id, &mut get_by_id).await;
            }
        }
        tracing::debug!("Id {} not present in collection", want_id);
        return Ok(None);
    }

    let Some(key) = want_key.filter(|k| !k.want.is_empty()) else {
        return Ok(None);
    };

    let mut scanned = 0usize;
    while let Some(entry) = collection.next().await {
        let entry = entry.inspect_err(|e| {
            tracing::warn!(
                "Listing failed after {} entries without a match for {}={}: {}",
                scanned,
                key.field,
                key.want,
                e
            );
        })?;
        if entry.id.is_empty() {
            continue;
        }
        scanned += 1;

        match get_by_id(entry.id.clone()).await {
            Ok(Some(detail)) if key.matches(&detail) => {
                tracing::debug!(
                    "Matched {}={} at entry {} (id {})",
                    key.field,
                    key.want,
                    scanned,
                    entry.id
                );
                return Ok(Some(detail));
            },
            Ok(_) => {},
            Err(e) => {
                tracing::warn!("Skipping entry {} during scan: {}", entry.id, e);
            },
        }
    }

    tracing::debug!("No match for {}={} after {} entries", key.field, key.want, scanned);
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn summaries() -> Vec<Summary> {
        (1..=5)
            .map(|i| Summary {
                id: format!("id-{}", i),
                key: None,
                raw: Value::Null,
            })
            .collect()
    }

    fn collection() -> Vec<Result<Summary, ApiError>> {
        summaries().into_iter().map(Ok).collect()
    }

    /// The first `n` entries, then the listing fails
    fn truncated(n: usize) -> Vec<Result<Summary, ApiError>> {
        let mut items: Vec<_> = summaries().into_iter().take(n).map(Ok).collect();
        items.push(Err(ApiError::Status {
            status: 500,
            message: "Internal Server Error".to_string(),
            body: String::new(),
        }));
        items
    }

    fn detail_for(id: &str) -> Detail {
        let n = id.trim_start_matches("id-");
        Detail::from_value(json!({
            "id": id,
            "name": format!("device-{}", n),
            "mac": format!("00:11:22:33:44:0{}", n)
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_known_id_needs_one_detail_call() {
        let calls = AtomicUsize::new(0);
        let found = resolve(stream::iter(collection()), "id-3", None, |id| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(Some(detail_for(&id))) }
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(found.field_str("name").as_deref(), Some("device-3"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let calls = AtomicUsize::new(0);
        let found = resolve(stream::iter(collection()), "id-9", None, |id| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(Some(detail_for(&id))) }
        })
        .await
        .unwrap();

        assert!(found.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_key_scan_stops_at_match() {
        let calls = AtomicUsize::new(0);
        let key = KeyMatch {
            field: "name",
            want: "device-4",
            equivalence: Equivalence::Exact,
        };
        let found = resolve(stream::iter(collection()), "", Some(key), |id| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(Some(detail_for(&id))) }
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(found.field_str("id").as_deref(), Some("id-4"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_key_scan_uses_equivalence() {
        let key = KeyMatch {
            field: "mac",
            want: "00-11-22-33-44-02",
            equivalence: Equivalence::MacAddress,
        };
        let found = resolve(stream::iter(collection()), "", Some(key), |id| async move {
            Ok(Some(detail_for(&id)))
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(found.field_str("id").as_deref(), Some("id-2"));
    }

    #[tokio::test]
    async fn test_scan_skips_failing_entries() {
        let key = KeyMatch {
            field: "name",
            want: "device-3",
            equivalence: Equivalence::Exact,
        };
        let found = resolve(stream::iter(collection()), "", Some(key), |id| async move {
            if id == "id-2" {
                Err(ApiError::Transport("connection reset".to_string()))
            } else {
                Ok(Some(detail_for(&id)))
            }
        })
        .await
        .unwrap();

        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_scan_exhausted_is_not_found() {
        let calls = AtomicUsize::new(0);
        let key = KeyMatch {
            field: "name",
            want: "device-42",
            equivalence: Equivalence::Exact,
        };
        let found = resolve(stream::iter(collection()), "", Some(key), |id| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(Some(detail_for(&id))) }
        })
        .await
        .unwrap();

        assert!(found.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_direct_id_error_is_surfaced() {
        let result = resolve(stream::iter(collection()), "id-1", None, |_| async move {
            Err(ApiError::Status {
                status: 500,
                message: "Internal Server Error".to_string(),
                body: "boom".to_string(),
            })
        })
        .await;

        assert!(matches!(result, Err(ApiError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_direct_id_not_found_is_none() {
        let result = resolve_by_id("gone", |_| async move { Err(ApiError::NotFound) }).await;
        assert!(result.unwrap().is_none());

        let result = resolve_by_id("empty", |_| async move { Ok(Some(Detail::default())) }).await;
        assert!(result.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nothing_wanted_lists_nothing() {
        let found = resolve(stream::iter(collection()), "", None, |_| async move {
            Ok::<_, ApiError>(None)
        })
        .await
        .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_listing_error_without_match_is_surfaced() {
        let key = KeyMatch {
            field: "name",
            want: "device-42",
            equivalence: Equivalence::Exact,
        };
        let result = resolve(stream::iter(truncated(2)), "", Some(key), |id| async move {
            Ok(Some(detail_for(&id)))
        })
        .await;

        assert!(matches!(result, Err(ApiError::Status { status: 500, .. })));

        let result = resolve(stream::iter(truncated(0)), "id-1", None, |id| async move {
            Ok(Some(detail_for(&id)))
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_match_before_listing_error_is_kept() {
        let key = KeyMatch {
            field: "name",
            want: "device-2",
            equivalence: Equivalence::Exact,
        };
        let found = resolve(stream::iter(truncated(3)), "", Some(key), |id| async move {
            Ok(Some(detail_for(&id)))
        })
        .await
        .unwrap();

        assert_eq!(found.unwrap().field_str("id").as_deref(), Some("id-2"));
    }
}
