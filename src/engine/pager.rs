//! Collection pager
//!
//! Turns a "fetch one page" call into a lazy stream of collection entries.
//! Pages are requested strictly one after another, each with the marker the
//! previous page handed back. A failing page is yielded as a final `Err` item,
//! so consumers can tell an exhausted collection from a truncated one; entries
//! already yielded stay yielded.

use super::api::{Page, PageMarker, ResourceApi, Summary};
use super::error::ApiError;
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use std::collections::HashSet;
use std::future::Future;

enum Cursor {
    First,
    Next(PageMarker),
    Done,
}

struct State<F> {
    fetch_page: F,
    cursor: Cursor,
    visited: HashSet<PageMarker>,
}

/// Lazily page through a collection using an arbitrary fetch function.
///
/// The stream ends after an empty page, a page without a next marker, or a
/// next marker that was already visited. A fetch error ends it with one `Err`.
pub fn paginate<F, Fut>(fetch_page: F) -> impl Stream<Item = Result<Summary, ApiError>>
where
    F: FnMut(Option<PageMarker>) -> Fut,
    Fut: Future<Output = Result<Page, ApiError>>,
{
    let state = State {
        fetch_page,
        cursor: Cursor::First,
        visited: HashSet::new(),
    };

    stream::unfold(state, |mut state| async move {
        let marker = match state.cursor {
            Cursor::First => None,
            Cursor::Next(marker) => Some(marker),
            Cursor::Done => return None,
        };

        let page = match (state.fetch_page)(marker).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Stopping pagination at {:?}: {}", marker, e);
                state.cursor = Cursor::Done;
                return Some((vec![Err(e)], state));
            },
        };

        if page.entries.is_empty() {
            return None;
        }

        state.cursor = match page.next {
            Some(next) if !state.visited.insert(next) => {
                tracing::warn!("Appliance repeated page marker {:?}, stopping", next);
                Cursor::Done
            },
            Some(next) => Cursor::Next(next),
            None => Cursor::Done,
        };

        tracing::debug!("Fetched {} entries (next: {:?})", page.entries.len(), page.next);
        let items: Vec<_> = page.entries.into_iter().map(Ok).collect();
        Some((items, state))
    })
    .flat_map(stream::iter)
}

/// Lazily page through the collection of one resource kind
pub fn pages<A>(api: &A) -> impl Stream<Item = Result<Summary, ApiError>> + '_
where
    A: ResourceApi + ?Sized,
{
    paginate(move |marker| async move { api.list_page(marker.as_ref()).await })
}

/// Materialize a whole collection, best effort: a failing page keeps what
/// earlier pages returned
pub async fn fetch_all<F, Fut>(fetch_page: F) -> Vec<Summary>
where
    F: FnMut(Option<PageMarker>) -> Fut,
    Fut: Future<Output = Result<Page, ApiError>>,
{
    paginate(fetch_page)
        .filter_map(|entry| future::ready(entry.ok()))
        .collect()
        .await
}
