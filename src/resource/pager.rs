//! Page-token pagination
//!
//! Both backends list resources a page at a time and hand back an opaque
//! token for the next page. [`paginate`] turns a page-fetching closure into a
//! lazy [`SnapshotStream`]: the next page is only requested once the previous
//! one has been consumed, and the first failed page ends the stream.

use super::{Snapshot, SnapshotStream};
use crate::error::BackendError;
use futures::{StreamExt, TryStreamExt};
use std::future::Future;

/// One fetched page and the token of the page after it
pub struct Page {
    pub items: Vec<Snapshot>,
    pub next_token: Option<String>,
}

impl Page {
    pub fn new(items: Vec<Snapshot>, next_token: Option<String>) -> Self {
        // Some APIs send "" on the last page
        let next_token = next_token.filter(|t| !t.is_empty());
        Self { items, next_token }
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Stream every item of every page returned by `fetch`
pub fn paginate<'a, F, Fut>(mut fetch: F) -> SnapshotStream<'a>
where
    F: FnMut(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page, BackendError>> + Send + 'a,
{
    let pages = futures::stream::try_unfold(Cursor::Start, move |cursor| {
        let token = match cursor {
            Cursor::Start => Some(None),
            Cursor::Next(token) => Some(Some(token)),
            Cursor::Done => None,
        };
        let request = token.map(&mut fetch);

        async move {
            let Some(request) = request else {
                return Ok(None);
            };
            let page = request.await?;
            tracing::debug!(
                "fetched page of {} items, more: {}",
                page.items.len(),
                page.next_token.is_some()
            );
            let next = match page.next_token {
                Some(token) => Cursor::Next(token),
                None => Cursor::Done,
            };
            let items = futures::stream::iter(page.items.into_iter().map(Ok));
            Ok::<_, BackendError>(Some((items, next)))
        }
    });

    pages.try_flatten().boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn snap(id: &str) -> Snapshot {
        Snapshot::new(id, Map::new())
    }

    #[tokio::test]
    async fn test_follows_tokens_until_exhausted() {
        let requests = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&requests);

        let stream = paginate(move |token| {
            seen.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, BackendError>(match token.as_deref() {
                    None => Page::new(vec![snap("a"), snap("b")], Some("p2".into())),
                    Some("p2") => Page::new(vec![snap("c")], Some(String::new())),
                    Some(other) => panic!("unexpected token {other}"),
                })
            }
        });

        let ids: Vec<String> = stream.map_ok(|s| s.id).try_collect().await.unwrap();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_nothing_is_fetched_until_polled() {
        let requests = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&requests);
        let stream = paginate(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, BackendError>(Page::new(vec![], None)) }
        });
        assert_eq!(requests.load(Ordering::SeqCst), 0);
        drop(stream);
    }

    #[tokio::test]
    async fn test_error_ends_the_stream() {
        let stream = paginate(|token| async move {
            match token {
                None => Ok(Page::new(vec![snap("a")], Some("p2".into()))),
                Some(_) => Err(BackendError::unavailable("reset")),
            }
        });
        let result: Result<Vec<Snapshot>, _> = stream.try_collect().await;
        assert_eq!(result, Err(BackendError::unavailable("reset")));
    }
}
