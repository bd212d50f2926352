use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, Stream, TryStreamExt};

use super::types::Page;
use crate::error::{Result, ScanError};

/// The trailing time span a run looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookbackWindow {
    pub start: DateTime<Utc>,
    pub days: u32,
}

impl LookbackWindow {
    /// Window covering the `days` days that end at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Config`] when the window would start before the
    /// earliest representable date.
    pub fn trailing_days(now: DateTime<Utc>, days: u32) -> Result<Self> {
        let start = Duration::try_days(i64::from(days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                ScanError::Config(format!("look-back of {days} days is out of range"))
            })?;
        Ok(Self { start, days })
    }

    /// Pipelines count as recent only when updated strictly after the window start.
    pub fn pipeline_is_too_old(&self, updated_at: DateTime<Utc>) -> bool {
        updated_at <= self.start
    }

    /// Workflows created at or before the window start halt the walk.
    pub fn workflow_is_too_old(&self, created_at: DateTime<Utc>) -> bool {
        created_at <= self.start
    }
}

enum Cursor {
    First,
    Next(String),
    Exhausted,
}

/// Walks a cursor-paginated collection that is ordered newest first.
///
/// `fetch` is called with `None` for the first page and with the previous page's
/// `next_page_token` afterwards. The walk stops when a page has no next token, or
/// at the first item for which `is_too_old` returns true; that item and everything
/// after it on the same page are dropped.
///
/// This is a prefix scan: if the API ever returns items out of order, anything
/// after the first old item is missed.
pub fn walk_pages<'a, T, F, Fut, P>(fetch: F, is_too_old: P) -> impl Stream<Item = Result<T>> + 'a
where
    T: 'a,
    F: FnMut(Option<String>) -> Fut + 'a,
    Fut: Future<Output = Result<Page<T>>> + 'a,
    P: Fn(&T) -> bool + 'a,
{
    stream::try_unfold(
        (fetch, is_too_old, Cursor::First),
        |(mut fetch, is_too_old, cursor)| async move {
            let token = match cursor {
                Cursor::First => None,
                Cursor::Next(token) => Some(token),
                Cursor::Exhausted => return Ok::<_, ScanError>(None),
            };

            let page = fetch(token).await?;

            let mut reached_cutoff = false;
            let mut retained = Vec::with_capacity(page.items.len());
            for item in page.items {
                if is_too_old(&item) {
                    reached_cutoff = true;
                    break;
                }
                retained.push(item);
            }

            let next = match page.next_page_token {
                Some(token) if !reached_cutoff => Cursor::Next(token),
                _ => Cursor::Exhausted,
            };

            Ok(Some((retained, (fetch, is_too_old, next))))
        },
    )
    .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
    .try_flatten()
}
