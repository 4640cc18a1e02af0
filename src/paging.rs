//! Cursor-based pagination shared by the remote sources.
//!
//! A cursor of `0` means "no page": it is both the starting cursor (the first
//! request carries no page parameter) and the sentinel a fetch returns when
//! there is nothing left.

use anyhow::Result;
use std::future::Future;
use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};

/// Items requested per page
pub const PAGE_SIZE: u8 = 50;

/// Cursor value meaning "first page" on input and "no further page" on output
pub const NO_PAGE: u32 = 0;

/// Pull pages from `fetch` until it reports no next page, forwarding every item.
///
/// A failed fetch is logged and ends the enumeration; items already forwarded
/// stay forwarded. The loop also ends when the receiving side has gone away.
/// Returns the number of items forwarded.
pub async fn enumerate_pages<T, F, Fut>(category: &str, mut fetch: F, sink: &Sender<T>) -> usize
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, u32)>>,
{
    let mut cursor = NO_PAGE;
    let mut forwarded = 0;

    loop {
        let (items, next) = match fetch(cursor).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Error reading {} page {}: {:#}", category, cursor, e);
                break;
            }
        };

        debug!(
            "Fetched {} page {} with {} items (next: {})",
            category,
            cursor,
            items.len(),
            next
        );

        for item in items {
            if sink.send(item).await.is_err() {
                debug!("Receiver for {} closed, stopping enumeration", category);
                return forwarded;
            }
            forwarded += 1;
        }

        if next == NO_PAGE {
            break;
        }
        cursor = next;
    }

    forwarded
}

/// Extract the `page` parameter from the query string of a `next` link.
///
/// Returns [`NO_PAGE`] when there is no link or it carries no usable page.
pub fn next_page_cursor(query: Option<&str>) -> u32 {
    query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "page")
        .and_then(|(_, value)| value.parse::<u32>().ok())
        .unwrap_or(NO_PAGE)
}
