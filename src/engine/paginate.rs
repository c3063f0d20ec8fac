use std::future::Future;

use async_channel::Sender;
use futures::{stream, StreamExt, TryStreamExt};
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SweepError};

/// Pages fetched concurrently while enumerating a single listing.
const PAGE_CONCURRENCY: usize = 4;

/// One page request against a listing endpoint. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Page {
    pub fn new(number: usize, size: usize) -> Self {
        Self { number, size }
    }

    /// Smallest request that still reports the listing total.
    pub fn total_only() -> Self {
        Self::new(1, 1)
    }
}

/// A page of results together with the total the remote side reported.
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Number of pages needed to cover `total` items at `page_size` per page.
pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1))
}

async fn cancellable<T>(cancel: &CancellationToken, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SweepError::Cancelled),
        result = fut => result,
    }
}

/// Asks the listing for its total using a one-item page.
pub async fn fetch_total<T, F, Fut>(cancel: &CancellationToken, list_page: &F) -> Result<usize>
where
    F: Fn(Page) -> Fut,
    Fut: Future<Output = Result<Listing<T>>>,
{
    Ok(cancellable(cancel, list_page(Page::total_only())).await?.total)
}

/// Fetches every page of a listing and returns all elements.
///
/// The total is learned from a one-item request, then pages `1..=ceil(total / page_size)`
/// are fetched concurrently. Any failed page fails the whole enumeration: a
/// partial listing is never returned as if it were complete.
pub async fn enumerate<T, F, Fut>(
    page_size: usize,
    cancel: &CancellationToken,
    list_page: F,
) -> Result<Vec<T>>
where
    F: Fn(Page) -> Fut,
    Fut: Future<Output = Result<Listing<T>>>,
{
    let total = fetch_total(cancel, &list_page).await?;
    enumerate_from(total, page_size, cancel, list_page).await
}

/// Same as [`enumerate`] for a caller that already knows the total.
pub async fn enumerate_from<T, F, Fut>(
    total: usize,
    page_size: usize,
    cancel: &CancellationToken,
    list_page: F,
) -> Result<Vec<T>>
where
    F: Fn(Page) -> Fut,
    Fut: Future<Output = Result<Listing<T>>>,
{
    let pages = page_count(total, page_size);
    debug!("Enumerating {total} items across {pages} pages of {page_size}");

    let items: Vec<T> = stream::iter(1..=pages)
        .map(|number| cancellable(cancel, list_page(Page::new(number, page_size))))
        .buffer_unordered(PAGE_CONCURRENCY)
        .try_fold(Vec::with_capacity(total), |mut acc, listing| async move {
            acc.extend(listing.items);
            Ok(acc)
        })
        .await?;

    if items.len() != total {
        warn!(
            "Listing reported {total} items but {} were returned; the collection changed while paging",
            items.len()
        );
    }

    Ok(items)
}

/// Fetches every page of a listing and pushes each element onto `tx` as soon
/// as its page arrives. Returns the number of elements emitted.
pub async fn seed<T, F, Fut>(
    page_size: usize,
    cancel: &CancellationToken,
    tx: &Sender<T>,
    list_page: F,
) -> Result<usize>
where
    F: Fn(Page) -> Fut,
    Fut: Future<Output = Result<Listing<T>>>,
{
    let total = fetch_total(cancel, &list_page).await?;
    let pages = page_count(total, page_size);
    debug!("Seeding {total} items across {pages} pages of {page_size}");

    let mut listings = stream::iter(1..=pages)
        .map(|number| cancellable(cancel, list_page(Page::new(number, page_size))))
        .buffer_unordered(PAGE_CONCURRENCY);

    let mut emitted = 0;
    while let Some(listing) = listings.next().await {
        for item in listing?.items {
            cancellable(cancel, async {
                tx.send(item).await.map_err(|_| SweepError::StreamClosed)
            })
            .await?;
            emitted += 1;
        }
    }

    Ok(emitted)
}
