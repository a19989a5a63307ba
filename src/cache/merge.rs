//! Merge and refetch policy for paginated cache slots.

use crate::models::{ListingPage, QueryArgs, Record};

use super::CachedData;

/// Fold an incoming page into the accumulated listing.
///
/// An empty cursor means first load or refresh, so the page replaces the
/// slot. A non-empty cursor appends to whatever is cached.
pub fn merge_listing<T: Record>(
    current: Option<ListingPage<T>>,
    incoming: ListingPage<T>,
    args: &QueryArgs,
) -> ListingPage<T> {
    if args.is_first_page() {
        return incoming;
    }

    match current {
        Some(mut cached) if !cached.items.is_empty() => {
            let count = incoming.pagination.count.or(cached.pagination.count);
            cached.items.extend(incoming.items);
            cached.pagination = incoming.pagination;
            cached.pagination.count = count;
            if incoming.facets.is_some() {
                cached.facets = incoming.facets;
            }
            cached
        }
        _ => incoming,
    }
}

/// Merge fetched data into a slot according to its shape.
pub fn merge_data(current: Option<CachedData>, incoming: CachedData, args: &QueryArgs) -> CachedData {
    match (current, incoming) {
        (Some(CachedData::Posts(cached)), CachedData::Posts(page)) => {
            CachedData::Posts(merge_listing(Some(cached), page, args))
        }
        (Some(CachedData::BestPractices(cached)), CachedData::BestPractices(page)) => {
            CachedData::BestPractices(merge_listing(Some(cached), page, args))
        }
        (_, incoming) => incoming,
    }
}

/// Whether a request with `current` arguments must hit the network when the
/// slot was last filled with `previous`.
///
/// Any change of cursor or of a filter (search, tag, sort, market flag)
/// forces a fetch.
pub fn force_refetch(current: &QueryArgs, previous: Option<&QueryArgs>) -> bool {
    let Some(previous) = previous else {
        return true;
    };

    current.cursor != previous.cursor
        || current.search != previous.search
        || current.tag != previous.tag
        || current.sort != previous.sort
        || current.is_market_post != previous.is_market_post
}
