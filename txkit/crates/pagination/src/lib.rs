//! Offset pagination primitives shared by txkit endpoints.
//!
//! Two types live here:
//!
//! - [`PageRequest`] is the inbound query shape (`page`, `limit`, `sortBy`,
//!   `sortDesc`) with the defaults handlers rely on.
//! - [`Pagination`] is the outbound envelope carrying one page of results
//!   together with the total count and a `hasNext` flag.
//!
//! `hasNext` is derived from `(page, take, total)` only. The length of the
//! result slice is never consulted, because the final page may legitimately
//! be short and a filtered page may legitimately be empty.

use serde::{Deserialize, Serialize};

/// Page number used when a request omits `page` or passes `0`.
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when a request omits `limit`.
pub const DEFAULT_LIMIT: u64 = 20;

/// Sort field used when a request omits `sortBy`.
pub const DEFAULT_SORT_FIELD: &str = "id";

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Ascending order.
    Asc,
    /// Descending order.
    #[default]
    Desc,
}

impl OrderType {
    /// SQL keyword for this direction.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

const fn default_page() -> u64 {
    DEFAULT_PAGE
}

const fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

fn default_sort_by() -> Option<String> {
    Some(DEFAULT_SORT_FIELD.to_owned())
}

/// Page request parsed from a query string.
///
/// # Examples
/// ```
/// use pagination::{OrderType, PageRequest};
///
/// let request = PageRequest::new(3, 10);
/// assert_eq!(request.skip(), 20);
/// assert_eq!(request.take(), 10);
/// assert_eq!(request.sort_desc, OrderType::Desc);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    /// One-based page number.
    #[serde(default = "default_page")]
    pub page: u64,
    /// Number of items per page.
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Field to sort by.
    #[serde(default = "default_sort_by")]
    pub sort_by: Option<String>,
    /// Sort direction, sent as `sortDesc=ASC|DESC`.
    #[serde(default)]
    pub sort_desc: OrderType,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE, DEFAULT_LIMIT)
    }
}

impl PageRequest {
    /// Build a request for `page` with `limit` items per page, using the
    /// default sort field and direction.
    #[must_use]
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit,
            sort_by: default_sort_by(),
            sort_desc: OrderType::default(),
        }
    }

    /// Effective one-based page number (`0` is read as the first page).
    #[must_use]
    pub const fn page(&self) -> u64 {
        normalise_page(self.page)
    }

    /// Number of rows to skip before this page.
    #[must_use]
    pub const fn skip(&self) -> u64 {
        skip_for(self.page, self.limit)
    }

    /// Number of rows in this page.
    #[must_use]
    pub const fn take(&self) -> u64 {
        self.limit
    }
}

const fn normalise_page(page: u64) -> u64 {
    if page == 0 { DEFAULT_PAGE } else { page }
}

const fn skip_for(page: u64, take: u64) -> u64 {
    normalise_page(page).saturating_sub(1).saturating_mul(take)
}

/// One page of results.
///
/// # Examples
/// ```
/// use pagination::Pagination;
///
/// let page = Pagination::new(vec![11, 12, 13], 25, 2, 10);
/// assert!(page.has_next);
/// assert_eq!(page.skip(), 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination<T> {
    /// Total number of rows matching the query.
    pub total: u64,
    /// Rows in this page.
    pub results: Vec<T>,
    /// One-based page number.
    pub page: u64,
    /// Page size.
    pub take: u64,
    /// Whether rows exist beyond this page.
    pub has_next: bool,
}

impl<T> Pagination<T> {
    /// Assemble a page. `has_next` is computed from `page`, `take` and
    /// `total`.
    #[must_use]
    pub fn new(results: Vec<T>, total: u64, page: u64, take: u64) -> Self {
        let current = normalise_page(page);
        Self {
            total,
            results,
            page: current,
            take,
            has_next: has_next(current, take, total),
        }
    }

    /// Assemble a page for a [`PageRequest`].
    #[must_use]
    pub fn for_request(results: Vec<T>, total: u64, request: &PageRequest) -> Self {
        Self::new(results, total, request.page(), request.take())
    }

    /// Number of rows preceding this page.
    #[must_use]
    pub const fn skip(&self) -> u64 {
        skip_for(self.page, self.take)
    }

    /// Transform the rows while keeping the paging metadata.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Pagination<U>
    where
        F: FnMut(T) -> U,
    {
        Pagination {
            total: self.total,
            results: self.results.into_iter().map(f).collect(),
            page: self.page,
            take: self.take,
            has_next: self.has_next,
        }
    }
}

/// Whether rows exist beyond page `page` of size `take` out of `total`.
#[must_use]
pub const fn has_next(page: u64, take: u64, total: u64) -> bool {
    skip_for(page, take).saturating_add(take) < total
}
