//! Catalog queries and lazy result paging

use crate::error::CatalogResult;
use crate::filter::Filter;
use crate::metacard::Metacard;
use crate::traits::Catalog;

/// One page of a catalog query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Predicate
    pub filter: Filter,
    /// Zero-based offset of the first result
    pub start_index: usize,
    /// Maximum number of results
    pub page_size: usize,
    /// Restrict to records held by the local catalog
    pub local_only: bool,
}

impl QueryRequest {
    /// First page of a query
    pub fn new(filter: Filter, page_size: usize) -> Self {
        QueryRequest {
            filter,
            start_index: 0,
            page_size,
            local_only: false,
        }
    }

    /// Builder: restrict to local results
    pub fn local(mut self) -> Self {
        self.local_only = true;
        self
    }
}

/// Results of one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResponse {
    /// Records on this page
    pub results: Vec<Metacard>,
    /// Total number of matches, when the catalog knows it
    pub hits: Option<u64>,
}

/// Lazily pages through every result of a query
///
/// A new page is fetched only when the previous one is drained, so at most
/// one page of records is held at a time. Iteration stops after a short page
/// or the first error.
pub struct PagedResults<'a> {
    catalog: &'a dyn Catalog,
    request: QueryRequest,
    page: std::vec::IntoIter<Metacard>,
    exhausted: bool,
}

impl<'a> PagedResults<'a> {
    /// Start paging; nothing is fetched until the first `next()`
    pub fn new(catalog: &'a dyn Catalog, mut request: QueryRequest) -> Self {
        request.page_size = request.page_size.max(1);
        PagedResults {
            catalog,
            request,
            page: Vec::new().into_iter(),
            exhausted: false,
        }
    }

    fn fetch_page(&mut self) -> CatalogResult<()> {
        let response = self.catalog.query(&self.request)?;
        let fetched = response.results.len();
        if fetched < self.request.page_size {
            self.exhausted = true;
        }
        self.request.start_index += fetched;
        self.page = response.results.into_iter();
        Ok(())
    }
}

impl Iterator for PagedResults<'_> {
    type Item = CatalogResult<Metacard>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(metacard) = self.page.next() {
                return Some(Ok(metacard));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}

/// Collect every result of a query into memory
pub fn query_all(catalog: &dyn Catalog, request: QueryRequest) -> CatalogResult<Vec<Metacard>> {
    PagedResults::new(catalog, request).collect()
}
