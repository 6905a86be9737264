//! Page navigation with a single-flight fetch guard.

use tracing::debug;

use crate::lifecycle::FetchState;
use crate::view::PageControl;

/// Number of pages needed for `total_records` at `page_size` per page.
///
/// Never less than 1, so an empty table still has a (blank) first page.
#[must_use]
pub fn total_pages_for(total_records: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 1;
    }
    let pages = total_records.div_ceil(u64::from(page_size)).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// A page fetch the caller should issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

/// Pagination state of one list instance.
#[derive(Debug, Clone)]
pub struct PaginationState {
    current_page: u32,
    total_pages: u32,
    page_size: u32,
    fetch: FetchState<()>,
}

impl PaginationState {
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            page_size: page_size.max(1),
            fetch: FetchState::Idle,
        }
    }

    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    #[must_use]
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn fetch(&self) -> &FetchState<()> {
        &self.fetch
    }

    /// Claims the in-flight slot for fetching `page`.
    ///
    /// Returns `None` while another fetch is outstanding: the trigger is
    /// dropped, not queued.
    pub fn begin_fetch(&mut self, page: u32) -> Option<PageRequest> {
        if self.fetch.begin().is_err() {
            debug!(page, "page fetch already in flight, skipping");
            return None;
        }
        Some(PageRequest {
            page,
            page_size: self.page_size,
        })
    }

    /// Settles the in-flight fetch.
    ///
    /// On success the current page becomes the fetched page and the page count
    /// follows `total_records`. A failure leaves both unchanged.
    pub fn finish_fetch(&mut self, request: PageRequest, total_records: Result<u64, String>) {
        if let Ok(total) = &total_records {
            self.current_page = request.page;
            self.total_pages = total_pages_for(*total, self.page_size);
        }
        self.fetch.finish(total_records.map(|_| ()));
    }

    /// Moves to `page` if it exists and differs from the current one.
    ///
    /// Returns whether the current page changed (and a fetch is due). Pages
    /// outside `1..=total_pages` are ignored.
    pub fn go_to(&mut self, page: u32) -> bool {
        if page == 0 || page > self.total_pages || page == self.current_page {
            return false;
        }
        self.current_page = page;
        true
    }

    /// One control per page, the current one marked active.
    #[must_use]
    pub fn controls(&self) -> Vec<PageControl> {
        (1..=self.total_pages)
            .map(|number| PageControl {
                number,
                active: number == self.current_page,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn seven_records_in_pages_of_two() {
        assert_eq!(total_pages_for(7, 2), 4);
    }

    #[test]
    fn empty_table_has_one_page() {
        assert_eq!(total_pages_for(0, 10), 1);
        assert_eq!(total_pages_for(5, 0), 1);
    }

    #[test]
    fn out_of_range_pages_are_ignored() {
        let mut state = PaginationState::new(2);
        let req = state.begin_fetch(1).expect("first fetch");
        state.finish_fetch(req, Ok(7));
        assert_eq!(state.total_pages(), 4);

        assert!(!state.go_to(5));
        assert!(!state.go_to(0));
        assert!(!state.go_to(1));
        assert_eq!(state.current_page(), 1);

        assert!(state.go_to(4));
        assert_eq!(state.current_page(), 4);
    }

    #[test]
    fn overlapping_fetch_is_dropped() {
        let mut state = PaginationState::new(2);
        let first = state.begin_fetch(1);
        assert!(first.is_some());
        assert!(state.begin_fetch(1).is_none());
        assert!(state.begin_fetch(2).is_none());

        state.finish_fetch(first.expect("first"), Ok(3));
        assert!(state.begin_fetch(2).is_some());
    }

    #[test]
    fn failed_fetch_keeps_page_and_releases_guard() {
        let mut state = PaginationState::new(2);
        let req = state.begin_fetch(1).expect("fetch");
        state.finish_fetch(req, Ok(9));
        assert!(state.go_to(3));

        let req = state.begin_fetch(3).expect("fetch");
        state.finish_fetch(req, Err("down".into()));
        assert_eq!(state.current_page(), 3);
        assert_eq!(state.total_pages(), 5);
        assert!(state.begin_fetch(3).is_some());
    }

    #[test]
    fn controls_mark_current_page() {
        let mut state = PaginationState::new(2);
        let req = state.begin_fetch(2).expect("fetch");
        state.finish_fetch(req, Ok(5));
        let controls = state.controls();
        assert_eq!(controls.len(), 3);
        assert!(controls[1].active);
        assert!(!controls[0].active && !controls[2].active);
    }

    proptest! {
        #[test]
        fn page_count_covers_every_record(total in 0u64..10_000, size in 1u32..100) {
            let pages = u64::from(total_pages_for(total, size));
            prop_assert!(pages >= 1);
            prop_assert!(pages * u64::from(size) >= total);
            prop_assert!(total == 0 || (pages - 1) * u64::from(size) < total);
        }
    }
}
