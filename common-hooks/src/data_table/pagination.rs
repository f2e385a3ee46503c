//! Pagination math derived from page, page size and row count.

/// Derived pagination view.
///
/// Every field is a pure function of `current_page`, `per_page` and
/// `total_items`; nothing here is stored by the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page, 1-based.
    pub current_page: usize,
    /// Page size.
    pub per_page: usize,
    /// Authoritative row count.
    pub total_items: usize,
}

impl Pagination {
    /// Creates a pagination view.
    pub fn new(current_page: usize, per_page: usize, total_items: usize) -> Self {
        Self {
            current_page,
            per_page,
            total_items,
        }
    }

    /// `ceil(total_items / per_page)`, zero when there are no rows.
    pub fn total_pages(&self) -> usize {
        if self.per_page == 0 {
            return 0;
        }
        self.total_items.div_ceil(self.per_page)
    }

    /// `[1, ..., total_pages]`.
    pub fn page_list(&self) -> Vec<usize> {
        (1..=self.total_pages()).collect()
    }

    pub fn can_go_next(&self) -> bool {
        self.current_page < self.total_pages() && self.total_items > 0
    }

    pub fn can_go_previous(&self) -> bool {
        self.current_page > 1 && self.total_items > 0
    }

    /// 1-based index of the first row shown.
    pub fn showing_from(&self) -> usize {
        self.current_page
            .saturating_sub(1)
            .saturating_mul(self.per_page)
            .saturating_add(1)
    }

    /// 1-based index of the last row shown.
    pub fn showing_to(&self) -> usize {
        self.current_page
            .saturating_mul(self.per_page)
            .min(self.total_items)
    }

    /// Whether `page` passes the `goto_page` guard.
    ///
    /// Only pages strictly between the first and the last page qualify, and
    /// never the current one.
    pub fn accepts_goto(&self, page: usize) -> bool {
        page > 1 && page < self.total_pages() && page != self.current_page
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        for per_page in 1..=7 {
            for total in 0..=40 {
                let p = Pagination::new(1, per_page, total);
                assert_eq!(p.total_pages(), total.div_ceil(per_page));
                assert_eq!(p.page_list().len(), p.total_pages());
            }
        }
    }

    #[test]
    fn test_empty_table_has_no_navigation() {
        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.total_pages(), 0);
        assert!(p.page_list().is_empty());
        assert!(!p.can_go_next());
        assert!(!p.can_go_previous());
        assert_eq!(p.showing_to(), 0);
    }

    #[test]
    fn test_showing_range_on_last_partial_page() {
        let p = Pagination::new(3, 10, 25);
        assert_eq!(p.showing_from(), 21);
        assert_eq!(p.showing_to(), 25);
        assert!(!p.can_go_next());
        assert!(p.can_go_previous());
    }

    #[test]
    fn test_showing_range_saturates_on_huge_page() {
        let p = Pagination::new(usize::MAX, 10, 3);
        assert_eq!(p.showing_from(), usize::MAX);
        assert_eq!(p.showing_to(), 3);
        assert!(!p.can_go_next());
    }

    #[test]
    fn test_goto_excludes_first_and_last() {
        let p = Pagination::new(2, 10, 50);
        assert!(!p.accepts_goto(1));
        assert!(!p.accepts_goto(5));
        assert!(!p.accepts_goto(2));
        assert!(p.accepts_goto(3));
        assert!(p.accepts_goto(4));
    }
}
