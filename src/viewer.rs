use crate::data::model::{TripRecord, TripTable};

pub const DEFAULT_PAGE_SIZE: usize = 5;

/// Forward-only cursor over a filtered table.  A new pager starts at row 0;
/// nothing carries over between sessions.
#[derive(Debug)]
pub struct RawPager<'a> {
    table: &'a TripTable,
    cursor: usize,
    page_size: usize,
}

impl<'a> RawPager<'a> {
    pub fn new(table: &'a TripTable, page_size: usize) -> Self {
        RawPager {
            table,
            cursor: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rows `[cursor, cursor + page_size)`, then advance the cursor by a
    /// full page.  Past the end this yields a short or empty page.
    pub fn next_page(&mut self) -> &'a [TripRecord] {
        let page = self.table.slice(self.cursor, self.page_size);
        self.cursor = self.cursor.saturating_add(self.page_size);
        page
    }
}
