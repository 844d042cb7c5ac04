use crate::aggregate::AggregatedRow;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewState {
    pub selected: usize,
    pub scroll: usize,
    pub expanded: bool,
    pub merge_mode: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ViewState {
    pub fn new(merge_mode: bool) -> Self {
        Self {
            selected: 0,
            scroll: 0,
            expanded: false,
            merge_mode,
        }
    }

    /// Moving off a row collapses it. A move blocked at the edge is a no-op.
    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.expanded = false;
        }
    }

    pub fn move_down(&mut self, row_count: usize) {
        if self.selected + 1 < row_count {
            self.selected += 1;
            self.expanded = false;
        }
    }

    pub fn toggle_expand(&mut self, rows: &[AggregatedRow]) {
        if self.can_expand(rows) {
            self.expanded = !self.expanded;
        }
    }

    /// Flips the aggregation mode. The selected index is kept; the caller
    /// rebuilds rows and clamps.
    pub fn toggle_merge(&mut self) {
        self.merge_mode = !self.merge_mode;
        self.expanded = false;
    }

    fn can_expand(&self, rows: &[AggregatedRow]) -> bool {
        self.merge_mode && rows.get(self.selected).is_some_and(|row| row.merged)
    }

    pub fn clamp(&mut self, rows: &[AggregatedRow]) {
        if rows.is_empty() {
            self.selected = 0;
            self.scroll = 0;
            self.expanded = false;
            return;
        }
        self.selected = self.selected.min(rows.len() - 1);
        self.scroll = self.scroll.min(self.selected);
        if self.expanded && !self.can_expand(rows) {
            self.expanded = false;
        }
    }

    /// Scrolls by the least amount that keeps the selection inside a window
    /// of `visible_rows` lines, then pulls back so the window is never left
    /// partly empty while rows sit above it.
    pub fn align_scroll(&mut self, visible_rows: usize, row_count: usize) {
        let page = visible_rows.max(1);
        if self.selected < self.scroll {
            self.scroll = self.selected;
        } else if self.selected >= self.scroll + page {
            self.scroll = self.selected + 1 - page;
        }
        self.scroll = self.scroll.min(row_count.saturating_sub(page));
    }
}
