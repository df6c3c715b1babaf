use std::time::{Duration, Instant};

/// An item is viewable once at least this share of its own area is on screen.
pub const VIEW_AREA_COVERAGE_PERCENT_THRESHOLD: f64 = 50.0;

const SCROLL_DURATION: Duration = Duration::from_millis(200);

/// Reports which list positions are visible enough to count as on screen.
pub trait VisibilityReporter {
    fn viewable_items(&self, item_count: usize) -> Vec<usize>;
}

#[derive(Clone, Copy, Debug)]
struct ScrollAnimation {
    from: f64,
    to: f64,
    started: Instant,
}

/// Vertical list whose pages are exactly one viewport tall.
///
/// Offsets are in terminal rows. Scrolling always lands on a page boundary;
/// in-between offsets only exist while a scroll animation runs, which is
/// where the visibility threshold decides the hand-over.
#[derive(Debug)]
pub struct PagedViewport {
    page_height: u16,
    offset: f64,
    animation: Option<ScrollAnimation>,
}

impl PagedViewport {
    pub fn new(page_height: u16) -> Self {
        Self {
            page_height,
            offset: 0.0,
            animation: None,
        }
    }

    #[cfg(test)]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn set_page_height(&mut self, page_height: u16) {
        if page_height == self.page_height {
            return;
        }
        let page = self.target_page();
        self.page_height = page_height;
        self.animation = None;
        self.offset = page as f64 * page_height as f64;
    }

    /// Page the viewport is on, or heading to when animating.
    pub fn target_page(&self) -> usize {
        let h = self.page_height.max(1) as f64;
        let target = self.animation.map_or(self.offset, |a| a.to);
        (target / h).round().max(0.0) as usize
    }

    #[cfg(test)]
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn scroll_to_index(
        &mut self,
        index: usize,
        item_count: usize,
        now: Instant,
        animated: bool,
    ) {
        let index = index.min(item_count.saturating_sub(1));
        let to = index as f64 * self.page_height as f64;

        if !animated || (to - self.offset).abs() < f64::EPSILON {
            self.offset = to;
            self.animation = None;
            return;
        }
        self.animation = Some(ScrollAnimation {
            from: self.offset,
            to,
            started: now,
        });
    }

    pub fn next_page(&mut self, item_count: usize, now: Instant) {
        let target = self.target_page() + 1;
        if target < item_count {
            self.scroll_to_index(target, item_count, now, true);
        }
    }

    pub fn prev_page(&mut self, item_count: usize, now: Instant) {
        if let Some(target) = self.target_page().checked_sub(1) {
            self.scroll_to_index(target, item_count, now, true);
        }
    }

    /// Moves the running animation forward; returns true if the offset changed.
    pub fn advance(&mut self, now: Instant) -> bool {
        let Some(anim) = self.animation else {
            return false;
        };

        let elapsed = now.saturating_duration_since(anim.started);
        let t = (elapsed.as_secs_f64() / SCROLL_DURATION.as_secs_f64()).min(1.0);
        // ease-out
        let eased = 1.0 - (1.0 - t) * (1.0 - t);
        let before = self.offset;
        self.offset = anim.from + (anim.to - anim.from) * eased;

        if t >= 1.0 {
            self.offset = anim.to;
            self.animation = None;
        }
        (self.offset - before).abs() > f64::EPSILON
    }

    /// Visible share of the item at `index`, in percent of its own area.
    pub fn coverage_percent(&self, index: usize) -> f64 {
        if self.page_height == 0 {
            return 0.0;
        }
        let h = self.page_height as f64;
        let top = index as f64 * h;
        let overlap = (top + h).min(self.offset + h) - top.max(self.offset);
        (overlap.max(0.0) / h) * 100.0
    }

    /// Row at which the item at `index` starts, relative to the viewport top.
    pub fn item_top(&self, index: usize) -> f64 {
        index as f64 * self.page_height as f64 - self.offset
    }
}

impl VisibilityReporter for PagedViewport {
    fn viewable_items(&self, item_count: usize) -> Vec<usize> {
        (0..item_count)
            .filter(|&i| self.coverage_percent(i) >= VIEW_AREA_COVERAGE_PERCENT_THRESHOLD)
            .collect()
    }
}
