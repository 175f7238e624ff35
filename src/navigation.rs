use crate::document::clamp_index;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// Direction the finger moved in a swipe gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    pub direction: Direction,
    pub animated: bool,
}

/// Which page is shown. Pure state: callers turn the returned transitions
/// into render requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    index: usize,
    page_count: usize,
}

impl Navigator {
    pub fn new(page_count: usize, start: isize) -> Self {
        let index = if page_count == 0 {
            0
        } else {
            clamp_index(start, page_count)
        };
        Navigator { index, page_count }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn last_index(&self) -> usize {
        self.page_count.saturating_sub(1)
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index == self.last_index()
    }

    /// Whether ordinary swipe paging is allowed. It is switched off on the
    /// first and last page, where a swipe would run past the document.
    pub fn swipe_enabled(&self) -> bool {
        !self.is_first() && !self.is_last()
    }

    pub fn next(&mut self) -> Option<Transition> {
        if self.page_count == 0 || self.is_last() {
            return None;
        }
        Some(self.go(self.index + 1, Direction::Forward, true))
    }

    pub fn prev(&mut self) -> Option<Transition> {
        if self.page_count == 0 || self.is_first() {
            return None;
        }
        Some(self.go(self.index - 1, Direction::Reverse, true))
    }

    /// Jumps to `index`, clamped into the document. Always produces a
    /// transition (possibly to the current page) so that the page gets
    /// redrawn, e.g. after the crop changed.
    pub fn jump(&mut self, index: isize) -> Option<Transition> {
        if self.page_count == 0 {
            return None;
        }
        let to = clamp_index(index, self.page_count);
        Some(self.go(to, Direction::Forward, false))
    }

    /// Swipe handling at the document boundaries, where ordinary paging is
    /// off: a left swipe on the first page moves one page forward, a right
    /// swipe on the last page one page back. A one-page document never moves.
    pub fn peek(&mut self, swipe: Swipe) -> Option<Transition> {
        if self.page_count < 2 {
            return None;
        }

        match swipe {
            Swipe::Left if self.is_first() => Some(self.go(1, Direction::Forward, true)),
            Swipe::Right if self.is_last() => {
                Some(self.go(self.index - 1, Direction::Reverse, true))
            }
            _ => None,
        }
    }

    fn go(&mut self, to: usize, direction: Direction, animated: bool) -> Transition {
        let from = self.index;
        self.index = to;
        log::debug!("page {from} -> {to} ({direction:?})");
        Transition {
            from,
            to,
            direction,
            animated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_start() {
        assert_eq!(Navigator::new(5, -3).index(), 0);
        assert_eq!(Navigator::new(5, 3).index(), 3);
        assert_eq!(Navigator::new(5, 30).index(), 4);
        assert_eq!(Navigator::new(0, 2).index(), 0);
    }

    #[test]
    fn test_next_and_prev_stop_at_bounds() {
        let mut nav = Navigator::new(3, 0);
        assert_eq!(nav.prev(), None, "prev on first page must be a no-op");

        assert_eq!(nav.next().map(|t| t.to), Some(1));
        assert_eq!(nav.next().map(|t| t.to), Some(2));
        assert_eq!(nav.next(), None, "next on last page must be a no-op");
        assert_eq!(nav.index(), 2);

        let t = nav.prev().unwrap();
        assert_eq!((t.from, t.to, t.direction), (2, 1, Direction::Reverse));
    }

    #[test]
    fn test_jump_clamps() {
        let n = 7;
        for i in -10..20 {
            let mut nav = Navigator::new(n, 3);
            nav.jump(i);
            assert_eq!(nav.index() as isize, i.clamp(0, n as isize - 1), "jump({i})");
        }

        let mut empty = Navigator::new(0, 0);
        assert_eq!(empty.jump(3), None);
    }

    #[test]
    fn test_jump_to_current_page_still_transitions() {
        let mut nav = Navigator::new(4, 2);
        let t = nav.jump(2).unwrap();
        assert_eq!((t.from, t.to, t.animated), (2, 2, false));
    }

    #[test]
    fn test_peek_forward_from_first_page() {
        let mut nav = Navigator::new(5, 0);
        let t = nav.peek(Swipe::Left).unwrap();
        assert_eq!((t.to, t.direction), (1, Direction::Forward));
        assert!(nav.swipe_enabled());
    }

    #[test]
    fn test_peek_on_single_page_is_noop() {
        let mut nav = Navigator::new(1, 0);
        assert_eq!(nav.peek(Swipe::Left), None);
        assert_eq!(nav.peek(Swipe::Right), None);
        assert_eq!(nav.index(), 0);
    }

    #[test]
    fn test_peek_back_from_last_page() {
        let mut nav = Navigator::new(5, 4);
        assert_eq!(nav.peek(Swipe::Left), None);
        let t = nav.peek(Swipe::Right).unwrap();
        assert_eq!((t.to, t.direction), (3, Direction::Reverse));
    }

    #[test]
    fn test_peek_in_the_middle_is_noop() {
        let mut nav = Navigator::new(5, 2);
        assert_eq!(nav.peek(Swipe::Left), None);
        assert_eq!(nav.peek(Swipe::Right), None);
    }

    #[test]
    fn test_swipe_enabled_only_inside() {
        assert!(!Navigator::new(5, 0).swipe_enabled());
        assert!(Navigator::new(5, 2).swipe_enabled());
        assert!(!Navigator::new(5, 4).swipe_enabled());

        // two pages: after peeking forward the last page is reached
        let mut nav = Navigator::new(2, 0);
        nav.peek(Swipe::Left);
        assert!(!nav.swipe_enabled());
    }
}
