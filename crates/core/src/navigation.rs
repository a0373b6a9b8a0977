/// Current question index, bounded to `[0, count)`.
///
/// Out-of-range requests are ignored rather than clamped to the nearest edge,
/// so "previous" on the first question and "next" on the last are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionCursor {
    index: usize,
    count: usize,
}

impl QuestionCursor {
    /// Cursor at the first question.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self { index: 0, count }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Move to `index` if it is in range. Returns whether the cursor moved.
    pub fn go_to(&mut self, index: usize) -> bool {
        if index < self.count {
            self.index = index;
            true
        } else {
            false
        }
    }

    /// Move by a signed offset, with the same range rule as `go_to`.
    pub fn step(&mut self, delta: isize) -> bool {
        match self.index.checked_add_signed(delta) {
            Some(target) => self.go_to(target),
            None => false,
        }
    }

    pub fn next(&mut self) -> bool {
        self.step(1)
    }

    pub fn previous(&mut self) -> bool {
        self.step(-1)
    }

    #[must_use]
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.index + 1 >= self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_to_accepts_only_in_range_indices() {
        let mut cursor = QuestionCursor::new(3);
        assert!(cursor.go_to(2));
        assert_eq!(cursor.index(), 2);
        assert!(!cursor.go_to(3));
        assert!(!cursor.go_to(usize::MAX));
        assert_eq!(cursor.index(), 2);
    }

    #[test]
    fn previous_and_next_stop_at_edges() {
        let mut cursor = QuestionCursor::new(2);
        assert!(cursor.is_first());
        assert!(!cursor.previous());
        assert_eq!(cursor.index(), 0);

        assert!(cursor.next());
        assert!(cursor.is_last());
        assert!(!cursor.next());
        assert_eq!(cursor.index(), 1);

        assert!(cursor.previous());
        assert_eq!(cursor.index(), 0);
    }

    #[test]
    fn empty_cursor_never_moves() {
        let mut cursor = QuestionCursor::new(0);
        assert!(!cursor.go_to(0));
        assert!(!cursor.next());
        assert_eq!(cursor.index(), 0);
    }
}
