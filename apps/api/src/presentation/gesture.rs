/// Horizontal travel a drag must exceed to count as a swipe.
pub const SWIPE_THRESHOLD_PX: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Previous,
    Next,
}

/// Dragging left reveals the next item.
pub fn classify_swipe(dx: f64) -> Option<SwipeDirection> {
    if !dx.is_finite() || dx.abs() <= SWIPE_THRESHOLD_PX {
        None
    } else if dx < 0.0 {
        Some(SwipeDirection::Next)
    } else {
        Some(SwipeDirection::Previous)
    }
}

/// Zero-based position in a list of fixed length. Clamped, never wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    index: usize,
    len: usize,
}

impl Cursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn at(index: usize, len: usize) -> Self {
        Self {
            index: index.min(len.saturating_sub(1)),
            len,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns whether the index moved.
    pub fn step(&mut self, direction: SwipeDirection) -> bool {
        let before = self.index;
        self.index = match direction {
            SwipeDirection::Previous => self.index.saturating_sub(1),
            SwipeDirection::Next => (self.index + 1).min(self.len.saturating_sub(1)),
        };
        self.index != before
    }

    pub fn swipe(&mut self, dx: f64) -> bool {
        classify_swipe(dx).is_some_and(|d| self.step(d))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapZone {
    Left,
    Middle,
    Right,
}

/// Splits `width` into thirds.
pub fn tap_zone(x: f64, width: f64) -> TapZone {
    let third = width / 3.0;
    if x < third {
        TapZone::Left
    } else if x >= third * 2.0 {
        TapZone::Right
    } else {
        TapZone::Middle
    }
}
