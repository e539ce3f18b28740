use crate::presentation::gesture::{tap_zone, Cursor, SwipeDirection, TapZone};

/// Fullscreen image viewer over an explicit list of image URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    images: Vec<String>,
    cursor: Cursor,
}

/// What a tap did to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    Moved,
    Unchanged,
    Close,
}

impl Viewer {
    /// `None` for an empty list.
    pub fn open(images: Vec<String>, start: usize) -> Option<Self> {
        if images.is_empty() {
            return None;
        }
        let cursor = Cursor::at(start, images.len());
        Some(Self { images, cursor })
    }

    pub fn index(&self) -> usize {
        self.cursor.index()
    }

    pub fn current(&self) -> &str {
        &self.images[self.cursor.index()]
    }

    pub fn swipe(&mut self, dx: f64) -> bool {
        self.cursor.swipe(dx)
    }

    pub fn tap(&mut self, x: f64, width: f64) -> TapOutcome {
        let direction = match tap_zone(x, width) {
            TapZone::Middle => return TapOutcome::Close,
            TapZone::Left => SwipeDirection::Previous,
            TapZone::Right => SwipeDirection::Next,
        };
        if self.cursor.step(direction) {
            TapOutcome::Moved
        } else {
            TapOutcome::Unchanged
        }
    }
}
