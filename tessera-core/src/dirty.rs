//! Dirty-rectangle tracking
//!
//! Each display keeps a small, fixed-capacity list of screen regions that
//! need repainting. Invalidations are clipped to the screen and dropped when
//! an existing entry already covers them. When the list fills up it
//! collapses into a single full-screen rectangle, so memory stays bounded no
//! matter how many invalidations arrive between frames.
//!
//! Before painting, [`DirtyTracker::merge`] greedily folds overlapping or
//! edge-adjacent entries together whenever the bounding box costs no more
//! pixels than painting both separately.

use heapless::Vec;
use log::{debug, warn};

use crate::area::Rect;

/// Number of dirty rectangles tracked per display
pub const DIRTY_CAPACITY: usize = 16;

/// One tracked entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DirtyArea {
    /// Region in screen coordinates (inclusive)
    pub rect: Rect,
    /// Folded into another entry by the last merge
    pub merged: bool,
}

/// Bounded set of screen regions awaiting repaint
#[derive(Debug, Clone)]
pub struct DirtyTracker {
    screen: Rect,
    areas: Vec<DirtyArea, DIRTY_CAPACITY>,
}

impl DirtyTracker {
    /// Create an empty tracker for a `h_res`×`v_res` screen
    pub fn new(h_res: u32, v_res: u32) -> Self {
        Self {
            screen: Rect::screen(h_res, v_res),
            areas: Vec::new(),
        }
    }

    /// Screen bounds all entries are clipped to
    pub fn screen(&self) -> Rect {
        self.screen
    }

    /// Mark a region as needing repaint, or clear everything with `None`
    pub fn invalidate(&mut self, area: Option<Rect>) {
        let Some(area) = area else {
            self.clear();
            return;
        };

        let Some(clipped) = area.intersect(&self.screen) else {
            return;
        };

        if self.areas.iter().any(|a| clipped.is_in(&a.rect)) {
            return;
        }

        let entry = DirtyArea {
            rect: clipped,
            merged: false,
        };
        if self.areas.push(entry).is_err() {
            warn!("dirty list full, repainting whole screen");
            self.areas.clear();
            // Capacity is non-zero, so a push into an empty list cannot fail
            let _ = self.areas.push(DirtyArea {
                rect: self.screen,
                merged: false,
            });
        }
    }

    /// Mark the whole screen as dirty
    pub fn invalidate_all(&mut self) {
        self.invalidate(Some(self.screen));
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.areas.clear();
    }

    /// Number of stored entries, merged-away ones included
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Entries still to be painted
    pub fn areas(&self) -> impl Iterator<Item = Rect> + '_ {
        self.areas.iter().filter(|a| !a.merged).map(|a| a.rect)
    }

    /// Raw entries including merge flags
    pub fn entries(&self) -> &[DirtyArea] {
        &self.areas
    }

    /// Pixel count of all unmerged entries (overlaps counted twice)
    pub fn total_area(&self) -> u32 {
        self.areas().map(|r| r.area()).sum()
    }

    /// Fold overlapping or touching entries together where that saves pixels
    ///
    /// Two entries merge when they are on each other and their bounding box is
    /// no larger than the sum of their areas. After a merge the scan for the
    /// grown entry restarts, since it may now reach entries it missed before.
    /// The result is greedy and depends on insertion order.
    pub fn merge(&mut self) {
        for a in self.areas.iter_mut() {
            a.merged = false;
        }

        let n = self.areas.len();
        for dst in 0..n {
            if self.areas[dst].merged {
                continue;
            }

            loop {
                let mut merged_any = false;

                for src in 0..n {
                    if src == dst || self.areas[src].merged {
                        continue;
                    }

                    let a = self.areas[dst].rect;
                    let b = self.areas[src].rect;
                    if !a.is_on(&b) {
                        continue;
                    }

                    let joined = a.join(&b);
                    if joined.area() <= a.area() + b.area() {
                        debug!(
                            "merged dirty [{}] into [{}], saved {} px",
                            src,
                            dst,
                            (a.area() + b.area()) - joined.area()
                        );
                        self.areas[dst].rect = joined;
                        self.areas[src].merged = true;
                        merged_any = true;
                    }
                }

                if !merged_any {
                    break;
                }
            }
        }
    }
}
