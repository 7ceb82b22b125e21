//! Window Manager (§4.4): the rolling, size-bounded segment window.

use std::collections::VecDeque;
use std::path::Path;

use crate::fs_util::unlink_tolerant;
use crate::segment::Segment;

/// Bounded, ordered sequence of admitted segments, oldest first.
#[derive(Debug, Default)]
pub struct Window {
    segments: VecDeque<Segment>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub fn front(&self) -> Option<&Segment> {
        self.segments.front()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Append a newly admitted segment. Does not enforce the window bound;
    /// callers must follow with `trim` so admission and eviction interleave
    /// correctly within a tick (§4.3 step 3f).
    pub fn push(&mut self, segment: Segment) {
        self.segments.push_back(segment);
    }

    /// Evict from the front until `|window| <= min(window_segments, max_segments)`,
    /// unlinking each evicted segment's file under `segments_dir`. Missing
    /// files are tolerated silently (cleanup races).
    pub async fn trim(&mut self, window_segments: usize, max_segments: usize, segments_dir: &Path) {
        let cap = window_segments.min(max_segments);
        while self.segments.len() > cap {
            if let Some(evicted) = self.segments.pop_front() {
                unlink_tolerant(segments_dir.join(&evicted.output_uri)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trim_keeps_only_the_smaller_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mut window = Window::new();
        for i in 0..5u64 {
            window.push(Segment::new(i, 2.0, false));
        }
        window.trim(2, 100, dir.path()).await;
        assert_eq!(window.len(), 2);
        assert_eq!(window.front().unwrap().output_uri, "3.ts");

        let mut window = Window::new();
        for i in 0..5u64 {
            window.push(Segment::new(i, 2.0, false));
        }
        window.trim(100, 2, dir.path()).await;
        assert_eq!(window.len(), 2);
    }

    #[tokio::test]
    async fn trim_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut window = Window::new();
        window.push(Segment::new(0, 2.0, false));
        window.push(Segment::new(1, 2.0, false));
        // Neither 0.ts nor 1.ts exists on disk; trim must not error.
        window.trim(0, 0, dir.path()).await;
        assert!(window.is_empty());
    }
}
