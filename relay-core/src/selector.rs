//! Source Selector (§4.2): decides `live` vs `standby` at each tick.

use std::path::Path;
use std::time::{Duration, SystemTime};

/// The effective source a channel worker is relaying from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Live,
    Standby,
}

/// `stalled = (now - mtime(playlist)) > stall_threshold`, or `true` if the
/// playlist doesn't exist yet (channel activated but transcoder hasn't
/// written anything). Always `false` when the channel isn't active.
pub fn is_stalled(active: bool, live_playlist: &Path, stall_threshold: Duration) -> bool {
    if !active {
        return false;
    }
    match std::fs::metadata(live_playlist).and_then(|m| m.modified()) {
        Ok(mtime) => SystemTime::now()
            .duration_since(mtime)
            .unwrap_or(Duration::ZERO)
            > stall_threshold,
        Err(_) => true,
    }
}

/// `effective_source = live iff active && !stalled, else standby`.
pub fn select_source(active: bool, stalled: bool) -> Source {
    if active && !stalled {
        Source::Live
    } else {
        Source::Standby
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn inactive_channel_is_never_stalled() {
        assert!(!is_stalled(false, Path::new("/does/not/exist"), Duration::from_secs(1)));
    }

    #[test]
    fn missing_playlist_counts_as_stalled() {
        assert!(is_stalled(true, Path::new("/does/not/exist"), Duration::from_secs(1)));
    }

    #[test]
    fn fresh_playlist_is_not_stalled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.m3u8");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "#EXTM3U").unwrap();
        drop(f);
        assert!(!is_stalled(true, &path, Duration::from_secs(30)));
    }

    #[test]
    fn select_source_matrix() {
        assert_eq!(select_source(true, false), Source::Live);
        assert_eq!(select_source(true, true), Source::Standby);
        assert_eq!(select_source(false, false), Source::Standby);
        assert_eq!(select_source(false, true), Source::Standby);
    }
}
