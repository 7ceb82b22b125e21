//! Segment Stitcher (§4.3): polls the current source playlist, copies new
//! segments into the channel's output, and assigns monotonic output numbers.
//!
//! Grounded on `crates/mesio/src/hls/playlist.rs`'s use of
//! `m3u8_rs::{MediaPlaylist, MediaSegment, parse_playlist_res}` for the
//! parsing API, and `original_source/app/channel_worker.py::run()` for the
//! per-segment admission algorithm.

use std::path::Path;

use m3u8_rs::Playlist;
use tracing::{debug, warn};

use crate::error::Result;
use crate::segment::{parse_upstream_segment_number, Segment};
use crate::window::Window;

/// Result of stitching one tick: whether anything new was admitted, and the
/// new high-water `last_processed` / `media_seq` values.
#[derive(Debug, Default, PartialEq)]
pub struct StitchOutcome {
    pub admitted: usize,
    pub last_processed: u64,
    pub media_seq: u64,
}

/// Run one stitching pass against `source_playlist_path` (§4.3 steps 1-3).
///
/// `discontinuity_pending` is consumed on the first admitted segment (if
/// any) and cleared; the caller passes it in by value and is told via the
/// return whether it was consumed, since this function has no mutable
/// access to the worker's state.
#[allow(clippy::too_many_arguments)]
pub async fn stitch_tick(
    source_playlist_path: &Path,
    source_segments_dir: &Path,
    out_segments_dir: &Path,
    window: &mut Window,
    window_segments: usize,
    max_segments: usize,
    mut media_seq: u64,
    mut last_processed: u64,
    mut discontinuity_pending: bool,
) -> Result<StitchOutcome> {
    // Step 1: if the source playlist doesn't exist yet, skip this tick.
    if tokio::fs::metadata(source_playlist_path).await.is_err() {
        return Ok(StitchOutcome {
            admitted: 0,
            last_processed,
            media_seq,
        });
    }

    let bytes = tokio::fs::read(source_playlist_path).await?;
    let parsed = match m3u8_rs::parse_playlist_res(&bytes) {
        Ok(Playlist::MediaPlaylist(p)) => p,
        Ok(Playlist::MasterPlaylist(_)) => {
            // A master (variant) playlist has no segments of its own; treat
            // as malformed input for this tick rather than crashing (§7).
            warn!(
                path = %source_playlist_path.display(),
                "source playlist is a master playlist, expected a media playlist"
            );
            return Ok(StitchOutcome {
                admitted: 0,
                last_processed,
                media_seq,
            });
        }
        Err(e) => {
            warn!(path = %source_playlist_path.display(), error = ?e, "failed to parse source playlist");
            return Ok(StitchOutcome {
                admitted: 0,
                last_processed,
                media_seq,
            });
        }
    };

    let mut admitted = 0usize;

    for media_segment in &parsed.segments {
        let Some(seg_num) = parse_upstream_segment_number(&media_segment.uri) else {
            continue;
        };
        if seg_num <= last_processed {
            continue;
        }

        let src_file = source_segments_dir.join(&media_segment.uri);
        if tokio::fs::metadata(&src_file).await.is_err() {
            // Under-construction or already-gone; don't advance last_processed.
            debug!(path = %src_file.display(), "segment file missing, skipping this tick");
            continue;
        }

        let dst_file = out_segments_dir.join(format!("{media_seq}.ts"));
        crate::fs_util::hardlink_or_copy(&src_file, &dst_file).await?;

        window.push(Segment::new(
            media_seq,
            media_segment.duration as f64,
            discontinuity_pending,
        ));
        discontinuity_pending = false;
        media_seq += 1;
        last_processed = seg_num;
        admitted += 1;

        window.trim(window_segments, max_segments, out_segments_dir).await;
    }

    Ok(StitchOutcome {
        admitted,
        last_processed,
        media_seq,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn write_file(path: &Path, contents: &[u8]) {
        let mut f = tokio::fs::File::create(path).await.unwrap();
        f.write_all(contents).await.unwrap();
    }

    async fn write_playlist(dir: &Path, segments: &[(u32, f64)]) {
        let mut body = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:2\n#EXT-X-MEDIA-SEQUENCE:0\n");
        for (n, dur) in segments {
            body.push_str(&format!("#EXTINF:{dur:.3},\nsegment_{n:03}.ts\n"));
        }
        write_file(&dir.join("index.m3u8"), body.as_bytes()).await;
    }

    #[tokio::test]
    async fn skips_tick_when_playlist_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut window = Window::new();
        let outcome = stitch_tick(
            &dir.path().join("index.m3u8"),
            dir.path(),
            dir.path(),
            &mut window,
            5,
            100,
            0,
            0,
            false,
        )
        .await
        .unwrap();
        assert_eq!(outcome, StitchOutcome { admitted: 0, last_processed: 0, media_seq: 0 });
        assert!(window.is_empty());
    }

    #[tokio::test]
    async fn admits_new_segments_in_order_and_clears_discontinuity() {
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        write_playlist(src_dir.path(), &[(0, 2.0), (1, 2.0)]).await;
        write_file(&src_dir.path().join("segment_000.ts"), b"a").await;
        write_file(&src_dir.path().join("segment_001.ts"), b"b").await;

        let mut window = Window::new();
        let outcome = stitch_tick(
            &src_dir.path().join("index.m3u8"),
            src_dir.path(),
            out_dir.path(),
            &mut window,
            5,
            100,
            0,
            0,
            true,
        )
        .await
        .unwrap();

        assert_eq!(outcome.admitted, 2);
        assert_eq!(outcome.media_seq, 2);
        assert_eq!(outcome.last_processed, 1);
        assert_eq!(window.len(), 2);
        let segs: Vec<_> = window.iter().collect();
        assert!(segs[0].discontinuity_before);
        assert!(!segs[1].discontinuity_before);
        assert!(out_dir.path().join("0.ts").exists());
        assert!(out_dir.path().join("1.ts").exists());
    }

    #[tokio::test]
    async fn skips_segments_at_or_below_last_processed() {
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        write_playlist(src_dir.path(), &[(0, 2.0), (1, 2.0), (2, 2.0)]).await;
        write_file(&src_dir.path().join("segment_000.ts"), b"a").await;
        write_file(&src_dir.path().join("segment_001.ts"), b"b").await;
        write_file(&src_dir.path().join("segment_002.ts"), b"c").await;

        let mut window = Window::new();
        let outcome = stitch_tick(
            &src_dir.path().join("index.m3u8"),
            src_dir.path(),
            out_dir.path(),
            &mut window,
            5,
            100,
            5,
            1,
            false,
        )
        .await
        .unwrap();

        // Only segment_002 (> last_processed=1) is admitted.
        assert_eq!(outcome.admitted, 1);
        assert_eq!(outcome.last_processed, 2);
        assert_eq!(outcome.media_seq, 6);
        assert_eq!(window.len(), 1);
        assert_eq!(window.front().unwrap().output_uri, "5.ts");
    }

    #[tokio::test]
    async fn skips_segment_with_missing_file_without_advancing_last_processed() {
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        write_playlist(src_dir.path(), &[(0, 2.0)]).await;
        // segment_000.ts intentionally not written (under construction).

        let mut window = Window::new();
        let outcome = stitch_tick(
            &src_dir.path().join("index.m3u8"),
            src_dir.path(),
            out_dir.path(),
            &mut window,
            5,
            100,
            0,
            0,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome.admitted, 0);
        assert_eq!(outcome.last_processed, 0);
        assert!(window.is_empty());
    }

    #[tokio::test]
    async fn malformed_playlist_does_not_mutate_state() {
        let src_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        write_file(&src_dir.path().join("index.m3u8"), b"not an hls playlist").await;

        let mut window = Window::new();
        let outcome = stitch_tick(
            &src_dir.path().join("index.m3u8"),
            src_dir.path(),
            out_dir.path(),
            &mut window,
            5,
            100,
            3,
            2,
            false,
        )
        .await
        .unwrap();

        assert_eq!(outcome.admitted, 0);
        assert_eq!(outcome.last_processed, 2);
        assert_eq!(outcome.media_seq, 3);
    }
}
