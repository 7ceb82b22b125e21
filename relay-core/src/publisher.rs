//! Publisher (§4.5): renders and atomically writes the output playlist.

use std::path::Path;

use crate::error::Result;
use crate::fs_util::atomic_write;
use crate::segment::Segment;
use crate::window::Window;

/// Render the output playlist for `window`, or `None` if the window is
/// empty (a tick that would publish an empty playlist is skipped, §4.5).
pub fn render(target_duration: u32, window: &Window) -> Option<String> {
    let first = window.front()?;
    let media_sequence = first
        .index()
        .expect("admitted segments always carry a parseable integer output_uri");

    let mut out = String::new();
    out.push_str("#EXTM3U\n");
    out.push_str("#EXT-X-VERSION:3\n");
    out.push_str(&format!("#EXT-X-TARGETDURATION:{target_duration}\n"));
    out.push_str(&format!("#EXT-X-MEDIA-SEQUENCE:{media_sequence}\n"));

    for segment in window.iter() {
        render_segment(&mut out, segment);
    }

    Some(out)
}

fn render_segment(out: &mut String, segment: &Segment) {
    if segment.discontinuity_before {
        out.push_str("#EXT-X-DISCONTINUITY\n");
    }
    // At least three decimal digits when produced numerically, per §6.
    out.push_str(&format!("#EXTINF:{:.3},\n", segment.duration_secs));
    out.push_str(&format!("segments/{}\n", segment.output_uri));
}

/// Render and atomically publish the playlist at `playlist_path`. A no-op
/// (per §4.5) when the window is currently empty.
pub async fn publish(target_duration: u32, window: &Window, playlist_path: &Path) -> Result<()> {
    let Some(contents) = render(target_duration, window) else {
        return Ok(());
    };
    atomic_write(playlist_path, &contents).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_scenario_s1() {
        let mut window = Window::new();
        window.push(Segment::new(0, 2.0, true));
        window.push(Segment::new(1, 2.0, false));

        let playlist = render(2, &window).unwrap();
        assert_eq!(
            playlist,
            "#EXTM3U\n\
             #EXT-X-VERSION:3\n\
             #EXT-X-TARGETDURATION:2\n\
             #EXT-X-MEDIA-SEQUENCE:0\n\
             #EXT-X-DISCONTINUITY\n\
             #EXTINF:2.000,\n\
             segments/0.ts\n\
             #EXTINF:2.000,\n\
             segments/1.ts\n"
        );
    }

    #[test]
    fn empty_window_renders_nothing() {
        let window = Window::new();
        assert!(render(2, &window).is_none());
    }

    #[tokio::test]
    async fn publish_is_atomic_and_skips_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let playlist_path = dir.path().join("index.m3u8");

        let empty = Window::new();
        publish(2, &empty, &playlist_path).await.unwrap();
        assert!(!playlist_path.exists());

        let mut window = Window::new();
        window.push(Segment::new(0, 2.0, false));
        publish(2, &window, &playlist_path).await.unwrap();
        let contents = tokio::fs::read_to_string(&playlist_path).await.unwrap();
        assert!(contents.starts_with("#EXTM3U\n"));
        assert!(contents.contains("segments/0.ts"));

        // No leftover temp file.
        let tmp_path = playlist_path.with_extension("tmp");
        assert!(!tmp_path.exists());
    }
}
