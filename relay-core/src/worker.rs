//! ChannelWorker (§3, §4.6): per-channel state machine, background tick
//! loop, and the synchronous control surface.
//!
//! Grounded on `original_source/app/channel_worker.py` for the state shape
//! and the tick algorithm, and on `rust-srec/src/downloader/manager.rs`'s
//! `DownloadManager` for the owning-service idiom (tracing on every
//! transition, `Arc`-wrapped handles).

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RelayConfig;
use crate::error::Result;
use crate::fs_util::{mkdir_p, rmrf};
use crate::publisher;
use crate::selector::{is_stalled, select_source, Source};
use crate::supervisor::{CrashOutcome, FfmpegSpawner, RunningProcess, TranscoderSpawner};
use crate::window::Window;

/// Snapshot returned by `status()` (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerStatus {
    pub active: bool,
    pub media_seq: u64,
    pub window_length: usize,
}

/// Mutable per-channel state, guarded by one `tokio::sync::Mutex` (§5).
struct WorkerState {
    live_url: Option<String>,
    current_source: Source,
    discontinuity_pending: bool,
    restart_count: u32,
    last_processed: u64,
    active: bool,
    running: bool,
    media_seq: u64,
    window: Window,
    process: Option<RunningProcess>,
}

impl WorkerState {
    fn new() -> Self {
        Self {
            live_url: None,
            current_source: Source::Standby,
            discontinuity_pending: false,
            restart_count: 0,
            last_processed: 0,
            active: false,
            running: true,
            media_seq: 0,
            window: Window::new(),
            process: None,
        }
    }
}

/// One logical channel's relay worker: owns the background tick task and
/// exposes the synchronous control surface (§4.6).
pub struct ChannelWorker {
    pub channel_id: String,
    config: RelayConfig,
    spawner: Arc<dyn TranscoderSpawner>,
    state: Mutex<WorkerState>,
    shutdown: CancellationToken,
}

impl ChannelWorker {
    /// Create a worker and spawn its background tick task. The caller is
    /// expected to hold the returned `Arc` in a `RelayContext` registry.
    pub fn spawn(channel_id: String, config: RelayConfig) -> Arc<Self> {
        let spawner: Arc<dyn TranscoderSpawner> = Arc::new(FfmpegSpawner {
            binary: std::env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()),
            target_duration: config.target_duration,
            window_segments: config.window_segments,
        });
        Self::spawn_with_spawner(channel_id, config, spawner)
    }

    /// Test/advanced seam: inject a custom `TranscoderSpawner` instead of
    /// the default ffmpeg command line (see SPEC_FULL.md §9's open question
    /// on the injected spawner).
    pub fn spawn_with_spawner(
        channel_id: String,
        config: RelayConfig,
        spawner: Arc<dyn TranscoderSpawner>,
    ) -> Arc<Self> {
        let worker = Arc::new(Self {
            channel_id,
            config,
            spawner,
            state: Mutex::new(WorkerState::new()),
            shutdown: CancellationToken::new(),
        });

        let loop_worker = worker.clone();
        tokio::spawn(async move { loop_worker.run().await });

        worker
    }

    fn in_dir(&self) -> std::path::PathBuf {
        self.config.channel_in_dir(&self.channel_id)
    }

    fn out_dir(&self) -> std::path::PathBuf {
        self.config.channel_out_dir(&self.channel_id)
    }

    fn segments_dir(&self) -> std::path::PathBuf {
        self.out_dir().join("segments")
    }

    fn playlist_path(&self) -> std::path::PathBuf {
        self.out_dir().join("index.m3u8")
    }

    fn source_dir(&self, source: Source) -> std::path::PathBuf {
        match source {
            Source::Live => self.in_dir(),
            Source::Standby => self.config.standby_in_dir(),
        }
    }

    // ---- Control Surface (§4.6) ----

    /// `set_source(url)`.
    pub async fn set_source(&self, url: String) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::stop_process(&self.config, &mut state).await?;

        state.live_url = Some(url.clone());
        state.restart_count = 0;
        state.active = true;
        state.current_source = Source::Live;
        state.discontinuity_pending = true;
        state.last_processed = 0;

        info!(channel_id = %self.channel_id, live_url = %url, "source assigned");
        self.start_process_locked(&mut state).await
    }

    /// `stop_source()`.
    pub async fn stop_source(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        Self::stop_process(&self.config, &mut state).await?;
        state.active = false;
        state.live_url = None;
        state.current_source = Source::Standby;
        state.discontinuity_pending = true;
        rmrf(self.in_dir()).await?;
        info!(channel_id = %self.channel_id, "source revoked, falling back to standby");
        Ok(())
    }

    /// `reset_window()`.
    pub async fn reset_window(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        rmrf(self.segments_dir()).await?;
        mkdir_p(self.segments_dir()).await?;
        state.window.clear();
        state.media_seq = 0;
        state.last_processed = 0;
        info!(channel_id = %self.channel_id, "window reset");
        Ok(())
    }

    /// `stop()`.
    pub async fn stop(&self) -> Result<()> {
        self.stop_source().await?;
        let mut state = self.state.lock().await;
        state.running = false;
        self.shutdown.cancel();
        info!(channel_id = %self.channel_id, "worker stopping");
        Ok(())
    }

    /// `status()`.
    pub async fn status(&self) -> WorkerStatus {
        let state = self.state.lock().await;
        WorkerStatus {
            active: state.active,
            media_seq: state.media_seq,
            window_length: state.window.len(),
        }
    }

    // ---- Ingress Supervisor (§4.1) ----

    async fn start_process_locked(&self, state: &mut WorkerState) -> Result<()> {
        let Some(live_url) = state.live_url.clone() else {
            return Ok(());
        };
        debug_assert!(state.process.is_none(), "no live subprocess currently owned");

        mkdir_p(self.in_dir()).await?;
        crate::supervisor::log_spawn(&self.channel_id, &live_url);
        let child = self.spawner.spawn(&self.channel_id, &live_url, &self.in_dir()).await?;
        state.process = Some(RunningProcess::watch(child));
        Ok(())
    }

    async fn stop_process(config: &RelayConfig, state: &mut WorkerState) -> Result<()> {
        if let Some(process) = state.process.take() {
            process.terminate(config.grace_kill).await;
        }
        Ok(())
    }

    /// §4.1 `handle_crash`: terminate any remaining handle, then either
    /// restart with backoff or give up and fall back to standby.
    async fn handle_crash(&self) -> Result<CrashOutcome> {
        let mut state = self.state.lock().await;
        Self::stop_process(&self.config, &mut state).await?;

        if state.live_url.is_some() && state.restart_count < self.config.restart_max {
            let delay = self.config.backoff_delay(state.restart_count);
            state.restart_count += 1;
            let restart_count = state.restart_count;
            drop(state);

            tokio::time::sleep(delay).await;

            let mut state = self.state.lock().await;
            // A control operation may have intervened while we slept; only
            // restart if we're still meant to be live.
            if state.live_url.is_some() && state.running {
                self.start_process_locked(&mut state).await?;
            }
            Ok(CrashOutcome::Restarted { restart_count })
        } else {
            state.restart_count = 0;
            Ok(CrashOutcome::GaveUp)
        }
    }

    // ---- Background tick loop (§4.2-§4.5, §5) ----

    async fn run(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.tick_interval) => {}
            }

            if let Err(e) = self.tick().await {
                warn!(channel_id = %self.channel_id, error = %e, "tick failed, will retry next cycle");
            }

            let running = self.state.lock().await.running;
            if !running {
                break;
            }
        }
        debug!(channel_id = %self.channel_id, "worker tick loop exited");
    }

    async fn tick(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.running {
            return Ok(());
        }

        // Opportunistic reap: drain the process-waiter channel without
        // blocking, and feed any observed exit into crash handling.
        let crashed = match &mut state.process {
            Some(process) => match process.exit_rx.try_recv() {
                Ok(_code) => true,
                Err(tokio::sync::mpsc::error::TryRecvError::Empty) => false,
                Err(tokio::sync::mpsc::error::TryRecvError::Disconnected) => false,
            },
            None => false,
        };
        if crashed {
            drop(state);
            match self.handle_crash().await? {
                CrashOutcome::Restarted { restart_count } => warn!(
                    channel_id = %self.channel_id,
                    restart_count,
                    "transcoder crashed, restarted after backoff"
                ),
                CrashOutcome::GaveUp => crate::supervisor::log_give_up(
                    &self.channel_id,
                    self.config.restart_max,
                ),
            }
            state = self.state.lock().await;
        }

        // Source Selector (§4.2).
        let live_playlist = self.in_dir().join("index.m3u8");
        let stalled = is_stalled(state.active, &live_playlist, self.config.stall_threshold());
        let effective = select_source(state.active, stalled);
        if effective != state.current_source {
            state.current_source = effective;
            state.discontinuity_pending = true;
            info!(channel_id = %self.channel_id, source = ?effective, "source transition");
        }

        // Segment Stitcher (§4.3).
        let source_dir = self.source_dir(state.current_source);
        let source_playlist = source_dir.join("index.m3u8");
        mkdir_p(self.segments_dir()).await?;

        let WorkerState {
            window,
            media_seq,
            last_processed,
            discontinuity_pending,
            ..
        } = &mut *state;

        let outcome = crate::stitcher::stitch_tick(
            &source_playlist,
            &source_dir,
            &self.segments_dir(),
            window,
            self.config.window_segments,
            self.config.max_segments_per_channel,
            *media_seq,
            *last_processed,
            *discontinuity_pending,
        )
        .await?;

        *media_seq = outcome.media_seq;
        *last_processed = outcome.last_processed;
        if outcome.admitted > 0 {
            *discontinuity_pending = false;
        }

        // Publisher (§4.5).
        publisher::publish(self.config.target_duration, &state.window, &self.playlist_path())
            .await?;

        Ok(())
    }
}
