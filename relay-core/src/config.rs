//! Relay-wide configuration, loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Static configuration shared by every channel worker.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Root directory containing `in/` and `out/`.
    pub out_root: PathBuf,
    /// Target segment length in seconds, written verbatim into `#EXT-X-TARGETDURATION`.
    pub target_duration: u32,
    /// Soft cap on window length (rolling HLS window size).
    pub window_segments: usize,
    /// Hard cap on window length (absolute storage bound).
    pub max_segments_per_channel: usize,
    /// Multiplier on `target_duration` to compute the stall threshold.
    pub stall_factor: u32,
    /// Max consecutive subprocess restart attempts.
    pub restart_max: u32,
    /// Base backoff in milliseconds.
    pub backoff_base_ms: u64,
    /// Exponential base for backoff growth.
    pub backoff_factor: f64,
    /// Upper bound on backoff delay in milliseconds.
    pub backoff_cap_ms: u64,
    /// Background tick cadence.
    pub tick_interval: Duration,
    /// SIGTERM -> SIGKILL grace period for subprocess termination.
    pub grace_kill: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            out_root: PathBuf::from("."),
            target_duration: 4,
            window_segments: 6,
            max_segments_per_channel: 100,
            stall_factor: 3,
            restart_max: 6,
            backoff_base_ms: 500,
            backoff_factor: 2.0,
            backoff_cap_ms: 30_000,
            tick_interval: Duration::from_millis(500),
            grace_kill: Duration::from_millis(2_000),
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything missing or unparsable. A parse failure is
    /// logged and the default retained rather than aborting startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            out_root: std::env::var("OUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.out_root),
            target_duration: env_parse("TARGET_DURATION", defaults.target_duration),
            window_segments: env_parse("WINDOW_SEGMENTS", defaults.window_segments),
            max_segments_per_channel: env_parse(
                "MAX_SEGMENTS_PER_CHANNEL",
                defaults.max_segments_per_channel,
            ),
            stall_factor: env_parse("STALL_FACTOR", defaults.stall_factor),
            restart_max: env_parse("RESTART_MAX", defaults.restart_max),
            backoff_base_ms: env_parse("BACKOFF_BASE_MS", defaults.backoff_base_ms),
            backoff_factor: env_parse("BACKOFF_FACTOR", defaults.backoff_factor),
            backoff_cap_ms: env_parse("BACKOFF_CAP_MS", defaults.backoff_cap_ms),
            tick_interval: Duration::from_millis(env_parse(
                "TICK_INTERVAL_MS",
                defaults.tick_interval.as_millis() as u64,
            )),
            grace_kill: Duration::from_millis(env_parse(
                "GRACE_KILL_MS",
                defaults.grace_kill.as_millis() as u64,
            )),
        }
    }

    /// `stall_threshold = target_duration * stall_factor`, as a `Duration`.
    pub fn stall_threshold(&self) -> Duration {
        Duration::from_secs((self.target_duration * self.stall_factor) as u64)
    }

    /// Backoff delay for a given consecutive restart count, per §4.1:
    /// `min(BACKOFF_BASE_MS * BACKOFF_FACTOR^restart_count, BACKOFF_CAP_MS)`.
    pub fn backoff_delay(&self, restart_count: u32) -> Duration {
        let scaled = self.backoff_base_ms as f64 * self.backoff_factor.powi(restart_count as i32);
        let capped = scaled.min(self.backoff_cap_ms as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    pub fn in_root(&self) -> PathBuf {
        self.out_root.join("in")
    }

    pub fn out_dir_root(&self) -> PathBuf {
        self.out_root.join("out")
    }

    pub fn channel_in_dir(&self, channel_id: &str) -> PathBuf {
        self.in_root().join(channel_id)
    }

    pub fn standby_in_dir(&self) -> PathBuf {
        self.in_root().join("standby")
    }

    pub fn channel_out_dir(&self, channel_id: &str) -> PathBuf {
        self.out_dir_root().join(channel_id)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "could not parse config value, using default");
            default
        }),
        Err(_) => default,
    }
}
