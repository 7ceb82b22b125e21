//! Relay Context (§4.7): the registry of channel workers and shared config.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::fs_util::rmrf;
use crate::worker::{ChannelWorker, WorkerStatus};

/// Owns every channel's worker plus the configuration they share.
///
/// Cloned cheaply: both fields are `Arc`-backed, so a clone is a handle to
/// the same registry, suitable for threading into every HTTP handler.
#[derive(Clone)]
pub struct RelayContext {
    config: RelayConfig,
    workers: Arc<Mutex<HashMap<String, Arc<ChannelWorker>>>>,
}

impl RelayContext {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            workers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// `set_source(channel, url)`: lazily creates the channel's worker if
    /// this is the first time it's been addressed.
    pub async fn set_source(&self, channel_id: &str, url: String) -> Result<()> {
        let worker = self.get_or_create(channel_id).await;
        worker.set_source(url).await
    }

    pub async fn stop_source(&self, channel_id: &str) -> Result<()> {
        self.get(channel_id).await?.stop_source().await
    }

    pub async fn reset_window(&self, channel_id: &str) -> Result<()> {
        self.get(channel_id).await?.reset_window().await
    }

    /// `stop()` followed by recursive removal of `out/<channel_id>/` (§3
    /// lifecycle): the worker only owns `in/<channel_id>/`, so the control
    /// plane is responsible for the output tree.
    pub async fn remove(&self, channel_id: &str) -> Result<()> {
        let worker = self.get(channel_id).await?;
        worker.stop().await?;
        rmrf(self.config.channel_out_dir(channel_id)).await?;
        self.workers.lock().await.remove(channel_id);
        Ok(())
    }

    pub async fn status(&self, channel_id: &str) -> Result<WorkerStatus> {
        Ok(self.get(channel_id).await?.status().await)
    }

    pub async fn list_channels(&self) -> Vec<String> {
        self.workers.lock().await.keys().cloned().collect()
    }

    async fn get(&self, channel_id: &str) -> Result<Arc<ChannelWorker>> {
        self.workers
            .lock()
            .await
            .get(channel_id)
            .cloned()
            .ok_or_else(|| RelayError::not_found(channel_id))
    }

    async fn get_or_create(&self, channel_id: &str) -> Arc<ChannelWorker> {
        let mut workers = self.workers.lock().await;
        workers
            .entry(channel_id.to_string())
            .or_insert_with(|| ChannelWorker::spawn(channel_id.to_string(), self.config.clone()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_channel_operations_return_not_found() {
        let ctx = RelayContext::new(RelayConfig::default());
        assert!(matches!(
            ctx.stop_source("missing").await,
            Err(RelayError::ChannelNotFound(_))
        ));
        assert!(matches!(
            ctx.status("missing").await,
            Err(RelayError::ChannelNotFound(_))
        ));
    }

    #[tokio::test]
    async fn set_source_creates_the_channel_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RelayConfig::default();
        config.out_root = dir.path().to_path_buf();
        let ctx = RelayContext::new(config);

        assert!(ctx.list_channels().await.is_empty());
        ctx.set_source("ch1", "rtmp://example.invalid/live".to_string())
            .await
            .ok();
        assert_eq!(ctx.list_channels().await, vec!["ch1".to_string()]);
    }
}
