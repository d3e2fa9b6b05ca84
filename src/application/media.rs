//! Concurrent attachment retrieval.
//!
//! All downloads for a batch are spawned before any result is awaited
//! (fire-and-collect), bounded by a semaphore so the remote service never
//! sees more than the configured number of in-flight requests. A single
//! failure is isolated to its message; the batch always completes.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::domain::{MediaAsset, MediaOutcome, Message};

use super::source::MessageSource;

/// Bounded-concurrency fetcher for one batch of messages.
pub struct MediaFetcher<S> {
    source: Arc<S>,
    max_in_flight: usize,
}

impl<S: MessageSource + 'static> MediaFetcher<S> {
    /// Create a fetcher over the given source with an in-flight bound.
    #[must_use]
    pub fn new(source: Arc<S>, max_in_flight: usize) -> Self {
        Self {
            source,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Download every attachment in the batch into `media_dir`.
    ///
    /// Returns one outcome per message, index-aligned with the input, so
    /// results match back to their originating message regardless of
    /// completion order. Dropping the returned future aborts in-flight
    /// downloads.
    pub async fn fetch_batch(&self, messages: &[Message], media_dir: &Path) -> Vec<MediaOutcome> {
        let mut outcomes: Vec<MediaOutcome> = messages
            .iter()
            .map(|m| {
                if m.has_attachment() {
                    // Overwritten on completion; stays if the task is lost.
                    MediaOutcome::Failed("fetch did not complete".to_string())
                } else {
                    MediaOutcome::Absent
                }
            })
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut set = JoinSet::new();

        for (idx, msg) in messages.iter().enumerate() {
            let Some(attachment) = msg.attachment.clone() else {
                continue;
            };
            let source = Arc::clone(&self.source);
            let semaphore = Arc::clone(&semaphore);
            let dest = media_dir.to_path_buf();
            let message_id = msg.id;

            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (idx, message_id, Err("fetch pool closed".to_string())),
                };
                let result = source
                    .download_attachment(&attachment, &dest)
                    .await
                    .map_err(|e| e.to_string());
                (idx, message_id, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, _, Ok(path))) => {
                    outcomes[idx] = MediaOutcome::Fetched(MediaAsset::from_downloaded(path));
                }
                Ok((idx, message_id, Err(reason))) => {
                    tracing::warn!(message_id, error = %reason, "attachment fetch failed");
                    outcomes[idx] = MediaOutcome::Failed(reason);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "attachment fetch task lost");
                }
            }
        }

        outcomes
    }
}
