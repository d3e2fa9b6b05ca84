//! The backup orchestrator.
//!
//! Drives one run across the selected conversations: fetch the delta above
//! the stored cursor, resolve attachments concurrently, append one render
//! write, then advance the cursor. The cursor advance after a successful
//! append is the single linearization point that makes crash-and-retry
//! idempotent. Failures isolate to their conversation; siblings proceed.

use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::{
    AppConfig, BackupError, ChatReport, Conversation, CursorMap, Result, RunReport,
};
use crate::infrastructure::{CursorStore, OutputLayout};

use super::media::MediaFetcher;
use super::renderer::Renderer;
use super::source::{MessageSource, RunContext};

/// Result of one conversation's processing.
struct ConversationOutcome {
    report: ChatReport,
    /// New cursor value and the document written, present only on commit.
    committed: Option<(i64, PathBuf)>,
}

/// The backup engine: one callable, internally guarded unit of work.
pub struct BackupEngine<S> {
    config: AppConfig,
    source: Arc<S>,
    cursor_store: CursorStore,
    layout: OutputLayout,
    renderer: Renderer,
    run_lock: tokio::sync::Mutex<()>,
}

impl<S: MessageSource + 'static> BackupEngine<S> {
    /// Create an engine over an authenticated source.
    ///
    /// # Errors
    /// Returns error if the configured output format is invalid.
    pub fn new(config: AppConfig, source: Arc<S>) -> Result<Self> {
        let format = config.backup.format.parse().map_err(BackupError::config)?;
        let cursor_store = CursorStore::new(config.cursor_file_path());
        let layout = OutputLayout::new(config.output_root());

        Ok(Self {
            config,
            source,
            cursor_store,
            layout,
            renderer: Renderer::new(format),
            run_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Run a backup for the selected conversations, dated today.
    ///
    /// Safe to invoke repeatedly; a run that races an active one is refused.
    ///
    /// # Errors
    /// Returns [`BackupError::RunInProgress`] if another run holds the lock,
    /// [`BackupError::SourceUnavailable`] if the conversation list cannot be
    /// fetched, and [`BackupError::AllFailed`] if every conversation failed.
    pub async fn run(&self) -> Result<RunReport> {
        self.run_for(RunContext::for_today()).await
    }

    /// Run a backup for an explicit run context.
    ///
    /// # Errors
    /// See [`Self::run`].
    pub async fn run_for(&self, ctx: RunContext) -> Result<RunReport> {
        // Overlapping runs would race the cursor file and the open
        // documents; refuse rather than queue.
        let Ok(_guard) = self.run_lock.try_lock() else {
            return Err(BackupError::RunInProgress);
        };

        let start = std::time::Instant::now();
        tracing::info!(run_date = %ctx.run_date, "starting backup run");

        let mut cursors = self.cursor_store.load();
        let conversations = self.source.list_conversations().await?;
        let (selected, mut report) = self.select_conversations(conversations);

        let mut finalize_docs: Vec<PathBuf> = Vec::new();
        let mut failed = 0usize;

        for conv in &selected {
            let prev_cursor = cursors.get(&conv.name).copied().unwrap_or(0);

            match self.backup_conversation(ctx, conv, prev_cursor).await {
                Ok(outcome) => {
                    if let Some((last_id, document)) = outcome.committed {
                        cursors.insert(conv.name.clone(), last_id);
                        finalize_docs.push(document);
                    }
                    report.chats.push(outcome.report);
                }
                Err(e) => {
                    tracing::warn!(chat = %conv.name, error = %e, "conversation backup failed");
                    failed += 1;
                    report.chats.push(ChatReport::skipped(&conv.name, e.to_string()));
                }
            }
        }

        // Close out every document that received a batch, once per run.
        for document in finalize_docs {
            if let Err(e) = self.renderer.finalize(&document) {
                tracing::warn!(path = %document.display(), error = %e, "finalize failed");
            }
        }

        if let Err(e) = self.cursor_store.save(&cursors) {
            // The prior cursor file is untouched; the next run re-covers
            // this run's deltas.
            tracing::warn!(error = %e, "cursor persist failed, progress will be re-covered");
            report.cursor_warning = Some(e.to_string());
        }

        // Only conversations actually attempted count toward run failure;
        // a misconfigured selection is reported, not fatal.
        if !selected.is_empty() && failed == selected.len() {
            return Err(BackupError::AllFailed { failed });
        }

        tracing::info!(
            messages = report.total_messages(),
            media = report.total_media(),
            media_failed = report.total_media_failed(),
            skipped = report.skipped_count(),
            duration_ms = start.elapsed().as_millis(),
            "backup run completed"
        );

        Ok(report)
    }

    /// Current cursor state, for inspection.
    #[must_use]
    pub fn cursors(&self) -> CursorMap {
        self.cursor_store.load()
    }

    /// Apply the configured chat selection. Configured names missing from
    /// the source are reported as skipped, never silently dropped.
    fn select_conversations(
        &self,
        available: Vec<Conversation>,
    ) -> (Vec<Conversation>, RunReport) {
        let mut report = RunReport::default();

        if self.config.backup.chats.is_empty() {
            return (available, report);
        }

        let mut selected = Vec::new();
        for name in &self.config.backup.chats {
            match available.iter().find(|c| &c.name == name) {
                Some(conv) => selected.push(conv.clone()),
                None => {
                    tracing::warn!(chat = %name, "configured conversation not found");
                    report
                        .chats
                        .push(ChatReport::skipped(name, "conversation not found"));
                }
            }
        }

        (selected, report)
    }

    /// Fetch, render and commit one conversation's delta.
    async fn backup_conversation(
        &self,
        ctx: RunContext,
        conv: &Conversation,
        prev_cursor: i64,
    ) -> Result<ConversationOutcome> {
        let paths = self
            .layout
            .path_for(&conv.name, ctx.run_date, self.renderer.extension());
        self.layout.ensure(&paths)?;

        let mut messages = self
            .source
            .get_messages(conv, prev_cursor, self.config.backup.page_limit)
            .await?;

        // Normalize: oldest-first, strictly above the cursor, no duplicates.
        messages.retain(|m| m.id > prev_cursor);
        messages.sort_by_key(|m| m.id);
        messages.dedup_by_key(|m| m.id);

        if messages.is_empty() {
            tracing::debug!(chat = %conv.name, "no new messages");
            return Ok(ConversationOutcome {
                report: ChatReport::empty(&conv.name),
                committed: None,
            });
        }

        let first_write = !paths.document.exists();

        let fetcher = MediaFetcher::new(
            Arc::clone(&self.source),
            self.config.backup.max_concurrent_fetches,
        );
        let media = fetcher.fetch_batch(&messages, &paths.media_dir).await;

        self.renderer
            .append_batch(&paths.document, &conv.name, &messages, &media, first_write)?;

        // Commit point: the append succeeded, so the cursor may advance.
        let last_id = messages.last().map_or(prev_cursor, |m| m.id);

        let media_written = media
            .iter()
            .filter(|o| matches!(o, crate::domain::MediaOutcome::Fetched(_)))
            .count();
        let media_failed = media
            .iter()
            .filter(|o| matches!(o, crate::domain::MediaOutcome::Failed(_)))
            .count();

        tracing::info!(
            chat = %conv.name,
            messages = messages.len(),
            media = media_written,
            media_failed,
            last_id,
            "conversation backed up"
        );

        Ok(ConversationOutcome {
            report: ChatReport {
                conversation: conv.name.clone(),
                messages_written: messages.len(),
                media_written,
                media_failed,
                skipped: None,
            },
            committed: Some((last_id, paths.document)),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::TempDir;
    use tokio::sync::Notify;

    use crate::domain::{AttachmentRef, Message, PathConfig};

    use super::*;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
    }

    fn message(id: i64, text: &str, attachment: Option<&str>) -> Message {
        Message {
            id,
            date: Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap(),
            sender: "alice".to_string(),
            outgoing: false,
            text: Some(text.to_string()),
            attachment: attachment.map(AttachmentRef::new),
        }
    }

    /// In-memory source with failure injection and a start gate.
    #[derive(Default)]
    struct FakeSource {
        conversations: Vec<Conversation>,
        messages: Mutex<HashMap<String, Vec<Message>>>,
        fail_messages_for: Vec<String>,
        fail_attachments: bool,
        list_gate: Option<Arc<Notify>>,
    }

    impl FakeSource {
        fn with_chat(name: &str, messages: Vec<Message>) -> Self {
            let mut source = Self::default();
            source.add_chat(name, messages);
            source
        }

        fn add_chat(&mut self, name: &str, messages: Vec<Message>) {
            let id = self.conversations.len() as i64 + 1;
            self.conversations.push(Conversation::new(id, name));
            self.messages
                .lock()
                .unwrap()
                .insert(name.to_string(), messages);
        }
    }

    #[async_trait]
    impl MessageSource for FakeSource {
        async fn list_conversations(&self) -> crate::domain::Result<Vec<Conversation>> {
            if let Some(gate) = &self.list_gate {
                gate.notified().await;
            }
            Ok(self.conversations.clone())
        }

        async fn get_messages(
            &self,
            conversation: &Conversation,
            min_id: i64,
            limit: usize,
        ) -> crate::domain::Result<Vec<Message>> {
            if self.fail_messages_for.contains(&conversation.name) {
                return Err(BackupError::source_unavailable("flood wait"));
            }

            let store = self.messages.lock().unwrap();
            let mut delta: Vec<Message> = store
                .get(&conversation.name)
                .map(|msgs| msgs.iter().filter(|m| m.id > min_id).cloned().collect())
                .unwrap_or_default();
            delta.sort_by_key(|m| m.id);
            delta.truncate(limit);
            // Newest-first, the way a remote service typically pages.
            delta.reverse();
            Ok(delta)
        }

        async fn download_attachment(
            &self,
            attachment: &AttachmentRef,
            dest_dir: &Path,
        ) -> crate::domain::Result<std::path::PathBuf> {
            if self.fail_attachments {
                return Err(BackupError::AttachmentFetchFailed {
                    message: "file reference expired".to_string(),
                });
            }
            let path = dest_dir.join(&attachment.0);
            fs::write(&path, b"media-bytes").map_err(|e| BackupError::io("write", e))?;
            Ok(path)
        }
    }

    struct Harness {
        _tmp: TempDir,
        engine: BackupEngine<FakeSource>,
        config: AppConfig,
    }

    fn harness(source: FakeSource, format: &str, chats: Vec<String>) -> Harness {
        let tmp = TempDir::new().unwrap();
        let mut config = AppConfig {
            paths: PathConfig {
                data_dir: Some(tmp.path().join("data")),
                output_root: Some(tmp.path().join("out")),
            },
            ..AppConfig::default()
        };
        config.backup.format = format.to_string();
        config.backup.chats = chats;

        let engine = BackupEngine::new(config.clone(), Arc::new(source)).unwrap();
        Harness {
            _tmp: tmp,
            engine,
            config,
        }
    }

    fn document_path(h: &Harness, chat: &str, ext: &str) -> std::path::PathBuf {
        OutputLayout::new(h.config.output_root()).path_for(chat, run_date(), ext).document
    }

    #[tokio::test]
    async fn scenario_delta_above_cursor_commits_and_fetches_media() {
        let source = FakeSource::with_chat(
            "alice",
            vec![
                message(100, "already backed up", None),
                message(101, "new text", None),
                message(102, "new photo", Some("photo.jpg")),
            ],
        );
        let h = harness(source, "html", vec![]);

        let mut seed = CursorMap::new();
        seed.insert("alice".to_string(), 100);
        CursorStore::new(h.config.cursor_file_path()).save(&seed).unwrap();

        let report = h.engine.run_for(RunContext::for_date(run_date())).await.unwrap();

        assert_eq!(report.total_messages(), 2);
        assert_eq!(report.total_media(), 1);
        assert_eq!(report.total_media_failed(), 0);
        assert_eq!(h.engine.cursors().get("alice"), Some(&102));

        let doc = fs::read_to_string(document_path(&h, "alice", "html")).unwrap();
        assert!(doc.contains("new text"));
        assert!(doc.contains("new photo"));
        assert!(!doc.contains("already backed up"));
        assert!(doc.contains("src=\"media/photo.jpg\""));

        let media_file = document_path(&h, "alice", "html")
            .parent()
            .unwrap()
            .join("media/photo.jpg");
        assert!(media_file.exists());
    }

    #[tokio::test]
    async fn second_run_with_no_new_messages_writes_nothing() {
        let source = FakeSource::with_chat("alice", vec![message(1, "only", None)]);
        let h = harness(source, "html", vec![]);
        let ctx = RunContext::for_date(run_date());

        h.engine.run_for(ctx).await.unwrap();
        let doc = document_path(&h, "alice", "html");
        let size_after_first = fs::metadata(&doc).unwrap().len();
        let cursors_after_first = h.engine.cursors();

        let report = h.engine.run_for(ctx).await.unwrap();

        assert_eq!(report.total_messages(), 0);
        assert_eq!(fs::metadata(&doc).unwrap().len(), size_after_first);
        assert_eq!(h.engine.cursors(), cursors_after_first);
    }

    #[tokio::test]
    async fn unordered_source_batches_render_oldest_first() {
        let mut source = FakeSource::default();
        // Stored out of order; get_messages also reverses.
        source.add_chat(
            "alice",
            vec![
                message(3, "m3", None),
                message(1, "m1", None),
                message(2, "m2", None),
            ],
        );
        let h = harness(source, "text", vec![]);

        h.engine.run_for(RunContext::for_date(run_date())).await.unwrap();

        let doc = fs::read_to_string(document_path(&h, "alice", "txt")).unwrap();
        let p1 = doc.find("m1").unwrap();
        let p2 = doc.find("m2").unwrap();
        let p3 = doc.find("m3").unwrap();
        assert!(p1 < p2 && p2 < p3);
        assert_eq!(h.engine.cursors().get("alice"), Some(&3));
    }

    #[tokio::test]
    async fn source_failure_isolates_to_one_conversation() {
        let mut source = FakeSource::with_chat("alice", vec![message(1, "a1", None)]);
        source.add_chat("bob", vec![message(5, "b5", None)]);
        source.fail_messages_for = vec!["alice".to_string()];
        let h = harness(source, "text", vec![]);

        let report = h.engine.run_for(RunContext::for_date(run_date())).await.unwrap();

        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.total_messages(), 1);
        let cursors = h.engine.cursors();
        assert_eq!(cursors.get("bob"), Some(&5));
        assert!(!cursors.contains_key("alice"));
    }

    #[tokio::test]
    async fn attachment_failure_does_not_block_commit() {
        let mut source = FakeSource::with_chat(
            "alice",
            vec![message(1, "text ok", None), message(2, "pic gone", Some("x.jpg"))],
        );
        source.fail_attachments = true;
        let h = harness(source, "text", vec![]);

        let report = h.engine.run_for(RunContext::for_date(run_date())).await.unwrap();

        assert_eq!(report.total_messages(), 2);
        assert_eq!(report.total_media(), 0);
        assert_eq!(report.total_media_failed(), 1);
        assert_eq!(h.engine.cursors().get("alice"), Some(&2));

        let doc = fs::read_to_string(document_path(&h, "alice", "txt")).unwrap();
        assert!(doc.contains("[media unavailable]"));
    }

    #[tokio::test]
    async fn render_failure_leaves_cursor_for_retry_without_duplication() {
        let source = FakeSource::with_chat("alice", vec![message(1, "once-only", None)]);
        let h = harness(source, "text", vec![]);
        let ctx = RunContext::for_date(run_date());

        // Occupy the document path with a directory so the append fails.
        let doc = document_path(&h, "alice", "txt");
        fs::create_dir_all(&doc).unwrap();

        let result = h.engine.run_for(ctx).await;
        assert!(matches!(result, Err(BackupError::AllFailed { failed: 1 })));
        assert!(!h.engine.cursors().contains_key("alice"));

        // Recover and retry: the same delta is re-covered exactly once.
        fs::remove_dir(&doc).unwrap();
        let report = h.engine.run_for(ctx).await.unwrap();
        assert_eq!(report.total_messages(), 1);

        let content = fs::read_to_string(&doc).unwrap();
        assert_eq!(content.matches("once-only").count(), 1);
        assert_eq!(h.engine.cursors().get("alice"), Some(&1));
    }

    #[tokio::test]
    async fn cursor_never_decreases_across_runs() {
        let source = FakeSource::with_chat("alice", vec![message(7, "m7", None)]);
        let h = harness(source, "text", vec![]);
        let ctx = RunContext::for_date(run_date());

        h.engine.run_for(ctx).await.unwrap();
        let before = *h.engine.cursors().get("alice").unwrap();

        h.engine.run_for(ctx).await.unwrap();
        let after = *h.engine.cursors().get("alice").unwrap();

        assert!(after >= before);
        assert_eq!(after, 7);
    }

    #[tokio::test]
    async fn backlog_larger_than_page_limit_drains_over_runs() {
        let messages: Vec<Message> = (1..=5).map(|i| message(i, &format!("m{i}"), None)).collect();
        let source = FakeSource::with_chat("alice", messages);
        let mut h = harness(source, "text", vec![]);
        h.engine.config.backup.page_limit = 2;
        let ctx = RunContext::for_date(run_date());

        let first = h.engine.run_for(ctx).await.unwrap();
        assert_eq!(first.total_messages(), 2);
        assert_eq!(h.engine.cursors().get("alice"), Some(&2));

        let second = h.engine.run_for(ctx).await.unwrap();
        assert_eq!(second.total_messages(), 2);
        assert_eq!(h.engine.cursors().get("alice"), Some(&4));

        let third = h.engine.run_for(ctx).await.unwrap();
        assert_eq!(third.total_messages(), 1);
        assert_eq!(h.engine.cursors().get("alice"), Some(&5));
    }

    #[tokio::test]
    async fn configured_selection_limits_and_reports_missing() {
        let mut source = FakeSource::with_chat("alice", vec![message(1, "a", None)]);
        source.add_chat("bob", vec![message(1, "b", None)]);
        let h = harness(
            source,
            "text",
            vec!["bob".to_string(), "carol".to_string()],
        );

        let report = h.engine.run_for(RunContext::for_date(run_date())).await.unwrap();

        let cursors = h.engine.cursors();
        assert!(cursors.contains_key("bob"));
        assert!(!cursors.contains_key("alice"));
        assert!(report
            .chats
            .iter()
            .any(|c| c.conversation == "carol" && c.skipped.is_some()));
    }

    #[tokio::test]
    async fn cursor_persist_failure_is_a_warning_not_a_run_failure() {
        let source = FakeSource::with_chat("alice", vec![message(1, "kept", None)]);
        let h = harness(source, "text", vec![]);

        // Occupy the cursor file path with a directory so the rename fails.
        let cursor_path = h.config.cursor_file_path();
        fs::create_dir_all(&cursor_path).unwrap();

        let report = h.engine.run_for(RunContext::for_date(run_date())).await.unwrap();

        assert_eq!(report.total_messages(), 1);
        assert!(report.cursor_warning.is_some());

        // The batch was still rendered; only progress tracking was lost.
        let doc = fs::read_to_string(document_path(&h, "alice", "txt")).unwrap();
        assert!(doc.contains("kept"));
        assert!(cursor_path.is_dir());
    }

    #[tokio::test]
    async fn selection_of_only_missing_names_is_not_a_run_failure() {
        let source = FakeSource::with_chat("alice", vec![message(1, "a", None)]);
        let h = harness(source, "text", vec!["typo".to_string()]);

        let report = h.engine.run_for(RunContext::for_date(run_date())).await.unwrap();

        assert_eq!(report.total_messages(), 0);
        assert_eq!(report.skipped_count(), 1);
        assert!(report
            .chats
            .iter()
            .any(|c| c.conversation == "typo" && c.skipped.is_some()));
    }

    #[tokio::test]
    async fn all_conversations_failing_fails_the_run() {
        let mut source = FakeSource::with_chat("alice", vec![message(1, "a", None)]);
        source.fail_messages_for = vec!["alice".to_string()];
        let h = harness(source, "text", vec![]);

        let result = h.engine.run_for(RunContext::for_date(run_date())).await;
        assert!(matches!(result, Err(BackupError::AllFailed { failed: 1 })));
    }

    #[tokio::test]
    async fn overlapping_runs_are_refused() {
        let gate = Arc::new(Notify::new());
        let mut source = FakeSource::with_chat("alice", vec![message(1, "a", None)]);
        source.list_gate = Some(Arc::clone(&gate));
        let h = harness(source, "text", vec![]);

        let engine = Arc::new(h.engine);
        let first = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run_for(RunContext::for_date(run_date())).await })
        };
        // Let the first run acquire the lock and park on the gate.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let second = engine.run_for(RunContext::for_date(run_date())).await;
        assert!(matches!(second, Err(BackupError::RunInProgress)));

        gate.notify_one();
        first.await.unwrap().unwrap();

        // Lock released: a new run proceeds (and finds nothing new).
        gate.notify_one();
        let third = engine.run_for(RunContext::for_date(run_date())).await.unwrap();
        assert_eq!(third.total_messages(), 0);
    }
}
