//! Background conversion
//!
//! A [`ConversionWorker`] fetches the library and converts a batch off the
//! caller's task. Log lines, progress and the final summary arrive as
//! [`WorkerEvent`]s. Every text event passes through [`ApiKey::redact`] first.
//!
//! Cancellation is cooperative: [`WorkerHandle::request_cancel`] sets a flag
//! the batch checks before each document and again before each part and
//! before writing. [`WorkerHandle::cancel`] additionally aborts the task once
//! a grace period runs out. The blocking thread then drops out at its next
//! check, so the interrupted document writes no output.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use zotero_client::{ApiKey, LibraryRef, ZoteroClient, DEFAULT_BASE_URL};

use crate::batch::{run_batch, BatchSummary};
use crate::config::{CiteMigrateConfig, MatchWeights};
use crate::error::{CiteMigrateError, Result};
use crate::matcher::{LibraryIndex, LibraryMatcher};
use crate::observer::ConversionObserver;
use crate::pipeline::ConversionOptions;

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Log(String),
    Progress { current: usize, total: usize },
    Finished(BatchSummary),
    Failed(String),
}

/// Everything a background run needs
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub inputs: Vec<PathBuf>,
    pub api_key: ApiKey,
    pub base_url: String,
    pub options: ConversionOptions,
    pub weights: MatchWeights,
    /// Skip the library fetch and match against these items
    pub prefetched: Option<LibraryIndex>,
}

impl ConversionJob {
    pub fn new(inputs: Vec<PathBuf>, library: LibraryRef, api_key: ApiKey) -> Self {
        Self {
            inputs,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            options: ConversionOptions::new(library),
            weights: MatchWeights::default(),
            prefetched: None,
        }
    }

    pub fn from_config(inputs: Vec<PathBuf>, config: &CiteMigrateConfig) -> Result<Self> {
        Ok(Self {
            inputs,
            api_key: config.api_key()?,
            base_url: config.library.base_url.clone(),
            options: ConversionOptions::from_config(config)?,
            weights: config.matching.clone(),
            prefetched: None,
        })
    }

    pub fn with_index(mut self, index: LibraryIndex) -> Self {
        self.prefetched = Some(index);
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn library(&self) -> &LibraryRef {
        &self.options.library
    }
}

/// Observer that turns conversion output into redacted [`WorkerEvent`]s
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<WorkerEvent>,
    api_key: ApiKey,
}

impl ChannelObserver {
    pub fn new(sender: mpsc::UnboundedSender<WorkerEvent>, api_key: ApiKey) -> Self {
        Self { sender, api_key }
    }

    fn send(&self, event: WorkerEvent) {
        // The receiver may be gone; the run continues regardless
        let _ = self.sender.send(event);
    }
}

impl ConversionObserver for ChannelObserver {
    fn log(&self, message: &str) {
        self.send(WorkerEvent::Log(self.api_key.redact(message)));
    }

    fn progress(&self, current: usize, total: usize) {
        self.send(WorkerEvent::Progress { current, total });
    }
}

pub struct ConversionWorker;

impl ConversionWorker {
    /// Start `job` on the current tokio runtime
    pub fn spawn(job: ConversionJob) -> WorkerHandle {
        let (sender, events) = mpsc::unbounded_channel();
        let cancel = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn({
            let cancel = Arc::clone(&cancel);
            async move {
                let api_key = job.api_key.clone();
                let event = match run_job(job, sender.clone(), cancel).await {
                    Ok(summary) => WorkerEvent::Finished(summary),
                    Err(e) => {
                        let message = api_key.redact(&e.to_string());
                        tracing::error!(error = %message, "Conversion worker failed");
                        WorkerEvent::Failed(message)
                    }
                };
                let _ = sender.send(event);
            }
        });

        WorkerHandle {
            events,
            cancel,
            task,
        }
    }
}

async fn run_job(
    job: ConversionJob,
    sender: mpsc::UnboundedSender<WorkerEvent>,
    cancel: Arc<AtomicBool>,
) -> Result<BatchSummary> {
    let ConversionJob {
        inputs,
        api_key,
        base_url,
        options,
        weights,
        prefetched,
    } = job;
    let observer = ChannelObserver::new(sender, api_key.clone());

    let index = match prefetched {
        Some(index) => index,
        None => {
            observer.log("Connecting to Zotero...");
            let client =
                ZoteroClient::new(options.library.clone(), api_key)?.with_base_url(&base_url)?;
            LibraryIndex::fetch(&client).await?
        }
    };
    observer.log(&format!("Found {} items in Zotero library.", index.len()));

    tokio::task::spawn_blocking(move || {
        let mut matcher = LibraryMatcher::with_weights(index, weights);
        run_batch(&inputs, &mut matcher, &options, &observer, &cancel)
    })
    .await
    .map_err(|e| CiteMigrateError::Worker(e.to_string()))
}

/// Caller's side of a running [`ConversionWorker`]
pub struct WorkerHandle {
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    cancel: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Next event, or `None` once the worker is done and the queue drained
    pub async fn next_event(&mut self) -> Option<WorkerEvent> {
        self.events.recv().await
    }

    /// Non-blocking poll for the UI thread
    pub fn try_next_event(&mut self) -> Option<WorkerEvent> {
        self.events.try_recv().ok()
    }

    /// Stop at the next check, leaving the current document unwritten
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request cancellation and wait up to `grace` for the worker to stop.
    /// Returns false if the task had to be aborted.
    pub async fn cancel(mut self, grace: Duration) -> bool {
        self.request_cancel();
        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!("Conversion worker did not stop in time, aborting");
                self.task.abort();
                false
            }
        }
    }

    /// Wait for the worker and collect all remaining events
    pub async fn join(mut self) -> Result<Vec<WorkerEvent>> {
        let mut collected = Vec::new();
        while let Some(event) = self.events.recv().await {
            collected.push(event);
        }
        self.task
            .await
            .map_err(|e| CiteMigrateError::Worker(e.to_string()))?;
        Ok(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zotero_client::{Creator, ZoteroItem};

    fn index() -> LibraryIndex {
        LibraryIndex::new(vec![ZoteroItem::new("ABCD1234", "book")
            .with_title("Sample")
            .with_date("2019")
            .with_creator(Creator::person("author", "Smith", "Jane"))])
    }

    #[test]
    fn test_channel_observer_redacts() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let observer = ChannelObserver::new(sender, ApiKey::new("SECRETKEY123"));
        observer.log("request with SECRETKEY123 failed");
        observer.progress(1, 3);

        assert_eq!(
            receiver.try_recv().unwrap(),
            WorkerEvent::Log("request with SECR**** failed".into())
        );
        assert_eq!(
            receiver.try_recv().unwrap(),
            WorkerEvent::Progress { current: 1, total: 3 }
        );
    }

    #[tokio::test]
    async fn test_prefetched_empty_batch_finishes() {
        let job = ConversionJob::new(Vec::new(), LibraryRef::user("1"), ApiKey::new("k"))
            .with_index(index());
        let events = ConversionWorker::spawn(job).join().await.unwrap();

        assert_eq!(
            events.first(),
            Some(&WorkerEvent::Log("Found 1 items in Zotero library.".into()))
        );
        match events.last() {
            Some(WorkerEvent::Finished(summary)) => {
                assert_eq!(summary.total_files, 0);
                assert!(!summary.cancelled);
            }
            other => panic!("expected Finished, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_library_reports_redacted_failure() {
        let key = "UNREACHABLEKEY99";
        let job = ConversionJob::new(Vec::new(), LibraryRef::user("1"), ApiKey::new(key))
            .with_base_url("http://127.0.0.1:9");
        let events = ConversionWorker::spawn(job).join().await.unwrap();

        let failure = events.iter().find_map(|e| match e {
            WorkerEvent::Failed(message) => Some(message.clone()),
            _ => None,
        });
        let failure = failure.expect("worker should fail");
        assert!(failure.contains("Could not connect to Zotero"));
        assert!(events.iter().all(|e| !format!("{:?}", e).contains(key)));
    }

    #[tokio::test]
    async fn test_cancel_after_finish() {
        let job = ConversionJob::new(Vec::new(), LibraryRef::user("1"), ApiKey::new("k"))
            .with_index(index());
        let mut handle = ConversionWorker::spawn(job);
        while let Some(event) = handle.next_event().await {
            if matches!(event, WorkerEvent::Finished(_)) {
                break;
            }
        }
        assert!(handle.cancel(Duration::from_secs(1)).await);
    }
}
