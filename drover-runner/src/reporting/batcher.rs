//! Keyed batching with size and age windows
//!
//! Records are handed to a flusher task over an unbounded channel, so
//! [`Batcher::add`] never blocks the caller. The flusher owns every buffer:
//! it groups records per key, publishes a key's batch once it holds
//! `max_records` records or its oldest record is `max_age` old, and retries a
//! failed publish forever. Records of one key are published in insertion
//! order.

use async_trait::async_trait;
use drover_client::ControlPlane;
use drover_core::domain::status::Partitioned;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, error, info, warn};

/// Delivers one batch for one key
#[async_trait]
pub trait Publish<K, V>: Send + Sync {
    async fn publish(
        &self,
        plane: &dyn ControlPlane,
        key: &K,
        batch: Vec<V>,
    ) -> drover_client::Result<()>;
}

/// Flush thresholds of a pipeline
#[derive(Debug, Clone, Copy)]
pub struct BatchPolicy {
    pub max_records: usize,
    pub max_age: Duration,
    /// Sleep between failed publish attempts
    pub retry_delay: Duration,
}

impl BatchPolicy {
    pub fn new(max_records: usize, max_age: Duration) -> Self {
        Self {
            max_records: max_records.max(1),
            max_age,
            retry_delay: Duration::from_secs(1),
        }
    }
}

enum Message<K, V> {
    Record(K, V),
    Shutdown,
}

struct Buffer<V> {
    records: Vec<V>,
    oldest: Instant,
}

/// Batching conduit for one record kind
pub struct Batcher<K, V> {
    name: &'static str,
    tx: mpsc::UnboundedSender<Message<K, V>>,
    closed: AtomicBool,
    failed_attempts: Arc<AtomicU64>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> Batcher<K, V>
where
    K: Ord + Clone + std::fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Starts the flusher task
    pub fn start<P>(
        name: &'static str,
        policy: BatchPolicy,
        plane: Arc<dyn ControlPlane>,
        publisher: P,
    ) -> Self
    where
        P: Publish<K, V> + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let failed_attempts = Arc::new(AtomicU64::new(0));

        let flusher = Flusher {
            name,
            policy,
            plane,
            publisher,
            buffers: BTreeMap::new(),
            failed_attempts: Arc::clone(&failed_attempts),
        };
        let handle = tokio::spawn(flusher.run(rx));

        Self {
            name,
            tx,
            closed: AtomicBool::new(false),
            failed_attempts,
            flusher: Mutex::new(Some(handle)),
        }
    }

    /// Queues a record; returns `false` once the pipeline is shut down
    pub fn add(&self, key: K, record: V) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            warn!("Pipeline {} is shut down, dropping record for {}", self.name, key);
            return false;
        }

        if self.tx.send(Message::Record(key, record)).is_err() {
            warn!("Pipeline {} flusher is gone, dropping record", self.name);
            return false;
        }

        true
    }

    /// Publish attempts that failed and were retried
    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts.load(Ordering::SeqCst)
    }

    /// Publishes every buffered record, then stops the flusher
    ///
    /// Records already queued when this is called are delivered too.
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // A send error means the flusher already exited
        let _ = self.tx.send(Message::Shutdown);

        let handle = self
            .flusher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Pipeline {} flusher panicked: {}", self.name, e);
            }
            info!(
                "Pipeline {} drained ({} failed publish attempt(s))",
                self.name,
                self.failed_attempts()
            );
        }
    }
}

impl<V> Batcher<String, V>
where
    V: Partitioned + Clone + Send + Sync + 'static,
{
    /// Queues a record under its own partition key
    pub fn push(&self, record: V) -> bool {
        let key = record.partition_key();
        self.add(key, record)
    }
}

struct Flusher<K, V, P> {
    name: &'static str,
    policy: BatchPolicy,
    plane: Arc<dyn ControlPlane>,
    publisher: P,
    buffers: BTreeMap<K, Buffer<V>>,
    failed_attempts: Arc<AtomicU64>,
}

impl<K, V, P> Flusher<K, V, P>
where
    K: Ord + Clone + std::fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    P: Publish<K, V>,
{
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Message<K, V>>) {
        loop {
            let deadline = self.next_deadline();

            tokio::select! {
                message = rx.recv() => match message {
                    Some(Message::Record(key, record)) => self.buffer(key, record).await,
                    Some(Message::Shutdown) | None => break,
                },
                _ = sleep_until(deadline), if deadline.is_some() => {
                    self.flush_expired().await;
                }
            }
        }

        // Collect stragglers that raced with shutdown
        rx.close();
        while let Some(message) = rx.recv().await {
            if let Message::Record(key, record) = message {
                self.buffers
                    .entry(key)
                    .or_insert_with(|| Buffer {
                        records: Vec::new(),
                        oldest: Instant::now(),
                    })
                    .records
                    .push(record);
            }
        }

        let keys: Vec<K> = self.buffers.keys().cloned().collect();
        for key in keys {
            self.flush_key(&key).await;
        }
    }

    async fn buffer(&mut self, key: K, record: V) {
        let buffer = self.buffers.entry(key.clone()).or_insert_with(|| Buffer {
            records: Vec::new(),
            oldest: Instant::now(),
        });
        buffer.records.push(record);

        if buffer.records.len() >= self.policy.max_records {
            self.flush_key(&key).await;
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.buffers
            .values()
            .map(|buffer| buffer.oldest + self.policy.max_age)
            .min()
    }

    async fn flush_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<K> = self
            .buffers
            .iter()
            .filter(|(_, buffer)| buffer.oldest + self.policy.max_age <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            self.flush_key(&key).await;
        }
    }

    async fn flush_key(&mut self, key: &K) {
        let Some(buffer) = self.buffers.remove(key) else {
            return;
        };

        let mut records = buffer.records;
        while !records.is_empty() {
            let rest = records.split_off(records.len().min(self.policy.max_records));
            self.publish_with_retry(key, records).await;
            records = rest;
        }
    }

    async fn publish_with_retry(&self, key: &K, batch: Vec<V>) {
        let size = batch.len();
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            match self
                .publisher
                .publish(self.plane.as_ref(), key, batch.clone())
                .await
            {
                Ok(()) => {
                    debug!(
                        "Pipeline {} published {} record(s) for {} (attempt {})",
                        self.name, size, key, attempt
                    );
                    return;
                }
                Err(e) if e.is_transport() => {
                    self.failed_attempts.fetch_add(1, Ordering::SeqCst);
                    warn!(
                        "Pipeline {} cannot reach the orchestrator, holding {} record(s) for {} (attempt {}): {}",
                        self.name, size, key, attempt, e
                    );
                    time::sleep(self.policy.retry_delay).await;
                }
                Err(e) => {
                    self.failed_attempts.fetch_add(1, Ordering::SeqCst);
                    error!(
                        "Pipeline {} batch of {} record(s) for {} was rejected (attempt {}): {}",
                        self.name, size, key, attempt, e
                    );
                    time::sleep(self.policy.retry_delay).await;
                }
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
