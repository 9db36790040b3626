//! Metadata service: one tokio task owns the store.
//!
//! Callers talk to the task through a cloneable [`MetadataHandle`]. The task
//! waits on the next command or the pending flush deadline, whichever comes
//! first, so all store access and the debounced flush run on a single
//! logical thread without locking.

use crate::clock::Clock;
use crate::entry::Entry;
use crate::store::{MetadataStore, StoreStats};
use docmeta_common::{Error, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

enum Command {
    Get {
        uri: String,
        key: String,
        reply: oneshot::Sender<Option<String>>,
    },
    Set {
        uri: String,
        key: String,
        value: Option<String>,
    },
    Forget {
        uri: String,
        reply: oneshot::Sender<bool>,
    },
    Flush {
        reply: oneshot::Sender<Result<()>>,
    },
    Stats {
        reply: oneshot::Sender<StoreStats>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<(String, Entry)>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Running metadata service
pub struct MetadataService {
    handle: MetadataHandle,
    task: JoinHandle<()>,
}

impl MetadataService {
    /// Spawn the service task on the current tokio runtime
    pub fn start<C>(store: MetadataStore<C>) -> Self
    where
        C: Clock + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, rx));
        info!("Metadata service started");

        Self {
            handle: MetadataHandle { tx },
            task,
        }
    }

    /// Get a handle for issuing commands
    #[must_use]
    pub fn handle(&self) -> MetadataHandle {
        self.handle.clone()
    }

    /// Stop the service, flushing a pending mutation first
    pub async fn shutdown(self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        if self.handle.tx.send(Command::Shutdown { reply }).is_ok() {
            // An Err means the task already exited
            let _ = done.await;
        }
        drop(self.handle);

        self.task.await.map_err(|_| Error::ServiceClosed)?;
        info!("Metadata service stopped");
        Ok(())
    }
}

/// Cloneable handle to a [`MetadataService`]
#[derive(Clone)]
pub struct MetadataHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl MetadataHandle {
    /// Get the value of `key` for document `uri`
    pub async fn get(&self, uri: impl AsRef<str>, key: impl AsRef<str>) -> Result<Option<String>> {
        let (uri, key) = (uri.as_ref().to_string(), key.as_ref().to_string());
        self.request(|reply| Command::Get { uri, key, reply }).await
    }

    /// Set `key` for document `uri`, or remove it when `value` is `None`
    pub fn set(&self, uri: impl AsRef<str>, key: impl AsRef<str>, value: Option<&str>) -> Result<()> {
        self.tx
            .send(Command::Set {
                uri: uri.as_ref().to_string(),
                key: key.as_ref().to_string(),
                value: value.map(str::to_string),
            })
            .map_err(|_| Error::ServiceClosed)
    }

    /// Drop every attribute of document `uri`
    pub async fn forget(&self, uri: impl AsRef<str>) -> Result<bool> {
        let uri = uri.as_ref().to_string();
        self.request(|reply| Command::Forget { uri, reply }).await
    }

    /// Write the backing file now instead of waiting for the debounce delay
    pub async fn flush(&self) -> Result<()> {
        self.request(|reply| Command::Flush { reply }).await?
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Copy of every document, sorted by URI
    pub async fn snapshot(&self) -> Result<Vec<(String, Entry)>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| Error::ServiceClosed)?;
        rx.await.map_err(|_| Error::ServiceClosed)
    }
}

async fn run<C: Clock>(mut store: MetadataStore<C>, mut rx: mpsc::UnboundedReceiver<Command>) {
    loop {
        let deadline = store.next_deadline();
        let command = tokio::select! {
            command = rx.recv() => command,
            () = wait_until(deadline) => {
                store.poll_flush();
                continue;
            }
        };

        match command {
            Some(Command::Shutdown { reply }) => {
                store.shutdown();
                let _ = reply.send(());
                return;
            }
            Some(command) => execute(&mut store, command),
            None => break,
        }
    }

    debug!("All metadata handles dropped");
    store.shutdown();
}

fn execute<C: Clock>(store: &mut MetadataStore<C>, command: Command) {
    // Send errors mean the caller stopped waiting
    match command {
        Command::Get { uri, key, reply } => {
            let _ = reply.send(store.get(&uri, &key));
        }
        Command::Set { uri, key, value } => store.set(&uri, &key, value.as_deref()),
        Command::Forget { uri, reply } => {
            let _ = reply.send(store.forget(&uri));
        }
        Command::Flush { reply } => {
            let _ = reply.send(store.flush());
        }
        Command::Stats { reply } => {
            let _ = reply.send(store.stats());
        }
        Command::Snapshot { reply } => {
            store.ensure_loaded();
            let mut documents: Vec<_> = store
                .documents()
                .map(|(uri, entry)| (uri.to_string(), entry.clone()))
                .collect();
            documents.sort_unstable_by(|a, b| a.0.cmp(&b.0));
            let _ = reply.send(documents);
        }
        Command::Shutdown { .. } => unreachable!("handled by the run loop"),
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmeta_common::StoreConfig;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn start(dir: &Path) -> (MetadataService, MetadataHandle) {
        let service = MetadataService::start(MetadataStore::open(&StoreConfig::with_cache_dir(dir)));
        let handle = service.handle();
        (service, handle)
    }

    fn read_file(dir: &Path) -> String {
        std::fs::read_to_string(dir.join("gedit-metadata.xml")).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_and_set() {
        let dir = tempdir().unwrap();
        let (service, handle) = start(dir.path());

        assert_eq!(handle.get("X", "a").await.unwrap(), None);
        handle.set("X", "a", Some("1")).unwrap();
        assert_eq!(handle.get("X", "a").await.unwrap(), Some("1".to_string()));

        handle.set("X", "a", None).unwrap();
        assert_eq!(handle.get("X", "a").await.unwrap(), None);

        service.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_single_flush() {
        let dir = tempdir().unwrap();
        let (service, handle) = start(dir.path());

        handle.set("X", "a", Some("1")).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.set("X", "b", Some("2")).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(handle.stats().await.unwrap().flushes, 0);

        // First deadline is two seconds after the first set
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.stats().await.unwrap().flushes, 1);

        let contents = read_file(dir.path());
        assert!(contents.contains(r#"key="a""#));
        assert!(contents.contains(r#"key="b""#));

        // Idle service does not write again
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.stats().await.unwrap().flushes, 1);

        service.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending() {
        let dir = tempdir().unwrap();
        let (service, handle) = start(dir.path());

        handle.set("file:///notes.txt", "position", Some("42")).unwrap();
        service.shutdown().await.unwrap();

        assert!(read_file(dir.path()).contains(r#"value="42""#));
        assert!(matches!(
            handle.get("file:///notes.txt", "position").await,
            Err(Error::ServiceClosed)
        ));
        assert!(matches!(
            handle.set("file:///notes.txt", "position", Some("1")),
            Err(Error::ServiceClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_and_forget() {
        let dir = tempdir().unwrap();
        let (service, handle) = start(dir.path());

        handle.set("b", "k", Some("2")).unwrap();
        handle.set("a", "k", Some("1")).unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        let uris: Vec<_> = snapshot.iter().map(|(uri, _)| uri.as_str()).collect();
        assert_eq!(uris, ["a", "b"]);

        assert!(handle.forget("a").await.unwrap());
        assert!(!handle.forget("a").await.unwrap());
        handle.flush().await.unwrap();

        let contents = read_file(dir.path());
        assert!(!contents.contains(r#"uri="a""#));
        assert!(contents.contains(r#"uri="b""#));

        service.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_all_handles_flushes_pending() {
        let dir = tempdir().unwrap();
        let (service, handle) = start(dir.path());

        handle.set("X", "position", Some("7")).unwrap();

        let MetadataService {
            handle: service_handle,
            task,
        } = service;
        drop(service_handle);
        drop(handle);
        task.await.unwrap();

        assert!(read_file(dir.path()).contains(r#"value="7""#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_reads_previous_session() {
        let dir = tempdir().unwrap();

        let (service, handle) = start(dir.path());
        handle.set("X", "encoding", Some("ISO-8859-15")).unwrap();
        service.shutdown().await.unwrap();

        let (service, handle) = start(dir.path());
        assert_eq!(
            handle.get("X", "encoding").await.unwrap(),
            Some("ISO-8859-15".to_string())
        );
        assert_eq!(handle.stats().await.unwrap().loads, 1);
        service.shutdown().await.unwrap();
    }
}
