use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

/// Closure run against the worker's connection. It carries its own reply
/// channel, so the worker never sees result types.
type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

/// Shared by every `Database` clone; the last clone to go stops the worker.
struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            // tasks queued before Shutdown still run
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("attendance db worker already gone at shutdown: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("attendance db worker panicked: {join_err:?}");
            }
        }
    }
}

/// SQLite attendance store. Every query runs on one dedicated thread, so
/// statements issued through `execute` never interleave.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Option<Arc<PathBuf>>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let path_for_thread = db_path.clone();
        let inner = spawn_worker(move || {
            Connection::open(&path_for_thread).context("failed to open SQLite database")
        })?;

        info!("attendance database ready at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(inner),
            db_path: Some(Arc::new(db_path)),
        })
    }

    /// Private in-memory database, dropped with the last clone.
    ///
    /// Same worker and migrations as [`Database::new`]. Clones share the one
    /// connection, which is what keeps the in-memory data visible to all of
    /// them. Used by tests and throwaway runs.
    pub fn in_memory() -> Result<Self> {
        let inner = spawn_worker(|| {
            Connection::open_in_memory().context("failed to open in-memory SQLite database")
        })?;

        Ok(Self {
            inner: Arc::new(inner),
            db_path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref().map(PathBuf::as_path)
    }

    /// Runs `task` on the worker thread and awaits its result. Tasks run one
    /// at a time in submission order.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("attendance db caller went away before its reply");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("attendance db worker is not accepting work: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("attendance db worker dropped the task"))?
    }
}

/// Starts the worker thread and blocks until it has opened the connection
/// and migrated the schema. `open` runs on the worker itself because a
/// rusqlite `Connection` must stay on the thread that uses it. Open and
/// migration errors are returned here instead of surfacing on first query.
fn spawn_worker<O>(open: O) -> Result<DatabaseInner>
where
    O: FnOnce() -> Result<Connection> + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
    let (ready_tx, ready_rx) = mpsc::channel();

    let worker = thread::Builder::new()
        .name("checkin-db".into())
        .spawn(move || {
            let mut conn = match open() {
                Ok(connection) => connection,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            // best effort; in-memory databases keep their memory journal
            if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                warn!("attendance db stays on default journal mode: {err}");
            }

            let init_result =
                run_migrations(&mut conn).context("failed to run database migrations");
            if ready_tx.send(init_result).is_err() {
                error!("attendance db opener gave up before the worker was ready");
                return;
            }

            while let Ok(command) = command_rx.recv() {
                match command {
                    DbCommand::Execute(task) => {
                        task(&mut conn);
                    }
                    DbCommand::Shutdown => break,
                }
            }

            info!("attendance db worker stopped");
        })
        .with_context(|| "failed to spawn database worker thread")?;

    ready_rx
        .recv()
        .context("database worker exited before signaling readiness")??;

    Ok(DatabaseInner {
        sender: command_tx,
        worker: Mutex::new(Some(worker)),
    })
}
