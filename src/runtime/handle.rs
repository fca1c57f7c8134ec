use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::{
    sync::{
        Mutex, broadcast,
        mpsc::{self, PermitIterator},
        oneshot,
    },
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

use crate::{
    core::store::{OwnershipStore, StoreError, StoreSnapshotV1},
    op::{Op, StoredOp},
    owner::{OwnershipDraft, OwnershipPatch, OwnershipRecord},
    persist::{OpSink, PersistError},
    types::{GemstoneId, OpSeq, OwnershipId},
};

use super::events::LedgerEvent;

/// Failure reported by a [`LedgerHandle`] call.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The store rejected the mutation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The journal rejected or failed the mutation.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// The ledger task is gone.
    #[error("ledger runtime channel closed")]
    ChannelClosed,
}

/// Tuning for the ledger task and its persistence worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Flush the journal as soon as a record is added.
    pub flush_on_add: bool,
    /// Ops the worker gathers before appending.
    pub batch_max_ops: usize,
    /// Longest a gathered batch waits before appending.
    pub batch_max_latency_ms: u64,
    /// Bound of the persistence queue, raised to 2 so a transfer fits. A mutation that does not
    /// fit is rejected before it is applied.
    pub persist_queue_bound: usize,
    /// Mutations between automatic snapshots; 0 disables them.
    pub snapshot_every_ops: usize,
    /// Drop journaled ops covered by each new snapshot.
    pub compact_after_snapshot: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_on_add: true,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
            snapshot_every_ops: 2000,
            compact_after_snapshot: false,
        }
    }
}

/// Cloneable async handle to the single-writer ledger task.
#[derive(Clone)]
pub struct LedgerHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<LedgerEvent>,
}

enum Command {
    Add {
        gemstone: GemstoneId,
        draft: OwnershipDraft,
        transfer: bool,
        resp: oneshot::Sender<Result<OwnershipId, RuntimeError>>,
    },
    Update {
        id: OwnershipId,
        patch: OwnershipPatch,
        resp: oneshot::Sender<Result<OwnershipRecord, RuntimeError>>,
    },
    Remove {
        id: OwnershipId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Get {
        id: OwnershipId,
        resp: oneshot::Sender<Option<OwnershipRecord>>,
    },
    List {
        gemstone: GemstoneId,
        resp: oneshot::Sender<Vec<OwnershipRecord>>,
    },
    Flush {
        resp: oneshot::Sender<Result<OpSeq, RuntimeError>>,
    },
    Checkpoint {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum PersistMsg {
    Op(StoredOp),
    Flush {
        resp: oneshot::Sender<Result<OpSeq, PersistError>>,
    },
    Checkpoint {
        snapshot: StoreSnapshotV1,
        last_seq: OpSeq,
        compact: bool,
        resp: oneshot::Sender<Result<(), PersistError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Moves `store` into a background task and returns a handle to it.
///
/// Without a sink, mutations are reported durable immediately.
pub fn spawn_ledger(
    store: OwnershipStore,
    sink: Option<Box<dyn OpSink>>,
    config: RuntimeConfig,
) -> LedgerHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<LedgerEvent>(1024);

    let (persist_tx_opt, mut durable_rx) = if let Some(sink) = sink {
        let (persist_tx, persist_rx) = mpsc::channel::<PersistMsg>(config.persist_queue_bound.max(2));
        let (durable_tx, durable_rx) = mpsc::unbounded_channel::<Result<OpSeq, PersistError>>();
        spawn_persistence_worker(sink, persist_rx, durable_tx, config.clone());
        (Some(persist_tx), Some(durable_rx))
    } else {
        (None, None)
    };

    info!(
        records = store.len(),
        persistent = persist_tx_opt.is_some(),
        "ownership ledger started"
    );

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let mut store = store;
        let mut ops_since_snapshot = 0usize;

        loop {
            if let Some(rx) = durable_rx.as_mut() {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break; };
                        let done = handle_command(
                            cmd,
                            &mut store,
                            &events_tx_loop,
                            persist_tx_opt.as_ref(),
                            &config,
                            &mut ops_since_snapshot,
                        ).await;

                        if done {
                            break;
                        }
                    }
                    durable = rx.recv() => {
                        match durable {
                            Some(Ok(op_seq)) => {
                                let _ = events_tx_loop.send(LedgerEvent::DurableUpTo { op_seq });
                            }
                            Some(Err(err)) => warn!(error = %err, "journal append failed"),
                            None => {}
                        }
                    }
                }
            } else {
                let Some(cmd) = cmd_rx.recv().await else { break; };
                let done = handle_command(
                    cmd,
                    &mut store,
                    &events_tx_loop,
                    persist_tx_opt.as_ref(),
                    &config,
                    &mut ops_since_snapshot,
                ).await;
                if done {
                    break;
                }
            }
        }

        info!("ownership ledger stopped");
    });

    LedgerHandle {
        cmd_tx,
        events_tx,
    }
}

impl LedgerHandle {
    /// Receiver for ledger events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events_tx.subscribe()
    }

    /// Adds a record; see [`OwnershipStore::add`].
    pub async fn add(
        &self,
        gemstone: GemstoneId,
        draft: OwnershipDraft,
        transfer: bool,
    ) -> Result<OwnershipId, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Add {
            gemstone,
            draft,
            transfer,
            resp: tx,
        })
        .await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Updates a record and returns its new state.
    pub async fn update(
        &self,
        id: OwnershipId,
        patch: OwnershipPatch,
    ) -> Result<OwnershipRecord, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Update { id, patch, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Deletes a record without touching its neighbors.
    pub async fn remove(&self, id: OwnershipId) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Remove { id, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Record `id`, if present.
    pub async fn get(&self, id: OwnershipId) -> Result<Option<OwnershipRecord>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Get { id, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Records of `gemstone`, unsorted.
    pub async fn list(&self, gemstone: GemstoneId) -> Result<Vec<OwnershipRecord>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::List { gemstone, resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Waits until every applied op is journaled and returns the last durable sequence.
    pub async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Writes a snapshot of the current state.
    pub async fn checkpoint(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Checkpoint { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Flushes the journal and stops the ledger task.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    async fn send(&self, cmd: Command) -> Result<(), RuntimeError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }
}

async fn handle_command(
    cmd: Command,
    store: &mut OwnershipStore,
    events_tx: &broadcast::Sender<LedgerEvent>,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    config: &RuntimeConfig,
    ops_since_snapshot: &mut usize,
) -> bool {
    match cmd {
        Command::Add {
            gemstone,
            draft,
            transfer,
            resp,
        } => {
            debug!(gemstone, transfer, "add command");
            let journal_ops = if transfer && store.current_owner(gemstone).is_some() {
                2
            } else {
                1
            };
            let res = reserve_persist(persist_tx, journal_ops).and_then(|permits| {
                let (id, ops) = store.add(gemstone, draft, transfer)?;
                let events: Vec<LedgerEvent> = ops
                    .iter()
                    .map(|stored| match &stored.op {
                        Op::Insert { record } => LedgerEvent::Added {
                            gemstone,
                            id: record.id,
                        },
                        other => LedgerEvent::Updated {
                            gemstone,
                            id: other.ownership_id(),
                        },
                    })
                    .collect();
                publish(store, events_tx, permits);
                for event in events {
                    let _ = events_tx.send(event);
                }
                Ok(id)
            });
            if res.is_ok() {
                *ops_since_snapshot += 1;
                maybe_auto_checkpoint(store, persist_tx, config, ops_since_snapshot).await;
            }
            let _ = resp.send(res);
        }
        Command::Update { id, patch, resp } => {
            debug!(id, "update command");
            let res = reserve_persist(persist_tx, 1).and_then(|permits| {
                store.update(id, patch)?;
                publish(store, events_tx, permits);
                let record = store
                    .get_cloned(id)
                    .ok_or(RuntimeError::Store(StoreError::MissingRecord(id)))?;
                let _ = events_tx.send(LedgerEvent::Updated {
                    gemstone: record.gemstone_id,
                    id,
                });
                Ok(record)
            });
            if res.is_ok() {
                *ops_since_snapshot += 1;
                maybe_auto_checkpoint(store, persist_tx, config, ops_since_snapshot).await;
            }
            let _ = resp.send(res);
        }
        Command::Remove { id, resp } => {
            debug!(id, "remove command");
            let res = reserve_persist(persist_tx, 1).and_then(|permits| {
                let stored = store.remove(id)?;
                let gemstone = stored.op.gemstone_id().unwrap_or_default();
                publish(store, events_tx, permits);
                let _ = events_tx.send(LedgerEvent::Removed { gemstone, id });
                Ok(())
            });
            if res.is_ok() {
                *ops_since_snapshot += 1;
                maybe_auto_checkpoint(store, persist_tx, config, ops_since_snapshot).await;
            }
            let _ = resp.send(res);
        }
        Command::Get { id, resp } => {
            let _ = resp.send(store.get_cloned(id));
        }
        Command::List { gemstone, resp } => {
            let _ = resp.send(store.list_cloned(gemstone));
        }
        Command::Flush { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (flush_tx, flush_rx) = oneshot::channel();
                if tx
                    .send(PersistMsg::Flush { resp: flush_tx })
                    .await
                    .is_err()
                {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    flush_rx
                        .await
                        .map_err(|_| RuntimeError::ChannelClosed)
                        .and_then(|r| r.map_err(RuntimeError::from))
                }
            } else {
                Ok(store.latest_op_seq())
            };
            let _ = resp.send(out);
        }
        Command::Checkpoint { resp } => {
            let out = match persist_tx {
                Some(tx) => request_checkpoint(store, tx, config.compact_after_snapshot).await,
                None => Ok(()),
            };
            if out.is_ok() {
                *ops_since_snapshot = 0;
            }
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let out = if let Some(tx) = persist_tx {
                let (done_tx, done_rx) = oneshot::channel();
                if tx.send(PersistMsg::Shutdown { resp: done_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    done_rx.await.map_err(|_| RuntimeError::ChannelClosed)
                }
            } else {
                Ok(())
            };
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

/// Hands the store's pending ops to the journal, or reports them durable when there is none.
fn publish(
    store: &mut OwnershipStore,
    events_tx: &broadcast::Sender<LedgerEvent>,
    permits: Option<PermitIterator<'_, PersistMsg>>,
) {
    let ops = store.drain_pending_ops();
    match permits {
        Some(mut permits) => {
            for stored in ops {
                match permits.next() {
                    Some(permit) => permit.send(PersistMsg::Op(stored)),
                    None => warn!(seq = stored.seq, "no journal slot reserved for op"),
                }
            }
        }
        None => {
            let _ = events_tx.send(LedgerEvent::DurableUpTo {
                op_seq: store.latest_op_seq(),
            });
        }
    }
}

fn spawn_persistence_worker(
    sink: Box<dyn OpSink>,
    mut rx: mpsc::Receiver<PersistMsg>,
    durable_tx: mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    config: RuntimeConfig,
) {
    let sink = Arc::new(Mutex::new(sink));
    tokio::spawn(async move {
        let mut buf = Vec::<StoredOp>::new();
        let mut deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
        let mut last_durable: OpSeq = 0;

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                        break;
                    };

                    match msg {
                        PersistMsg::Op(stored) => {
                            let is_insert = matches!(stored.op, Op::Insert { .. });
                            buf.push(stored);

                            if buf.len() >= config.batch_max_ops || (config.flush_on_add && is_insert) {
                                let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                                deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                            }
                        }
                        PersistMsg::Flush { resp } => {
                            let result = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(result.map(|_| last_durable));
                            deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                        }
                        PersistMsg::Checkpoint { snapshot, last_seq, compact, resp } => {
                            let result = match flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await {
                                Err(err) => Err(err),
                                Ok(()) => {
                                    let sink_ref = Arc::clone(&sink);
                                    tokio::task::spawn_blocking(move || {
                                        let mut sink = sink_ref.blocking_lock();
                                        sink.write_snapshot(&snapshot, last_seq)?;
                                        if compact {
                                            let removed = sink.compact_through(last_seq)?;
                                            debug!(last_seq, removed, "journal compacted");
                                        }
                                        Result::<(), PersistError>::Ok(())
                                    })
                                    .await
                                    .unwrap_or_else(|e| Err(PersistError::Message(format!("join error: {e}"))))
                                }
                            };
                            let _ = resp.send(result);
                            deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                        }
                        PersistMsg::Shutdown { resp } => {
                            let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, true).await;
                            let _ = resp.send(());
                            break;
                        }
                    }
                }
                _ = tokio::time::sleep_until(deadline), if !buf.is_empty() => {
                    let _ = flush_buf(&sink, &mut buf, &mut last_durable, &durable_tx, false).await;
                    deadline = Instant::now() + Duration::from_millis(config.batch_max_latency_ms);
                }
            }
        }
    });
}

async fn flush_buf(
    sink: &Arc<Mutex<Box<dyn OpSink>>>,
    buf: &mut Vec<StoredOp>,
    last_durable: &mut OpSeq,
    durable_tx: &mpsc::UnboundedSender<Result<OpSeq, PersistError>>,
    call_flush: bool,
) -> Result<(), PersistError> {
    if buf.is_empty() {
        if call_flush {
            let sink_ref = Arc::clone(sink);
            tokio::task::spawn_blocking(move || {
                let mut sink = sink_ref.blocking_lock();
                sink.flush()
            })
            .await
            .map_err(|e| PersistError::Message(format!("join error: {e}")))??;
        }
        return Ok(());
    }

    let ops = std::mem::take(buf);
    let sink_ref = Arc::clone(sink);
    let append_res: Result<OpSeq, PersistError> = tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        let seq = sink.append_ops(&ops)?;
        if call_flush {
            sink.flush()?;
        }
        Ok(seq)
    })
    .await
    .map_err(|e| PersistError::Message(format!("join error: {e}")))?;

    match append_res {
        Ok(seq) => {
            *last_durable = (*last_durable).max(seq);
            let _ = durable_tx.send(Ok(*last_durable));
            Ok(())
        }
        Err(err) => {
            let _ = durable_tx.send(Err(PersistError::Message(format!("append failed: {err}"))));
            Err(err)
        }
    }
}

async fn request_checkpoint(
    store: &OwnershipStore,
    tx: &mpsc::Sender<PersistMsg>,
    compact: bool,
) -> Result<(), RuntimeError> {
    let (cp_tx, cp_rx) = oneshot::channel();
    tx.send(PersistMsg::Checkpoint {
        snapshot: store.export_snapshot(),
        last_seq: store.latest_op_seq(),
        compact,
        resp: cp_tx,
    })
    .await
    .map_err(|_| RuntimeError::ChannelClosed)?;
    cp_rx
        .await
        .map_err(|_| RuntimeError::ChannelClosed)?
        .map_err(RuntimeError::from)
}

async fn maybe_auto_checkpoint(
    store: &OwnershipStore,
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    config: &RuntimeConfig,
    ops_since_snapshot: &mut usize,
) {
    if config.snapshot_every_ops == 0 || *ops_since_snapshot < config.snapshot_every_ops {
        return;
    }

    let Some(tx) = persist_tx else {
        return;
    };

    match request_checkpoint(store, tx, config.compact_after_snapshot).await {
        Ok(()) => *ops_since_snapshot = 0,
        Err(err) => warn!(error = %err, "automatic snapshot failed"),
    }
}

/// Claims journal queue slots for `ops` ops. Called before the store is touched, so a full
/// queue rejects the mutation without applying it.
fn reserve_persist(
    persist_tx: Option<&mpsc::Sender<PersistMsg>>,
    ops: usize,
) -> Result<Option<PermitIterator<'_, PersistMsg>>, RuntimeError> {
    let Some(tx) = persist_tx else {
        return Ok(None);
    };
    tx.try_reserve_many(ops).map(Some).map_err(|err| {
        warn!(error = %err, ops, "persistence queue rejected mutation");
        RuntimeError::Persist(PersistError::Message(format!("persist queue error: {err}")))
    })
}
