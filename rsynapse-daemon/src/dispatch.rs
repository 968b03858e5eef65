use crate::cache::ResultCache;
use crate::plugin_manager::{QueryHandle, QueryLayer};
use crate::query_parser;
use rsynapse_plugin::{Query, QueryResultUi};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, Sleep};
use tracing::{debug, info, warn};

/// Hard deadline for a query, measured from dispatch start.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// What the engine forwards to its caller, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// A non-empty batch. An empty one is only sent as the end of stream,
    /// or as the sole answer to an empty query.
    Batch(Vec<QueryResultUi>),
    Timeout { query: String, request_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Completed,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub state: DispatchState,
    pub total_results: usize,
    pub elapsed: Duration,
}

pub struct DispatchEngine {
    layer: Arc<dyn QueryLayer>,
    cache: Arc<ResultCache>,
}

impl DispatchEngine {
    pub fn new(layer: Arc<dyn QueryLayer>, cache: Arc<ResultCache>) -> Self {
        Self { layer, cache }
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Parses `raw` and streams its results into `sink`.
    pub async fn dispatch(
        &self,
        request_id: &str,
        raw: &str,
        sink: &mpsc::Sender<DispatchEvent>,
    ) -> DispatchOutcome {
        let started = Instant::now();
        if raw.is_empty() {
            let answer = sink.send(DispatchEvent::Batch(Vec::new()));
            let _ = tokio::time::timeout_at(started + QUERY_TIMEOUT, answer).await;
            return DispatchOutcome {
                state: DispatchState::Completed,
                total_results: 0,
                elapsed: started.elapsed(),
            };
        }

        let query = query_parser::parse(raw, self.layer.as_ref());
        self.run(request_id, query, started, sink).await
    }

    /// Streams the results of an already built query, e.g. a selection.
    pub async fn dispatch_query(
        &self,
        request_id: &str,
        query: Query,
        sink: &mpsc::Sender<DispatchEvent>,
    ) -> DispatchOutcome {
        self.run(request_id, query, Instant::now(), sink).await
    }

    async fn run(
        &self,
        request_id: &str,
        query: Query,
        started: Instant,
        sink: &mpsc::Sender<DispatchEvent>,
    ) -> DispatchOutcome {
        debug!(
            request_id,
            trigger = %query.trigger_keyword,
            command = %query.command,
            search = %query.search,
            "Dispatching query"
        );
        let QueryHandle {
            mut batches,
            mut done,
        } = self.layer.query(query.clone());

        let deadline = tokio::time::sleep_until(started + QUERY_TIMEOUT);
        tokio::pin!(deadline);

        let mut total_results = 0;
        let mut batches_open = true;
        let state = loop {
            tokio::select! {
                // The deadline is checked first so a busy stream cannot starve it;
                // pending batches are drained before `done` ends the stream.
                biased;

                _ = &mut deadline => break report_timeout(&query, request_id, sink),
                batch = batches.recv(), if batches_open => {
                    let Some(batch) = batch else {
                        batches_open = false;
                        continue;
                    };
                    if batch.results.is_empty() {
                        continue;
                    }
                    total_results += batch.results.len();
                    let forwarded = batch
                        .results
                        .iter()
                        .map(|result| {
                            self.cache.record(&query, &batch.plugin, result);
                            result.to_ui(request_id)
                        })
                        .collect();
                    match send_before(deadline.as_mut(), sink, DispatchEvent::Batch(forwarded)).await {
                        Sent::Delivered => {}
                        Sent::Closed => {
                            warn!(request_id, "Query receiver went away, stop dispatching");
                            break DispatchState::Completed;
                        }
                        Sent::DeadlinePassed => break report_timeout(&query, request_id, sink),
                    }
                }
                _ = &mut done => {
                    info!(
                        request_id,
                        total_results,
                        cost_ms = started.elapsed().as_millis() as u64,
                        "Query done"
                    );
                    match send_before(deadline.as_mut(), sink, DispatchEvent::Batch(Vec::new())).await {
                        Sent::DeadlinePassed => break report_timeout(&query, request_id, sink),
                        Sent::Delivered | Sent::Closed => break DispatchState::Completed,
                    }
                }
            }
        };

        DispatchOutcome {
            state,
            total_results,
            elapsed: started.elapsed(),
        }
    }
}

enum Sent {
    Delivered,
    Closed,
    DeadlinePassed,
}

/// Waits for room in `sink`, but never past the deadline.
async fn send_before(
    deadline: Pin<&mut Sleep>,
    sink: &mpsc::Sender<DispatchEvent>,
    event: DispatchEvent,
) -> Sent {
    tokio::select! {
        biased;

        _ = deadline => Sent::DeadlinePassed,
        sent = sink.send(event) => match sent {
            Ok(()) => Sent::Delivered,
            Err(_) => Sent::Closed,
        },
    }
}

/// Queues the timeout error without waiting on a full sink. When the
/// receiver is behind, a detached task delivers it once there is room.
fn report_timeout(
    query: &Query,
    request_id: &str,
    sink: &mpsc::Sender<DispatchEvent>,
) -> DispatchState {
    let query = query.to_string();
    info!(%query, request_id, "Query timeout");
    let event = DispatchEvent::Timeout {
        query,
        request_id: request_id.to_string(),
    };
    if let Err(TrySendError::Full(event)) = sink.try_send(event) {
        let sink = sink.clone();
        tokio::spawn(async move {
            let _ = sink.send(event).await;
        });
    }
    DispatchState::TimedOut
}
