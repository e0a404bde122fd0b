//! Request/response multiplexer over the fire-and-forget worker boundary.

use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use shared::{
    domain::{CallId, LogLevel},
    protocol::{BuildPayload, InitAck, InitPayload, WorkerMessage, WorkerRequest},
};
use thiserror::Error;
use tokio::{
    sync::{mpsc::UnboundedReceiver, mpsc::UnboundedSender, oneshot, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, warn};

pub mod boundary;
pub mod status;

pub use boundary::{boundary, BoundaryEvent, ControllerPort, WorkerPort};
pub use status::{LogEntry, StatusLog, StatusSink};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The worker answered the call with an error string.
    #[error("{0}")]
    Remote(String),
    #[error("worker terminated: {0}")]
    WorkerTerminated(String),
    #[error("failed to encode {kind} request: {message}")]
    Encode { kind: &'static str, message: String },
}

type Settle = oneshot::Sender<Result<Value, CallError>>;

#[derive(Default)]
struct PendingCalls {
    last_id: u64,
    pending: HashMap<CallId, Settle>,
    terminated: Option<String>,
}

struct ChannelInner {
    outbound: UnboundedSender<String>,
    calls: Mutex<PendingCalls>,
    sink: Arc<dyn StatusSink>,
}

pub struct WorkerChannel {
    inner: Arc<ChannelInner>,
    pump: JoinHandle<()>,
}

impl WorkerChannel {
    /// Takes ownership of the controller port and starts relaying inbound
    /// events. Must be called inside a tokio runtime.
    pub fn spawn(port: ControllerPort, sink: Arc<dyn StatusSink>) -> Self {
        let ControllerPort { outbound, inbound } = port;
        let inner = Arc::new(ChannelInner {
            outbound,
            calls: Mutex::new(PendingCalls::default()),
            sink,
        });
        let pump = tokio::spawn(pump_inbound(inner.clone(), inbound));
        Self { inner, pump }
    }

    pub async fn call(&self, request: WorkerRequest) -> Result<Value, CallError> {
        let kind = request.kind();
        let (settle_tx, settle_rx) = oneshot::channel();

        let id = {
            let mut calls = self.inner.calls.lock().await;
            if let Some(reason) = &calls.terminated {
                return Err(CallError::WorkerTerminated(reason.clone()));
            }
            calls.last_id += 1;
            let id = CallId(calls.last_id);
            let frame = serde_json::to_string(&request.into_message(id)).map_err(|err| {
                CallError::Encode {
                    kind,
                    message: err.to_string(),
                }
            })?;
            if self.inner.outbound.send(frame).is_err() {
                let reason = "worker boundary closed".to_string();
                calls.terminated = Some(reason.clone());
                return Err(CallError::WorkerTerminated(reason));
            }
            calls.pending.insert(id, settle_tx);
            id
        };
        debug!(call_id = %id, kind, "posted worker request");

        settle_rx.await.map_err(|_| {
            CallError::WorkerTerminated(format!("call {id} dropped before settlement"))
        })?
    }

    /// Any successful `init` result acknowledges the call. A payload that is
    /// not an `InitAck` reads as a bare positive acknowledgement.
    pub async fn init(&self, payload: InitPayload) -> Result<InitAck, CallError> {
        let value = self.call(WorkerRequest::Init(payload)).await?;
        Ok(serde_json::from_value(value).unwrap_or_else(|err| {
            debug!(error = %err, "init payload carries no acknowledgement details");
            InitAck::default()
        }))
    }

    pub async fn build(&self, payload: BuildPayload) -> Result<Value, CallError> {
        self.call(WorkerRequest::Build(payload)).await
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.calls.lock().await.pending.len()
    }
}

impl Drop for WorkerChannel {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_inbound(inner: Arc<ChannelInner>, mut inbound: UnboundedReceiver<BoundaryEvent>) {
    while let Some(event) = inbound.recv().await {
        match event {
            BoundaryEvent::Frame(frame) => inner.handle_frame(&frame).await,
            BoundaryEvent::Fault(message) => inner.report_fault(&message),
        }
    }
    inner.terminate("worker context terminated").await;
}

impl ChannelInner {
    async fn handle_frame(&self, frame: &str) {
        let message = match serde_json::from_str::<WorkerMessage>(frame) {
            Ok(message) => message,
            Err(err) => {
                self.report_fault(&format!("malformed worker message: {err}"));
                return;
            }
        };

        match message {
            WorkerMessage::Status(event) => self.sink.record(event),
            WorkerMessage::Result(result) => {
                let id = result.id;
                // Removed before settling so a late duplicate finds nothing.
                let settle = self.calls.lock().await.pending.remove(&id);
                let Some(settle) = settle else {
                    debug!(call_id = %id, "dropping result for unknown call id");
                    return;
                };
                let outcome = result.into_outcome().map_err(CallError::Remote);
                if settle.send(outcome).is_err() {
                    debug!(call_id = %id, "caller went away before result arrived");
                }
            }
        }
    }

    fn report_fault(&self, message: &str) {
        warn!(fault = message, "worker boundary fault");
        self.sink.log(LogLevel::Error, message, None);
    }

    async fn terminate(&self, reason: &str) {
        let orphaned: Vec<(CallId, Settle)> = {
            let mut calls = self.calls.lock().await;
            calls.terminated = Some(reason.to_string());
            calls.pending.drain().collect()
        };
        error!(
            reason,
            pending = orphaned.len(),
            "worker boundary closed; rejecting pending calls"
        );
        self.sink.log(LogLevel::Error, reason, None);
        for (_, settle) in orphaned {
            let _ = settle.send(Err(CallError::WorkerTerminated(reason.to_string())));
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
