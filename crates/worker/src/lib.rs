//! Worker context: owns the computation environment and answers requests
//! arriving over the boundary, one at a time.

use std::sync::Arc;

use serde_json::Value;
use shared::{
    domain::CallId,
    protocol::{CallResult, ControllerMessage, WorkerMessage},
};
use tracing::{debug, info, warn};
use worker_channel::{boundary, BoundaryEvent, ControllerPort, WorkerPort};

pub mod environment;
pub mod error;
pub mod figures;
pub mod native;
pub mod reporter;
pub mod session;
pub mod source;
pub mod stats;

pub use environment::{Environment, ScriptRuntime};
pub use error::WorkerError;
pub use reporter::StatusReporter;
pub use session::WorkerSession;

/// Starts a worker task on the current runtime and returns the controller's
/// end of its boundary.
pub fn spawn_worker(runtime: Arc<dyn ScriptRuntime>) -> ControllerPort {
    let (controller_port, worker_port) = boundary();
    let session = WorkerSession::new(runtime, StatusReporter::new(worker_port.outbound.clone()));
    tokio::spawn(serve(worker_port, session));
    controller_port
}

pub async fn serve(mut port: WorkerPort, mut session: WorkerSession) {
    info!("worker started");
    while let Some(frame) = port.inbound.recv().await {
        let result = match serde_json::from_str::<ControllerMessage>(&frame) {
            Ok(message) => {
                debug!(call_id = %message.id(), kind = message.kind(), "worker request");
                session.handle(message).await
            }
            Err(err) => match recover_call_id(&frame) {
                Some(id) => CallResult::failed(id, format!("malformed request: {err}")),
                None => {
                    warn!(error = %err, "unreadable request without call id");
                    if port
                        .outbound
                        .send(BoundaryEvent::Fault(format!("unreadable request: {err}")))
                        .is_err()
                    {
                        break;
                    }
                    continue;
                }
            },
        };

        let event = match serde_json::to_string(&WorkerMessage::Result(result)) {
            Ok(frame) => BoundaryEvent::Frame(frame),
            Err(err) => BoundaryEvent::Fault(format!("failed to encode result: {err}")),
        };
        if port.outbound.send(event).is_err() {
            break;
        }
    }
    info!("worker stopped");
}

fn recover_call_id(frame: &str) -> Option<CallId> {
    serde_json::from_str::<Value>(frame)
        .ok()?
        .get("id")?
        .as_u64()
        .map(CallId)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
