//! In-process stand-in for the worker message boundary: fire-and-forget
//! posting in both directions, plus an out-of-band fault signal.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryEvent {
    Frame(String),
    /// Failure outside the request/response protocol; carries no call id.
    Fault(String),
}

/// Controller half of the boundary. Owned exclusively by the channel.
pub struct ControllerPort {
    pub outbound: UnboundedSender<String>,
    pub inbound: UnboundedReceiver<BoundaryEvent>,
}

/// Worker half of the boundary. Dropping `outbound` is how the worker
/// context terminates from the controller's point of view.
pub struct WorkerPort {
    pub inbound: UnboundedReceiver<String>,
    pub outbound: UnboundedSender<BoundaryEvent>,
}

pub fn boundary() -> (ControllerPort, WorkerPort) {
    let (to_worker_tx, to_worker_rx) = mpsc::unbounded_channel();
    let (to_controller_tx, to_controller_rx) = mpsc::unbounded_channel();
    (
        ControllerPort {
            outbound: to_worker_tx,
            inbound: to_controller_rx,
        },
        WorkerPort {
            inbound: to_worker_rx,
            outbound: to_controller_tx,
        },
    )
}
