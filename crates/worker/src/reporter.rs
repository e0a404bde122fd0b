//! Worker-side producer of status events.

use serde_json::Value;
use shared::{
    domain::LogLevel,
    protocol::{StatusEvent, WorkerMessage},
};
use tokio::sync::mpsc::UnboundedSender;
use worker_channel::BoundaryEvent;

#[derive(Clone)]
pub struct StatusReporter {
    outbound: UnboundedSender<BoundaryEvent>,
}

impl StatusReporter {
    pub fn new(outbound: UnboundedSender<BoundaryEvent>) -> Self {
        Self { outbound }
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(StatusEvent::status(message));
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>, extra: Option<Value>) {
        let mut event = StatusEvent::log(level, message);
        event.extra = extra;
        self.emit(event);
    }

    pub fn emit(&self, event: StatusEvent) {
        let frame = match serde_json::to_string(&WorkerMessage::Status(event)) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode status event");
                return;
            }
        };
        // Nobody is listening once the controller side is gone.
        let _ = self.outbound.send(BoundaryEvent::Frame(frame));
    }
}
