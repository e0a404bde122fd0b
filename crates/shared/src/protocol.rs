use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{CallId, LogLevel, PackageSource},
    error::ProtocolError,
};

pub const DEFAULT_DATASET: &str = "d6yy-54nr";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub environment_index_location: String,
    #[serde(default)]
    pub accelerated_packages: Vec<String>,
    #[serde(default)]
    pub pure_script_packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPayload {
    pub dataset: String,
}

/// A call the controller can issue; the variant doubles as the call's kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerRequest {
    Init(InitPayload),
    Build(BuildPayload),
}

impl WorkerRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerRequest::Init(_) => "init",
            WorkerRequest::Build(_) => "build",
        }
    }

    pub fn into_message(self, id: CallId) -> ControllerMessage {
        match self {
            WorkerRequest::Init(payload) => ControllerMessage::Init { id, payload },
            WorkerRequest::Build(payload) => ControllerMessage::Build { id, payload },
        }
    }
}

/// Controller -> worker frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerMessage {
    Init { id: CallId, payload: InitPayload },
    Build { id: CallId, payload: BuildPayload },
}

impl ControllerMessage {
    pub fn id(&self) -> CallId {
        match self {
            ControllerMessage::Init { id, .. } | ControllerMessage::Build { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ControllerMessage::Init { .. } => "init",
            ControllerMessage::Build { .. } => "build",
        }
    }
}

/// Worker -> controller frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Status(StatusEvent),
    Result(CallResult),
}

/// Informational event, not tied to any call.
///
/// Without a `level` it replaces the headline status; with one it is a log
/// line for the sink's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(rename = "payload")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<LogLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl StatusEvent {
    pub fn status(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: None,
            extra: None,
        }
    }

    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: Some(level),
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// Terminal response for the call carrying the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub id: CallId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallResult {
    pub fn ok(id: CallId, payload: Value) -> Self {
        Self {
            id,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failed(id: CallId, error: impl Into<String>) -> Self {
        Self {
            id,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// `error` wins over `payload`; a success without payload reads as `{}`.
    pub fn into_outcome(self) -> Result<Value, String> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self
                .payload
                .unwrap_or_else(|| Value::Object(Default::default()))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageOutcome {
    pub name: String,
    pub source: PackageSource,
    pub installed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PackageOutcome {
    pub fn installed(name: impl Into<String>, source: PackageSource) -> Self {
        Self {
            name: name.into(),
            source,
            installed: true,
            error: None,
        }
    }

    pub fn failed(name: impl Into<String>, source: PackageSource, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source,
            installed: false,
            error: Some(error.into()),
        }
    }
}

/// Payload of a successful `init` call. Missing fields read as a positive
/// acknowledgement with no package report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitAck {
    pub ok: bool,
    pub packages: Vec<PackageOutcome>,
}

impl Default for InitAck {
    fn default() -> Self {
        Self {
            ok: true,
            packages: Vec::new(),
        }
    }
}

impl InitAck {
    pub fn failed_packages(&self) -> impl Iterator<Item = &PackageOutcome> {
        self.packages.iter().filter(|outcome| !outcome.installed)
    }
}

/// Data and layout for one chart, in the shape the charting surface consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureSpec {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Value>,
}

/// Wire form of a successful `build` payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildResultPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figures: Option<BTreeMap<String, FigureSpec>>,
}

impl BuildResultPayload {
    pub fn rich(html: impl Into<String>) -> Self {
        Self {
            engine: Some("vizro".to_string()),
            html: Some(html.into()),
            figures: None,
        }
    }

    pub fn figures(figures: BTreeMap<String, FigureSpec>) -> Self {
        Self {
            engine: Some("plotly".to_string()),
            html: None,
            figures: Some(figures),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    RichExport {
        content: String,
    },
    FigureSet {
        figures: BTreeMap<String, FigureSpec>,
    },
    Empty,
}

impl BuildOutcome {
    pub fn from_payload(payload: Value) -> Result<Self, ProtocolError> {
        match payload {
            Value::Null => Ok(BuildOutcome::Empty),
            Value::Object(_) => {
                let raw: BuildResultPayload = serde_json::from_value(payload)?;
                Ok(raw.into())
            }
            other => Err(ProtocolError::UnexpectedPayload(format!(
                "build result must be an object, got {other}"
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BuildOutcome::RichExport { .. } => "rich_export",
            BuildOutcome::FigureSet { .. } => "figure_set",
            BuildOutcome::Empty => "empty",
        }
    }
}

impl From<BuildResultPayload> for BuildOutcome {
    fn from(value: BuildResultPayload) -> Self {
        if let Some(content) = value.html.filter(|html| !html.trim().is_empty()) {
            BuildOutcome::RichExport { content }
        } else if let Some(figures) = value.figures {
            BuildOutcome::FigureSet { figures }
        } else {
            BuildOutcome::Empty
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
