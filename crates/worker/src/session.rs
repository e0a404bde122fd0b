//! Worker-side state, created once at worker startup and threaded through
//! every request handler.

use std::sync::Arc;

use serde_json::json;
use shared::{
    domain::{LogLevel, PackageSource},
    protocol::{
        BuildPayload, BuildResultPayload, CallResult, ControllerMessage, InitAck, InitPayload,
        PackageOutcome,
    },
};
use tracing::{info, warn};
use url::Url;

use crate::{
    environment::{Environment, ScriptRuntime},
    error::WorkerError,
    reporter::StatusReporter,
};

pub struct WorkerSession {
    runtime: Arc<dyn ScriptRuntime>,
    environment: Option<Box<dyn Environment>>,
    reporter: StatusReporter,
}

impl WorkerSession {
    pub fn new(runtime: Arc<dyn ScriptRuntime>, reporter: StatusReporter) -> Self {
        Self {
            runtime,
            environment: None,
            reporter,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.environment.is_some()
    }

    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    pub async fn handle(&mut self, message: ControllerMessage) -> CallResult {
        let id = message.id();
        let outcome = match message {
            ControllerMessage::Init { payload, .. } => self
                .handle_init(payload)
                .await
                .and_then(|ack| to_value(&ack)),
            ControllerMessage::Build { payload, .. } => self
                .handle_build(payload)
                .await
                .and_then(|result| to_value(&result)),
        };
        match outcome {
            Ok(payload) => CallResult::ok(id, payload),
            Err(err) => {
                warn!(call_id = %id, error = %err, "request failed");
                self.reporter
                    .log(LogLevel::Error, err.to_string(), Some(json!({ "call_id": id })));
                CallResult::failed(id, err.to_string())
            }
        }
    }

    pub async fn handle_init(&mut self, payload: InitPayload) -> Result<InitAck, WorkerError> {
        self.reporter.status("Loading runtime...");
        let index = Url::parse(&payload.environment_index_location).map_err(|source| {
            WorkerError::InvalidIndexLocation {
                location: payload.environment_index_location.clone(),
                source,
            }
        })?;
        if self.environment.take().is_some() {
            info!("re-initializing worker environment");
        }

        let mut environment = self
            .runtime
            .bootstrap(&index, &self.reporter)
            .await
            .map_err(WorkerError::Bootstrap)?;
        self.reporter.log(
            LogLevel::Info,
            "runtime bootstrapped",
            Some(json!({ "index": index.as_str() })),
        );

        self.reporter.status("Installing packages...");
        let packages = install_packages(
            environment.as_mut(),
            &payload.accelerated_packages,
            &payload.pure_script_packages,
            &self.reporter,
        )
        .await;

        self.environment = Some(environment);
        self.reporter.status("Runtime ready");
        Ok(InitAck { ok: true, packages })
    }

    pub async fn handle_build(
        &mut self,
        payload: BuildPayload,
    ) -> Result<BuildResultPayload, WorkerError> {
        let environment = self
            .environment
            .as_mut()
            .ok_or(WorkerError::NotInitialized)?;
        self.reporter
            .status(format!("Building dashboard for dataset {}...", payload.dataset));
        let result = environment
            .build(&payload.dataset, &self.reporter)
            .await
            .map_err(WorkerError::Build)?;
        self.reporter.status("Build complete");
        Ok(result)
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, WorkerError> {
    serde_json::to_value(value).map_err(|err| WorkerError::Build(err.into()))
}

/// Installs every package in order. A failure is recorded and reported as a
/// warning; it never stops the remaining installs.
pub async fn install_packages(
    environment: &mut dyn Environment,
    accelerated: &[String],
    pure_script: &[String],
    reporter: &StatusReporter,
) -> Vec<PackageOutcome> {
    let mut outcomes = Vec::with_capacity(accelerated.len() + pure_script.len());

    for name in accelerated {
        let result = environment.load_accelerated(name).await;
        outcomes.push(record(name, PackageSource::Accelerated, result, reporter));
    }
    for name in pure_script {
        let result = environment.install_pure(name).await;
        outcomes.push(record(name, PackageSource::PureScript, result, reporter));
    }
    outcomes
}

fn record(
    name: &str,
    source: PackageSource,
    result: anyhow::Result<()>,
    reporter: &StatusReporter,
) -> PackageOutcome {
    match result {
        Ok(()) => {
            reporter.log(
                LogLevel::Debug,
                format!("package {name} ready"),
                Some(json!({ "package": name, "source": source })),
            );
            PackageOutcome::installed(name, source)
        }
        Err(err) => {
            let error = format!("{err:#}");
            warn!(package = name, ?source, %error, "package install failed");
            reporter.log(
                LogLevel::Warning,
                format!("package {name} failed to install"),
                Some(json!({ "package": name, "source": source, "error": error })),
            );
            PackageOutcome::failed(name, source, error)
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
