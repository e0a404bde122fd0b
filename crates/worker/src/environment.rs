//! Seams between the worker session and the computation environment.

use anyhow::Result;
use async_trait::async_trait;
use shared::protocol::BuildResultPayload;
use url::Url;

use crate::reporter::StatusReporter;

/// Produces a ready environment from the runtime bootstrap location.
#[async_trait]
pub trait ScriptRuntime: Send + Sync {
    async fn bootstrap(
        &self,
        index_location: &Url,
        reporter: &StatusReporter,
    ) -> Result<Box<dyn Environment>>;
}

#[async_trait]
pub trait Environment: Send {
    async fn load_accelerated(&mut self, package: &str) -> Result<()>;
    async fn install_pure(&mut self, package: &str) -> Result<()>;
    async fn build(&mut self, dataset: &str, reporter: &StatusReporter)
        -> Result<BuildResultPayload>;
}
