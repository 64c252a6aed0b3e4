//! Plugin contract and execution context.

use std::sync::Arc;

use async_trait::async_trait;

use uplink_core::bus::ScopedEmitter;
use uplink_core::config::ManagerConfig;
use uplink_core::error::FileError;
use uplink_core::models::TrackedFile;
use uplink_storage::StorageAdapter;

/// Context provided to plugins during hook execution.
///
/// `files` is a snapshot of the tracked sequence taken when the stage runs
/// for this plugin; plugins must not assume it reflects later mutations.
/// Events emitted through `emit` are delivered under `<pluginId>:<action>`.
#[derive(Clone)]
pub struct PluginContext {
    pub files: Arc<Vec<TrackedFile>>,
    pub config: Arc<ManagerConfig>,
    pub storage: Option<Arc<dyn StorageAdapter>>,
    pub emit: ScopedEmitter,
}

/// A bundle of lifecycle hooks sharing an id.
///
/// Hooks default to pass-through; a plugin overrides only the stages it
/// participates in. Stage semantics:
///
/// - `validate` inspects the candidate and fails to reject it; it never
///   transforms the file.
/// - `preprocess` may attach UI-only side effects (preview, thumbnail data
///   URL) but must not mutate bytes or rename the file.
/// - `process` may transform bytes and replace `data`, `size`, `mime_type`,
///   and adjust the id extension.
/// - `complete` runs post-upload side effects.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Non-empty identifier, used for event scoping and logs.
    fn id(&self) -> &str;

    async fn validate(&self, _file: &TrackedFile, _ctx: &PluginContext) -> Result<(), FileError> {
        Ok(())
    }

    async fn preprocess(
        &self,
        file: TrackedFile,
        _ctx: &PluginContext,
    ) -> Result<TrackedFile, FileError> {
        Ok(file)
    }

    async fn process(
        &self,
        file: TrackedFile,
        _ctx: &PluginContext,
    ) -> Result<TrackedFile, FileError> {
        Ok(file)
    }

    async fn complete(&self, _file: &TrackedFile, _ctx: &PluginContext) -> Result<(), FileError> {
        Ok(())
    }
}
