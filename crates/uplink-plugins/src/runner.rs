//! Stage execution across the registered plugin sequence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use uplink_core::bus::{EventBus, ScopedEmitter};
use uplink_core::config::ManagerConfig;
use uplink_core::error::FileError;
use uplink_core::events::Event;
use uplink_core::models::TrackedFile;
use uplink_storage::StorageAdapter;

use crate::plugin::{Plugin, PluginContext};

/// Failure signal from a hook, tagged with the plugin that raised it.
/// Carries the file as it stood when the hook failed, so the caller can
/// apply its admission/error policy without re-fetching it.
#[derive(Debug, Clone)]
pub struct StageFailure {
    pub plugin_id: String,
    pub error: FileError,
    pub file: TrackedFile,
}

/// Inputs shared by every plugin invocation of one stage run.
#[derive(Clone)]
pub struct StageEnv {
    pub files: Arc<Vec<TrackedFile>>,
    pub config: Arc<ManagerConfig>,
    pub storage: Option<Arc<dyn StorageAdapter>>,
}

/// Executes lifecycle stages over the plugin sequence, in registration
/// order, for one file at a time.
///
/// The scoped emitter for each plugin id is created on first use and cached
/// for the runner's lifetime.
pub struct PluginRunner {
    plugins: RwLock<Vec<Arc<dyn Plugin>>>,
    bus: EventBus,
    emitters: Mutex<HashMap<String, ScopedEmitter>>,
}

impl PluginRunner {
    pub fn new(bus: EventBus) -> Self {
        Self {
            plugins: RwLock::new(Vec::new()),
            bus,
            emitters: Mutex::new(HashMap::new()),
        }
    }

    /// Append a plugin; takes effect on subsequent stage runs.
    pub fn register(&self, plugin: Arc<dyn Plugin>) {
        self.plugins
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(plugin);
    }

    pub fn plugin_ids(&self) -> Vec<String> {
        self.snapshot().iter().map(|p| p.id().to_string()).collect()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Plugin>> {
        self.plugins
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn emitter_for(&self, plugin_id: &str) -> ScopedEmitter {
        let mut emitters = self
            .emitters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        emitters
            .entry(plugin_id.to_string())
            .or_insert_with(|| self.bus.scoped(plugin_id))
            .clone()
    }

    fn context(&self, plugin_id: &str, env: &StageEnv) -> PluginContext {
        PluginContext {
            files: env.files.clone(),
            config: env.config.clone(),
            storage: env.storage.clone(),
            emit: self.emitter_for(plugin_id),
        }
    }

    /// Run all `validate` hooks. The first failure aborts the stage and is
    /// returned to the caller; the candidate is not transformed.
    pub async fn run_validate(
        &self,
        file: &TrackedFile,
        env: &StageEnv,
    ) -> Result<(), StageFailure> {
        for plugin in self.snapshot() {
            let ctx = self.context(plugin.id(), env);
            if let Err(error) = plugin.validate(file, &ctx).await {
                tracing::debug!(
                    plugin_id = %plugin.id(),
                    file_id = %file.id,
                    error = %error,
                    "Validation rejected file"
                );
                return Err(StageFailure {
                    plugin_id: plugin.id().to_string(),
                    error,
                    file: file.clone(),
                });
            }
        }
        Ok(())
    }

    /// Run all `preprocess` hooks, threading the file through each. A hook
    /// failure emits `file:error`, is logged with the plugin id, and returns
    /// a failure signal; the lifecycle controller decides admission policy.
    pub async fn run_preprocess(
        &self,
        file: TrackedFile,
        env: &StageEnv,
    ) -> Result<TrackedFile, StageFailure> {
        self.run_transform(file, env, Stage::Preprocess).await
    }

    /// Run all `process` hooks; same containment as `run_preprocess`.
    pub async fn run_process(
        &self,
        file: TrackedFile,
        env: &StageEnv,
    ) -> Result<TrackedFile, StageFailure> {
        self.run_transform(file, env, Stage::Process).await
    }

    async fn run_transform(
        &self,
        mut file: TrackedFile,
        env: &StageEnv,
        stage: Stage,
    ) -> Result<TrackedFile, StageFailure> {
        for plugin in self.snapshot() {
            let ctx = self.context(plugin.id(), env);
            let result = match stage {
                Stage::Preprocess => plugin.preprocess(file.clone(), &ctx).await,
                Stage::Process => plugin.process(file.clone(), &ctx).await,
            };
            match result {
                Ok(next) => file = next,
                Err(error) => {
                    tracing::warn!(
                        plugin_id = %plugin.id(),
                        file_id = %file.id,
                        stage = stage.name(),
                        error = %error,
                        "Plugin hook failed"
                    );
                    self.bus.emit(&Event::FileError {
                        file: file.clone(),
                        error: error.clone(),
                    });
                    return Err(StageFailure {
                        plugin_id: plugin.id().to_string(),
                        error,
                        file,
                    });
                }
            }
        }
        Ok(file)
    }

    /// Run all `complete` hooks; failures are logged and swallowed.
    pub async fn run_complete(&self, file: &TrackedFile, env: &StageEnv) {
        for plugin in self.snapshot() {
            let ctx = self.context(plugin.id(), env);
            if let Err(error) = plugin.complete(file, &ctx).await {
                tracing::warn!(
                    plugin_id = %plugin.id(),
                    file_id = %file.id,
                    error = %error,
                    "Complete hook failed"
                );
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Stage {
    Preprocess,
    Process,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Stage::Preprocess => "preprocess",
            Stage::Process => "process",
        }
    }
}
