//! Manager construction.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::watch;

use uplink_core::bus::EventBus;
use uplink_core::config::ManagerConfig;
use uplink_plugins::{
    AllowedFileTypesValidator, DuplicateFileValidator, MaxFileSizeValidator, MaxFilesValidator,
    Plugin, PluginRunner,
};
use uplink_processing::{CompressionPlugin, ThumbnailPlugin};
use uplink_storage::StorageAdapter;

use crate::manager::{ManagerInner, UploadManager};
use crate::registry::FileRegistry;
use crate::resources::ObjectUrlTracker;

/// Builds an [`UploadManager`] from configuration, an optional storage
/// adapter and extra plugins.
///
/// Built-in plugins install from configuration flags in a fixed order
/// (max-files, max-file-size, allowed-file-types, duplicate-files,
/// thumbnail, image-compression); user plugins follow in the order given.
pub struct UploadManagerBuilder {
    config: ManagerConfig,
    storage: Option<Arc<dyn StorageAdapter>>,
    plugins: Vec<Arc<dyn Plugin>>,
}

impl UploadManagerBuilder {
    pub fn new() -> Self {
        Self {
            config: ManagerConfig::default(),
            storage: None,
            plugins: Vec::new(),
        }
    }

    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn storage(mut self, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(adapter);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Build the manager and kick off initial-file resolution.
    ///
    /// Must run inside a Tokio runtime when `initial_files` is set, since
    /// resolution is spawned as a task.
    pub fn build(self) -> UploadManager {
        let config = Arc::new(self.config);
        let bus = EventBus::new();
        let runner = PluginRunner::new(bus.clone());

        if let Some(limit) = config.max_files {
            runner.register(Arc::new(MaxFilesValidator::new(limit)));
        }
        if let Some(limit) = config.max_file_size {
            runner.register(Arc::new(MaxFileSizeValidator::new(limit)));
        }
        if config.allowed_types_active() {
            let allowed = config.allowed_file_types.clone().unwrap_or_default();
            runner.register(Arc::new(AllowedFileTypesValidator::new(allowed)));
        }
        if config.detect_duplicates {
            runner.register(Arc::new(DuplicateFileValidator));
        }
        if let Some(thumbnails) = &config.thumbnails {
            runner.register(Arc::new(ThumbnailPlugin::new(thumbnails.clone())));
        }
        if let Some(compression) = &config.image_compression {
            runner.register(Arc::new(CompressionPlugin::new(compression.clone())));
        }
        for plugin in self.plugins {
            runner.register(plugin);
        }

        let ready = config.initial_files.is_none();
        let (ready_tx, _) = watch::channel(ready);

        let manager = UploadManager {
            inner: Arc::new(ManagerInner {
                config,
                bus,
                registry: FileRegistry::new(),
                resources: ObjectUrlTracker::new(),
                runner,
                storage: self.storage,
                ready_tx,
                uploaded_latch: AtomicBool::new(false),
                init_latch: AtomicBool::new(false),
                upload_gate: tokio::sync::Mutex::new(()),
                http: reqwest::Client::new(),
            }),
        };
        manager.spawn_initialization();
        manager
    }
}

impl Default for UploadManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
