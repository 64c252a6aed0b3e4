//! Plugin system for the uplink upload manager.
//!
//! A plugin is an id plus a partial set of lifecycle hooks; the
//! [`PluginRunner`] executes one stage at a time across the registered
//! sequence, scoping each plugin's events and containing its failures.

pub mod plugin;
pub mod runner;
pub mod validators;

pub use plugin::{Plugin, PluginContext};
pub use runner::{PluginRunner, StageEnv, StageFailure};
pub use validators::{
    AllowedFileTypesValidator, DuplicateFileValidator, MaxFileSizeValidator, MaxFilesValidator,
};
