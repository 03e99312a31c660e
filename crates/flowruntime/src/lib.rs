//! Workflow execution runtime
//!
//! This crate provides the engine that loads and validates workflows,
//! manages the node registry, and runs graphs breadth-first in the background.

mod config;
mod engine;
mod executor;
pub mod loader;
mod registry;
mod store;

pub use config::{ConfigManager, HttpSettings, RuntimeConfig, Settings, StorageSettings, CONFIG_PATH_ENV};
pub use engine::WorkflowEngine;
pub use executor::{RunContext, WorkflowExecutor, DEFAULT_ENTRY_NODE_TYPE};
pub use registry::{FnFactory, NodeFactory, NodeMetadata, NodeRegistry};
pub use store::ExecutionStore;
