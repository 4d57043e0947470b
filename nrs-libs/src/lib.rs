//! # NRS Libraries
//!
//! Shared building blocks for NRS.gui, the graphical editor for NRS node and
//! variable graphs. Everything the GUI services agree on lives here: the
//! node model, the listener contracts, name validation, value access
//! delegates, configuration and the common error type.
//!
//! ## Main Components
//!
//! - `NodeListener` / `VariableListener`: observer contracts for graph changes
//! - `GraphEvent`: typed events keyed by `EventKind`
//! - `ValidateNodeName`: admission check for proposed node names
//! - `AccessDelegate`: getter/setter pair bound to a value owned elsewhere
//! - `GuiConfig` and `Settings`, loaded from `nrsgui.yaml`
//! - `AppError`: standardized error handling

pub mod access;
pub mod config;
pub mod constants;
pub mod error;
pub mod listener;
pub mod node;
pub mod validate;

// Re-export main types for convenience
pub use access::AccessDelegate;
pub use config::{GuiConfig, NameRules, ServerConfig, Settings, load_config};
pub use error::AppError;
pub use listener::{EventKind, GraphEvent, NodeListener, VariableListener};
pub use node::{Link, Node, NodeId, NodeVariable, SyncStatus, VariableId};
pub use validate::{UniqueName, ValidateNodeName, ValidateNodeNameExt};

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
