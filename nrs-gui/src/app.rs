//! Application manager
//!
//! [`AppManager`] is the application context: configuration, settings and
//! the node graph. It is created once in `main` and handed to everything
//! that needs it; clones share the same state.

use crate::api;
use crate::events::ActivityLog;
use crate::graph::{NodeChange, NodeGraph};
use anyhow::Result;
use nrs_libs::constants::{self, settings};
use nrs_libs::{
    AccessDelegate, AppError, GraphEvent, GuiConfig, Link, Node, NodeId, NodeVariable, Settings,
    SyncStatus, UniqueName, ValidateNodeName, VariableId,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Outcome of a name check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCheck {
    pub name: String,
    pub acceptable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Clone)]
pub struct AppManager {
    config: Arc<GuiConfig>,
    graph: Arc<RwLock<NodeGraph>>,
    settings: Arc<RwLock<Settings>>,
    events: broadcast::Sender<GraphEvent>,
    /// Raw process arguments handed to `startup`
    args: Arc<Vec<String>>,
}

impl AppManager {
    /// Build the application context from a configuration.
    ///
    /// The graph starts in the online mode given by the configured settings.
    pub fn new(config: GuiConfig) -> Self {
        let mut graph = NodeGraph::new(constants::EVENT_CHANNEL_CAPACITY);
        graph.subscribe_nodes(Arc::new(ActivityLog));
        graph.set_online(config.settings.is_online());

        let events = graph.events().sender();
        let settings = config.settings.clone();

        Self {
            config: Arc::new(config),
            graph: Arc::new(RwLock::new(graph)),
            settings: Arc::new(RwLock::new(settings)),
            events,
            args: Arc::new(Vec::new()),
        }
    }

    /// Start the GUI backend and serve the editor API until ctrl-c.
    ///
    /// `args` are kept verbatim; nothing here interprets them.
    pub async fn startup(mut self, args: Vec<String>) -> Result<()> {
        if !args.is_empty() {
            info!("Startup arguments: {:?}", args);
        }
        self.args = Arc::new(args);

        info!(
            "Starting {} (names up to {} chars, spaces {})",
            if self.is_online() { "online" } else { "offline" },
            self.config.names.max_length,
            if self.config.names.allow_spaces { "allowed" } else { "rejected" }
        );

        let addr = self.config.server.addr();
        let app = api::create_router(self);

        info!("Starting NRS.gui editor API on {}", addr);
        info!("Event stream: ws://{}/ws", addr);

        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("NRS.gui stopped");
        Ok(())
    }

    pub fn config(&self) -> &GuiConfig {
        &self.config
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Receive every graph event from now on
    pub fn subscribe_events(&self) -> broadcast::Receiver<GraphEvent> {
        self.events.subscribe()
    }

    fn read_graph(&self) -> Result<RwLockReadGuard<'_, NodeGraph>, AppError> {
        self.graph
            .read()
            .map_err(|_| AppError::Internal("Node graph lock poisoned".to_string()))
    }

    fn write_graph(&self) -> Result<RwLockWriteGuard<'_, NodeGraph>, AppError> {
        self.graph
            .write()
            .map_err(|_| AppError::Internal("Node graph lock poisoned".to_string()))
    }

    fn write_settings(&self) -> Result<RwLockWriteGuard<'_, Settings>, AppError> {
        self.settings
            .write()
            .map_err(|_| AppError::Internal("Settings lock poisoned".to_string()))
    }

    /// Run `f` with shared access to the graph
    pub fn with_graph<T>(&self, f: impl FnOnce(&NodeGraph) -> T) -> Result<T, AppError> {
        let graph = self.read_graph()?;
        Ok(f(&*graph))
    }

    /// Run `f` with exclusive access to the graph
    pub fn with_graph_mut<T>(
        &self,
        f: impl FnOnce(&mut NodeGraph) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut graph = self.write_graph()?;
        f(&mut *graph)
    }

    // === Nodes ===

    pub fn list_nodes(&self) -> Result<Vec<Node>, AppError> {
        self.with_graph(|graph| graph.nodes().into_iter().cloned().collect())
    }

    /// A node together with its variables
    pub fn node_details(&self, id: NodeId) -> Result<(Node, Vec<NodeVariable>), AppError> {
        let graph = self.read_graph()?;
        let node = graph
            .node(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Node '{}' not found", id)))?;
        let variables = graph.variables_of(id).into_iter().cloned().collect();
        Ok((node, variables))
    }

    pub fn create_node(
        &self,
        name: &str,
        node_type: &str,
        attributes: BTreeMap<String, Value>,
    ) -> Result<Node, AppError> {
        let rules = &self.config.names;
        self.with_graph_mut(|graph| graph.add_node(name, node_type, attributes, rules))
    }

    pub fn modify_node(&self, id: NodeId, change: NodeChange) -> Result<Node, AppError> {
        let rules = &self.config.names;
        self.with_graph_mut(|graph| graph.modify_node(id, change, rules))
    }

    pub fn delete_node(&self, id: NodeId) -> Result<Node, AppError> {
        self.with_graph_mut(|graph| graph.delete_node(id))
    }

    pub fn set_node_sync(&self, id: NodeId, status: SyncStatus) -> Result<Node, AppError> {
        self.with_graph_mut(|graph| graph.set_sync(id, status))
    }

    /// Check a proposed name without creating anything
    pub fn validate_name(&self, name: &str) -> Result<NameCheck, AppError> {
        let rules = &self.config.names;
        self.with_graph(|graph| {
            let reason = if !rules.node_name_acceptable(name) {
                Some("does not satisfy the naming rules".to_string())
            } else if !UniqueName::new(graph.node_names()).node_name_acceptable(name) {
                Some("is already in use".to_string())
            } else {
                None
            };

            NameCheck {
                name: name.to_string(),
                acceptable: reason.is_none(),
                reason,
            }
        })
    }

    // === Variables and links ===

    pub fn add_variable(
        &self,
        node: NodeId,
        name: &str,
        value: Value,
    ) -> Result<NodeVariable, AppError> {
        self.with_graph_mut(|graph| graph.add_variable(node, name, value))
    }

    pub fn set_variable_value(&self, id: VariableId, value: Value) -> Result<NodeVariable, AppError> {
        self.with_graph_mut(|graph| graph.set_variable_value(id, value))
    }

    pub fn add_link(&self, source: VariableId, target: VariableId) -> Result<Link, AppError> {
        self.with_graph_mut(|graph| graph.add_link(source, target))
    }

    pub fn remove_link(&self, source: VariableId, target: VariableId) -> Result<Link, AppError> {
        self.with_graph_mut(|graph| graph.remove_link(source, target))
    }

    // === Online/offline ===

    /// Online mode as the graph sees it
    pub fn is_online(&self) -> bool {
        self.with_graph(|graph| graph.is_online()).unwrap_or(false)
    }

    /// Apply the online flag to the graph and record it in the settings.
    ///
    /// Both are updated under the graph's write lock, so concurrent
    /// switches cannot leave them disagreeing. Lock order is graph, then
    /// settings. Returns the nodes whose sync status flipped.
    pub fn set_online(&self, online: bool) -> Result<Vec<NodeId>, AppError> {
        self.with_graph_mut(|graph| {
            self.write_settings()?.set_online(online);
            Ok(graph.set_online(online))
        })
    }

    /// Set attribute `key` of node `id`; a `null` value removes it.
    ///
    /// # Returns
    ///
    /// * `Ok(Node)` with the node after the write
    /// * `Err(AppError::NotFound)` if the node does not exist
    pub fn set_attribute(&self, id: NodeId, key: &str, value: Value) -> Result<Node, AppError> {
        let change = if value.is_null() {
            NodeChange {
                remove_attributes: vec![key.to_string()],
                ..NodeChange::default()
            }
        } else {
            NodeChange::set(key, value)
        };
        self.modify_node(id, change)
    }

    // === Access delegates ===

    /// Delegate reading and writing attribute `key` of node `id`.
    ///
    /// Writes go through [`AppManager::set_attribute`], so listeners see them.
    /// Reads of a missing attribute (or a deleted node) yield `null`;
    /// `null` writes remove the attribute.
    pub fn attribute_delegate(&self, id: NodeId, key: &str) -> Result<AccessDelegate, AppError> {
        if !self.with_graph(|graph| graph.node(id).is_some())? {
            return Err(AppError::NotFound(format!("Node '{}' not found", id)));
        }

        let reader = self.clone();
        let read_key = key.to_string();
        let writer = self.clone();
        let write_key = key.to_string();

        Ok(AccessDelegate::new(
            move || {
                reader
                    .with_graph(|graph| {
                        graph
                            .node(id)
                            .and_then(|node| node.attribute(&read_key))
                            .cloned()
                    })
                    .ok()
                    .flatten()
                    .unwrap_or(Value::Null)
            },
            move |value: Value| {
                if let Err(e) = writer.set_attribute(id, &write_key, value) {
                    warn!("Failed to write attribute '{}' of node {}: {}", write_key, id, e);
                }
            },
        ))
    }

    /// Delegate bound to a settings key.
    ///
    /// Writing the online/offline key also switches the graph's mode.
    pub fn setting_delegate(&self, key: &str) -> AccessDelegate {
        let reader = self.clone();
        let read_key = key.to_string();
        let writer = self.clone();
        let write_key = key.to_string();

        AccessDelegate::new(
            move || {
                reader
                    .settings
                    .read()
                    .ok()
                    .and_then(|settings| settings.get(&read_key).cloned())
                    .unwrap_or(Value::Null)
            },
            move |value: Value| {
                if write_key == settings::ONLINE {
                    match value.as_bool() {
                        Some(online) => {
                            if let Err(e) = writer.set_online(online) {
                                warn!("Failed to switch online mode: {}", e);
                            }
                        }
                        None => warn!("Ignoring non-boolean {} value: {}", settings::ONLINE, value),
                    }
                    return;
                }

                match writer.write_settings() {
                    Ok(mut settings) => {
                        settings.set(write_key.clone(), value);
                    }
                    Err(e) => warn!("Failed to write setting '{}': {}", write_key, e),
                }
            },
        )
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
