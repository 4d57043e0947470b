//! Graph event bus
//!
//! Delivers every [`GraphEvent`] to three kinds of subscribers, in this order:
//! 1. `NodeListener`s (node events) and the `VariableListener`s registered
//!    for the observed variable (link events)
//! 2. callbacks registered for the event's [`EventKind`]
//! 3. the broadcast channel, for async consumers such as WebSocket clients

use nrs_libs::{EventKind, GraphEvent, Node, NodeListener, VariableId, VariableListener};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Callback registered for one event kind
pub type EventCallback = Arc<dyn Fn(&GraphEvent) + Send + Sync>;

/// Handle returned by every subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fan-out point for graph events
///
/// Owned by the [`crate::graph::NodeGraph`]; every mutation goes through
/// [`EventBus::emit`]. Listeners are called synchronously, in registration
/// order.
pub struct EventBus {
    node_listeners: Vec<(SubscriptionId, Arc<dyn NodeListener>)>,
    variable_listeners: HashMap<VariableId, Vec<(SubscriptionId, Arc<dyn VariableListener>)>>,
    callbacks: HashMap<EventKind, Vec<(SubscriptionId, EventCallback)>>,
    tx: broadcast::Sender<GraphEvent>,
    next_id: u64,
}

impl EventBus {
    /// Create a bus whose broadcast channel buffers `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            node_listeners: Vec::new(),
            variable_listeners: HashMap::new(),
            callbacks: HashMap::new(),
            tx,
            next_id: 0,
        }
    }

    fn next_subscription(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a listener for node events
    ///
    /// # Arguments
    ///
    /// * `listener` - Called for every node added, deleted, modified or
    ///   whose sync status changes
    ///
    /// # Returns
    ///
    /// * The `SubscriptionId` to pass to [`EventBus::unsubscribe`]
    pub fn add_node_listener(&mut self, listener: Arc<dyn NodeListener>) -> SubscriptionId {
        let id = self.next_subscription();
        self.node_listeners.push((id, listener));
        id
    }

    /// Register a listener for the links of one variable
    ///
    /// # Arguments
    ///
    /// * `observed` - Variable whose links are watched, either direction
    /// * `listener` - Called with the source variable of each link change
    ///
    /// # Returns
    ///
    /// * The `SubscriptionId` to pass to [`EventBus::unsubscribe`]
    pub fn add_variable_listener(
        &mut self,
        observed: VariableId,
        listener: Arc<dyn VariableListener>,
    ) -> SubscriptionId {
        let id = self.next_subscription();
        self.variable_listeners
            .entry(observed)
            .or_default()
            .push((id, listener));
        id
    }

    /// Register a callback for one kind of event
    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        let id = self.next_subscription();
        self.callbacks
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscription of any kind. Returns false if it was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscription_count();

        self.node_listeners.retain(|(sub, _)| *sub != id);
        for listeners in self.variable_listeners.values_mut() {
            listeners.retain(|(sub, _)| *sub != id);
        }
        self.variable_listeners.retain(|_, listeners| !listeners.is_empty());
        for callbacks in self.callbacks.values_mut() {
            callbacks.retain(|(sub, _)| *sub != id);
        }

        self.subscription_count() < before
    }

    /// Drop every listener observing `variable` (the variable is gone)
    pub fn forget_variable(&mut self, variable: VariableId) {
        self.variable_listeners.remove(&variable);
    }

    /// Subscribe to the broadcast stream of all events
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.tx.subscribe()
    }

    /// Sender side of the broadcast channel, for subscribing without the bus
    pub fn sender(&self) -> broadcast::Sender<GraphEvent> {
        self.tx.clone()
    }

    /// Number of listeners and callbacks, not counting broadcast receivers
    pub fn subscription_count(&self) -> usize {
        self.node_listeners.len()
            + self.variable_listeners.values().map(Vec::len).sum::<usize>()
            + self.callbacks.values().map(Vec::len).sum::<usize>()
    }

    /// Deliver an event to every subscriber
    pub fn emit(&self, event: GraphEvent) {
        let kind = event.kind();
        debug!("Emitting {}", kind);

        match &event {
            GraphEvent::LinkAdded { observed, .. } | GraphEvent::LinkRemoved { observed, .. } => {
                if let Some(listeners) = self.variable_listeners.get(observed) {
                    for (_, listener) in listeners {
                        event.notify_variable_listener(listener.as_ref());
                    }
                }
            }
            _ => {
                for (_, listener) in &self.node_listeners {
                    event.notify_node_listener(listener.as_ref());
                }
            }
        }

        if let Some(callbacks) = self.callbacks.get(&kind) {
            for (_, callback) in callbacks {
                callback(&event);
            }
        }

        // Ignore send errors (happens when no receivers)
        let _ = self.tx.send(event);
    }
}

/// Node listener writing the node lifecycle to the log
pub struct ActivityLog;

impl NodeListener for ActivityLog {
    fn node_added(&self, node: &Node) {
        info!("Node '{}' ({}) added as {}", node.name, node.id, node.node_type);
    }

    fn node_deleted(&self, node: &Node) {
        info!(
            "Node '{}' ({}) deleted with {} variables",
            node.name,
            node.id,
            node.variables.len()
        );
    }

    fn node_modified(&self, node: &Node) {
        debug!("Node '{}' ({}) modified", node.name, node.id);
    }

    fn node_sync_changed(&self, node: &Node) {
        info!("Node '{}' ({}) is now {:?}", node.name, node.id, node.sync);
    }
}
