//! Node graph module
//!
//! Owns every node, variable and link being edited, and reports each change
//! through the [`EventBus`].

use crate::events::{EventBus, SubscriptionId};
use nrs_libs::{
    AppError, EventKind, GraphEvent, Link, Node, NodeId, NodeListener, NodeVariable, SyncStatus,
    UniqueName, ValidateNodeName, VariableId, VariableListener,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Edit applied to a node by [`NodeGraph::modify_node`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeChange {
    /// New name, if renaming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Attributes to insert or overwrite
    #[serde(default)]
    pub set_attributes: BTreeMap<String, Value>,

    /// Attributes to remove
    #[serde(default)]
    pub remove_attributes: Vec<String>,
}

impl NodeChange {
    /// A change that sets one attribute
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        let mut change = Self::default();
        change.set_attributes.insert(key.into(), value);
        change
    }

    /// A change that only renames the node
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// The graph of nodes and variables being edited.
///
/// Listeners run synchronously inside the mutating call. They receive
/// snapshots and must not call back into the graph.
pub struct NodeGraph {
    nodes: HashMap<NodeId, Node>,
    variables: HashMap<VariableId, NodeVariable>,
    online: bool,
    events: EventBus,
}

impl NodeGraph {
    /// Create an empty, offline graph
    pub fn new(event_capacity: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            variables: HashMap::new(),
            online: false,
            events: EventBus::new(event_capacity),
        }
    }

    // === Subscriptions ===

    /// Register a listener for node events
    ///
    /// # Arguments
    ///
    /// * `listener` - Notified of every node added, deleted, modified or
    ///   whose sync status changes
    ///
    /// # Returns
    ///
    /// * The `SubscriptionId` to pass to [`NodeGraph::unsubscribe`]
    pub fn subscribe_nodes(&mut self, listener: Arc<dyn NodeListener>) -> SubscriptionId {
        self.events.add_node_listener(listener)
    }

    /// Observe the links of one variable
    ///
    /// # Arguments
    ///
    /// * `variable` - Variable to watch; links in either direction count
    /// * `listener` - Notified with the source variable of each link change
    ///
    /// # Returns
    ///
    /// * `Ok(SubscriptionId)` if the variable exists
    /// * `Err(AppError::NotFound)` otherwise
    pub fn subscribe_variable(
        &mut self,
        variable: VariableId,
        listener: Arc<dyn VariableListener>,
    ) -> Result<SubscriptionId, AppError> {
        if !self.variables.contains_key(&variable) {
            return Err(AppError::NotFound(format!(
                "Variable '{}' not found",
                variable
            )));
        }
        Ok(self.events.add_variable_listener(variable, listener))
    }

    /// Register a callback for one kind of event
    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, callback)
    }

    /// Remove a subscription
    ///
    /// # Returns
    ///
    /// * `true` if something was removed
    /// * `false` if `id` was unknown
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// The bus every change is reported through
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // === Queries ===

    /// Get a node by ID
    ///
    /// # Returns
    ///
    /// * `Some(&Node)` if found
    /// * `None` if not found
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Get a node by its exact name
    pub fn find_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.values().find(|node| node.name == name)
    }

    /// All nodes, sorted by name
    pub fn nodes(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes
    }

    /// Names currently in use, unordered
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.values().map(|node| node.name.as_str())
    }

    /// Get a variable by ID
    pub fn variable(&self, id: VariableId) -> Option<&NodeVariable> {
        self.variables.get(&id)
    }

    /// Variables of a node in creation order
    pub fn variables_of(&self, node: NodeId) -> Vec<&NodeVariable> {
        self.nodes
            .get(&node)
            .map(|node| {
                node.variables
                    .iter()
                    .filter_map(|id| self.variables.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every link in the graph, sorted
    pub fn links(&self) -> Vec<Link> {
        let links: BTreeSet<Link> = self
            .variables
            .values()
            .flat_map(|variable| {
                variable
                    .targets
                    .iter()
                    .map(move |&target| Link::new(variable.id, target))
            })
            .collect();
        links.into_iter().collect()
    }

    /// Number of nodes
    pub fn count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is in online mode
    pub fn is_online(&self) -> bool {
        self.online
    }

    fn node_or_not_found(&self, id: NodeId) -> Result<&Node, AppError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Node '{}' not found", id)))
    }

    fn variable_or_not_found(&self, id: VariableId) -> Result<&NodeVariable, AppError> {
        self.variables
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Variable '{}' not found", id)))
    }

    /// Check a proposed name against `validator` and against the names in use
    fn admit_name(&self, name: &str, validator: &dyn ValidateNodeName) -> Result<(), AppError> {
        if !validator.node_name_acceptable(name) {
            return Err(AppError::BadRequest(format!(
                "Node name '{}' is not acceptable",
                name
            )));
        }

        if !UniqueName::new(self.node_names()).node_name_acceptable(name) {
            return Err(AppError::Conflict(format!(
                "Node name '{}' is already in use",
                name
            )));
        }

        Ok(())
    }

    // === Node lifecycle ===

    /// Add a node. Its sync status follows the current online mode.
    ///
    /// # Arguments
    ///
    /// * `name` - Proposed name, checked by `validator` and for uniqueness
    /// * `node_type` - Kind of node; must not be blank
    /// * `attributes` - Initial attributes
    /// * `validator` - Naming rules the name must satisfy
    ///
    /// # Returns
    ///
    /// * `Ok(Node)` with the stored node
    /// * `Err(AppError::BadRequest)` if the name or type is rejected
    /// * `Err(AppError::Conflict)` if the name is already in use
    pub fn add_node(
        &mut self,
        name: &str,
        node_type: &str,
        attributes: BTreeMap<String, Value>,
        validator: &dyn ValidateNodeName,
    ) -> Result<Node, AppError> {
        self.admit_name(name, validator)?;

        if node_type.trim().is_empty() {
            return Err(AppError::BadRequest("node_type cannot be empty".to_string()));
        }

        let node = Node::new(name, node_type, attributes, SyncStatus::for_online(self.online));
        self.nodes.insert(node.id, node.clone());

        self.events.emit(GraphEvent::NodeAdded { node: node.clone() });
        Ok(node)
    }

    /// Delete a node together with its variables and their links.
    ///
    /// `NodeDeleted` is emitted first, while the node is still in the graph;
    /// a `LinkRemoved` follows for every link that goes away.
    pub fn delete_node(&mut self, id: NodeId) -> Result<Node, AppError> {
        let node = self.node_or_not_found(id)?.clone();

        self.events.emit(GraphEvent::NodeDeleted { node: node.clone() });

        let doomed: BTreeSet<Link> = node
            .variables
            .iter()
            .filter_map(|variable| self.variables.get(variable))
            .flat_map(|variable| variable.links())
            .collect();

        for link in doomed {
            self.unlink(link)?;
        }

        for variable in &node.variables {
            self.variables.remove(variable);
            self.events.forget_variable(*variable);
        }
        self.nodes.remove(&id);

        info!("Deleted node '{}' ({})", node.name, id);
        Ok(node)
    }

    /// Apply a [`NodeChange`]. A change that alters nothing emits nothing.
    pub fn modify_node(
        &mut self,
        id: NodeId,
        change: NodeChange,
        validator: &dyn ValidateNodeName,
    ) -> Result<Node, AppError> {
        let current = self.node_or_not_found(id)?;

        let rename = change.name.filter(|name| *name != current.name);
        if let Some(name) = &rename {
            self.admit_name(name, validator)?;
        }

        let sets: Vec<(String, Value)> = change
            .set_attributes
            .into_iter()
            .filter(|(key, value)| current.attributes.get(key) != Some(value))
            .collect();
        let removes: Vec<String> = change
            .remove_attributes
            .into_iter()
            .filter(|key| current.attributes.contains_key(key))
            .collect();

        if rename.is_none() && sets.is_empty() && removes.is_empty() {
            debug!("Change to node {} is a no-op", id);
            return Ok(current.clone());
        }

        let node = self.nodes.get_mut(&id).ok_or_else(|| {
            AppError::Internal(format!("Node '{}' vanished during modification", id))
        })?;
        if let Some(name) = rename {
            node.name = name;
        }
        for (key, value) in sets {
            node.attributes.insert(key, value);
        }
        for key in removes {
            node.attributes.remove(&key);
        }

        self.after_modification(id)
    }

    /// Set a node's sync status. Emits `NodeSyncChanged` only on a flip.
    pub fn set_sync(&mut self, id: NodeId, status: SyncStatus) -> Result<Node, AppError> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Node '{}' not found", id)))?;

        if node.sync == status {
            return Ok(node.clone());
        }

        node.sync = status;
        let snapshot = node.clone();
        self.events.emit(GraphEvent::NodeSyncChanged {
            node: snapshot.clone(),
        });
        Ok(snapshot)
    }

    /// Switch the graph online or offline.
    ///
    /// Going online synchronizes every unsynchronized node. Going offline
    /// leaves nodes alone; they lose sync when next modified. Returns the
    /// nodes whose status flipped, in name order.
    pub fn set_online(&mut self, online: bool) -> Vec<NodeId> {
        if self.online == online {
            return Vec::new();
        }
        self.online = online;
        info!("Graph is now {}", if online { "online" } else { "offline" });

        if !online {
            return Vec::new();
        }

        let stale: Vec<NodeId> = self
            .nodes()
            .into_iter()
            .filter(|node| !node.sync.is_synchronized())
            .map(|node| node.id)
            .collect();

        for id in &stale {
            if let Some(node) = self.nodes.get_mut(id) {
                node.sync = SyncStatus::Synchronized;
                let snapshot = node.clone();
                self.events.emit(GraphEvent::NodeSyncChanged { node: snapshot });
            }
        }

        stale
    }

    /// Stamp and announce a modification of node `id`.
    ///
    /// Offline, a synchronized node also becomes unsynchronized.
    fn after_modification(&mut self, id: NodeId) -> Result<Node, AppError> {
        let online = self.online;
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Node '{}' not found", id)))?;

        node.touch();
        let lost_sync = !online && node.sync.is_synchronized();
        if lost_sync {
            node.sync = SyncStatus::Unsynchronized;
        }
        let snapshot = node.clone();

        self.events.emit(GraphEvent::NodeModified {
            node: snapshot.clone(),
        });
        if lost_sync {
            self.events.emit(GraphEvent::NodeSyncChanged {
                node: snapshot.clone(),
            });
        }

        Ok(snapshot)
    }

    // === Variables ===

    /// Add a variable to a node. Counts as a modification of the node.
    pub fn add_variable(
        &mut self,
        node: NodeId,
        name: &str,
        value: Value,
    ) -> Result<NodeVariable, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Variable name cannot be empty".to_string(),
            ));
        }

        let owner = self.node_or_not_found(node)?;
        if self.variables_of(owner.id).iter().any(|v| v.name == name) {
            return Err(AppError::Conflict(format!(
                "Node '{}' already has a variable '{}'",
                owner.name, name
            )));
        }

        let variable = NodeVariable::new(node, name, value);
        self.variables.insert(variable.id, variable.clone());
        if let Some(owner) = self.nodes.get_mut(&node) {
            owner.variables.push(variable.id);
        }

        self.after_modification(node)?;
        Ok(variable)
    }

    /// Replace a variable's value. Counts as a modification of its node.
    pub fn set_variable_value(
        &mut self,
        id: VariableId,
        value: Value,
    ) -> Result<NodeVariable, AppError> {
        let variable = self
            .variables
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Variable '{}' not found", id)))?;

        if variable.value == value {
            return Ok(variable.clone());
        }

        variable.value = value;
        let snapshot = variable.clone();
        self.after_modification(snapshot.node)?;
        Ok(snapshot)
    }

    // === Links ===

    /// Link `source -> target`.
    ///
    /// Listeners of the target hear about it first, then listeners of the
    /// source; both receive the source variable.
    pub fn add_link(&mut self, source: VariableId, target: VariableId) -> Result<Link, AppError> {
        self.variable_or_not_found(source)?;
        let target_variable = self.variable_or_not_found(target)?;

        if source == target {
            return Err(AppError::BadRequest(
                "A variable cannot link to itself".to_string(),
            ));
        }

        if target_variable.sources.contains(&source) {
            return Err(AppError::Conflict(format!(
                "Link {} -> {} already exists",
                source, target
            )));
        }

        let link = Link::new(source, target);
        if let Some(variable) = self.variables.get_mut(&target) {
            variable.sources.insert(source);
        }
        let snapshot = match self.variables.get_mut(&source) {
            Some(variable) => {
                variable.targets.insert(target);
                variable.clone()
            }
            None => return Err(AppError::Internal(format!("Variable '{}' vanished", source))),
        };

        self.events.emit(GraphEvent::LinkAdded {
            observed: target,
            source: snapshot.clone(),
        });
        self.events.emit(GraphEvent::LinkAdded {
            observed: source,
            source: snapshot,
        });

        debug!("Linked {} -> {}", source, target);
        Ok(link)
    }

    /// Remove the link `source -> target`
    pub fn remove_link(&mut self, source: VariableId, target: VariableId) -> Result<Link, AppError> {
        let link = Link::new(source, target);
        let exists = self
            .variables
            .get(&source)
            .is_some_and(|variable| variable.targets.contains(&target));

        if !exists {
            return Err(AppError::NotFound(format!(
                "Link {} -> {} not found",
                source, target
            )));
        }

        self.unlink(link)?;
        Ok(link)
    }

    fn unlink(&mut self, link: Link) -> Result<(), AppError> {
        if let Some(variable) = self.variables.get_mut(&link.target) {
            variable.sources.remove(&link.source);
        }
        let snapshot = match self.variables.get_mut(&link.source) {
            Some(variable) => {
                variable.targets.remove(&link.target);
                variable.clone()
            }
            None => {
                return Err(AppError::Internal(format!(
                    "Variable '{}' vanished",
                    link.source
                )));
            }
        };

        self.events.emit(GraphEvent::LinkRemoved {
            observed: link.target,
            source: snapshot.clone(),
        });
        self.events.emit(GraphEvent::LinkRemoved {
            observed: link.source,
            source: snapshot,
        });

        debug!("Unlinked {} -> {}", link.source, link.target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nrs_libs::NameRules;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every notification as "<hook>:<name>"
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }
    }

    impl NodeListener for Recorder {
        fn node_added(&self, node: &Node) {
            self.push(format!("added:{}", node.name));
        }

        fn node_deleted(&self, node: &Node) {
            self.push(format!("deleted:{}", node.name));
        }

        fn node_modified(&self, node: &Node) {
            self.push(format!("modified:{}", node.name));
        }

        fn node_sync_changed(&self, node: &Node) {
            self.push(format!("sync:{}:{:?}", node.name, node.sync));
        }
    }

    impl VariableListener for Recorder {
        fn link_added(&self, source: &NodeVariable) {
            self.push(format!("link_added:{}", source.name));
        }

        fn link_removed(&self, source: &NodeVariable) {
            self.push(format!("link_removed:{}", source.name));
        }
    }

    fn rules() -> NameRules {
        NameRules::default()
    }

    fn graph_with_recorder() -> (NodeGraph, Arc<Recorder>) {
        let mut graph = NodeGraph::new(16);
        let recorder = Arc::new(Recorder::default());
        graph.subscribe_nodes(recorder.clone());
        (graph, recorder)
    }

    fn add(graph: &mut NodeGraph, name: &str) -> Node {
        graph
            .add_node(name, "neuron", BTreeMap::new(), &rules())
            .unwrap()
    }

    #[test]
    fn test_add_node_notifies() {
        let (mut graph, recorder) = graph_with_recorder();

        let node = add(&mut graph, "sensor");

        assert_eq!(graph.count(), 1);
        assert_eq!(node.sync, SyncStatus::Unsynchronized);
        assert_eq!(graph.node(node.id).unwrap().name, "sensor");
        assert_eq!(recorder.take(), vec!["added:sensor"]);
    }

    #[test]
    fn test_add_node_online_starts_synchronized() {
        let mut graph = NodeGraph::new(16);
        graph.set_online(true);

        let node = add(&mut graph, "motor");
        assert_eq!(node.sync, SyncStatus::Synchronized);
    }

    #[test]
    fn test_rejected_names_do_not_notify() {
        let (mut graph, recorder) = graph_with_recorder();
        add(&mut graph, "sensor");
        recorder.take();

        let invalid = graph.add_node("two words", "neuron", BTreeMap::new(), &rules());
        assert!(matches!(invalid, Err(AppError::BadRequest(_))));

        let duplicate = graph.add_node("sensor", "neuron", BTreeMap::new(), &rules());
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));

        let custom = |name: &str| name.starts_with("n_");
        let rejected = graph.add_node("motor", "neuron", BTreeMap::new(), &custom);
        assert!(matches!(rejected, Err(AppError::BadRequest(_))));

        assert_eq!(graph.count(), 1);
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_modify_node_offline_loses_sync() {
        let (mut graph, recorder) = graph_with_recorder();
        let node = add(&mut graph, "sensor");
        graph.set_sync(node.id, SyncStatus::Synchronized).unwrap();
        recorder.take();

        let updated = graph
            .modify_node(node.id, NodeChange::set("gain", json!(2.0)), &rules())
            .unwrap();

        assert_eq!(updated.attribute("gain"), Some(&json!(2.0)));
        assert_eq!(updated.sync, SyncStatus::Unsynchronized);
        assert!(updated.modified_at >= node.modified_at);
        assert_eq!(
            recorder.take(),
            vec!["modified:sensor", "sync:sensor:Unsynchronized"]
        );
    }

    #[test]
    fn test_modify_node_online_keeps_sync() {
        let (mut graph, recorder) = graph_with_recorder();
        graph.set_online(true);
        let node = add(&mut graph, "sensor");
        recorder.take();

        graph
            .modify_node(node.id, NodeChange::set("gain", json!(1)), &rules())
            .unwrap();

        assert_eq!(recorder.take(), vec!["modified:sensor"]);
    }

    #[test]
    fn test_no_op_change_emits_nothing() {
        let (mut graph, recorder) = graph_with_recorder();
        let node = add(&mut graph, "sensor");
        graph
            .modify_node(node.id, NodeChange::set("gain", json!(1)), &rules())
            .unwrap();
        recorder.take();

        let mut change = NodeChange::set("gain", json!(1));
        change.name = Some("sensor".to_string());
        change.remove_attributes.push("missing".to_string());
        graph.modify_node(node.id, change, &rules()).unwrap();

        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_rename_and_remove_attribute() {
        let (mut graph, recorder) = graph_with_recorder();
        let mut attributes = BTreeMap::new();
        attributes.insert("rate".to_string(), json!(10));
        let node = graph
            .add_node("sensor", "neuron", attributes, &rules())
            .unwrap();
        add(&mut graph, "taken");
        recorder.take();

        let clash = graph.modify_node(node.id, NodeChange::rename("taken"), &rules());
        assert!(matches!(clash, Err(AppError::Conflict(_))));

        let mut change = NodeChange::rename("eye");
        change.remove_attributes.push("rate".to_string());
        let updated = graph.modify_node(node.id, change, &rules()).unwrap();

        assert_eq!(updated.name, "eye");
        assert!(updated.attributes.is_empty());
        assert!(graph.find_by_name("sensor").is_none());
        assert_eq!(recorder.take(), vec!["modified:eye"]);
    }

    #[test]
    fn test_set_sync_only_notifies_on_flip() {
        let (mut graph, recorder) = graph_with_recorder();
        let node = add(&mut graph, "sensor");
        recorder.take();

        graph.set_sync(node.id, SyncStatus::Unsynchronized).unwrap();
        assert!(recorder.take().is_empty());

        graph.set_sync(node.id, SyncStatus::Synchronized).unwrap();
        assert_eq!(recorder.take(), vec!["sync:sensor:Synchronized"]);

        assert!(matches!(
            graph.set_sync(NodeId::new(), SyncStatus::Synchronized),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_going_online_synchronizes_stale_nodes() {
        let (mut graph, recorder) = graph_with_recorder();
        let b = add(&mut graph, "b");
        let a = add(&mut graph, "a");
        recorder.take();

        let flipped = graph.set_online(true);
        assert_eq!(flipped, vec![a.id, b.id]);
        assert_eq!(
            recorder.take(),
            vec!["sync:a:Synchronized", "sync:b:Synchronized"]
        );

        // Already online: nothing to do
        assert!(graph.set_online(true).is_empty());

        // Going offline leaves nodes synchronized until they are edited
        assert!(graph.set_online(false).is_empty());
        assert!(graph.node(a.id).unwrap().sync.is_synchronized());
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_variables_count_as_modifications() {
        let (mut graph, recorder) = graph_with_recorder();
        graph.set_online(true);
        let node = add(&mut graph, "neuron");
        recorder.take();

        let variable = graph.add_variable(node.id, "potential", json!(-70)).unwrap();
        assert_eq!(graph.variables_of(node.id).len(), 1);
        assert_eq!(graph.node(node.id).unwrap().variables, vec![variable.id]);

        let duplicate = graph.add_variable(node.id, "potential", json!(0));
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
        assert!(matches!(
            graph.add_variable(node.id, " ", json!(0)),
            Err(AppError::BadRequest(_))
        ));

        graph.set_variable_value(variable.id, json!(-55)).unwrap();
        graph.set_variable_value(variable.id, json!(-55)).unwrap();

        assert_eq!(
            graph.variable(variable.id).unwrap().value,
            json!(-55)
        );
        assert_eq!(recorder.take(), vec!["modified:neuron", "modified:neuron"]);
    }

    #[test]
    fn test_links_notify_both_ends_with_source() {
        let mut graph = NodeGraph::new(16);
        let pre = add(&mut graph, "pre");
        let post = add(&mut graph, "post");
        let out = graph.add_variable(pre.id, "out", json!(0)).unwrap();
        let input = graph.add_variable(post.id, "in", json!(0)).unwrap();

        let source_side = Arc::new(Recorder::default());
        let target_side = Arc::new(Recorder::default());
        graph.subscribe_variable(out.id, source_side.clone()).unwrap();
        graph.subscribe_variable(input.id, target_side.clone()).unwrap();

        let link = graph.add_link(out.id, input.id).unwrap();
        assert_eq!(graph.links(), vec![link]);
        assert!(graph.variable(input.id).unwrap().sources.contains(&out.id));
        assert_eq!(source_side.take(), vec!["link_added:out"]);
        assert_eq!(target_side.take(), vec!["link_added:out"]);

        graph.remove_link(out.id, input.id).unwrap();
        assert!(graph.links().is_empty());
        assert_eq!(source_side.take(), vec!["link_removed:out"]);
        assert_eq!(target_side.take(), vec!["link_removed:out"]);
    }

    #[test]
    fn test_link_errors() {
        let mut graph = NodeGraph::new(16);
        let node = add(&mut graph, "n");
        let a = graph.add_variable(node.id, "a", json!(0)).unwrap();
        let b = graph.add_variable(node.id, "b", json!(0)).unwrap();

        assert!(matches!(
            graph.add_link(a.id, a.id),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            graph.add_link(a.id, VariableId::new()),
            Err(AppError::NotFound(_))
        ));

        graph.add_link(a.id, b.id).unwrap();
        assert!(matches!(
            graph.add_link(a.id, b.id),
            Err(AppError::Conflict(_))
        ));

        // Reverse direction is a different link
        graph.add_link(b.id, a.id).unwrap();
        assert_eq!(graph.links().len(), 2);

        assert!(matches!(
            graph.remove_link(VariableId::new(), a.id),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            graph.subscribe_variable(VariableId::new(), Arc::new(Recorder::default())),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_node_notifies_before_removal_then_unlinks() {
        let (mut graph, recorder) = graph_with_recorder();
        let pre = add(&mut graph, "pre");
        let post = add(&mut graph, "post");
        let out = graph.add_variable(pre.id, "out", json!(0)).unwrap();
        let input = graph.add_variable(post.id, "in", json!(0)).unwrap();
        graph.add_link(out.id, input.id).unwrap();

        let target_side = Arc::new(Recorder::default());
        graph.subscribe_variable(input.id, target_side.clone()).unwrap();
        recorder.take();

        // Observe graph order: the deletion callback fires before any unlink
        let order = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::NodeDeleted, EventKind::LinkRemoved] {
            let log = Arc::clone(&order);
            graph.on(kind, move |event| log.lock().unwrap().push(event.kind()));
        }

        let deleted = graph.delete_node(pre.id).unwrap();

        assert_eq!(deleted.variables, vec![out.id]);
        assert_eq!(recorder.take(), vec!["deleted:pre"]);
        assert_eq!(target_side.take(), vec!["link_removed:out"]);
        assert_eq!(
            *order.lock().unwrap(),
            vec![
                EventKind::NodeDeleted,
                EventKind::LinkRemoved,
                EventKind::LinkRemoved
            ]
        );

        assert!(graph.node(pre.id).is_none());
        assert!(graph.variable(out.id).is_none());
        assert!(graph.links().is_empty());
        assert!(graph.variable(input.id).unwrap().sources.is_empty());
        assert!(matches!(
            graph.delete_node(pre.id),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_node_with_internal_link() {
        let mut graph = NodeGraph::new(16);
        let node = add(&mut graph, "loop");
        let a = graph.add_variable(node.id, "a", json!(0)).unwrap();
        let b = graph.add_variable(node.id, "b", json!(0)).unwrap();
        graph.add_link(a.id, b.id).unwrap();

        graph.delete_node(node.id).unwrap();
        assert_eq!(graph.count(), 0);
        assert!(graph.variable(b.id).is_none());
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let mut graph = NodeGraph::new(16);
        let recorder = Arc::new(Recorder::default());
        let id = graph.subscribe_nodes(recorder.clone());

        assert!(graph.unsubscribe(id));
        add(&mut graph, "quiet");
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_nodes_sorted_by_name() {
        let mut graph = NodeGraph::new(16);
        add(&mut graph, "c");
        add(&mut graph, "a");
        add(&mut graph, "b");

        let names: Vec<&str> = graph.nodes().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
