//! Listener contracts and graph events.
//!
//! Graph changes are described by [`GraphEvent`], one variant per
//! [`EventKind`]. Code that prefers the observer style implements
//! [`NodeListener`] or [`VariableListener`]; all hooks default to no-ops so
//! a listener only writes the ones it cares about.

use crate::node::{Node, NodeVariable, VariableId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observer of the node lifecycle.
///
/// Hooks run synchronously on the thread applying the change and must not
/// call back into the graph.
pub trait NodeListener: Send + Sync {
    /// A node became part of the graph.
    fn node_added(&self, _node: &Node) {}

    /// A node is being removed.
    ///
    /// Called mid-deletion: the node and its variables are still in the graph
    /// when this runs.
    fn node_deleted(&self, _node: &Node) {}

    /// An attribute, the name or a variable of the node changed.
    fn node_modified(&self, _node: &Node) {}

    /// The node's synchronization status flipped.
    fn node_sync_changed(&self, _node: &Node) {}
}

/// Observer of the links of one variable.
///
/// Both hooks receive the *source* variable of the link that changed.
pub trait VariableListener: Send + Sync {
    fn link_added(&self, _source: &NodeVariable) {}

    fn link_removed(&self, _source: &NodeVariable) {}
}

/// Discriminant of [`GraphEvent`], used to key subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NodeAdded,
    NodeDeleted,
    NodeModified,
    NodeSyncChanged,
    LinkAdded,
    LinkRemoved,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::NodeAdded,
        EventKind::NodeDeleted,
        EventKind::NodeModified,
        EventKind::NodeSyncChanged,
        EventKind::LinkAdded,
        EventKind::LinkRemoved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::NodeAdded => "node_added",
            EventKind::NodeDeleted => "node_deleted",
            EventKind::NodeModified => "node_modified",
            EventKind::NodeSyncChanged => "node_sync_changed",
            EventKind::LinkAdded => "link_added",
            EventKind::LinkRemoved => "link_removed",
        }
    }

    pub fn is_node_event(self) -> bool {
        !matches!(self, EventKind::LinkAdded | EventKind::LinkRemoved)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change to the graph, carrying a snapshot of the affected entity.
///
/// Serialized internally tagged, e.g.
/// `{"type":"node_added","node":{...}}` or
/// `{"type":"link_removed","observed":"<uuid>","source":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphEvent {
    NodeAdded {
        node: Node,
    },
    NodeDeleted {
        node: Node,
    },
    NodeModified {
        node: Node,
    },
    NodeSyncChanged {
        node: Node,
    },
    /// A link touching `observed` was added; `source` is the link's source
    LinkAdded {
        observed: VariableId,
        source: NodeVariable,
    },
    LinkRemoved {
        observed: VariableId,
        source: NodeVariable,
    },
}

impl GraphEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GraphEvent::NodeAdded { .. } => EventKind::NodeAdded,
            GraphEvent::NodeDeleted { .. } => EventKind::NodeDeleted,
            GraphEvent::NodeModified { .. } => EventKind::NodeModified,
            GraphEvent::NodeSyncChanged { .. } => EventKind::NodeSyncChanged,
            GraphEvent::LinkAdded { .. } => EventKind::LinkAdded,
            GraphEvent::LinkRemoved { .. } => EventKind::LinkRemoved,
        }
    }

    /// Node the event is about, for node lifecycle events
    pub fn node(&self) -> Option<&Node> {
        match self {
            GraphEvent::NodeAdded { node }
            | GraphEvent::NodeDeleted { node }
            | GraphEvent::NodeModified { node }
            | GraphEvent::NodeSyncChanged { node } => Some(node),
            GraphEvent::LinkAdded { .. } | GraphEvent::LinkRemoved { .. } => None,
        }
    }

    /// Call the matching hook of a node listener. Link events are skipped.
    pub fn notify_node_listener(&self, listener: &dyn NodeListener) {
        match self {
            GraphEvent::NodeAdded { node } => listener.node_added(node),
            GraphEvent::NodeDeleted { node } => listener.node_deleted(node),
            GraphEvent::NodeModified { node } => listener.node_modified(node),
            GraphEvent::NodeSyncChanged { node } => listener.node_sync_changed(node),
            GraphEvent::LinkAdded { .. } | GraphEvent::LinkRemoved { .. } => {}
        }
    }

    /// Call the matching hook of a variable listener. Node events are skipped.
    pub fn notify_variable_listener(&self, listener: &dyn VariableListener) {
        match self {
            GraphEvent::LinkAdded { source, .. } => listener.link_added(source),
            GraphEvent::LinkRemoved { source, .. } => listener.link_removed(source),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeId, SyncStatus};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl NodeListener for Recorder {
        fn node_added(&self, node: &Node) {
            self.calls.lock().unwrap().push(format!("added:{}", node.name));
        }

        fn node_sync_changed(&self, node: &Node) {
            self.calls.lock().unwrap().push(format!("sync:{}", node.name));
        }
    }

    impl VariableListener for Recorder {
        fn link_removed(&self, source: &NodeVariable) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("unlinked:{}", source.name));
        }
    }

    fn test_node(name: &str) -> Node {
        Node::new(name, "neuron", BTreeMap::new(), SyncStatus::Synchronized)
    }

    #[test]
    fn test_kind_matches_variant() {
        let node = test_node("n1");
        let variable = NodeVariable::new(node.id, "v", Value::Null);

        let events = [
            GraphEvent::NodeAdded { node: node.clone() },
            GraphEvent::NodeDeleted { node: node.clone() },
            GraphEvent::NodeModified { node: node.clone() },
            GraphEvent::NodeSyncChanged { node: node.clone() },
            GraphEvent::LinkAdded {
                observed: variable.id,
                source: variable.clone(),
            },
            GraphEvent::LinkRemoved {
                observed: variable.id,
                source: variable,
            },
        ];

        let kinds: Vec<EventKind> = events.iter().map(GraphEvent::kind).collect();
        assert_eq!(kinds, EventKind::ALL.to_vec());
    }

    #[test]
    fn test_event_serialization_is_internally_tagged() {
        let event = GraphEvent::NodeSyncChanged {
            node: test_node("motor"),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "node_sync_changed");
        assert_eq!(json["node"]["name"], "motor");
        assert_eq!(json["node"]["sync"], "synchronized");
    }

    #[test]
    fn test_unimplemented_hooks_are_no_ops() {
        let recorder = Recorder::default();
        let node = test_node("n1");

        GraphEvent::NodeModified { node: node.clone() }.notify_node_listener(&recorder);
        GraphEvent::NodeAdded { node: node.clone() }.notify_node_listener(&recorder);
        GraphEvent::NodeSyncChanged { node: node.clone() }.notify_node_listener(&recorder);

        let variable = NodeVariable::new(NodeId::new(), "out", Value::Null);
        GraphEvent::LinkAdded {
            observed: variable.id,
            source: variable.clone(),
        }
        .notify_variable_listener(&recorder);
        GraphEvent::LinkRemoved {
            observed: variable.id,
            source: variable,
        }
        .notify_variable_listener(&recorder);

        // Node events never reach variable hooks
        GraphEvent::NodeAdded { node }.notify_variable_listener(&recorder);

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(*calls, vec!["added:n1", "sync:n1", "unlinked:out"]);
    }

    #[test]
    fn test_is_node_event() {
        assert!(EventKind::NodeDeleted.is_node_event());
        assert!(!EventKind::LinkAdded.is_node_event());
        assert_eq!(EventKind::NodeSyncChanged.to_string(), "node_sync_changed");
    }
}
