//! Node and variable model.
//!
//! A [`Node`] is a named, configurable element of the graph the GUI edits.
//! Nodes own [`NodeVariable`]s, and variables are joined by directed
//! [`Link`]s (`source -> target`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub Uuid);

impl NodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier of a node variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableId(pub Uuid);

impl VariableId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VariableId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Whether a node's state matches what the running system knows about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synchronized,
    Unsynchronized,
}

impl SyncStatus {
    pub fn is_synchronized(self) -> bool {
        matches!(self, SyncStatus::Synchronized)
    }

    /// Status a freshly created or reconnected node gets in the given mode
    pub fn for_online(online: bool) -> Self {
        if online {
            SyncStatus::Synchronized
        } else {
            SyncStatus::Unsynchronized
        }
    }
}

/// A configurable element of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,

    /// Display name, unique within the graph
    pub name: String,

    /// Kind of element this node configures (e.g. "neuron", "motor")
    pub node_type: String,

    /// Free-form attributes edited through the GUI
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,

    pub sync: SyncStatus,

    /// Variables owned by this node, in creation order
    #[serde(default)]
    pub variables: Vec<VariableId>,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Node {
    pub fn new(
        name: impl Into<String>,
        node_type: impl Into<String>,
        attributes: BTreeMap<String, Value>,
        sync: SyncStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: NodeId::new(),
            name: name.into(),
            node_type: node_type.into(),
            attributes,
            sync,
            variables: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

/// A variable of a node, taking part in the link graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeVariable {
    pub id: VariableId,

    /// Owning node
    pub node: NodeId,

    /// Name, unique within the owning node
    pub name: String,

    #[serde(default)]
    pub value: Value,

    /// Variables linking into this one
    #[serde(default)]
    pub sources: BTreeSet<VariableId>,

    /// Variables this one links to
    #[serde(default)]
    pub targets: BTreeSet<VariableId>,
}

impl NodeVariable {
    pub fn new(node: NodeId, name: impl Into<String>, value: Value) -> Self {
        Self {
            id: VariableId::new(),
            node,
            name: name.into(),
            value,
            sources: BTreeSet::new(),
            targets: BTreeSet::new(),
        }
    }

    /// Number of links touching this variable, either direction
    pub fn link_count(&self) -> usize {
        self.sources.len() + self.targets.len()
    }

    /// Every link this variable takes part in
    pub fn links(&self) -> impl Iterator<Item = Link> + '_ {
        let incoming = self.sources.iter().map(|&source| Link {
            source,
            target: self.id,
        });
        let outgoing = self.targets.iter().map(|&target| Link {
            source: self.id,
            target,
        });
        incoming.chain(outgoing)
    }
}

/// Directed link between two variables
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Link {
    pub source: VariableId,
    pub target: VariableId,
}

impl Link {
    pub fn new(source: VariableId, target: VariableId) -> Self {
        Self { source, target }
    }

    pub fn touches(&self, variable: VariableId) -> bool {
        self.source == variable || self.target == variable
    }
}
