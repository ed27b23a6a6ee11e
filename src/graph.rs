//! # Property Graph
//!
//! In-memory mutable graph of typed nodes with attributes and directed,
//! named relations. The graph owns node lifecycle within one disambiguation
//! pass: nodes are created by the parser or by a merge, and destroyed only
//! through [`PropertyGraph::replace`].
//!
//! Acyclicity is not enforced here; cycles on designated relations are
//! removed upstream before disambiguation runs.

use crate::error::{DisambiguationError, Result};
use crate::model::{Attributes, InstanceRef, Node, NodeId};
use hashbrown::{HashMap, HashSet};
use std::collections::{BTreeMap, BTreeSet};

/// A directed, named relation `subject --name--> object`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub subject: NodeId,
    pub object: NodeId,
    pub name: String,
}

impl Edge {
    pub fn new(subject: NodeId, object: NodeId, name: impl Into<String>) -> Self {
        Self {
            subject,
            object,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PropertyGraph {
    nodes: BTreeMap<NodeId, Node>,
    outgoing: HashMap<NodeId, BTreeSet<Edge>>,
    incoming: HashMap<NodeId, BTreeSet<Edge>>,
    next_node_id: u32,
}

impl PropertyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node and return its handle.
    pub fn create(
        &mut self,
        external_id: impl Into<String>,
        type_name: impl Into<String>,
        attrs: Attributes,
    ) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        self.nodes.insert(
            id,
            Node::new(id, external_id.into(), type_name.into(), attrs),
        );
        id
    }

    /// Add `subject --name--> object`. Relating an identical triple twice is
    /// a no-op; returns whether the edge was new.
    pub fn relate(&mut self, subject: NodeId, object: NodeId, name: &str) -> Result<bool> {
        self.get(subject)?;
        self.get(object)?;
        Ok(self.insert_edge(Edge::new(subject, object, name)))
    }

    /// Redirect every edge incident to `old` onto `new`, then remove `old`.
    ///
    /// Edges that would duplicate an existing edge of `new`, or become a
    /// self-loop on `new`, are dropped.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        self.get(old)?;
        self.get(new)?;
        if old == new {
            return Ok(());
        }

        let mut incident: BTreeSet<Edge> = self.outgoing.remove(&old).unwrap_or_default();
        incident.extend(self.incoming.remove(&old).unwrap_or_default());

        for edge in incident {
            self.detach_edge(&edge);
            let redirect = |id: NodeId| if id == old { new } else { id };
            let moved = Edge::new(redirect(edge.subject), redirect(edge.object), edge.name);
            if moved.subject == moved.object {
                continue;
            }
            self.insert_edge(moved);
        }

        self.nodes.remove(&old);
        Ok(())
    }

    /// Bind a node to a persisted entity. A binding, once set, is never
    /// overwritten; returns whether this call set it.
    pub fn bind_instance(&mut self, id: NodeId, instance: InstanceRef) -> Result<bool> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or(DisambiguationError::UnknownNode(id))?;
        if node.instance.is_some() {
            return Ok(false);
        }
        node.instance = Some(instance);
        Ok(true)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Like `node`, but a missing node is an error.
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(DisambiguationError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes in handle order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(BTreeSet::len).sum()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.outgoing.values().flat_map(|edges| edges.iter())
    }

    /// Edges leaving `id`.
    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.outgoing.get(&id).into_iter().flat_map(|edges| edges.iter())
    }

    /// Edges arriving at `id`.
    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &Edge> {
        self.incoming.get(&id).into_iter().flat_map(|edges| edges.iter())
    }

    /// Objects of the forward `name` edges of `id`.
    pub fn related(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.outgoing(id)
            .filter(|edge| edge.name == name)
            .map(|edge| edge.object)
            .collect()
    }

    /// Subjects of the `name` edges pointing at `id`.
    pub fn referrers(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.incoming(id)
            .filter(|edge| edge.name == name)
            .map(|edge| edge.subject)
            .collect()
    }

    /// Rename every node whose external id also occurs in `other` to a fresh
    /// id unused by either graph. Returns the renamed handles.
    ///
    /// External ids are only unique within one graph, and relation keys are
    /// built from them, so two graphs must not share any before their keys
    /// are compared.
    pub fn namespace_external_ids(&mut self, other: &PropertyGraph) -> Vec<NodeId> {
        let foreign: HashSet<&str> = other.nodes().map(|n| n.external_id.as_str()).collect();
        let mut taken: HashSet<String> = foreign.iter().map(|id| id.to_string()).collect();
        taken.extend(self.nodes().map(|n| n.external_id.clone()));

        let mut renamed = Vec::new();
        for node in self.nodes.values_mut() {
            if !foreign.contains(node.external_id.as_str()) {
                continue;
            }
            let fresh = (1u32..)
                .map(|n| format!("{}~{}", node.external_id, n))
                .find(|candidate| !taken.contains(candidate))
                .unwrap_or_default();
            taken.insert(fresh.clone());
            node.external_id = fresh;
            renamed.push(node.id);
        }
        renamed
    }

    pub fn find_by_external_id(&self, external_id: &str) -> Option<NodeId> {
        self.nodes
            .values()
            .find(|node| node.external_id == external_id)
            .map(|node| node.id)
    }

    fn insert_edge(&mut self, edge: Edge) -> bool {
        let inserted = self
            .outgoing
            .entry(edge.subject)
            .or_default()
            .insert(edge.clone());
        if inserted {
            self.incoming.entry(edge.object).or_default().insert(edge);
        }
        inserted
    }

    fn detach_edge(&mut self, edge: &Edge) {
        if let Some(edges) = self.outgoing.get_mut(&edge.subject) {
            edges.remove(edge);
        }
        if let Some(edges) = self.incoming.get_mut(&edge.object) {
            edges.remove(edge);
        }
    }
}
