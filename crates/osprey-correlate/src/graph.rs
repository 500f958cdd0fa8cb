//! Relationship graph around a target.
//!
//! The graph is a star: the target sits in the middle and every correlated
//! identifier hangs off it by a single edge.

use crate::correlation::{display_string, CorrelationSet};
use osprey_core::Target;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};
use tracing::debug;

/// Id of the registrant node when the record has no registrant name.
pub const UNKNOWN_REGISTRANT: &str = "Unknown Registrant";

/// What a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The scanned target
    Target,
    /// A contact address
    Email,
    /// The domain registrar
    Registrar,
    /// A DNS name server
    NameServer,
    /// The domain registrant
    Registrant,
}

impl NodeKind {
    /// Name used in serialized output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Email => "email",
            Self::Registrar => "registrar",
            Self::NameServer => "name_server",
            Self::Registrant => "registrant",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the relationship graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    /// Unique id; also the label
    pub id: String,
    /// What the node stands for
    pub kind: NodeKind,
    /// Extra details (registrant fields)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, Value>>,
}

/// An undirected edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GraphEdge {
    /// One endpoint (always the target for built graphs)
    pub source: String,
    /// The other endpoint
    pub target: String,
}

impl GraphEdge {
    fn connects(&self, a: &str, b: &str) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

/// Undirected graph with nodes unique by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Graph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node unless one with the same id exists. Returns whether it was added.
    pub fn add_node(
        &mut self,
        id: impl Into<String>,
        kind: NodeKind,
        attributes: Option<BTreeMap<String, Value>>,
    ) -> bool {
        let id = id.into();
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(GraphNode {
            id,
            kind,
            attributes,
        });
        true
    }

    /// Connect two existing, distinct nodes. Returns whether an edge was added.
    pub fn add_edge(&mut self, a: &str, b: &str) -> bool {
        if a == b || !self.index.contains_key(a) || !self.index.contains_key(b) {
            return false;
        }
        if self.edges.iter().any(|e| e.connects(a, b)) {
            return false;
        }
        self.edges.push(GraphEdge {
            source: a.to_string(),
            target: b.to_string(),
        });
        true
    }

    /// Nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Edges in insertion order.
    #[must_use]
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Ids of every node sharing an edge with `id`.
    #[must_use]
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter_map(|e| {
                if e.source == id {
                    Some(e.target.as_str())
                } else if e.target == id {
                    Some(e.source.as_str())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Render as a Graphviz `graph`.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let name = self
            .nodes
            .iter()
            .find(|n| n.kind == NodeKind::Target)
            .map_or("osprey", |n| n.id.as_str());

        let mut out = String::new();
        let _ = writeln!(out, "graph {} {{", quote(name));
        for node in &self.nodes {
            let _ = writeln!(
                out,
                "    {} [kind={}, shape={}];",
                quote(&node.id),
                quote(node.kind.as_str()),
                shape(node.kind)
            );
        }
        for edge in &self.edges {
            let _ = writeln!(out, "    {} -- {};", quote(&edge.source), quote(&edge.target));
        }
        out.push_str("}\n");
        out
    }
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn shape(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Target => "doublecircle",
        NodeKind::Email => "ellipse",
        NodeKind::Registrar => "box",
        NodeKind::NameServer => "diamond",
        NodeKind::Registrant => "house",
    }
}

fn attach(
    graph: &mut Graph,
    hub: &str,
    id: &str,
    kind: NodeKind,
    attributes: Option<BTreeMap<String, Value>>,
) -> bool {
    let added = graph.add_node(id, kind, attributes);
    graph.add_edge(hub, id);
    added
}

/// Build the relationship graph for `target` from its correlations.
///
/// The target node comes first, followed by emails, the registrar, name
/// servers and one registrant node, each joined to the target. Ids that are
/// already taken keep their first kind and get no second edge; a registrant
/// whose name is already a node loses its attribute map.
#[must_use]
pub fn build_graph(target: &Target, correlations: &CorrelationSet) -> Graph {
    let hub = target.name().as_str();
    let mut graph = Graph::new();
    graph.add_node(hub, NodeKind::Target, None);

    for email in &correlations.emails {
        attach(&mut graph, hub, email, NodeKind::Email, None);
    }
    if let Some(registrar) = &correlations.registrar {
        attach(&mut graph, hub, registrar, NodeKind::Registrar, None);
    }
    for name_server in &correlations.name_servers {
        attach(&mut graph, hub, name_server, NodeKind::NameServer, None);
    }
    if !correlations.registrant_info.is_empty() {
        let id = correlations
            .registrant_info
            .get("Name")
            .and_then(display_string)
            .unwrap_or_else(|| UNKNOWN_REGISTRANT.to_string());
        let added = attach(
            &mut graph,
            hub,
            &id,
            NodeKind::Registrant,
            Some(correlations.registrant_info.clone()),
        );
        if !added {
            debug!(
                registrant = %id,
                "registrant name already used by another node, dropping its attributes"
            );
        }
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::find_correlations;
    use osprey_core::{ScanCategory, TargetName};
    use serde_json::json;
    use std::collections::BTreeSet;

    fn target_with_domain(name: &str, record: Value) -> Target {
        let mut target = Target::new(TargetName::new(name).expect("valid"));
        target.insert(ScanCategory::Domain, record);
        target
    }

    fn build(target: &Target) -> Graph {
        build_graph(target, &find_correlations(target))
    }

    fn assert_hub(graph: &Graph, hub: &str) {
        for edge in graph.edges() {
            assert!(
                edge.source == hub || edge.target == hub,
                "edge {edge:?} does not touch {hub}"
            );
        }
    }

    #[test]
    fn test_scenario_graph() {
        let target = target_with_domain(
            "example.com",
            json!({
                "emails": ["a@x.com", "b@x.com"],
                "registrar": "ACME",
                "name_servers": "ns1.x.com"
            }),
        );
        let graph = build(&target);

        let ids: BTreeSet<&str> = graph.nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            BTreeSet::from(["example.com", "a@x.com", "b@x.com", "ACME", "ns1.x.com"])
        );
        assert_eq!(graph.edge_count(), 4);
        assert_hub(&graph, "example.com");

        assert_eq!(graph.node("ACME").map(|n| n.kind), Some(NodeKind::Registrar));
        assert_eq!(graph.node("ns1.x.com").map(|n| n.kind), Some(NodeKind::NameServer));
        assert_eq!(graph.node("example.com").map(|n| n.kind), Some(NodeKind::Target));
    }

    #[test]
    fn test_empty_record_gives_lone_target() {
        let graph = build(&target_with_domain("example.com", json!({})));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.nodes()[0].kind, NodeKind::Target);
    }

    #[test]
    fn test_registrant_node() {
        let target = target_with_domain(
            "example.com",
            json!({ "name": "Jane Doe", "country": "US" }),
        );
        let graph = build(&target);

        let registrant = graph.node("Jane Doe").expect("registrant node");
        assert_eq!(registrant.kind, NodeKind::Registrant);
        let attributes = registrant.attributes.as_ref().expect("attributes");
        assert_eq!(attributes["Country"], json!("US"));
        assert_eq!(graph.neighbors("Jane Doe"), vec!["example.com"]);
    }

    #[test]
    fn test_unnamed_registrant() {
        let graph = build(&target_with_domain(
            "example.com",
            json!({ "org": "Example Org" }),
        ));
        assert_eq!(
            graph.node(UNKNOWN_REGISTRANT).map(|n| n.kind),
            Some(NodeKind::Registrant)
        );
    }

    #[test]
    fn test_colliding_ids_keep_first_kind() {
        let target = target_with_domain(
            "example.com",
            json!({
                "emails": ["ACME", "example.com"],
                "registrar": "ACME",
            }),
        );
        let graph = build(&target);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node("ACME").map(|n| n.kind), Some(NodeKind::Email));
        assert_eq!(graph.node("example.com").map(|n| n.kind), Some(NodeKind::Target));
        assert_hub(&graph, "example.com");
    }

    #[test]
    fn test_registrant_named_like_an_email_keeps_email_node() {
        let target = target_with_domain(
            "example.com",
            json!({
                "emails": ["hostmaster@example.com"],
                "name": "hostmaster@example.com",
                "country": "US",
            }),
        );
        let graph = build(&target);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        let node = graph.node("hostmaster@example.com").expect("email node");
        assert_eq!(node.kind, NodeKind::Email);
        assert_eq!(node.attributes, None);
    }

    #[test]
    fn test_build_is_deterministic() {
        let target = target_with_domain(
            "example.com",
            json!({
                "emails": ["z@x.com", "a@x.com", "m@x.com"],
                "name_servers": ["NS2.X.COM", "ns1.x.com"],
                "registrar": "ACME",
                "name": "Jane Doe",
                "city": "Springfield"
            }),
        );
        let first = build(&target);
        let second = build(&target);
        assert_eq!(first.nodes(), second.nodes());
        assert_eq!(first.edges(), second.edges());
        assert_eq!(first.to_dot(), second.to_dot());
        assert_hub(&first, "example.com");
        assert_eq!(first.neighbors("example.com").len(), first.node_count() - 1);
    }

    #[test]
    fn test_edges_are_not_duplicated() {
        let mut graph = Graph::new();
        graph.add_node("hub", NodeKind::Target, None);
        assert!(graph.add_node("leaf", NodeKind::Email, None));
        assert!(!graph.add_node("leaf", NodeKind::Registrar, None));
        assert!(graph.add_edge("hub", "leaf"));
        assert!(!graph.add_edge("leaf", "hub"));
        assert!(!graph.add_edge("hub", "hub"));
        assert!(!graph.add_edge("hub", "missing"));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_serialization() {
        let graph = build(&target_with_domain(
            "example.com",
            json!({ "registrar": "ACME" }),
        ));
        assert_eq!(
            serde_json::to_value(&graph).expect("serialize"),
            json!({
                "nodes": [
                    { "id": "example.com", "kind": "target" },
                    { "id": "ACME", "kind": "registrar" }
                ],
                "edges": [{ "source": "example.com", "target": "ACME" }]
            })
        );
    }

    #[test]
    fn test_to_dot() {
        let graph = build(&target_with_domain(
            "example.com",
            json!({ "registrar": "ACME \"Names\"" }),
        ));
        let dot = graph.to_dot();
        assert!(dot.starts_with("graph \"example.com\" {\n"));
        assert!(dot.contains("\"example.com\" [kind=\"target\", shape=doublecircle];"));
        assert!(dot.contains("\"example.com\" -- \"ACME \\\"Names\\\"\";"));
        assert!(dot.ends_with("}\n"));
    }
}
