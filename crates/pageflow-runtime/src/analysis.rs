use crate::node::Node;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde::Serialize;
use std::collections::HashMap;

/// A port bound to a node id that is not part of the workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DanglingEdge {
    pub from_node: String,
    pub from_port: String,
    pub to_node: String,
}

/// Static findings about a built workflow graph
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphReport {
    /// Nodes no port path from the start node reaches, sorted by id
    pub unreachable: Vec<String>,
    pub dangling: Vec<DanglingEdge>,
    /// Whether some port path leads back to an earlier node
    pub has_cycles: bool,
}

impl GraphReport {
    pub fn is_clean(&self) -> bool {
        self.unreachable.is_empty() && self.dangling.is_empty() && !self.has_cycles
    }
}

/// Inspect the port graph rooted at `start_id`
pub(crate) fn analyze(nodes: &HashMap<String, Node>, start_id: &str) -> GraphReport {
    let mut graph: DiGraph<&str, &str> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    let mut ids: Vec<&str> = nodes.keys().map(String::as_str).collect();
    ids.sort_unstable();
    for id in &ids {
        index.insert(*id, graph.add_node(*id));
    }

    let mut dangling = Vec::new();
    for id in &ids {
        let node = &nodes[*id];
        let mut ports: Vec<(&String, &String)> = node.outputs().iter().collect();
        ports.sort();
        for (port, target) in ports {
            match index.get(target.as_str()) {
                Some(to) => {
                    graph.add_edge(index[id], *to, port.as_str());
                }
                None => dangling.push(DanglingEdge {
                    from_node: id.to_string(),
                    from_port: port.clone(),
                    to_node: target.clone(),
                }),
            }
        }
    }

    let mut reached = vec![false; graph.node_count()];
    if let Some(start) = index.get(start_id) {
        let mut dfs = Dfs::new(&graph, *start);
        while let Some(ix) = dfs.next(&graph) {
            reached[ix.index()] = true;
        }
    }

    let unreachable = graph
        .node_indices()
        .filter(|ix| !reached[ix.index()])
        .map(|ix| graph[ix].to_string())
        .collect();

    GraphReport {
        unreachable,
        dangling,
        has_cycles: is_cyclic_directed(&graph),
    }
}
