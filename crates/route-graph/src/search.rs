//! Shortest and k-shortest simple path search
//!
//! Dijkstra settles nodes in (distance, identifier) order and only replaces a
//! predecessor on a strictly shorter distance, so ties resolve the same way on
//! every run. Yen's algorithm reuses it with nodes and edges masked out.

use crate::RouteGraph;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Nodes and edges hidden from a search
#[derive(Debug, Default)]
pub(crate) struct Exclusions {
    nodes: HashSet<NodeIndex>,
    edges: HashSet<(NodeIndex, NodeIndex)>,
}

impl Exclusions {
    fn block_node(&mut self, node: NodeIndex) {
        self.nodes.insert(node);
    }

    fn block_edge(&mut self, a: NodeIndex, b: NodeIndex) {
        self.edges.insert(edge_key(a, b));
    }

    fn allows(&self, from: NodeIndex, to: NodeIndex) -> bool {
        !self.nodes.contains(&to) && !self.edges.contains(&edge_key(from, to))
    }
}

fn edge_key(a: NodeIndex, b: NodeIndex) -> (NodeIndex, NodeIndex) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Heap entry; `BinaryHeap` is a max-heap so the ordering is reversed
struct Frontier<'a> {
    cost: f64,
    id: &'a str,
    node: NodeIndex,
}

impl PartialEq for Frontier<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier<'_> {}

impl PartialOrd for Frontier<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.id.cmp(self.id))
    }
}

/// Minimum-weight path from `from` to `to` avoiding `exclusions`
pub(crate) fn shortest_path(
    graph: &RouteGraph,
    from: NodeIndex,
    to: NodeIndex,
    exclusions: &Exclusions,
) -> Option<Vec<NodeIndex>> {
    let inner = graph.inner();
    let mut dist: HashMap<NodeIndex, f64> = HashMap::new();
    let mut prev: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut settled: HashSet<NodeIndex> = HashSet::new();
    let mut heap = BinaryHeap::new();

    dist.insert(from, 0.0);
    heap.push(Frontier {
        cost: 0.0,
        id: &inner[from].id,
        node: from,
    });

    while let Some(Frontier { cost, node, .. }) = heap.pop() {
        if !settled.insert(node) {
            continue;
        }
        if node == to {
            break;
        }

        let mut neighbours: Vec<(NodeIndex, f64)> = inner
            .edges(node)
            .map(|e| {
                let next = if e.source() == node { e.target() } else { e.source() };
                (next, e.weight().weight)
            })
            .filter(|&(next, _)| !settled.contains(&next) && exclusions.allows(node, next))
            .collect();
        neighbours.sort_by(|a, b| inner[a.0].id.cmp(&inner[b.0].id));

        for (next, weight) in neighbours {
            let candidate = cost + weight;
            if dist.get(&next).map_or(true, |&d| candidate < d) {
                dist.insert(next, candidate);
                prev.insert(next, node);
                heap.push(Frontier {
                    cost: candidate,
                    id: &inner[next].id,
                    node: next,
                });
            }
        }
    }

    if !settled.contains(&to) {
        return None;
    }

    let mut path = vec![to];
    let mut current = to;
    while current != from {
        current = *prev.get(&current)?;
        path.push(current);
    }
    path.reverse();
    Some(path)
}

struct Candidate {
    cost: f64,
    path: Vec<NodeIndex>,
}

/// Up to `k` simple paths in non-decreasing weight order (Yen's algorithm).
///
/// Equal-weight candidates are ordered by hop count, then by node identifiers.
pub(crate) fn k_shortest_paths(
    graph: &RouteGraph,
    from: NodeIndex,
    to: NodeIndex,
    k: usize,
) -> Vec<Vec<NodeIndex>> {
    if k == 0 || from == to {
        return Vec::new();
    }

    let first = match shortest_path(graph, from, to, &Exclusions::default()) {
        Some(path) => path,
        None => return Vec::new(),
    };

    let mut accepted: Vec<Vec<NodeIndex>> = vec![first];
    let mut candidates: Vec<Candidate> = Vec::new();

    while accepted.len() < k {
        let last = &accepted[accepted.len() - 1];

        for i in 0..last.len() - 1 {
            let spur = last[i];
            let root = &last[..=i];

            let mut exclusions = Exclusions::default();
            for path in &accepted {
                if path.len() > i + 1 && path[..=i] == *root {
                    exclusions.block_edge(path[i], path[i + 1]);
                }
            }
            for &node in &root[..i] {
                exclusions.block_node(node);
            }

            let Some(spur_path) = shortest_path(graph, spur, to, &exclusions) else {
                continue;
            };

            let mut total = root[..i].to_vec();
            total.extend(spur_path);

            let known = accepted.contains(&total) || candidates.iter().any(|c| c.path == total);
            if known {
                continue;
            }
            if let Some(cost) = graph.index_path_weight(&total) {
                candidates.push(Candidate { cost, path: total });
            }
        }

        let best = candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| compare_candidates(graph, a, b))
            .map(|(i, _)| i);

        match best {
            Some(i) => accepted.push(candidates.swap_remove(i).path),
            None => break,
        }
    }

    accepted
}

fn compare_candidates(graph: &RouteGraph, a: &Candidate, b: &Candidate) -> Ordering {
    let inner = graph.inner();
    a.cost
        .total_cmp(&b.cost)
        .then_with(|| a.path.len().cmp(&b.path.len()))
        .then_with(|| {
            let ids_a = a.path.iter().map(|&n| inner[n].id.as_str());
            let ids_b = b.path.iter().map(|&n| inner[n].id.as_str());
            ids_a.cmp(ids_b)
        })
}
