//! Cycle detection and topological condensation (spec §4, L8). Tarjan's
//! algorithm finds strongly connected components within an evaluation
//! closure; the SCCs are then condensed into a DAG and handed a stable
//! Kahn ordering so the evaluator can walk them one at a time.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::engine::graph::DependencyGraph;
use crate::engine::vertex::VertexId;

pub struct Scc {
    pub members: Vec<VertexId>,
}

impl Scc {
    pub fn is_cycle(&self, graph: &DependencyGraph) -> bool {
        if self.members.len() > 1 {
            return true;
        }
        let id = self.members[0];
        graph
            .get(id)
            .map(|v| v.dependencies.contains(&id))
            .unwrap_or(false)
    }
}

/// Tarjan's strongly-connected-components algorithm restricted to the
/// induced subgraph on `closure` (edges leaving `closure` are ignored).
/// Iterative to avoid recursion depth scaling with formula chain length.
pub fn strongly_connected_components(graph: &DependencyGraph, closure: &FxHashSet<VertexId>) -> Vec<Scc> {
    struct Frame {
        node: VertexId,
        child_index: usize,
    }

    let mut index_of: FxHashMap<VertexId, usize> = FxHashMap::default();
    let mut lowlink: FxHashMap<VertexId, usize> = FxHashMap::default();
    let mut on_stack: FxHashSet<VertexId> = FxHashSet::default();
    let mut stack: Vec<VertexId> = Vec::new();
    let mut next_index = 0usize;
    let mut result: Vec<Scc> = Vec::new();

    let mut ordered: Vec<VertexId> = closure.iter().copied().collect();
    ordered.sort_by_key(|id| graph.get(*id).map(|v| v.created_seq).unwrap_or(u64::MAX));

    for &start in &ordered {
        if index_of.contains_key(&start) {
            continue;
        }
        let mut call_stack: Vec<Frame> = vec![Frame { node: start, child_index: 0 }];
        index_of.insert(start, next_index);
        lowlink.insert(start, next_index);
        next_index += 1;
        stack.push(start);
        on_stack.insert(start);

        while let Some(frame) = call_stack.last_mut() {
            let node = frame.node;
            let deps: Vec<VertexId> = graph
                .get(node)
                .map(|v| v.dependents.iter().copied().filter(|d| closure.contains(d)).collect())
                .unwrap_or_default();

            if frame.child_index < deps.len() {
                let child = deps[frame.child_index];
                frame.child_index += 1;
                if !index_of.contains_key(&child) {
                    index_of.insert(child, next_index);
                    lowlink.insert(child, next_index);
                    next_index += 1;
                    stack.push(child);
                    on_stack.insert(child);
                    call_stack.push(Frame { node: child, child_index: 0 });
                } else if on_stack.contains(&child) {
                    let child_index = index_of[&child];
                    let entry = lowlink.get_mut(&node).unwrap();
                    *entry = (*entry).min(child_index);
                }
            } else {
                call_stack.pop();
                if let Some(parent_frame) = call_stack.last() {
                    let node_low = lowlink[&node];
                    let parent = parent_frame.node;
                    let parent_low = lowlink.get_mut(&parent).unwrap();
                    *parent_low = (*parent_low).min(node_low);
                }
                if lowlink[&node] == index_of[&node] {
                    let mut members = Vec::new();
                    loop {
                        let w = stack.pop().unwrap();
                        on_stack.remove(&w);
                        members.push(w);
                        if w == node {
                            break;
                        }
                    }
                    result.push(Scc { members });
                }
            }
        }
    }

    result
}

/// Orders SCCs so every predecessor SCC (in the dependency direction)
/// comes before its dependents, via Kahn's algorithm over the condensed
/// graph. Ties are broken by the minimum "first dirtied" timestamp among
/// an SCC's members (spec §5).
pub fn topological_order(graph: &DependencyGraph, sccs: Vec<Scc>) -> Vec<Scc> {
    let mut owner: FxHashMap<VertexId, usize> = FxHashMap::default();
    for (i, scc) in sccs.iter().enumerate() {
        for &m in &scc.members {
            owner.insert(m, i);
        }
    }

    let n = sccs.len();
    let mut indegree = vec![0usize; n];
    let mut adj: Vec<FxHashSet<usize>> = vec![FxHashSet::default(); n];

    for (i, scc) in sccs.iter().enumerate() {
        for &m in &scc.members {
            if let Some(v) = graph.get(m) {
                for &dep in &v.dependencies {
                    if let Some(&j) = owner.get(&dep) {
                        if j != i && adj[j].insert(i) {
                            indegree[i] += 1;
                        }
                    }
                }
            }
        }
    }

    let priority = |i: usize| -> u64 {
        sccs[i]
            .members
            .iter()
            .map(|&m| graph.dirtied_at(m))
            .min()
            .unwrap_or(u64::MAX)
    };

    let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    ready.sort_by_key(|&i| priority(i));
    let mut order = Vec::with_capacity(n);
    let mut consumed = vec![false; n];

    while !ready.is_empty() {
        ready.sort_by_key(|&i| priority(i));
        let i = ready.remove(0);
        if consumed[i] {
            continue;
        }
        consumed[i] = true;
        order.push(i);
        for &j in &adj[i] {
            indegree[j] -= 1;
            if indegree[j] == 0 {
                ready.push(j);
            }
        }
    }

    // `order` holds the condensed-graph indices in dependency-respecting
    // sequence; a well-formed condensation visits every SCC exactly once.
    debug_assert_eq!(order.len(), sccs.len());
    let mut placeholder: Vec<Option<Scc>> = sccs.into_iter().map(Some).collect();
    order
        .into_iter()
        .map(|i| placeholder[i].take().expect("condensation must be acyclic"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::vertex::VertexKind;
    use gridcore_common::CellValue;

    fn value_vertex(g: &mut DependencyGraph) -> VertexId {
        g.insert(None, VertexKind::ValueCell { value: CellValue::Number(0.0) })
    }

    #[test]
    fn detects_a_three_cycle() {
        let mut g = DependencyGraph::new();
        let a = value_vertex(&mut g);
        let b = value_vertex(&mut g);
        let c = value_vertex(&mut g);
        g.add_edge(b, a);
        g.add_edge(c, b);
        g.add_edge(a, c);
        let closure: FxHashSet<VertexId> = [a, b, c].into_iter().collect();
        let sccs = strongly_connected_components(&g, &closure);
        assert_eq!(sccs.len(), 1);
        assert_eq!(sccs[0].members.len(), 3);
        assert!(sccs[0].is_cycle(&g));
    }

    #[test]
    fn acyclic_chain_yields_singleton_sccs_in_order() {
        let mut g = DependencyGraph::new();
        let a = value_vertex(&mut g);
        let b = value_vertex(&mut g);
        let c = value_vertex(&mut g);
        g.add_edge(b, a);
        g.add_edge(c, b);
        let closure: FxHashSet<VertexId> = [a, b, c].into_iter().collect();
        let sccs = strongly_connected_components(&g, &closure);
        assert_eq!(sccs.len(), 3);
        for scc in &sccs {
            assert!(!scc.is_cycle(&g));
        }
        let ordered = topological_order(&g, sccs);
        let positions: FxHashMap<VertexId, usize> = ordered
            .iter()
            .enumerate()
            .map(|(i, scc)| (scc.members[0], i))
            .collect();
        assert!(positions[&a] < positions[&b]);
        assert!(positions[&b] < positions[&c]);
    }
}
