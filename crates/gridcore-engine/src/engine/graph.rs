//! The dependency graph itself (spec §4, L5): owns the vertex arena, the
//! dirty/volatile frontiers, and edge maintenance. Topological ordering
//! and cycle detection live in `cycle_detector.rs` and `evaluator.rs`,
//! which both borrow this graph rather than duplicate its state.

use rustc_hash::{FxHashMap, FxHashSet};

use gridcore_common::CellAddress;

use crate::engine::vertex::{Vertex, VertexArena, VertexId, VertexKind};

pub struct DependencyGraph {
    arena: VertexArena,
    dirty: FxHashSet<VertexId>,
    volatile: FxHashSet<VertexId>,
    /// First-dirtied order, used to break topological ties between
    /// independent SCCs (spec §5, "Ordering guarantees").
    dirtied_order: FxHashMap<VertexId, u64>,
    dirty_counter: u64,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph {
            arena: VertexArena::new(),
            dirty: FxHashSet::default(),
            volatile: FxHashSet::default(),
            dirtied_order: Default::default(),
            dirty_counter: 0,
        }
    }

    pub fn insert(&mut self, address: Option<CellAddress>, kind: VertexKind) -> VertexId {
        let volatile = kind.is_volatile();
        let dirty = kind.is_dirty();
        let id = self.arena.insert(address, kind);
        if volatile {
            self.volatile.insert(id);
        }
        if dirty {
            self.mark_dirty(id);
        }
        id
    }

    pub fn get(&self, id: VertexId) -> Option<&Vertex> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.arena.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vertex> {
        self.arena.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vertex> {
        self.arena.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Adds a directed dependency edge: `dependent` reads from `on`.
    pub fn add_edge(&mut self, dependent: VertexId, on: VertexId) {
        if let Some(v) = self.arena.get_mut(on) {
            if !v.dependents.contains(&dependent) {
                v.dependents.push(dependent);
            }
        }
        if let Some(v) = self.arena.get_mut(dependent) {
            if !v.dependencies.contains(&on) {
                v.dependencies.push(on);
            }
        }
    }

    /// Drops every outgoing dependency edge from `id` (used when a
    /// formula is replaced or re-linked) while leaving `id`'s dependents
    /// untouched — whoever reads `id` still should.
    pub fn clear_dependencies(&mut self, id: VertexId) {
        let deps = match self.arena.get(id) {
            Some(v) => v.dependencies.clone(),
            None => return,
        };
        for d in deps {
            if let Some(v) = self.arena.get_mut(d) {
                v.dependents.retain(|&x| x != id);
            }
        }
        if let Some(v) = self.arena.get_mut(id) {
            v.dependencies.clear();
        }
    }

    pub fn remove_edge(&mut self, dependent: VertexId, on: VertexId) {
        if let Some(v) = self.arena.get_mut(on) {
            v.dependents.retain(|&d| d != dependent);
        }
        if let Some(v) = self.arena.get_mut(dependent) {
            v.dependencies.retain(|&d| d != on);
        }
    }

    /// Tears down every edge touching `id` from the opposite side's
    /// bookkeeping, leaving `id` itself still present (caller removes it).
    pub fn isolate(&mut self, id: VertexId) {
        let (deps, dependents) = match self.arena.get(id) {
            Some(v) => (v.dependencies.clone(), v.dependents.clone()),
            None => return,
        };
        for d in deps {
            if let Some(v) = self.arena.get_mut(d) {
                v.dependents.retain(|&x| x != id);
            }
        }
        for d in dependents {
            if let Some(v) = self.arena.get_mut(d) {
                v.dependencies.retain(|&x| x != id);
            }
        }
        if let Some(v) = self.arena.get_mut(id) {
            v.dependencies.clear();
            v.dependents.clear();
        }
    }

    pub fn remove(&mut self, id: VertexId) -> Option<Vertex> {
        self.isolate(id);
        self.dirty.remove(&id);
        self.volatile.remove(&id);
        self.dirtied_order.remove(&id);
        self.arena.remove(id)
    }

    pub fn mark_dirty(&mut self, id: VertexId) {
        if self.dirty.insert(id) {
            self.dirtied_order.insert(id, self.dirty_counter);
            self.dirty_counter += 1;
        }
        if let Some(v) = self.arena.get_mut(id) {
            v.kind.set_dirty(true);
        }
    }

    pub fn clear_dirty(&mut self, id: VertexId) {
        self.dirty.remove(&id);
        if let Some(v) = self.arena.get_mut(id) {
            v.kind.set_dirty(false);
        }
    }

    pub fn dirty_vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.dirty.iter().copied()
    }

    pub fn volatile_vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.volatile.iter().copied()
    }

    pub fn dirtied_at(&self, id: VertexId) -> u64 {
        self.dirtied_order.get(&id).copied().unwrap_or(u64::MAX)
    }

    /// Marks `id` as volatile or not, used when a formula is replaced.
    pub fn set_volatile(&mut self, id: VertexId, volatile: bool) {
        if volatile {
            self.volatile.insert(id);
        } else {
            self.volatile.remove(&id);
        }
    }

    /// Everything reachable forward (through `dependents` edges) from any
    /// vertex in `seeds`, seeds included. This is the evaluation closure:
    /// every vertex whose value could possibly change this pass.
    pub fn forward_reachable(&self, seeds: impl IntoIterator<Item = VertexId>) -> FxHashSet<VertexId> {
        let mut seen: FxHashSet<VertexId> = FxHashSet::default();
        let mut stack: Vec<VertexId> = seeds.into_iter().collect();
        for &s in &stack {
            seen.insert(s);
        }
        while let Some(id) = stack.pop() {
            if let Some(v) = self.arena.get(id) {
                for &d in &v.dependents {
                    if seen.insert(d) {
                        stack.push(d);
                    }
                }
            }
        }
        seen
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcore_common::CellValue;

    fn value_vertex(g: &mut DependencyGraph) -> VertexId {
        g.insert(None, VertexKind::ValueCell { value: CellValue::Number(1.0) })
    }

    #[test]
    fn forward_reachable_follows_dependents_transitively() {
        let mut g = DependencyGraph::new();
        let a = value_vertex(&mut g);
        let b = value_vertex(&mut g);
        let c = value_vertex(&mut g);
        g.add_edge(b, a); // b depends on a
        g.add_edge(c, b); // c depends on b
        let closure = g.forward_reachable([a]);
        assert!(closure.contains(&a) && closure.contains(&b) && closure.contains(&c));
    }

    #[test]
    fn removing_a_vertex_clears_both_edge_directions() {
        let mut g = DependencyGraph::new();
        let a = value_vertex(&mut g);
        let b = value_vertex(&mut g);
        g.add_edge(b, a);
        g.remove(a);
        assert!(g.get(b).unwrap().dependencies.is_empty());
    }

    #[test]
    fn dirtied_order_tracks_first_mark_only() {
        let mut g = DependencyGraph::new();
        let a = value_vertex(&mut g);
        let b = value_vertex(&mut g);
        g.mark_dirty(b);
        g.mark_dirty(a);
        g.mark_dirty(b); // re-marking does not move it later
        assert!(g.dirtied_at(b) < g.dirtied_at(a));
    }
}
