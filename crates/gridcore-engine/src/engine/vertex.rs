//! Vertex arena primitives (spec §3's six vertex kinds, §9's arena +
//! integer-handle design). A generational `VertexId` rather than a raw
//! index catches use of a handle whose slot has since been recycled.

use gridcore_common::{CellAddress, CellRange, CellValue};

use crate::engine::lazy_ast::AstId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId {
    pub index: u32,
    pub generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameScope {
    Workbook,
    Sheet(gridcore_common::SheetId),
}

#[derive(Debug, Clone)]
pub enum VertexKind {
    /// A plain literal cell: number, text, bool, error, or empty.
    ValueCell { value: CellValue },
    FormulaCell {
        ast_id: AstId,
        cached_value: CellValue,
        dirty: bool,
        volatile: bool,
    },
    ArrayCell {
        ast_id: AstId,
        extent: (u32, u32),
        cached_values: Vec<Vec<CellValue>>,
        dirty: bool,
        volatile: bool,
    },
    /// Materialized on demand the first time a formula references an empty
    /// address; distinct from `ValueCell { value: CellValue::Empty }` so
    /// the graph builder can tell "never written" from "explicitly blank".
    EmptyCell,
    /// A fan-in aggregator over a rectangular span. Its own dependencies
    /// are the individual cell vertices covered by `range`; anything that
    /// references the range becomes one of its dependents instead of
    /// fanning out to every cell directly.
    Range { range: CellRange },
    NamedExpression {
        name: String,
        scope: NameScope,
        ast_id: AstId,
        cached_value: CellValue,
        dirty: bool,
    },
}

impl VertexKind {
    pub fn is_dirty(&self) -> bool {
        match self {
            VertexKind::FormulaCell { dirty, .. } => *dirty,
            VertexKind::ArrayCell { dirty, .. } => *dirty,
            VertexKind::NamedExpression { dirty, .. } => *dirty,
            _ => false,
        }
    }

    pub fn set_dirty(&mut self, value: bool) {
        match self {
            VertexKind::FormulaCell { dirty, .. } => *dirty = value,
            VertexKind::ArrayCell { dirty, .. } => *dirty = value,
            VertexKind::NamedExpression { dirty, .. } => *dirty = value,
            _ => {}
        }
    }

    pub fn is_volatile(&self) -> bool {
        matches!(
            self,
            VertexKind::FormulaCell { volatile: true, .. } | VertexKind::ArrayCell { volatile: true, .. }
        )
    }

    pub fn ast_id(&self) -> Option<AstId> {
        match self {
            VertexKind::FormulaCell { ast_id, .. } => Some(*ast_id),
            VertexKind::ArrayCell { ast_id, .. } => Some(*ast_id),
            VertexKind::NamedExpression { ast_id, .. } => Some(*ast_id),
            _ => None,
        }
    }

    pub fn value(&self) -> CellValue {
        match self {
            VertexKind::ValueCell { value } => value.clone(),
            VertexKind::FormulaCell { cached_value, .. } => cached_value.clone(),
            VertexKind::ArrayCell {
                cached_values, ..
            } => cached_values
                .first()
                .and_then(|row| row.first())
                .cloned()
                .unwrap_or(CellValue::Empty),
            VertexKind::NamedExpression { cached_value, .. } => cached_value.clone(),
            VertexKind::EmptyCell => CellValue::Empty,
            VertexKind::Range { .. } => CellValue::Empty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Vertex {
    pub id: VertexId,
    pub address: Option<CellAddress>,
    pub kind: VertexKind,
    /// Vertices that read from this one; traversing these is how dirty
    /// and volatile frontiers expand forward.
    pub dependents: Vec<VertexId>,
    /// Vertices this one reads from; kept so edges can be torn down
    /// symmetrically when a formula is replaced or removed.
    pub dependencies: Vec<VertexId>,
    /// Monotonic creation order, used to break ties within an SCC so
    /// repeated evaluation passes over unchanged input are deterministic.
    pub created_seq: u64,
}

enum Slot {
    Occupied(Vertex),
    Free { next_free: Option<u32>, generation: u32 },
}

/// Arena owning every vertex in the graph. Removal recycles the slot index
/// but bumps its generation, so a stale `VertexId` captured before the
/// removal is detected rather than silently aliasing the new occupant.
pub struct VertexArena {
    slots: Vec<Slot>,
    free_head: Option<u32>,
    next_seq: u64,
    len: usize,
}

impl VertexArena {
    pub fn new() -> Self {
        VertexArena {
            slots: Vec::new(),
            free_head: None,
            next_seq: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, address: Option<CellAddress>, kind: VertexKind) -> VertexId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let vertex_at = |id: VertexId| Vertex {
            id,
            address,
            kind,
            dependents: Vec::new(),
            dependencies: Vec::new(),
            created_seq: seq,
        };
        self.len += 1;
        if let Some(index) = self.free_head {
            let generation = match &self.slots[index as usize] {
                Slot::Free { generation, .. } => *generation,
                Slot::Occupied(_) => unreachable!("free_head pointed at occupied slot"),
            };
            let next_free = match &self.slots[index as usize] {
                Slot::Free { next_free, .. } => *next_free,
                Slot::Occupied(_) => unreachable!(),
            };
            self.free_head = next_free;
            let id = VertexId { index, generation };
            self.slots[index as usize] = Slot::Occupied(vertex_at(id));
            id
        } else {
            let index = self.slots.len() as u32;
            let id = VertexId { index, generation: 0 };
            self.slots.push(Slot::Occupied(vertex_at(id)));
            id
        }
    }

    pub fn get(&self, id: VertexId) -> Option<&Vertex> {
        match self.slots.get(id.index as usize)? {
            Slot::Occupied(v) if v.id.generation == id.generation => Some(v),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        match self.slots.get_mut(id.index as usize)? {
            Slot::Occupied(v) if v.id.generation == id.generation => Some(v),
            _ => None,
        }
    }

    pub fn remove(&mut self, id: VertexId) -> Option<Vertex> {
        match self.slots.get(id.index as usize) {
            Some(Slot::Occupied(v)) if v.id.generation == id.generation => {}
            _ => return None,
        }
        let next_generation = id.generation.wrapping_add(1);
        let old = std::mem::replace(
            &mut self.slots[id.index as usize],
            Slot::Free {
                next_free: self.free_head,
                generation: next_generation,
            },
        );
        self.free_head = Some(id.index);
        self.len -= 1;
        match old {
            Slot::Occupied(v) => Some(v),
            Slot::Free { .. } => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vertex> {
        self.slots.iter().filter_map(|s| match s {
            Slot::Occupied(v) => Some(v),
            Slot::Free { .. } => None,
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vertex> {
        self.slots.iter_mut().filter_map(|s| match s {
            Slot::Occupied(v) => Some(v),
            Slot::Free { .. } => None,
        })
    }
}

impl Default for VertexArena {
    fn default() -> Self {
        Self::new()
    }
}
