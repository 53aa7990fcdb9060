//! Named expression registry (spec §4, L4). A name is scoped either to
//! the whole workbook or to a single sheet; sheet scope shadows workbook
//! scope when both define the same name.

use rustc_hash::FxHashMap;

use gridcore_common::SheetId;

use crate::engine::vertex::{NameScope, VertexId};

#[derive(Default)]
pub struct NamedExpressionStore {
    workbook: FxHashMap<String, VertexId>,
    sheet: FxHashMap<(SheetId, String), VertexId>,
}

impl NamedExpressionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: &str, scope: NameScope, vertex: VertexId) -> Result<(), &'static str> {
        match scope {
            NameScope::Workbook => {
                if self.workbook.contains_key(name) {
                    return Err("already defined");
                }
                self.workbook.insert(name.to_string(), vertex);
            }
            NameScope::Sheet(sheet) => {
                let key = (sheet, name.to_string());
                if self.sheet.contains_key(&key) {
                    return Err("already defined");
                }
                self.sheet.insert(key, vertex);
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str, scope: NameScope) -> Option<VertexId> {
        match scope {
            NameScope::Workbook => self.workbook.remove(name),
            NameScope::Sheet(sheet) => self.sheet.remove(&(sheet, name.to_string())),
        }
    }

    /// Sheet scope shadows workbook scope for the same name.
    pub fn resolve(&self, name: &str, current_sheet: Option<SheetId>) -> Option<VertexId> {
        if let Some(sheet) = current_sheet {
            if let Some(&v) = self.sheet.get(&(sheet, name.to_string())) {
                return Some(v);
            }
        }
        self.workbook.get(name).copied()
    }

    /// A defined name must start with a letter or underscore, contain only
    /// word characters or dots, and not itself parse as a reference (a
    /// name like `A1` would be unreachable once defined).
    pub fn is_valid_name(name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let mut chars = name.chars();
        let first = chars.next().unwrap();
        if !(first.is_alphabetic() || first == '_') {
            return false;
        }
        if !chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
            return false;
        }
        !matches!(
            gridcore_parse::parse(&format!("={name}")).map(|ast| ast.node_type),
            Ok(gridcore_parse::ASTNodeType::Reference {
                reference: gridcore_parse::ReferenceType::Cell { .. } | gridcore_parse::ReferenceType::Range { .. },
                ..
            })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_names_that_look_like_references() {
        assert!(!NamedExpressionStore::is_valid_name("A1"));
        assert!(!NamedExpressionStore::is_valid_name("AB12"));
        assert!(NamedExpressionStore::is_valid_name("TaxRate"));
    }

    #[test]
    fn sheet_scope_shadows_workbook_scope() {
        let mut store = NamedExpressionStore::new();
        let wb_vertex = VertexId { index: 0, generation: 0 };
        let sheet_vertex = VertexId { index: 1, generation: 0 };
        store.define("Rate", NameScope::Workbook, wb_vertex).unwrap();
        store.define("Rate", NameScope::Sheet(0), sheet_vertex).unwrap();
        assert_eq!(store.resolve("Rate", Some(0)), Some(sheet_vertex));
        assert_eq!(store.resolve("Rate", Some(1)), Some(wb_vertex));
        assert_eq!(store.resolve("Rate", None), Some(wb_vertex));
    }
}
