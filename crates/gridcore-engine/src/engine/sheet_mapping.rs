//! Sheet registry (spec §4, L2): name/id interning plus the owning
//! `AddressMapping` for each sheet.

use rustc_hash::FxHashMap;

use gridcore_common::SheetId;

use crate::engine::address_mapping::AddressMapping;

pub struct SheetEntry {
    pub name: String,
    pub mapping: AddressMapping,
    pub max_rows: u32,
    pub max_cols: u32,
}

#[derive(Default)]
pub struct SheetMapping {
    entries: FxHashMap<SheetId, SheetEntry>,
    name_to_id: FxHashMap<String, SheetId>,
    next_id: SheetId,
}

impl SheetMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, name: &str, max_rows: u32, max_cols: u32) -> Option<SheetId> {
        if self.name_to_id.contains_key(name) {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            SheetEntry {
                name: name.to_string(),
                mapping: AddressMapping::choose(max_rows, max_cols),
                max_rows,
                max_cols,
            },
        );
        self.name_to_id.insert(name.to_string(), id);
        Some(id)
    }

    pub fn remove_sheet(&mut self, id: SheetId) -> Option<SheetEntry> {
        let entry = self.entries.remove(&id)?;
        self.name_to_id.remove(&entry.name);
        Some(entry)
    }

    pub fn rename_sheet(&mut self, id: SheetId, new_name: &str) -> Result<(), &'static str> {
        if self.name_to_id.contains_key(new_name) {
            return Err("sheet name already in use");
        }
        let entry = self.entries.get_mut(&id).ok_or("unknown sheet id")?;
        let old_name = std::mem::replace(&mut entry.name, new_name.to_string());
        self.name_to_id.remove(&old_name);
        self.name_to_id.insert(new_name.to_string(), id);
        Ok(())
    }

    pub fn id_of(&self, name: &str) -> Option<SheetId> {
        self.name_to_id.get(name).copied()
    }

    pub fn name_of(&self, id: SheetId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.name.as_str())
    }

    pub fn entry(&self, id: SheetId) -> Option<&SheetEntry> {
        self.entries.get(&id)
    }

    pub fn entry_mut(&mut self, id: SheetId) -> Option<&mut SheetEntry> {
        self.entries.get_mut(&id)
    }

    pub fn sheet_ids(&self) -> impl Iterator<Item = SheetId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_sheet_name_rejected() {
        let mut m = SheetMapping::new();
        assert!(m.add_sheet("Sheet1", 100, 100).is_some());
        assert!(m.add_sheet("Sheet1", 100, 100).is_none());
    }

    #[test]
    fn rename_updates_lookup() {
        let mut m = SheetMapping::new();
        let id = m.add_sheet("Sheet1", 100, 100).unwrap();
        m.rename_sheet(id, "Renamed").unwrap();
        assert_eq!(m.id_of("Sheet1"), None);
        assert_eq!(m.id_of("Renamed"), Some(id));
    }
}
