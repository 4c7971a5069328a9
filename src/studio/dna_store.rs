use std::collections::HashMap;
use std::sync::Arc;

use crate::dna::{CharacterDna, DnaField};
use crate::error::GenerationError;

/// DNA records keyed by character id, in the order characters were forged.
///
/// Records are shared as `Arc`s and never mutated in place; an edit stores a
/// new record so previously handed-out snapshots stay as they were.
#[derive(Debug, Clone, Default)]
pub struct DnaStore {
    entries: HashMap<String, Arc<CharacterDna>>,
    order: Vec<String>,
}

impl DnaStore {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, character_id: &str) -> Option<Arc<CharacterDna>> {
        self.entries.get(character_id).cloned()
    }

    pub fn insert(&mut self, character_id: &str, dna: CharacterDna) -> Arc<CharacterDna> {
        let dna = Arc::new(dna);
        if self
            .entries
            .insert(character_id.to_owned(), Arc::clone(&dna))
            .is_none()
        {
            self.order.push(character_id.to_owned());
        }
        dna
    }

    pub fn update_field(
        &mut self,
        character_id: &str,
        field: DnaField,
        value: &str,
    ) -> Result<Arc<CharacterDna>, GenerationError> {
        let entry = self
            .entries
            .get_mut(character_id)
            .ok_or_else(|| GenerationError::UnknownCharacter(character_id.to_owned()))?;
        let mut next = CharacterDna::clone(entry);
        field.apply(&mut next, value);
        *entry = Arc::new(next);
        Ok(Arc::clone(entry))
    }

    /// Looks up each id in turn, silently skipping ids without a record.
    pub fn resolve(&self, character_ids: &[String]) -> Vec<Arc<CharacterDna>> {
        character_ids
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub fn all(&self) -> Vec<Arc<CharacterDna>> {
        self.resolve(&self.order)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<CharacterDna>)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|dna| (id.as_str(), dna)))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
