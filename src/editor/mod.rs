//! Free-form key/value editing of vehicle specifications.
//!
//! While a form is open the specs live in a [`SpecDraft`], an ordered list of
//! entries. At the persistence boundary the draft is folded into [`Specs`],
//! a mapping. The fold is last-write-wins: when two entries share a key, the
//! later one survives and the earlier value is dropped. That collapse is
//! reported through [`SpecDraft::duplicate_keys`] and logged, never repaired.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

use crate::models::Specs;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("spec index {index} out of range for {len} entries")]
    OutOfRange { index: usize, len: usize },
}

/// One named attribute, e.g. `Engine: 2000cc`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecEntry {
    pub key: String,
    pub value: String,
}

/// A single change made in the spec editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SpecEdit {
    Add { key: String, value: String },
    Remove { index: usize },
    SetValue { index: usize, value: String },
}

/// Ordered spec entries being edited. Deserializing goes through
/// [`SpecDraft::add`], so blank entries never make it into a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SpecEntry>", into = "Vec<SpecEntry>")]
pub struct SpecDraft {
    entries: Vec<SpecEntry>,
}

impl SpecDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[SpecEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an entry when both sides are non-blank. Returns whether
    /// anything was added; blank input is not an error.
    pub fn add(&mut self, key: &str, value: &str) -> bool {
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return false;
        }

        self.entries.push(SpecEntry {
            key: key.to_string(),
            value: value.to_string(),
        });
        true
    }

    pub fn remove(&mut self, index: usize) -> Result<SpecEntry, EditorError> {
        self.check(index)?;
        Ok(self.entries.remove(index))
    }

    /// Replaces the value at `index`, leaving its key alone
    pub fn update_value(&mut self, index: usize, value: impl Into<String>) -> Result<(), EditorError> {
        self.check(index)?;
        self.entries[index].value = value.into();
        Ok(())
    }

    pub fn apply(&mut self, edit: SpecEdit) -> Result<(), EditorError> {
        match edit {
            SpecEdit::Add { key, value } => {
                self.add(&key, &value);
            }
            SpecEdit::Remove { index } => {
                self.remove(index)?;
            }
            SpecEdit::SetValue { index, value } => self.update_value(index, value)?,
        }
        Ok(())
    }

    /// Keys that appear more than once, in first-seen order
    pub fn duplicate_keys(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for entry in &self.entries {
            if !seen.insert(entry.key.as_str()) && !dups.contains(&entry.key) {
                dups.push(entry.key.clone());
            }
        }
        dups
    }

    /// Folds the draft into its persisted mapping (last write wins)
    pub fn to_specs(&self) -> Specs {
        let dups = self.duplicate_keys();
        if !dups.is_empty() {
            warn!("Spec keys entered more than once, keeping the last value: {:?}", dups);
        }

        let mut specs = Specs::new();
        for entry in &self.entries {
            let (key, value) = (entry.key.trim(), entry.value.trim());
            if key.is_empty() || value.is_empty() {
                warn!("Dropping blank spec entry {:?} on save", entry.key);
                continue;
            }
            specs.insert(key, value);
        }
        specs
    }

    /// Unfolds a persisted mapping in its stored key order
    pub fn from_specs(specs: &Specs) -> Self {
        let entries = specs
            .iter()
            .map(|(key, value)| SpecEntry {
                key: key.to_string(),
                value,
            })
            .collect();
        Self { entries }
    }

    fn check(&self, index: usize) -> Result<(), EditorError> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(EditorError::OutOfRange {
                index,
                len: self.entries.len(),
            })
        }
    }
}

impl From<Vec<SpecEntry>> for SpecDraft {
    fn from(entries: Vec<SpecEntry>) -> Self {
        let mut draft = Self::new();
        for entry in &entries {
            draft.add(&entry.key, &entry.value);
        }
        draft
    }
}

impl From<SpecDraft> for Vec<SpecEntry> {
    fn from(draft: SpecDraft) -> Self {
        draft.entries
    }
}

impl From<&Specs> for SpecDraft {
    fn from(specs: &Specs) -> Self {
        Self::from_specs(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_sides_are_ignored() {
        let mut draft = SpecDraft::new();
        assert!(!draft.add("", "v"));
        assert!(!draft.add("k", ""));
        assert!(!draft.add("   ", "\t"));
        assert!(draft.is_empty());

        assert!(draft.add(" Engine ", " 2000cc "));
        assert_eq!(
            draft.entries(),
            &[SpecEntry {
                key: "Engine".into(),
                value: "2000cc".into()
            }]
        );
    }

    #[test]
    fn later_duplicate_wins_on_save() {
        let mut draft = SpecDraft::new();
        draft.add("Engine", "2000cc");
        draft.add("Engine", "1800cc");

        assert_eq!(draft.duplicate_keys(), vec!["Engine".to_string()]);

        let specs = draft.to_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs.get("Engine").as_deref(), Some("1800cc"));
    }

    #[test]
    fn remove_and_update_guard_the_index() {
        let mut draft = SpecDraft::new();
        draft.add("Engine", "2000cc");
        draft.add("Fuel", "Petrol");

        draft.update_value(1, "Diesel").unwrap();
        assert_eq!(draft.entries()[1].key, "Fuel");
        assert_eq!(draft.entries()[1].value, "Diesel");

        assert_eq!(
            draft.update_value(2, "x"),
            Err(EditorError::OutOfRange { index: 2, len: 2 })
        );

        let removed = draft.remove(0).unwrap();
        assert_eq!(removed.key, "Engine");
        assert_eq!(draft.len(), 1);
        assert!(draft.remove(5).is_err());
    }

    #[test]
    fn unfold_then_fold_reproduces_the_mapping() {
        let specs: Specs = serde_json::from_value(json!({
            "Engine": "2000cc",
            "Transmission": "Automatic",
            "Mileage": "45,000 km"
        }))
        .unwrap();

        let draft = SpecDraft::from_specs(&specs);
        let keys: Vec<_> = draft.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["Engine", "Transmission", "Mileage"]);
        assert_eq!(draft.to_specs(), specs);
    }

    #[test]
    fn edits_apply_in_order() {
        let mut draft = SpecDraft::new();
        let edits: Vec<SpecEdit> = serde_json::from_value(json!([
            {"op": "add", "key": "Engine", "value": "2000cc"},
            {"op": "add", "key": "Fuel", "value": "Petrol"},
            {"op": "set_value", "index": 0, "value": "2400cc"},
            {"op": "remove", "index": 1},
            {"op": "add", "key": "", "value": "ignored"}
        ]))
        .unwrap();

        for edit in edits {
            draft.apply(edit).unwrap();
        }
        assert_eq!(draft.len(), 1);
        assert_eq!(draft.to_specs().get("Engine").as_deref(), Some("2400cc"));

        assert!(draft.apply(SpecEdit::Remove { index: 3 }).is_err());
    }

    #[test]
    fn blanked_values_are_not_saved() {
        let mut draft = SpecDraft::new();
        draft.add("Engine", "2000cc");
        draft.add("Fuel", "Petrol");
        draft.apply(SpecEdit::SetValue { index: 1, value: "  ".into() }).unwrap();

        let specs = draft.to_specs();
        assert_eq!(specs.len(), 1);
        assert!(specs.get("Fuel").is_none());
    }

    #[test]
    fn submitted_drafts_drop_blank_entries() {
        let draft: SpecDraft = serde_json::from_value(json!([
            {"key": "", "value": ""},
            {"key": "   ", "value": "x"},
            {"key": "Engine", "value": "  "},
            {"key": " Fuel ", "value": "Petrol"}
        ]))
        .unwrap();

        assert_eq!(draft.len(), 1);
        assert_eq!(draft.entries()[0].key, "Fuel");
        assert_eq!(
            serde_json::to_value(&draft).unwrap(),
            json!([{"key": "Fuel", "value": "Petrol"}])
        );
    }

    #[test]
    fn unfold_stringifies_values() {
        let specs: Specs = serde_json::from_value(json!({"Seats": 7})).unwrap();
        let draft = SpecDraft::from(&specs);
        assert_eq!(draft.entries()[0].value, "7");
    }
}
