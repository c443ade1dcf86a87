//! Relation label codec.
//!
//! Maps relation label strings to dense class indices and back. The map is
//! persisted as a versioned JSON document:
//!
//! ```json
//! { "version": 1, "labels": { "no_relation": 0, "org:top_members/employees": 1 } }
//! ```
//!
//! A map is validated on load: it must be a bijection onto `0..n` with the
//! `no_relation` sentinel at index 0.

use crate::{TrainError, TrainResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;

/// Label of the majority "no relation" class.
pub const NO_RELATION: &str = "no_relation";

/// Schema version written by [`LabelMap::save`].
pub const LABEL_MAP_VERSION: u32 = 1;

/// The 30 KLUE-RE relation labels in index order.
pub const KLUE_RELATIONS: [&str; 30] = [
    "no_relation",
    "org:top_members/employees",
    "org:members",
    "org:product",
    "per:title",
    "org:alternate_names",
    "per:employee_of",
    "org:place_of_headquarters",
    "per:product",
    "org:number_of_employees/members",
    "per:children",
    "per:place_of_residence",
    "per:alternate_names",
    "per:other_family",
    "per:colleagues",
    "per:origin",
    "per:siblings",
    "per:spouse",
    "org:founded",
    "org:political/religious_affiliation",
    "org:member_of",
    "per:parents",
    "org:dissolved",
    "per:schools_attended",
    "per:date_of_death",
    "per:date_of_birth",
    "per:place_of_birth",
    "per:place_of_death",
    "org:founded_by",
    "per:religion",
];

#[derive(Debug, Serialize, Deserialize)]
struct LabelMapFile {
    version: u32,
    labels: BTreeMap<String, usize>,
}

/// Bidirectional label ↔ index mapping.
///
/// Read-only once built; share it by reference across folds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    label_to_index: HashMap<String, usize>,
    index_to_label: Vec<String>,
}

impl LabelMap {
    /// Build a map from labels listed in index order.
    pub fn from_ordered<S: AsRef<str>>(labels: &[S]) -> TrainResult<Self> {
        let entries = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.as_ref().to_string(), i))
            .collect::<BTreeMap<_, _>>();
        Self::from_entries(entries)
    }

    /// The built-in KLUE-RE inventory.
    pub fn klue() -> Self {
        Self {
            label_to_index: KLUE_RELATIONS
                .iter()
                .enumerate()
                .map(|(i, label)| (label.to_string(), i))
                .collect(),
            index_to_label: KLUE_RELATIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn from_entries(entries: BTreeMap<String, usize>) -> TrainResult<Self> {
        if entries.is_empty() {
            return Err(TrainError::ConfigError("label map is empty".to_string()));
        }

        let n = entries.len();
        let mut index_to_label: Vec<Option<String>> = vec![None; n];
        for (label, &index) in &entries {
            if index >= n {
                return Err(TrainError::ConfigError(format!(
                    "label '{}' has index {} outside 0..{}",
                    label, index, n
                )));
            }
            if let Some(existing) = &index_to_label[index] {
                return Err(TrainError::ConfigError(format!(
                    "labels '{}' and '{}' share index {}",
                    existing, label, index
                )));
            }
            index_to_label[index] = Some(label.clone());
        }

        match entries.get(NO_RELATION) {
            Some(0) => {}
            Some(other) => {
                return Err(TrainError::ConfigError(format!(
                    "'{}' must map to index 0, found {}",
                    NO_RELATION, other
                )))
            }
            None => {
                return Err(TrainError::ConfigError(format!(
                    "label map has no '{}' entry",
                    NO_RELATION
                )))
            }
        }

        // n distinct in-range indices for n labels: every slot is filled.
        let index_to_label = index_to_label.into_iter().flatten().collect();

        Ok(Self {
            label_to_index: entries.into_iter().collect(),
            index_to_label,
        })
    }

    /// Load and validate a persisted label map.
    pub fn load<P: AsRef<Path>>(path: P) -> TrainResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrainError::ConfigError(format!(
                "Failed to read label map {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: LabelMapFile = serde_json::from_str(&content).map_err(|e| {
            TrainError::ConfigError(format!(
                "Failed to parse label map {}: {}",
                path.display(),
                e
            ))
        })?;

        if file.version != LABEL_MAP_VERSION {
            return Err(TrainError::ConfigError(format!(
                "Unsupported label map version {} in {} (expected {})",
                file.version,
                path.display(),
                LABEL_MAP_VERSION
            )));
        }

        let map = Self::from_entries(file.labels)?;
        tracing::debug!(path = %path.display(), num_labels = map.num_labels(), "Loaded label map");
        Ok(map)
    }

    /// Persist the map as a versioned JSON document.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TrainResult<()> {
        let path = path.as_ref();
        let file = LabelMapFile {
            version: LABEL_MAP_VERSION,
            labels: self
                .label_to_index
                .iter()
                .map(|(label, &index)| (label.clone(), index))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| {
            TrainError::ConfigError(format!("Failed to serialize label map: {}", e))
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TrainError::ConfigError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, json).map_err(|e| {
            TrainError::ConfigError(format!(
                "Failed to write label map {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Index of a single label.
    pub fn index_of(&self, label: &str) -> TrainResult<usize> {
        self.label_to_index
            .get(label)
            .copied()
            .ok_or_else(|| TrainError::LabelError(format!("Unknown label: {}", label)))
    }

    /// Encode labels to indices, failing on the first unknown label.
    pub fn encode<S: AsRef<str>>(&self, labels: &[S]) -> TrainResult<Vec<usize>> {
        labels.iter().map(|l| self.index_of(l.as_ref())).collect()
    }

    /// Label for an index.
    pub fn decode(&self, index: usize) -> TrainResult<&str> {
        self.index_to_label
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| {
                TrainError::LabelError(format!(
                    "Index {} out of bounds for {} classes",
                    index,
                    self.index_to_label.len()
                ))
            })
    }

    /// Index of the `no_relation` sentinel.
    pub fn no_relation_index(&self) -> usize {
        0
    }

    /// Number of classes.
    pub fn num_labels(&self) -> usize {
        self.index_to_label.len()
    }

    /// Labels in index order.
    pub fn labels(&self) -> &[String] {
        &self.index_to_label
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::klue()
    }
}
