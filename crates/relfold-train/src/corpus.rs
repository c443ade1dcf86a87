//! Corpus loading.
//!
//! A corpus is a headered CSV file with one relation example per row:
//!
//! ```text
//! id,sentence,subject_word,subject_start,subject_end,subject_type,object_word,object_start,object_end,object_type,label
//! ```
//!
//! Entity spans are inclusive character offsets into `sentence`.

use crate::{TrainError, TrainResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Named-entity type of a relation argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    /// Person.
    Per,
    /// Organization.
    Org,
    /// Location.
    Loc,
    /// Date.
    Dat,
    /// Other proper noun.
    Poh,
    /// Quantity.
    Noh,
}

impl EntityType {
    /// All entity types in marker order.
    pub const ALL: [EntityType; 6] = [
        EntityType::Per,
        EntityType::Org,
        EntityType::Loc,
        EntityType::Dat,
        EntityType::Poh,
        EntityType::Noh,
    ];

    /// Position of this type in [`EntityType::ALL`].
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Upper-case tag used in corpus files and marker names.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Per => "PER",
            EntityType::Org => "ORG",
            EntityType::Loc => "LOC",
            EntityType::Dat => "DAT",
            EntityType::Poh => "POH",
            EntityType::Noh => "NOH",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TrainError::ConfigError(format!("Unknown entity type: {}", s)))
    }
}

/// An entity mention inside a sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMention {
    /// Surface form as recorded in the corpus.
    pub word: String,
    /// First character (inclusive).
    pub start: usize,
    /// Last character (inclusive).
    pub end: usize,
    /// Entity type.
    pub entity_type: EntityType,
}

impl EntityMention {
    /// Create a new mention.
    pub fn new(word: impl Into<String>, start: usize, end: usize, entity_type: EntityType) -> Self {
        Self {
            word: word.into(),
            start,
            end,
            entity_type,
        }
    }

    /// Whether two mentions share at least one character.
    pub fn overlaps(&self, other: &EntityMention) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// One labelled relation example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExample {
    /// Identifier from the corpus.
    pub id: String,
    /// Sentence text.
    pub sentence: String,
    /// Subject entity.
    pub subject: EntityMention,
    /// Object entity.
    pub object: EntityMention,
    /// Gold relation label.
    pub label: String,
}

#[derive(Debug, Deserialize)]
struct CorpusRow {
    id: String,
    sentence: String,
    subject_word: String,
    subject_start: usize,
    subject_end: usize,
    subject_type: String,
    object_word: String,
    object_start: usize,
    object_end: usize,
    object_type: String,
    label: String,
}

impl CorpusRow {
    fn into_example(self) -> TrainResult<RawExample> {
        Ok(RawExample {
            subject: EntityMention::new(
                self.subject_word,
                self.subject_start,
                self.subject_end,
                self.subject_type.parse()?,
            ),
            object: EntityMention::new(
                self.object_word,
                self.object_start,
                self.object_end,
                self.object_type.parse()?,
            ),
            id: self.id,
            sentence: self.sentence,
            label: self.label,
        })
    }
}

/// Load every example of a corpus file, in file order.
pub fn load_corpus<P: AsRef<Path>>(path: P) -> TrainResult<Vec<RawExample>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| {
            TrainError::ConfigError(format!("Failed to open corpus {}: {}", path.display(), e))
        })?;

    let mut examples = Vec::new();
    for (row, result) in reader.deserialize::<CorpusRow>().enumerate() {
        // Row 1 is the header.
        let line = row + 2;
        let record = result.map_err(|e| {
            TrainError::ConfigError(format!("{}:{}: {}", path.display(), line, e))
        })?;
        let example = record.into_example().map_err(|e| {
            TrainError::ConfigError(format!("{}:{}: {}", path.display(), line, e))
        })?;
        examples.push(example);
    }

    if examples.is_empty() {
        return Err(TrainError::ConfigError(format!(
            "Corpus {} contains no examples",
            path.display()
        )));
    }

    tracing::info!(path = %path.display(), examples = examples.len(), "Loaded corpus");
    Ok(examples)
}

/// Gold labels of a corpus, in order.
pub fn corpus_labels(examples: &[RawExample]) -> Vec<&str> {
    examples.iter().map(|e| e.label.as_str()).collect()
}
