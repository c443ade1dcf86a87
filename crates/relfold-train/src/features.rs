//! Fixed-length feature encoding for relation examples.
//!
//! Every example becomes `max_length` token ids laid out as
//!
//! ```text
//! [CLS] subject [SEP] object [SEP] marked sentence [SEP] [PAD] ...
//! ```
//!
//! where the marked sentence wraps each entity in a typed marker token on
//! both sides (`[S:PER] Alice [S:PER]`). Markers are allocated after the
//! tokenizer's base vocabulary.

use crate::corpus::{EntityMention, EntityType, RawExample};
use crate::labels::LabelMap;
use crate::{TrainError, TrainResult};
use scirs2_core::ndarray::{Array2, Axis};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Range;
use std::path::Path;

/// Number of entity marker tokens: two roles times six entity types.
pub const ENTITY_MARKER_COUNT: usize = 2 * EntityType::ALL.len();

/// `[CLS]` plus the three `[SEP]` tokens of the layout.
const STRUCTURAL_TOKENS: usize = 4;

/// Padding token.
pub const PAD_TOKEN: &str = "[PAD]";
/// Unknown-word token.
pub const UNK_TOKEN: &str = "[UNK]";
/// Sequence-start token.
pub const CLS_TOKEN: &str = "[CLS]";
/// Separator token.
pub const SEP_TOKEN: &str = "[SEP]";

/// Ids of the special tokens a [`Tokenizer`] must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    /// `[CLS]`.
    pub cls: u32,
    /// `[SEP]`.
    pub sep: u32,
    /// `[PAD]`.
    pub pad: u32,
    /// `[UNK]`.
    pub unk: u32,
}

/// Text to token-id conversion.
pub trait Tokenizer: fmt::Debug {
    /// Token ids of `text`, without special tokens.
    fn tokenize(&self, text: &str) -> Vec<u32>;

    /// Size of the base vocabulary.
    fn vocab_size(&self) -> usize;

    /// Special token ids.
    fn special_tokens(&self) -> SpecialTokens;
}

/// Split text on whitespace, with each punctuation character as its own word.
pub fn split_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    for chunk in text.split_whitespace() {
        let mut start = 0;
        for (i, c) in chunk.char_indices() {
            if c.is_alphanumeric() {
                continue;
            }
            if start < i {
                words.push(&chunk[start..i]);
            }
            let end = i + c.len_utf8();
            words.push(&chunk[i..end]);
            start = end;
        }
        if start < chunk.len() {
            words.push(&chunk[start..]);
        }
    }
    words
}

/// Word-level tokenizer over a fixed vocabulary.
///
/// Words missing from the vocabulary map to `[UNK]`.
#[derive(Debug, Clone)]
pub struct WordLevelTokenizer {
    token_to_id: HashMap<String, u32>,
    id_to_token: Vec<String>,
    special: SpecialTokens,
}

impl WordLevelTokenizer {
    /// Tokenizer over `tokens`, where a token's position is its id.
    ///
    /// The four special tokens must be present and no token may repeat.
    pub fn from_tokens(tokens: Vec<String>) -> TrainResult<Self> {
        let mut token_to_id = HashMap::with_capacity(tokens.len());
        for (id, token) in tokens.iter().enumerate() {
            if token.is_empty() {
                return Err(TrainError::ConfigError(format!(
                    "Empty vocabulary entry at id {}",
                    id
                )));
            }
            if token_to_id.insert(token.clone(), id as u32).is_some() {
                return Err(TrainError::ConfigError(format!(
                    "Duplicate vocabulary entry: {}",
                    token
                )));
            }
        }

        let lookup = |name: &str| {
            token_to_id.get(name).copied().ok_or_else(|| {
                TrainError::ConfigError(format!("Vocabulary is missing {}", name))
            })
        };
        let special = SpecialTokens {
            cls: lookup(CLS_TOKEN)?,
            sep: lookup(SEP_TOKEN)?,
            pad: lookup(PAD_TOKEN)?,
            unk: lookup(UNK_TOKEN)?,
        };

        Ok(Self {
            token_to_id,
            id_to_token: tokens,
            special,
        })
    }

    /// Build a vocabulary from texts.
    ///
    /// Special tokens take ids 0-3; words follow by descending frequency,
    /// ties broken lexicographically.
    pub fn build<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for text in texts {
            for word in split_words(text) {
                *counts.entry(word).or_insert(0) += 1;
            }
        }

        let mut words: Vec<(&str, usize)> = counts.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        let mut id_to_token: Vec<String> = [PAD_TOKEN, UNK_TOKEN, CLS_TOKEN, SEP_TOKEN]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut token_to_id: HashMap<String, u32> = id_to_token
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
        for (word, _) in words {
            if !token_to_id.contains_key(word) {
                token_to_id.insert(word.to_string(), id_to_token.len() as u32);
                id_to_token.push(word.to_string());
            }
        }

        Self {
            token_to_id,
            id_to_token,
            special: SpecialTokens {
                pad: 0,
                unk: 1,
                cls: 2,
                sep: 3,
            },
        }
    }

    /// Build a vocabulary from the sentences of a corpus.
    pub fn from_corpus(examples: &[RawExample]) -> Self {
        Self::build(examples.iter().map(|e| e.sentence.as_str()))
    }

    /// Load a vocabulary file: one token per line, line number = id.
    pub fn load<P: AsRef<Path>>(path: P) -> TrainResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrainError::ConfigError(format!(
                "Failed to read vocabulary {}: {}",
                path.display(),
                e
            ))
        })?;
        let tokens = content.lines().map(|l| l.trim_end().to_string()).collect();
        let tokenizer = Self::from_tokens(tokens).map_err(|e| {
            TrainError::ConfigError(format!("{}: {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), size = tokenizer.vocab_size(), "Loaded vocabulary");
        Ok(tokenizer)
    }

    /// Write the vocabulary in the format read by [`WordLevelTokenizer::load`].
    pub fn save<P: AsRef<Path>>(&self, path: P) -> TrainResult<()> {
        let path = path.as_ref();
        let mut content = self.id_to_token.join("\n");
        content.push('\n');
        std::fs::write(path, content).map_err(|e| {
            TrainError::ConfigError(format!(
                "Failed to write vocabulary {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Id of a token, if present.
    pub fn token_id(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    /// Token of an id, if present.
    pub fn token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(id as usize).map(String::as_str)
    }
}

impl Tokenizer for WordLevelTokenizer {
    fn tokenize(&self, text: &str) -> Vec<u32> {
        split_words(text)
            .into_iter()
            .map(|w| self.token_id(w).unwrap_or(self.special.unk))
            .collect()
    }

    fn vocab_size(&self) -> usize {
        self.id_to_token.len()
    }

    fn special_tokens(&self) -> SpecialTokens {
        self.special
    }
}

/// Role of an entity in a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRole {
    /// Subject (head) entity.
    Subject,
    /// Object (tail) entity.
    Object,
}

impl EntityRole {
    fn ordinal(self) -> usize {
        match self {
            EntityRole::Subject => 0,
            EntityRole::Object => 1,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            EntityRole::Subject => "S",
            EntityRole::Object => "O",
        }
    }
}

/// Surface form of an entity marker, e.g. `[S:PER]`.
pub fn marker_token(role: EntityRole, entity_type: EntityType) -> String {
    format!("[{}:{}]", role.tag(), entity_type)
}

/// One encoded example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFeature {
    /// Token ids, exactly `max_length` long.
    pub input_ids: Vec<u32>,
    /// 1 for real tokens, 0 for padding.
    pub attention_mask: Vec<u8>,
    /// Positions of the subject and object opening markers (0 if cut).
    pub entity_positions: [usize; 2],
    /// Gold label index.
    pub label: usize,
}

/// A batch of encoded examples.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFeatures {
    /// Token ids (`n x max_length`).
    pub input_ids: Array2<u32>,
    /// Attention mask (`n x max_length`).
    pub attention_mask: Array2<u8>,
    /// Subject and object marker positions (`n x 2`).
    pub entity_positions: Array2<usize>,
    /// Gold label indices.
    pub labels: Vec<usize>,
}

impl EncodedFeatures {
    /// Number of examples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Sequence length.
    pub fn max_length(&self) -> usize {
        self.input_ids.ncols()
    }

    /// Rows at `indices`, in the given order.
    pub fn subset(&self, indices: &[usize]) -> TrainResult<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(TrainError::InvalidParameter(format!(
                "index {} out of range for {} features",
                bad,
                self.len()
            )));
        }
        Ok(Self {
            input_ids: self.input_ids.select(Axis(0), indices),
            attention_mask: self.attention_mask.select(Axis(0), indices),
            entity_positions: self.entity_positions.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        })
    }
}

/// Sentence tokens with markers inserted.
struct MarkedSentence {
    tokens: Vec<u32>,
    subject_open: usize,
    object_open: usize,
    first_open: usize,
    last_close: usize,
}

/// Encodes relation examples to fixed-length features.
#[derive(Debug)]
pub struct FeatureEncoder {
    tokenizer: Box<dyn Tokenizer>,
    max_length: usize,
}

impl FeatureEncoder {
    /// Encoder producing sequences of exactly `max_length` tokens.
    pub fn new<T: Tokenizer + 'static>(tokenizer: T, max_length: usize) -> TrainResult<Self> {
        if max_length < STRUCTURAL_TOKENS {
            return Err(TrainError::InvalidParameter(format!(
                "max_length must be at least {}, got {}",
                STRUCTURAL_TOKENS, max_length
            )));
        }
        Ok(Self {
            tokenizer: Box::new(tokenizer),
            max_length,
        })
    }

    /// Sequence length of every encoded example.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Base vocabulary plus the entity markers.
    pub fn extended_vocab_size(&self) -> usize {
        self.tokenizer.vocab_size() + ENTITY_MARKER_COUNT
    }

    /// Token id of an entity marker.
    pub fn marker_id(&self, role: EntityRole, entity_type: EntityType) -> u32 {
        (self.tokenizer.vocab_size() + role.ordinal() * EntityType::ALL.len() + entity_type.ordinal())
            as u32
    }

    /// Encode one example.
    pub fn encode(&self, example: &RawExample, labels: &LabelMap) -> TrainResult<EncodedFeature> {
        let label = labels.index_of(&example.label)?;
        let subject_range = char_span(example, &example.subject)?;
        let object_range = char_span(example, &example.object)?;
        if example.subject.overlaps(&example.object) {
            return Err(TrainError::InvalidExample {
                id: example.id.clone(),
                reason: "subject and object spans overlap".to_string(),
            });
        }

        let subject_text = &example.sentence[subject_range.clone()];
        let object_text = &example.sentence[object_range.clone()];
        warn_on_mismatch(example, &example.subject, subject_text);
        warn_on_mismatch(example, &example.object, object_text);

        let special = self.tokenizer.special_tokens();
        let mut subject_ids = self.tokenizer.tokenize(subject_text);
        let mut object_ids = self.tokenizer.tokenize(object_text);

        let available = self.max_length - STRUCTURAL_TOKENS;
        subject_ids.truncate(available);
        object_ids.truncate(available - subject_ids.len());
        let budget = available - subject_ids.len() - object_ids.len();

        let marked = self.mark(example, subject_range, object_range);
        let window = truncation_window(&marked, budget);

        let offset = 3 + subject_ids.len() + object_ids.len();
        let position = |marker: usize| {
            if window.contains(&marker) {
                offset + marker - window.start
            } else {
                0
            }
        };
        let entity_positions = [position(marked.subject_open), position(marked.object_open)];

        let mut input_ids = Vec::with_capacity(self.max_length);
        input_ids.push(special.cls);
        input_ids.extend_from_slice(&subject_ids);
        input_ids.push(special.sep);
        input_ids.extend_from_slice(&object_ids);
        input_ids.push(special.sep);
        input_ids.extend_from_slice(&marked.tokens[window]);
        input_ids.push(special.sep);

        let real = input_ids.len();
        let mut attention_mask = vec![1u8; real];
        input_ids.resize(self.max_length, special.pad);
        attention_mask.resize(self.max_length, 0);

        Ok(EncodedFeature {
            input_ids,
            attention_mask,
            entity_positions,
            label,
        })
    }

    /// Encode a batch of examples.
    pub fn encode_batch(
        &self,
        examples: &[RawExample],
        labels: &LabelMap,
    ) -> TrainResult<EncodedFeatures> {
        self.encode_rows(examples.iter(), labels)
    }

    /// Encode the examples at `indices`, in the given order.
    pub fn encode_selection(
        &self,
        examples: &[RawExample],
        indices: &[usize],
        labels: &LabelMap,
    ) -> TrainResult<EncodedFeatures> {
        let rows = indices
            .iter()
            .map(|&i| {
                examples.get(i).ok_or_else(|| {
                    TrainError::InvalidParameter(format!(
                        "example index {} out of range for {} examples",
                        i,
                        examples.len()
                    ))
                })
            })
            .collect::<TrainResult<Vec<_>>>()?;
        self.encode_rows(rows.into_iter(), labels)
    }

    fn encode_rows<'a, I>(&self, rows: I, labels: &LabelMap) -> TrainResult<EncodedFeatures>
    where
        I: ExactSizeIterator<Item = &'a RawExample>,
    {
        let n = rows.len();
        let mut input_ids = Vec::with_capacity(n * self.max_length);
        let mut attention_mask = Vec::with_capacity(n * self.max_length);
        let mut entity_positions = Vec::with_capacity(n * 2);
        let mut gold = Vec::with_capacity(n);

        for example in rows {
            let feature = self.encode(example, labels)?;
            input_ids.extend(feature.input_ids);
            attention_mask.extend(feature.attention_mask);
            entity_positions.extend(feature.entity_positions);
            gold.push(feature.label);
        }

        let shape_error = |e: scirs2_core::ndarray::ShapeError| TrainError::ShapeError(e.to_string());
        Ok(EncodedFeatures {
            input_ids: Array2::from_shape_vec((n, self.max_length), input_ids).map_err(shape_error)?,
            attention_mask: Array2::from_shape_vec((n, self.max_length), attention_mask)
                .map_err(shape_error)?,
            entity_positions: Array2::from_shape_vec((n, 2), entity_positions)
                .map_err(shape_error)?,
            labels: gold,
        })
    }

    /// Tokenize the sentence with both entities wrapped in their markers.
    fn mark(
        &self,
        example: &RawExample,
        subject_range: Range<usize>,
        object_range: Range<usize>,
    ) -> MarkedSentence {
        let sentence = example.sentence.as_str();
        let mut entities = [
            (EntityRole::Subject, example.subject.entity_type, subject_range),
            (EntityRole::Object, example.object.entity_type, object_range),
        ];
        entities.sort_by_key(|(_, _, range)| range.start);

        let mut tokens = Vec::new();
        let mut opens = [0usize; 2];
        let mut first_open = 0;
        let mut last_close = 0;
        let mut cursor = 0;

        for (i, (role, entity_type, range)) in entities.into_iter().enumerate() {
            tokens.extend(self.tokenizer.tokenize(&sentence[cursor..range.start]));
            let marker = self.marker_id(role, entity_type);

            opens[role.ordinal()] = tokens.len();
            if i == 0 {
                first_open = tokens.len();
            }
            tokens.push(marker);
            tokens.extend(self.tokenizer.tokenize(&sentence[range.clone()]));
            last_close = tokens.len();
            tokens.push(marker);

            cursor = range.end;
        }
        tokens.extend(self.tokenizer.tokenize(&sentence[cursor..]));

        MarkedSentence {
            tokens,
            subject_open: opens[EntityRole::Subject.ordinal()],
            object_open: opens[EntityRole::Object.ordinal()],
            first_open,
            last_close,
        }
    }
}

/// Window of the marked sentence that fits in `budget` tokens.
///
/// Tail truncation, shifted forward to end right after the last marker when
/// that keeps both entities.
fn truncation_window(marked: &MarkedSentence, budget: usize) -> Range<usize> {
    let len = marked.tokens.len();
    if len <= budget {
        return 0..len;
    }
    let entity_span = marked.last_close - marked.first_open + 1;
    if marked.last_close >= budget && entity_span <= budget {
        let end = marked.last_close + 1;
        return end - budget..end;
    }
    0..budget
}

/// Byte range of an inclusive character span, validated against the sentence.
fn char_span(example: &RawExample, entity: &EntityMention) -> TrainResult<Range<usize>> {
    let invalid = |reason: String| TrainError::InvalidExample {
        id: example.id.clone(),
        reason,
    };
    if entity.start > entity.end {
        return Err(invalid(format!(
            "span {}..={} of '{}' starts after it ends",
            entity.start, entity.end, entity.word
        )));
    }

    let offsets: Vec<usize> = example
        .sentence
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(example.sentence.len()))
        .collect();
    let n_chars = offsets.len() - 1;
    if entity.end >= n_chars {
        return Err(invalid(format!(
            "span {}..={} of '{}' exceeds sentence length {}",
            entity.start, entity.end, entity.word, n_chars
        )));
    }

    Ok(offsets[entity.start]..offsets[entity.end + 1])
}

fn warn_on_mismatch(example: &RawExample, entity: &EntityMention, span_text: &str) {
    if span_text != entity.word {
        tracing::warn!(
            id = %example.id,
            declared = %entity.word,
            span = %span_text,
            "Entity word differs from its span; encoding the span"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example(sentence: &str, subject: EntityMention, object: EntityMention) -> RawExample {
        RawExample {
            id: "t0".to_string(),
            sentence: sentence.to_string(),
            subject,
            object,
            label: "org:top_members/employees".to_string(),
        }
    }

    fn alice() -> RawExample {
        example(
            "Alice works at Acme.",
            EntityMention::new("Alice", 0, 4, EntityType::Per),
            EntityMention::new("Acme", 15, 18, EntityType::Org),
        )
    }

    fn encoder_for(e: &RawExample, max_length: usize) -> FeatureEncoder {
        let tokenizer = WordLevelTokenizer::from_corpus(std::slice::from_ref(e));
        FeatureEncoder::new(tokenizer, max_length).unwrap()
    }

    #[test]
    fn test_split_words() {
        assert_eq!(
            split_words("Alice, (CEO) runs  Acme."),
            vec!["Alice", ",", "(", "CEO", ")", "runs", "Acme", "."]
        );
        assert_eq!(split_words("이순신은 조선의 장군이다."), vec!["이순신은", "조선의", "장군이다", "."]);
    }

    #[test]
    fn test_build_vocabulary_order() {
        let tokenizer = WordLevelTokenizer::build(["b a b", "c"]);
        assert_eq!(tokenizer.token(0), Some(PAD_TOKEN));
        assert_eq!(tokenizer.token(3), Some(SEP_TOKEN));
        assert_eq!(tokenizer.token(4), Some("b"));
        assert_eq!(tokenizer.token(5), Some("a"));
        assert_eq!(tokenizer.token(6), Some("c"));
        assert_eq!(tokenizer.tokenize("a zzz"), vec![5, 1]);
    }

    #[test]
    fn test_vocabulary_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocab.txt");
        let tokenizer = WordLevelTokenizer::build(["x y z"]);
        tokenizer.save(&path).unwrap();

        let loaded = WordLevelTokenizer::load(&path).unwrap();
        assert_eq!(loaded.vocab_size(), tokenizer.vocab_size());
        assert_eq!(loaded.tokenize("z y"), tokenizer.tokenize("z y"));
        assert_eq!(loaded.special_tokens(), tokenizer.special_tokens());
    }

    #[test]
    fn test_vocabulary_missing_special_token() {
        let tokens = vec!["[PAD]".to_string(), "[UNK]".to_string(), "[CLS]".to_string()];
        assert!(matches!(
            WordLevelTokenizer::from_tokens(tokens),
            Err(TrainError::ConfigError(_))
        ));
    }

    #[test]
    fn test_extended_vocab_size_and_markers() {
        let e = alice();
        let encoder = encoder_for(&e, 32);
        assert_eq!(encoder.extended_vocab_size(), 9 + ENTITY_MARKER_COUNT);

        let mut ids: Vec<u32> = [EntityRole::Subject, EntityRole::Object]
            .into_iter()
            .flat_map(|r| EntityType::ALL.into_iter().map(move |t| (r, t)))
            .map(|(r, t)| encoder.marker_id(r, t))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 12);
        assert_eq!(ids[0], 9);
        assert_eq!(ids[11], 20);
        assert_eq!(marker_token(EntityRole::Object, EntityType::Org), "[O:ORG]");
    }

    #[test]
    fn test_encode_layout() {
        // Vocabulary: 4 ".", 5 "Acme", 6 "Alice", 7 "at", 8 "works".
        // Markers: [S:PER] = 9, [O:ORG] = 16.
        let e = alice();
        let encoder = encoder_for(&e, 20);
        let feature = encoder.encode(&e, &LabelMap::klue()).unwrap();

        assert_eq!(
            feature.input_ids,
            vec![2, 6, 3, 5, 3, 9, 6, 9, 8, 7, 16, 5, 16, 4, 3, 0, 0, 0, 0, 0]
        );
        assert_eq!(feature.attention_mask.iter().filter(|&&m| m == 1).count(), 15);
        assert_eq!(feature.attention_mask[15..], [0u8; 5]);
        assert_eq!(feature.entity_positions, [5, 10]);
        assert_eq!(feature.label, 1);
    }

    #[test]
    fn test_tail_truncation_keeps_markers_in_window() {
        let e = alice();
        let feature = encoder_for(&e, 12).encode(&e, &LabelMap::klue()).unwrap();
        assert_eq!(feature.input_ids, vec![2, 6, 3, 5, 3, 9, 6, 9, 8, 7, 16, 3]);
        assert_eq!(feature.entity_positions, [5, 10]);

        let feature = encoder_for(&e, 11).encode(&e, &LabelMap::klue()).unwrap();
        assert_eq!(feature.input_ids.len(), 11);
        assert_eq!(feature.entity_positions, [5, 0]);
    }

    #[test]
    fn test_truncation_shifts_to_keep_entities() {
        // Vocabulary: 4 "x", 5 "Ann", 6 "Bob", 7 "met"; [S:PER] = 8, [O:PER] = 14.
        let e = example(
            "x x x x x Bob met Ann",
            EntityMention::new("Bob", 10, 12, EntityType::Per),
            EntityMention::new("Ann", 18, 20, EntityType::Per),
        );
        let feature = encoder_for(&e, 14).encode(&e, &LabelMap::klue()).unwrap();

        assert_eq!(
            feature.input_ids,
            vec![2, 6, 3, 5, 3, 4, 8, 6, 8, 7, 14, 5, 14, 3]
        );
        assert_eq!(feature.entity_positions, [6, 10]);
        assert_eq!(feature.input_ids[6], 8);
        assert_eq!(feature.input_ids[10], 14);
    }

    #[test]
    fn test_object_before_subject() {
        let e = example(
            "Acme hired Alice",
            EntityMention::new("Alice", 11, 15, EntityType::Per),
            EntityMention::new("Acme", 0, 3, EntityType::Org),
        );
        let encoder = encoder_for(&e, 24);
        let feature = encoder.encode(&e, &LabelMap::klue()).unwrap();
        let [subject, object] = feature.entity_positions;
        assert!(object < subject);
        assert_eq!(
            feature.input_ids[subject],
            encoder.marker_id(EntityRole::Subject, EntityType::Per)
        );
        assert_eq!(
            feature.input_ids[object],
            encoder.marker_id(EntityRole::Object, EntityType::Org)
        );
    }

    #[test]
    fn test_query_longer_than_budget() {
        let e = alice();
        let feature = encoder_for(&e, 5).encode(&e, &LabelMap::klue()).unwrap();
        assert_eq!(feature.input_ids, vec![2, 6, 3, 3, 3]);
        assert_eq!(feature.entity_positions, [0, 0]);
    }

    #[test]
    fn test_multibyte_spans() {
        let e = example(
            "이순신은 조선의 장군이다.",
            EntityMention::new("이순신", 0, 2, EntityType::Per),
            EntityMention::new("조선", 5, 6, EntityType::Org),
        );
        let feature = encoder_for(&e, 32).encode(&e, &LabelMap::klue()).unwrap();
        assert_eq!(feature.input_ids.len(), 32);
        assert!(feature.entity_positions.iter().all(|&p| p > 0));
    }

    #[test]
    fn test_invalid_spans() {
        let out_of_range = example(
            "Bob met Ann",
            EntityMention::new("Bob", 0, 2, EntityType::Per),
            EntityMention::new("Ann", 8, 11, EntityType::Per),
        );
        let encoder = encoder_for(&out_of_range, 16);
        assert!(matches!(
            encoder.encode(&out_of_range, &LabelMap::klue()),
            Err(TrainError::InvalidExample { .. })
        ));

        let reversed = example(
            "Bob met Ann",
            EntityMention::new("Bob", 2, 0, EntityType::Per),
            EntityMention::new("Ann", 8, 10, EntityType::Per),
        );
        assert!(matches!(
            encoder.encode(&reversed, &LabelMap::klue()),
            Err(TrainError::InvalidExample { .. })
        ));

        let overlapping = example(
            "Bob met Ann",
            EntityMention::new("Bob met", 0, 6, EntityType::Per),
            EntityMention::new("met", 4, 6, EntityType::Per),
        );
        assert!(matches!(
            encoder.encode(&overlapping, &LabelMap::klue()),
            Err(TrainError::InvalidExample { .. })
        ));
    }

    #[test]
    fn test_word_mismatch_encodes_span() {
        let mut e = alice();
        e.subject.word = "Alicia".to_string();
        let encoder = encoder_for(&e, 20);
        let feature = encoder.encode(&e, &LabelMap::klue()).unwrap();
        assert_eq!(feature.input_ids[1], 6);
    }

    #[test]
    fn test_unknown_label() {
        let mut e = alice();
        e.label = "per:pet".to_string();
        let encoder = encoder_for(&e, 20);
        assert!(matches!(
            encoder.encode(&e, &LabelMap::klue()),
            Err(TrainError::LabelError(_))
        ));
    }

    #[test]
    fn test_encode_batch_and_subset() {
        let a = alice();
        let mut b = alice();
        b.label = "no_relation".to_string();
        let examples = vec![a, b];
        let encoder = encoder_for(&examples[0], 16);

        let batch = encoder.encode_batch(&examples, &LabelMap::klue()).unwrap();
        assert_eq!(batch.input_ids.dim(), (2, 16));
        assert_eq!(batch.attention_mask.dim(), (2, 16));
        assert_eq!(batch.entity_positions.dim(), (2, 2));
        assert_eq!(batch.labels, vec![1, 0]);

        let subset = batch.subset(&[1]).unwrap();
        assert_eq!(subset.labels, vec![0]);
        assert_eq!(subset.max_length(), 16);
        assert!(batch.subset(&[2]).is_err());

        let selected = encoder
            .encode_selection(&examples, &[1, 0], &LabelMap::klue())
            .unwrap();
        assert_eq!(selected.labels, vec![0, 1]);
        assert!(encoder.encode_selection(&examples, &[5], &LabelMap::klue()).is_err());
    }

    #[test]
    fn test_max_length_too_small() {
        let tokenizer = WordLevelTokenizer::build(["a"]);
        assert!(matches!(
            FeatureEncoder::new(tokenizer, 3),
            Err(TrainError::InvalidParameter(_))
        ));
    }
}
