//! Mapping between network output labels and grapheme strings.
//!
//! A [`Codec`] maps each configured string (usually one grapheme cluster, but
//! ligatures and multi-codepoint sequences are allowed) to a non-empty
//! sequence of labels. Label `0` is reserved for the CTC blank. Several strings
//! may share one label sequence; decoding then yields the canonical string,
//! the lexicographically smallest of them.
//!
//! Encoding is a greedy longest match over the configured strings. Decoding is
//! a greedy longest match over label sequences. Construction rejects codecs in
//! which a multi-label code extends a shorter code by labels that can start
//! another run of codes, since greedy decoding of such a codec could split its
//! own encodings differently.

use crate::core::errors::{OCRError, OcrResult};
use crate::domain::transcription::CharacterSpan;
use crate::processors::ctc::LabelEmission;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use unicode_segmentation::UnicodeSegmentation;

/// The reserved blank label.
pub const BLANK_LABEL: u32 = 0;

/// How to reconcile a codec with a new training alphabet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecResize {
    /// Refuse alphabets that contain unmapped graphemes.
    #[default]
    Fail,
    /// Append classes for unmapped graphemes, keep every existing class.
    Add,
    /// Append new classes and remove classes absent from the alphabet.
    Both,
}

/// Outcome of [`Codec::resize`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResizedCodec {
    pub codec: Codec,
    /// For each old label, its new label (`None` when the class was removed).
    /// Index 0 is the blank and always maps to itself.
    pub label_map: Vec<Option<u32>>,
    /// Graphemes that received new classes.
    pub added: Vec<String>,
    /// Graphemes whose classes were removed.
    pub removed: Vec<String>,
}

/// Bidirectional grapheme/label mapping. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Codec {
    c2l: BTreeMap<String, Vec<u32>>,
    l2c: BTreeMap<Vec<u32>, String>,
    max_label: u32,
    longest_key: usize,
    longest_code: usize,
    fallback: Option<u32>,
}

impl Codec {
    /// Builds a codec from an explicit string → label-sequence map.
    pub fn new(map: BTreeMap<String, Vec<u32>>) -> OcrResult<Self> {
        if map.is_empty() {
            return Err(OCRError::codec_error("codec has no entries"));
        }
        let mut l2c: BTreeMap<Vec<u32>, String> = BTreeMap::new();
        for (key, labels) in &map {
            if key.is_empty() {
                return Err(OCRError::codec_error("codec contains an empty string key"));
            }
            if labels.is_empty() {
                return Err(OCRError::codec_error(format!(
                    "codec entry {key:?} has no labels"
                )));
            }
            if labels.contains(&BLANK_LABEL) {
                return Err(OCRError::codec_error(format!(
                    "codec entry {key:?} uses the reserved blank label 0"
                )));
            }
            // BTreeMap iterates keys in order, so the first string seen is canonical.
            l2c.entry(labels.clone()).or_insert_with(|| key.clone());
        }

        let max_label = map.values().flatten().copied().max().unwrap_or(0);
        let longest_key = map.keys().map(String::len).max().unwrap_or(0);
        let longest_code = l2c.keys().map(Vec::len).max().unwrap_or(0);

        let codec = Self {
            c2l: map,
            l2c,
            max_label,
            longest_key,
            longest_code,
            fallback: None,
        };
        codec.check_unambiguous()?;
        tracing::debug!(
            "Built codec with {} strings, {} label sequences, {} classes",
            codec.c2l.len(),
            codec.l2c.len(),
            codec.num_classes()
        );
        Ok(codec)
    }

    /// One single-label class per distinct string, labels assigned from 1 in input order.
    pub fn from_alphabet<I, S>(symbols: I) -> OcrResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        let mut next = 1u32;
        for symbol in symbols {
            let symbol = symbol.into();
            if symbol.is_empty() || map.contains_key(&symbol) {
                continue;
            }
            map.insert(symbol, vec![next]);
            next += 1;
        }
        Self::new(map)
    }

    /// One class per distinct grapheme cluster of the training lines, in sorted order.
    pub fn from_corpus<I, S>(lines: I) -> OcrResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let graphemes: BTreeSet<String> = lines
            .into_iter()
            .flat_map(|line| {
                line.as_ref()
                    .graphemes(true)
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();
        Self::from_alphabet(graphemes)
    }

    /// Parses a JSON object of the form `{"a": [1], "ﬁ": [2, 3]}`.
    pub fn from_json(json: &str) -> OcrResult<Self> {
        let map: BTreeMap<String, Vec<u32>> = serde_json::from_str(json)?;
        Self::new(map)
    }

    /// Reads a JSON codec definition from disk.
    pub fn from_json_file(path: &Path) -> OcrResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OCRError::invalid_input(format!(
                "failed to read codec definition from '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Maps unencodable graphemes to `label` instead of failing.
    pub fn with_fallback(mut self, label: u32) -> OcrResult<Self> {
        if label == BLANK_LABEL || !self.l2c.contains_key(&vec![label]) {
            return Err(OCRError::codec_error(format!(
                "fallback label {label} is not a single-label class of this codec"
            )));
        }
        self.fallback = Some(label);
        Ok(self)
    }

    /// Size of the network output layer this codec needs, blank included.
    pub fn num_classes(&self) -> usize {
        self.max_label as usize + 1
    }

    pub fn max_label(&self) -> u32 {
        self.max_label
    }

    pub fn fallback(&self) -> Option<u32> {
        self.fallback
    }

    pub fn len(&self) -> usize {
        self.c2l.len()
    }

    pub fn is_empty(&self) -> bool {
        self.c2l.is_empty()
    }

    /// Configured strings in sorted order.
    pub fn strings(&self) -> impl Iterator<Item = &str> {
        self.c2l.keys().map(String::as_str)
    }

    /// Label sequence for one configured string.
    pub fn labels_of(&self, s: &str) -> Option<&[u32]> {
        self.c2l.get(s).map(Vec::as_slice)
    }

    /// Encodes `text` into labels.
    ///
    /// # Errors
    ///
    /// `OutOfVocabulary` with the first unencodable grapheme cluster when no
    /// fallback class is configured.
    pub fn encode(&self, text: &str) -> OcrResult<Vec<u32>> {
        let mut labels = Vec::with_capacity(text.len());
        let mut pos = 0;
        while pos < text.len() {
            if let Some((len, code)) = self.longest_key_at(text, pos) {
                labels.extend_from_slice(code);
                pos += len;
                continue;
            }
            let cluster = text[pos..].graphemes(true).next().unwrap_or(&text[pos..]);
            match self.fallback {
                Some(label) => {
                    tracing::debug!("Encoding {cluster:?} at {pos} with fallback label {label}");
                    labels.push(label);
                    pos += cluster.len();
                }
                None => return Err(OCRError::out_of_vocabulary(cluster, pos)),
            }
        }
        Ok(labels)
    }

    /// Decodes bare labels into text. Blanks are dropped.
    ///
    /// Labels that do not start any known label sequence are skipped.
    ///
    /// # Errors
    ///
    /// `Codec` if a label exceeds the codec's alphabet.
    pub fn decode_labels(&self, labels: &[u32]) -> OcrResult<String> {
        let emissions: Vec<LabelEmission> = labels
            .iter()
            .enumerate()
            .map(|(i, &label)| LabelEmission {
                label,
                start: i,
                end: i + 1,
                confidence: 1.0,
            })
            .collect();
        Ok(self
            .decode(&emissions)?
            .into_iter()
            .map(|span| span.text)
            .collect())
    }

    /// Decodes labelled emissions into character spans.
    ///
    /// A multi-label code spans from the start of its first emission to the
    /// end of its last, with the mean confidence of its emissions.
    pub fn decode(&self, emissions: &[LabelEmission]) -> OcrResult<Vec<CharacterSpan>> {
        if let Some(bad) = emissions.iter().find(|e| e.label > self.max_label) {
            return Err(OCRError::codec_error(format!(
                "label {} outside codec alphabet of {} classes",
                bad.label,
                self.num_classes()
            )));
        }
        let emissions: Vec<&LabelEmission> =
            emissions.iter().filter(|e| e.label != BLANK_LABEL).collect();

        let mut spans = Vec::new();
        let mut pos = 0;
        while pos < emissions.len() {
            let max_len = self.longest_code.min(emissions.len() - pos);
            let found = (1..=max_len).rev().find_map(|len| {
                let key: Vec<u32> = emissions[pos..pos + len].iter().map(|e| e.label).collect();
                self.l2c.get(&key).map(|s| (len, s))
            });
            match found {
                Some((len, text)) => {
                    let window = &emissions[pos..pos + len];
                    let confidence =
                        window.iter().map(|e| e.confidence).sum::<f32>() / len as f32;
                    spans.push(CharacterSpan {
                        text: text.clone(),
                        confidence,
                        start: window[0].start,
                        end: window[len - 1].end,
                    });
                    pos += len;
                }
                None => {
                    tracing::debug!(
                        "Skipping label {} at frame {}: no code starts with it",
                        emissions[pos].label,
                        emissions[pos].start
                    );
                    pos += 1;
                }
            }
        }
        Ok(spans)
    }

    /// Grapheme clusters of `text` this codec cannot encode, ignoring the fallback.
    pub fn missing(&self, text: &str) -> BTreeSet<String> {
        let mut missing = BTreeSet::new();
        let mut pos = 0;
        while pos < text.len() {
            if let Some((len, _)) = self.longest_key_at(text, pos) {
                pos += len;
                continue;
            }
            let cluster = text[pos..].graphemes(true).next().unwrap_or(&text[pos..]);
            missing.insert(cluster.to_string());
            pos += cluster.len();
        }
        missing
    }

    /// Returns a codec with single-label classes appended for `graphemes` not yet mapped.
    pub fn add_graphemes<I, S>(&self, graphemes: I) -> OcrResult<Codec>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = self.c2l.clone();
        let mut next = self.max_label + 1;
        for g in graphemes {
            let g = g.into();
            if g.is_empty() || map.contains_key(&g) {
                continue;
            }
            map.insert(g, vec![next]);
            next += 1;
        }
        let mut codec = Codec::new(map)?;
        codec.fallback = self.fallback;
        Ok(codec)
    }

    /// Reconciles this codec with the graphemes of a new training corpus.
    pub fn resize<I, S>(&self, lines: I, mode: CodecResize) -> OcrResult<ResizedCodec>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<String> = lines.into_iter().map(|l| l.as_ref().to_string()).collect();
        let added: Vec<String> = lines
            .iter()
            .flat_map(|l| self.missing(l))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        match mode {
            CodecResize::Fail => {
                if !added.is_empty() {
                    return Err(OCRError::codec_error(format!(
                        "training data contains {} unmapped grapheme(s): {}",
                        added.len(),
                        added.join(" ")
                    )));
                }
                Ok(ResizedCodec {
                    codec: self.clone(),
                    label_map: identity_map(self.max_label),
                    added,
                    removed: Vec::new(),
                })
            }
            CodecResize::Add => {
                let codec = self.add_graphemes(added.iter().cloned())?;
                tracing::info!("Codec resized: {} class(es) added", added.len());
                Ok(ResizedCodec {
                    codec,
                    label_map: identity_map(self.max_label),
                    added,
                    removed: Vec::new(),
                })
            }
            CodecResize::Both => {
                let expanded = self.add_graphemes(added.iter().cloned())?;
                let used: BTreeSet<&str> = lines
                    .iter()
                    .flat_map(|l| expanded.matched_keys(l))
                    .collect();
                let removed: Vec<String> = self
                    .c2l
                    .keys()
                    .filter(|k| !used.contains(k.as_str()))
                    .cloned()
                    .collect();
                let kept: BTreeMap<String, Vec<u32>> = expanded
                    .c2l
                    .iter()
                    .filter(|(k, _)| used.contains(k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();

                let surviving: BTreeSet<u32> = kept.values().flatten().copied().collect();
                let mut label_map = vec![None; self.max_label as usize + 1];
                label_map[0] = Some(BLANK_LABEL);
                let mut compact: BTreeMap<u32, u32> = BTreeMap::new();
                for (new, old) in surviving.iter().enumerate() {
                    compact.insert(*old, new as u32 + 1);
                    if let Some(slot) = label_map.get_mut(*old as usize) {
                        *slot = Some(new as u32 + 1);
                    }
                }
                let remapped: BTreeMap<String, Vec<u32>> = kept
                    .into_iter()
                    .map(|(k, v)| (k, v.iter().map(|l| compact[l]).collect()))
                    .collect();
                let mut codec = Codec::new(remapped)?;
                codec.fallback = self.fallback.and_then(|f| compact.get(&f).copied());
                tracing::info!(
                    "Codec resized: {} class(es) added, {} removed",
                    added.len(),
                    removed.len()
                );
                Ok(ResizedCodec {
                    codec,
                    label_map,
                    added,
                    removed,
                })
            }
        }
    }

    /// Longest configured string starting at byte `pos`.
    fn longest_key_at(&self, text: &str, pos: usize) -> Option<(usize, &[u32])> {
        let rest = &text[pos..];
        let limit = self.longest_key.min(rest.len());
        (1..=limit)
            .rev()
            .filter(|&len| rest.is_char_boundary(len))
            .find_map(|len| self.c2l.get(&rest[..len]).map(|v| (len, v.as_slice())))
    }

    /// Configured strings the greedy encoder uses for `text`.
    fn matched_keys<'a>(&'a self, text: &str) -> Vec<&'a str> {
        let mut keys = Vec::new();
        let mut pos = 0;
        while pos < text.len() {
            match self.longest_key_at(text, pos) {
                Some((len, _)) => {
                    if let Some((k, _)) = self.c2l.get_key_value(&text[pos..pos + len]) {
                        keys.push(k.as_str());
                    }
                    pos += len;
                }
                None => {
                    pos += text[pos..].graphemes(true).next().map_or(1, str::len);
                }
            }
        }
        keys
    }

    /// Rejects codecs whose greedy decoding can split an encoding differently
    /// from how it was built.
    ///
    /// Greedy longest match goes wrong exactly when a code extends a shorter
    /// code by a tail that can begin a run of codes: the encoder may emit the
    /// shorter code followed by that run, and the decoder then takes the longer
    /// code instead.
    fn check_unambiguous(&self) -> OcrResult<()> {
        for code in self.l2c.keys().filter(|c| c.len() > 1) {
            for split in 1..code.len() {
                let (head, tail) = code.split_at(split);
                if self.l2c.contains_key(head) && self.starts_code_run(tail) {
                    return Err(OCRError::codec_error(format!(
                        "label sequence {code:?} for {:?} extends the code of {:?} and cannot be decoded unambiguously",
                        self.l2c[code], self.l2c[head]
                    )));
                }
            }
        }
        Ok(())
    }

    /// Whether `labels` is a prefix of some concatenation of codes.
    fn starts_code_run(&self, labels: &[u32]) -> bool {
        // reachable[i]: labels[..i] is a concatenation of whole codes.
        let mut reachable = vec![false; labels.len() + 1];
        reachable[0] = true;
        for i in 0..labels.len() {
            if !reachable[i] {
                continue;
            }
            let rest = &labels[i..];
            // Keys sort lexicographically, so the first key not below `rest`
            // starts with it if any key does.
            if self
                .l2c
                .range(rest.to_vec()..)
                .next()
                .is_some_and(|(key, _)| key.starts_with(rest))
            {
                return true;
            }
            for len in 1..rest.len() {
                if self.l2c.contains_key(&rest[..len]) {
                    reachable[i + len] = true;
                }
            }
        }
        false
    }
}

fn identity_map(max_label: u32) -> Vec<Option<u32>> {
    (0..=max_label).map(Some).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn latin() -> Codec {
        Codec::from_alphabet(["a", "b", "c", " ", "ﬁ"]).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let codec = latin();
        for text in ["abc", "a b c", "ﬁ a", "", "cab ﬁﬁ"] {
            let labels = codec.encode(text).unwrap();
            assert_eq!(codec.decode_labels(&labels).unwrap(), text);
        }
    }

    #[test]
    fn test_out_of_vocabulary_reports_grapheme_cluster() {
        let codec = latin();
        // "e" followed by a combining acute accent is one cluster.
        let err = codec.encode("ab e\u{301}c").unwrap_err();
        match err {
            OCRError::OutOfVocabulary { grapheme, offset } => {
                assert_eq!(grapheme, "e\u{301}");
                assert_eq!(offset, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_fallback_class() {
        let codec = latin().with_fallback(4).unwrap();
        assert_eq!(codec.encode("axb").unwrap(), vec![1, 4, 2]);
        assert!(latin().with_fallback(0).is_err());
    }

    #[test]
    fn test_multi_label_codes_and_longest_match() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), vec![1]);
        map.insert("b".to_string(), vec![2]);
        map.insert("ab".to_string(), vec![3, 4]);
        let codec = Codec::new(map).unwrap();
        assert_eq!(codec.encode("abab").unwrap(), vec![3, 4, 3, 4]);
        assert_eq!(codec.decode_labels(&[3, 4, 1, 0, 2]).unwrap(), "abab");
        assert_eq!(codec.num_classes(), 5);
    }

    #[test]
    fn test_ambiguous_codec_rejected() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), vec![1]);
        map.insert("b".to_string(), vec![2]);
        map.insert("x".to_string(), vec![1, 2]);
        assert!(matches!(Codec::new(map), Err(OCRError::Codec { .. })));
    }

    #[test]
    fn test_overlapping_codes_rejected() {
        // "z" + "y" encodes to [1, 2, 3], which greedy decoding reads as "x" + "w".
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), vec![1, 2]);
        map.insert("y".to_string(), vec![2, 3]);
        map.insert("z".to_string(), vec![1]);
        map.insert("w".to_string(), vec![3]);
        assert!(matches!(Codec::new(map), Err(OCRError::Codec { .. })));

        // Without "z" nothing can precede [2, 3] inside [1, 2].
        let mut map = BTreeMap::new();
        map.insert("x".to_string(), vec![1, 2]);
        map.insert("y".to_string(), vec![2, 3]);
        map.insert("w".to_string(), vec![3]);
        let codec = Codec::new(map).unwrap();
        for text in ["xy", "yx", "wxw", "xwy"] {
            let labels = codec.encode(text).unwrap();
            assert_eq!(codec.decode_labels(&labels).unwrap(), text);
        }
    }

    #[test]
    fn test_aliases_decode_to_canonical() {
        let mut map = BTreeMap::new();
        map.insert("'".to_string(), vec![1]);
        map.insert("\u{2019}".to_string(), vec![1]);
        let codec = Codec::new(map).unwrap();
        assert_eq!(codec.encode("\u{2019}").unwrap(), vec![1]);
        assert_eq!(codec.decode_labels(&[1]).unwrap(), "'");
    }

    #[test]
    fn test_blank_and_reserved_label() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), vec![0]);
        assert!(Codec::new(map).is_err());
        assert_eq!(latin().decode_labels(&[0, 0, 0]).unwrap(), "");
        assert!(latin().decode_labels(&[99]).is_err());
    }

    #[test]
    fn test_decode_spans() {
        let codec = latin();
        let emissions = vec![
            LabelEmission {
                label: 1,
                start: 0,
                end: 2,
                confidence: 0.9,
            },
            LabelEmission {
                label: 3,
                start: 4,
                end: 5,
                confidence: 0.7,
            },
        ];
        let spans = codec.decode(&emissions).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[1].text, "c");
        assert_eq!((spans[1].start, spans[1].end), (4, 5));
    }

    #[test]
    fn test_from_corpus_uses_grapheme_clusters() {
        let codec = Codec::from_corpus(["ne\u{301}e", "en"]).unwrap();
        assert_eq!(codec.len(), 3);
        assert!(codec.labels_of("e\u{301}").is_some());
        let labels = codec.encode("e\u{301}n").unwrap();
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"a": [1], "b": [2], "ch": [3]}}"#).unwrap();
        let codec = Codec::from_json_file(file.path()).unwrap();
        assert_eq!(codec.encode("chab").unwrap(), vec![3, 1, 2]);
        assert!(Codec::from_json("[1, 2]").is_err());
    }

    #[test]
    fn test_missing_graphemes() {
        let missing = latin().missing("abxyx");
        assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_resize_modes() {
        let codec = Codec::from_alphabet(["a", "b", "c"]).unwrap();
        assert!(codec.resize(["abd"], CodecResize::Fail).is_err());

        let added = codec.resize(["abd"], CodecResize::Add).unwrap();
        assert_eq!(added.added, vec!["d"]);
        assert_eq!(added.codec.labels_of("d"), Some(&[4u32][..]));
        assert_eq!(added.codec.labels_of("c"), Some(&[3u32][..]));

        let both = codec.resize(["bd"], CodecResize::Both).unwrap();
        assert_eq!(both.removed, vec!["a", "c"]);
        assert_eq!(both.codec.num_classes(), 3);
        assert_eq!(both.label_map, vec![Some(0), None, Some(1), None]);
        assert_eq!(both.codec.labels_of("d"), Some(&[2u32][..]));
    }
}
