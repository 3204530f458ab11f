//! Alignment-free (CTC) decoding of frame posteriors.
//!
//! Both decoders implement the CTC collapsing rule: repeated labels without an
//! intervening blank merge into a single emission and blanks are dropped.
//!
//! * Greedy (best path): per-frame argmax, then collapse.
//! * Beam: prefix beam search that sums the probability of every alignment of
//!   a prefix, keeping the `width` best prefixes per frame. Prefixes live in an
//!   arena trie; a hypothesis is just the index of its last node.
//!
//! Line confidence is the per-frame geometric mean of the decoded sequence's
//! probability, `exp(log P / T)`. An empty decoding has confidence 1.0.

use crate::core::config::{ConfigError, ConfigValidator};
use crate::domain::posteriors::FramePosteriors;
use crate::processors::codec::BLANK_LABEL;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const MIN_PROB: f32 = 1e-30;

/// One non-blank emission of a decoded path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelEmission {
    pub label: u32,
    /// First frame of the emission.
    pub start: usize,
    /// One past the last frame.
    pub end: usize,
    /// Maximum probability of `label` within the span.
    pub confidence: f32,
}

/// Decoding strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecoderMode {
    /// Best-path decoding.
    #[default]
    Greedy,
    /// Prefix beam search with `width` surviving hypotheses per frame.
    Beam { width: usize },
}

/// Decoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(default)]
    pub mode: DecoderMode,
    /// Labels below this probability are not expanded by the beam search.
    #[serde(default = "DecoderConfig::default_label_cutoff")]
    pub label_cutoff: f32,
}

impl DecoderConfig {
    pub fn greedy() -> Self {
        Self::default()
    }

    pub fn beam(width: usize) -> Self {
        Self {
            mode: DecoderMode::Beam { width },
            ..Self::default()
        }
    }

    pub fn with_label_cutoff(mut self, cutoff: f32) -> Self {
        self.label_cutoff = cutoff;
        self
    }

    fn default_label_cutoff() -> f32 {
        1e-4
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            mode: DecoderMode::Greedy,
            label_cutoff: Self::default_label_cutoff(),
        }
    }
}

impl ConfigValidator for DecoderConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let DecoderMode::Beam { width } = self.mode {
            self.validate_non_zero("beam width", width)?;
        }
        self.validate_range("label_cutoff", self.label_cutoff, 0.0, 1.0)
    }

    fn get_defaults() -> Self {
        Self::default()
    }
}

/// A decoded label sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPath {
    pub emissions: Vec<LabelEmission>,
    /// Natural log of the sequence probability.
    pub log_prob: f32,
    /// `exp(log_prob / frames)`, or 1.0 for an empty sequence.
    pub confidence: f32,
}

impl DecodedPath {
    fn new(emissions: Vec<LabelEmission>, log_prob: f32, frames: usize) -> Self {
        let confidence = if emissions.is_empty() || frames == 0 {
            1.0
        } else {
            (log_prob / frames as f32).exp().clamp(0.0, 1.0)
        };
        Self {
            emissions,
            log_prob,
            confidence,
        }
    }

    pub fn labels(&self) -> Vec<u32> {
        self.emissions.iter().map(|e| e.label).collect()
    }
}

/// Decodes `posteriors` with the configured strategy.
pub fn decode(posteriors: &FramePosteriors, config: &DecoderConfig) -> DecodedPath {
    match config.mode {
        DecoderMode::Greedy => greedy_decode(posteriors),
        DecoderMode::Beam { width } => beam_decode(posteriors, width, config.label_cutoff),
    }
}

#[inline]
fn ln(p: f32) -> f32 {
    p.max(MIN_PROB).ln()
}

#[inline]
fn log_add(a: f32, b: f32) -> f32 {
    if a == f32::NEG_INFINITY {
        return b;
    }
    if b == f32::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Index of the largest value; ties resolve to the lowest index.
fn argmax(values: impl Iterator<Item = f32>) -> (usize, f32) {
    values
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| {
            if v > best.1 { (i, v) } else { best }
        })
}

/// Best-path decoding.
pub fn greedy_decode(posteriors: &FramePosteriors) -> DecodedPath {
    let frames = posteriors.frames();
    let mut emissions: Vec<LabelEmission> = Vec::new();
    let mut log_prob = 0.0f32;
    let mut prev: Option<u32> = None;

    for t in 0..frames {
        let (best, p) = argmax(posteriors.frame(t).iter().copied());
        let label = best as u32;
        log_prob += ln(p);

        if label == BLANK_LABEL {
            prev = Some(label);
            continue;
        }
        match emissions.last_mut() {
            Some(last) if prev == Some(label) => {
                last.end = t + 1;
                last.confidence = last.confidence.max(p);
            }
            _ => emissions.push(LabelEmission {
                label,
                start: t,
                end: t + 1,
                confidence: p,
            }),
        }
        prev = Some(label);
    }

    tracing::trace!(
        "greedy decode: {} frames -> {} emissions",
        frames,
        emissions.len()
    );
    DecodedPath::new(emissions, log_prob, frames)
}

#[derive(Debug, Clone, Copy)]
struct BeamNode {
    label: u32,
    parent: Option<usize>,
}

/// Prefix trie in struct-of-nodes form. A prefix is identified by its last node.
#[derive(Debug, Default)]
struct PrefixArena {
    nodes: Vec<BeamNode>,
    children: HashMap<(Option<usize>, u32), usize>,
}

impl PrefixArena {
    fn child(&mut self, parent: Option<usize>, label: u32) -> usize {
        if let Some(&idx) = self.children.get(&(parent, label)) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(BeamNode { label, parent });
        self.children.insert((parent, label), idx);
        idx
    }

    fn last_label(&self, prefix: Option<usize>) -> Option<u32> {
        prefix.map(|n| self.nodes[n].label)
    }

    fn labels(&self, prefix: Option<usize>) -> Vec<u32> {
        let mut labels = Vec::new();
        let mut cursor = prefix;
        while let Some(idx) = cursor {
            labels.push(self.nodes[idx].label);
            cursor = self.nodes[idx].parent;
        }
        labels.reverse();
        labels
    }
}

/// Log-probabilities of a prefix ending in blank and in its last label.
#[derive(Debug, Clone, Copy)]
struct PrefixScore {
    blank: f32,
    non_blank: f32,
}

impl PrefixScore {
    const EMPTY: PrefixScore = PrefixScore {
        blank: f32::NEG_INFINITY,
        non_blank: f32::NEG_INFINITY,
    };

    fn total(&self) -> f32 {
        log_add(self.blank, self.non_blank)
    }
}

/// CTC prefix beam search.
pub fn beam_decode(posteriors: &FramePosteriors, width: usize, label_cutoff: f32) -> DecodedPath {
    let width = width.max(1);
    let frames = posteriors.frames();
    let classes = posteriors.num_classes();
    let mut arena = PrefixArena::default();
    let mut beams: Vec<(Option<usize>, PrefixScore)> = vec![(
        None,
        PrefixScore {
            blank: 0.0,
            non_blank: f32::NEG_INFINITY,
        },
    )];

    for t in 0..frames {
        let row = posteriors.frame(t);
        let blank_lp = ln(row[BLANK_LABEL as usize]);

        let mut candidates: Vec<(u32, f32)> = (1..classes)
            .filter(|&c| row[c] >= label_cutoff)
            .map(|c| (c as u32, row[c]))
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        candidates.truncate(width);

        // BTreeMap keeps iteration order independent of hashing.
        let mut next: BTreeMap<Option<usize>, PrefixScore> = BTreeMap::new();
        for &(prefix, score) in &beams {
            let total = score.total();
            let entry = next.entry(prefix).or_insert(PrefixScore::EMPTY);
            entry.blank = log_add(entry.blank, total + blank_lp);

            let last = arena.last_label(prefix);
            if let Some(l) = last {
                let entry = next.entry(prefix).or_insert(PrefixScore::EMPTY);
                entry.non_blank = log_add(entry.non_blank, score.non_blank + ln(row[l as usize]));
            }

            for &(c, p) in &candidates {
                let child = arena.child(prefix, c);
                let extend = if last == Some(c) {
                    score.blank + ln(p)
                } else {
                    total + ln(p)
                };
                let entry = next.entry(Some(child)).or_insert(PrefixScore::EMPTY);
                entry.non_blank = log_add(entry.non_blank, extend);
            }
        }

        beams = next.into_iter().collect();
        beams.sort_by(|a, b| b.1.total().total_cmp(&a.1.total()).then(a.0.cmp(&b.0)));
        beams.truncate(width);
    }

    let Some(&(best, score)) = beams.first() else {
        return DecodedPath::new(Vec::new(), 0.0, frames);
    };
    let labels = arena.labels(best);
    let log_prob = if frames == 0 { 0.0 } else { score.total() };

    let emissions = match viterbi_align(posteriors, &labels) {
        Some(spans) => labels
            .iter()
            .zip(spans)
            .map(|(&label, (start, end))| LabelEmission {
                label,
                start,
                end,
                confidence: (start..end)
                    .map(|t| posteriors.frame(t)[label as usize])
                    .fold(0.0, f32::max),
            })
            .collect(),
        None => {
            tracing::warn!(
                "beam result of {} labels cannot be aligned to {} frames; using best path",
                labels.len(),
                frames
            );
            return greedy_decode(posteriors);
        }
    };
    tracing::trace!(
        "beam decode: {} frames, {} arena nodes -> {} emissions",
        frames,
        arena.nodes.len(),
        labels.len()
    );
    DecodedPath::new(emissions, log_prob, frames)
}

/// Most likely CTC alignment of `labels` to the frames of `posteriors`.
///
/// Returns one `(start, end)` frame span per label, or `None` when the label
/// sequence needs more frames than are available.
pub fn viterbi_align(posteriors: &FramePosteriors, labels: &[u32]) -> Option<Vec<(usize, usize)>> {
    let frames = posteriors.frames();
    if labels.is_empty() {
        return Some(Vec::new());
    }
    if frames == 0 || labels.iter().any(|&l| l as usize >= posteriors.num_classes()) {
        return None;
    }

    // Extended sequence: blank, l1, blank, l2, ..., blank.
    let states = 2 * labels.len() + 1;
    let ext = |s: usize| if s % 2 == 0 { BLANK_LABEL } else { labels[s / 2] };

    let mut score = vec![f32::NEG_INFINITY; states];
    let mut back = vec![0u8; frames * states];
    score[0] = ln(posteriors.frame(0)[ext(0) as usize]);
    score[1] = ln(posteriors.frame(0)[ext(1) as usize]);

    for t in 1..frames {
        let row = posteriors.frame(t);
        let mut next = vec![f32::NEG_INFINITY; states];
        for s in 0..states {
            let mut best = score[s];
            let mut step = 0u8;
            if s >= 1 && score[s - 1] > best {
                best = score[s - 1];
                step = 1;
            }
            if s >= 2 && ext(s) != BLANK_LABEL && ext(s) != ext(s - 2) && score[s - 2] > best {
                best = score[s - 2];
                step = 2;
            }
            if best > f32::NEG_INFINITY {
                next[s] = best + ln(row[ext(s) as usize]);
                back[t * states + s] = step;
            }
        }
        score = next;
    }

    let last = states - 1;
    let mut state = if score[last] >= score[last - 1] { last } else { last - 1 };
    if score[state] == f32::NEG_INFINITY {
        return None;
    }

    let mut path = vec![0usize; frames];
    for t in (0..frames).rev() {
        path[t] = state;
        if t > 0 {
            state -= back[t * states + state] as usize;
        }
    }
    if path[0] > 1 {
        return None;
    }

    let mut spans: Vec<Option<(usize, usize)>> = vec![None; labels.len()];
    for (t, &s) in path.iter().enumerate() {
        if s % 2 == 1 {
            let k = s / 2;
            let span = spans[k].get_or_insert((t, t + 1));
            span.1 = t + 1;
        }
    }
    spans.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// Builds peaked posteriors: each frame puts `peak` on its label and spreads the rest.
    fn peaked(frames: &[u32], classes: usize, peak: f32) -> FramePosteriors {
        let mut probs = Array2::from_elem((frames.len(), classes), (1.0 - peak) / (classes - 1) as f32);
        for (t, &label) in frames.iter().enumerate() {
            probs[[t, label as usize]] = peak;
        }
        FramePosteriors::new(probs).unwrap()
    }

    #[test]
    fn test_greedy_collapses_repeats_and_blanks() {
        let post = peaked(&[0, 1, 1, 0, 1, 2, 2, 0], 3, 0.9);
        let path = greedy_decode(&post);
        assert_eq!(path.labels(), vec![1, 1, 2]);
        assert_eq!((path.emissions[0].start, path.emissions[0].end), (1, 3));
        assert_eq!((path.emissions[2].start, path.emissions[2].end), (5, 7));
        assert!(path.confidence > 0.85 && path.confidence <= 1.0);
    }

    #[test]
    fn test_all_blank_is_empty_with_full_confidence() {
        let post = peaked(&[0, 0, 0, 0], 4, 0.6);
        for config in [DecoderConfig::greedy(), DecoderConfig::beam(4)] {
            let path = decode(&post, &config);
            assert!(path.emissions.is_empty());
            assert_eq!(path.confidence, 1.0);
        }
    }

    #[test]
    fn test_zero_frames() {
        let post = FramePosteriors::new(Array2::zeros((0, 3))).unwrap();
        assert!(greedy_decode(&post).emissions.is_empty());
        assert!(beam_decode(&post, 3, 1e-4).emissions.is_empty());
    }

    #[test]
    fn test_blank_insertion_does_not_change_decoding() {
        let base = [1u32, 0, 2, 3, 3, 0, 1];
        let variants: [&[u32]; 4] = [
            &[0, 0, 1, 0, 2, 3, 3, 0, 1],
            &[1, 0, 0, 0, 2, 3, 3, 0, 1, 0, 0],
            &[1, 0, 2, 0, 3, 3, 0, 0, 1],
            &[0, 1, 0, 2, 3, 3, 0, 0, 0, 1, 0],
        ];
        let reference = greedy_decode(&peaked(&base, 4, 0.9)).labels();
        assert_eq!(reference, vec![1, 2, 3, 1]);
        for frames in variants {
            let post = peaked(frames, 4, 0.9);
            assert_eq!(greedy_decode(&post).labels(), reference);
            assert_eq!(beam_decode(&post, 8, 1e-4).labels(), reference);
        }
    }

    #[test]
    fn test_beam_sums_alignments() {
        // Best path is blank-blank (0.6 * 0.6 = 0.36), but "a" collects
        // 0.4*0.4 + 0.4*0.6 + 0.6*0.4 = 0.64 over its alignments.
        let probs = ndarray::array![[0.6, 0.4], [0.6, 0.4]];
        let post = FramePosteriors::new(probs).unwrap();
        assert!(greedy_decode(&post).labels().is_empty());
        let beam = beam_decode(&post, 4, 1e-4);
        assert_eq!(beam.labels(), vec![1]);
        assert!((beam.log_prob - 0.64f32.ln()).abs() < 1e-4);
        assert!((beam.confidence - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_repeated_label_needs_blank() {
        let post = peaked(&[1, 0, 1], 3, 0.95);
        assert_eq!(beam_decode(&post, 4, 1e-4).labels(), vec![1, 1]);
        let merged = peaked(&[1, 1, 1], 3, 0.95);
        assert_eq!(beam_decode(&merged, 4, 1e-4).labels(), vec![1]);
    }

    #[test]
    fn test_short_input_is_deterministic() {
        let post = peaked(&[2], 4, 0.4);
        let first = beam_decode(&post, 3, 1e-4);
        for _ in 0..5 {
            assert_eq!(beam_decode(&post, 3, 1e-4), first);
        }
        assert_eq!(first.labels(), vec![2]);
    }

    #[test]
    fn test_viterbi_alignment_spans() {
        let post = peaked(&[0, 1, 1, 0, 0, 2, 0], 3, 0.9);
        let spans = viterbi_align(&post, &[1, 2]).unwrap();
        assert_eq!(spans, vec![(1, 3), (5, 6)]);
        // "aa" needs three frames.
        let short = peaked(&[1, 1], 3, 0.9);
        assert!(viterbi_align(&short, &[1, 1]).is_none());
        assert_eq!(viterbi_align(&short, &[]), Some(vec![]));
    }

    #[test]
    fn test_config_validation() {
        assert!(DecoderConfig::beam(0).validate().is_err());
        assert!(DecoderConfig::beam(5).validate().is_ok());
        let parsed: DecoderConfig =
            serde_json::from_str(r#"{"mode": {"type": "beam", "width": 3}}"#).unwrap();
        assert_eq!(parsed.mode, DecoderMode::Beam { width: 3 });
        let default: DecoderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(default.mode, DecoderMode::Greedy);
    }
}
