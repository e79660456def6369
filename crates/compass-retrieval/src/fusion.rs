//! Fusion of the dense and lexical rankings of one query.
//!
//! Each list is min-max normalized on its own (lexical scores are unbounded,
//! dense similarities are not), combined with the policy weights per distinct
//! chunk text, boosted by query intent, clamped to `[0, 1]` and sorted.

use std::collections::HashMap;

use compass_core::config::FusionPolicy;
use compass_core::types::{Provenance, RetrievalResult, ScoredChunk};

use crate::intent::{mentions_materials, QueryIntent};

/// Normalized value given to every entry of a list whose scores are all
/// equal, or whose maximum is zero.
pub const NEUTRAL_SCORE: f32 = 0.5;

/// Min-max normalization into `[0, 1]`, preserving order.
pub fn normalize(scores: &[f32]) -> Vec<f32> {
    let Some(&first) = scores.first() else { return vec![] };
    let (min, max) = scores.iter().fold((first, first), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    if max == min || max == 0.0 {
        return vec![NEUTRAL_SCORE; scores.len()];
    }
    scores.iter().map(|&s| (s - min) / (max - min)).collect()
}

/// Cosine distance in `[0, 2]` to a similarity in `[0, 1]`.
pub fn distance_to_similarity(distance: f32) -> f32 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Default)]
pub struct ScoreFuser {
    policy: FusionPolicy,
}

impl ScoreFuser {
    pub fn new(policy: FusionPolicy) -> Self { Self { policy } }

    pub fn policy(&self) -> &FusionPolicy { &self.policy }

    /// Flat boost added to every fused score of a query with this intent.
    pub fn intent_boost(&self, intent: QueryIntent) -> f32 {
        match intent {
            QueryIntent::Locator => self.policy.locator_boost,
            QueryIntent::Materials => self.policy.materials_boost,
            QueryIntent::General => 0.0,
        }
    }

    /// Top `k` fused results, best first. Ties keep insertion order: dense
    /// results before lexical ones, each in its list's order.
    pub fn fuse(&self, query: &str, dense: &[ScoredChunk], lexical: &[ScoredChunk], k: usize) -> Vec<RetrievalResult> {
        let intent = QueryIntent::classify(query);
        let mut merged: Vec<RetrievalResult> = Vec::with_capacity(dense.len() + lexical.len());
        let mut by_text: HashMap<String, usize> = HashMap::new();

        for (list, weight) in [(dense, self.policy.dense_weight), (lexical, self.policy.lexical_weight)] {
            let scores: Vec<f32> = list.iter().map(|r| r.score).collect();
            for (hit, mut norm) in list.iter().zip(normalize(&scores)) {
                if intent == QueryIntent::Materials && mentions_materials(&hit.chunk.text) {
                    norm = (norm + self.policy.materials_term_boost).min(1.0);
                }
                match by_text.get(&hit.chunk.text) {
                    Some(&i) => {
                        let existing = &mut merged[i];
                        existing.hybrid_score += norm * weight;
                        if existing.provenance != Provenance::from(hit.signal) {
                            existing.provenance = Provenance::Both;
                        }
                    }
                    None => {
                        by_text.insert(hit.chunk.text.clone(), merged.len());
                        merged.push(RetrievalResult {
                            chunk: hit.chunk.clone(),
                            raw_score: hit.score,
                            normalized_score: norm,
                            hybrid_score: norm * weight,
                            provenance: hit.signal.into(),
                        });
                    }
                }
            }
        }

        let boost = self.intent_boost(intent);
        for r in &mut merged {
            r.hybrid_score = (r.hybrid_score + boost).clamp(0.0, 1.0);
        }
        merged.sort_by(|a, b| b.hybrid_score.total_cmp(&a.hybrid_score));
        tracing::debug!(%intent, boost, dense = dense.len(), lexical = lexical.len(), merged = merged.len(), k, "fused rankings");
        merged.truncate(k);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compass_core::types::{Chunk, Signal};
    use std::sync::Arc;

    fn hit(text: &str, score: f32, signal: Signal) -> ScoredChunk {
        let chunk = Chunk {
            text: text.into(),
            breadcrumb: format!("bc {text}"),
            source_file: "f.md".into(),
            chunk_id: 0,
            start_char: 0,
            end_char: text.len(),
        };
        ScoredChunk { chunk: Arc::new(chunk), score, signal }
    }

    fn close(a: f32, b: f32) -> bool { (a - b).abs() < 1e-5 }

    #[test]
    fn normalize_spreads_to_unit_range() {
        assert_eq!(normalize(&[0.9, 0.5, 0.1]).iter().map(|x| (x * 100.0).round() / 100.0).collect::<Vec<_>>(), vec![1.0, 0.5, 0.0]);
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn normalize_degenerate_lists_are_neutral() {
        assert_eq!(normalize(&[5.0, 5.0, 5.0]), vec![0.5; 3]);
        assert_eq!(normalize(&[7.0]), vec![0.5]);
        assert_eq!(normalize(&[-1.0, 0.0]), vec![0.5; 2]);
    }

    #[test]
    fn weighted_combination_of_degenerate_lexical_list() {
        let dense = vec![hit("a", 0.9, Signal::Dense), hit("b", 0.5, Signal::Dense), hit("c", 0.1, Signal::Dense)];
        let lexical = vec![hit("a", 5.0, Signal::Lexical), hit("b", 5.0, Signal::Lexical), hit("c", 5.0, Signal::Lexical)];
        let fused = ScoreFuser::default().fuse("grading breakdown", &dense, &lexical, 10);
        let scores: Vec<f32> = fused.iter().map(|r| r.hybrid_score).collect();
        assert_eq!(fused.len(), 3);
        assert!(close(scores[0], 0.8) && close(scores[1], 0.5) && close(scores[2], 0.2), "{scores:?}");
        assert!(fused.iter().all(|r| r.provenance == Provenance::Both));
    }

    #[test]
    fn locator_query_adds_flat_boost() {
        let dense = vec![hit("a", 0.9, Signal::Dense), hit("b", 0.5, Signal::Dense), hit("c", 0.1, Signal::Dense)];
        let lexical = vec![hit("a", 5.0, Signal::Lexical), hit("b", 5.0, Signal::Lexical), hit("c", 5.0, Signal::Lexical)];
        let fuser = ScoreFuser::default();
        let plain = fuser.fuse("the syllabus", &dense, &lexical, 10);
        let located = fuser.fuse("where is the syllabus", &dense, &lexical, 10);
        assert!(close(located[0].hybrid_score, 0.95));
        assert!(close(located[2].hybrid_score, plain[2].hybrid_score + 0.15));
    }

    #[test]
    fn materials_query_boosts_matching_results_before_weighting() {
        let dense = vec![hit("Required textbook: Fundamentals of Networking", 0.7, Signal::Dense), hit("Office hours Tuesday", 0.3, Signal::Dense)];
        let fused = ScoreFuser::default().fuse("what textbook do I need", &dense, &[], 10);
        // matching: 0.6 * min(1, 1.0 + 0.25) + 0.2 ; other: 0.6 * 0.0 + 0.2
        assert!(close(fused[0].hybrid_score, 0.8));
        assert!(close(fused[0].normalized_score, 1.0));
        assert!(close(fused[1].hybrid_score, 0.2));
    }

    #[test]
    fn duplicate_texts_collapse_and_sum() {
        let dense = vec![hit("same", 0.9, Signal::Dense), hit("dense only", 0.1, Signal::Dense)];
        let lexical = vec![hit("lexical only", 3.0, Signal::Lexical), hit("same", 1.0, Signal::Lexical)];
        let fused = ScoreFuser::default().fuse("anything", &dense, &lexical, 10);
        assert_eq!(fused.len(), 3);
        let same: Vec<_> = fused.iter().filter(|r| r.text() == "same").collect();
        assert_eq!(same.len(), 1);
        assert!(close(same[0].hybrid_score, 0.6 * 1.0 + 0.4 * 0.0));
        assert_eq!(same[0].provenance, Provenance::Both);
        assert!(close(same[0].raw_score, 0.9));
        let lex = fused.iter().find(|r| r.text() == "lexical only").expect("lexical result");
        assert_eq!(lex.provenance, Provenance::Lexical);
        assert!(close(lex.hybrid_score, 0.4));
    }

    #[test]
    fn ties_keep_dense_first_and_k_truncates() {
        let dense = vec![hit("d", 0.4, Signal::Dense)];
        let lexical = vec![hit("l", 2.0, Signal::Lexical)];
        let policy = FusionPolicy { dense_weight: 0.5, lexical_weight: 0.5, ..FusionPolicy::default() };
        let fused = ScoreFuser::new(policy).fuse("x", &dense, &lexical, 10);
        assert_eq!(fused.iter().map(|r| r.text()).collect::<Vec<_>>(), vec!["d", "l"]);
        assert_eq!(ScoreFuser::default().fuse("x", &dense, &lexical, 1).len(), 1);
        assert!(ScoreFuser::default().fuse("x", &dense, &lexical, 0).is_empty());
    }

    #[test]
    fn empty_inputs_fuse_to_nothing() {
        assert!(ScoreFuser::default().fuse("where", &[], &[], 5).is_empty());
    }

    #[test]
    fn similarity_from_cosine_distance() {
        assert_eq!(distance_to_similarity(0.0), 1.0);
        assert_eq!(distance_to_similarity(1.0), 0.5);
        assert_eq!(distance_to_similarity(2.0), 0.0);
        assert_eq!(distance_to_similarity(2.5), 0.0);
    }
}
