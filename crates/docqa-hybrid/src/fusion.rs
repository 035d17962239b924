// Reciprocal Rank Fusion (RRF)

use std::collections::HashMap;

use docqa_core::types::{ContentId, SearchResult};

/// Default rank offset; larger values flatten the weight of top ranks.
pub const RRF_K: usize = 60;

/// Merge two best-first result lists by reciprocal rank.
///
/// An item at 1-based rank `r` in either list contributes `1 / (k + r)`; items
/// are identified by content id, so the same chunk found by both engines is
/// summed. The output holds every distinct item, highest fused score first,
/// with ties in first-seen order (all of `a`, then `b`). Each result carries
/// its fused score and the chunk as first seen.
pub fn reciprocal_rank_fusion(a: &[SearchResult], b: &[SearchResult], k: usize) -> Vec<SearchResult> {
    let k_param = k as f32;
    let mut fused: Vec<SearchResult> = Vec::with_capacity(a.len() + b.len());
    let mut positions: HashMap<ContentId, usize> = HashMap::new();

    for list in [a, b] {
        for (rank, result) in list.iter().enumerate() {
            let contribution = 1.0 / (k_param + (rank + 1) as f32);
            match positions.get(&result.chunk.content_id) {
                Some(&pos) => fused[pos].score += contribution,
                None => {
                    positions.insert(result.chunk.content_id.clone(), fused.len());
                    fused.push(SearchResult::new(result.chunk.clone(), contribution));
                }
            }
        }
    }

    // stable: equal scores keep first-seen order
    fused.sort_by(|x, y| y.score.total_cmp(&x.score));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::types::Chunk;

    fn hit(text: &str, score: f32) -> SearchResult {
        SearchResult::new(Chunk::new(text.to_string(), "doc.txt", 1, 0), score)
    }

    fn contents(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk.content.as_str()).collect()
    }

    #[test]
    fn items_in_both_lists_rank_first() {
        let vector = vec![hit("1", 0.9), hit("2", 0.8), hit("3", 0.7)];
        let keyword = vec![hit("3", 10.0), hit("1", 8.0), hit("4", 5.0)];
        let fused = reciprocal_rank_fusion(&vector, &keyword, RRF_K);
        assert_eq!(fused.len(), 4);
        assert_eq!(contents(&fused)[..2], ["1", "3"]);
    }

    #[test]
    fn single_ranker_preserves_order() {
        let a = vec![hit("x", 10.0), hit("y", 8.0), hit("z", 5.0)];
        let fused = reciprocal_rank_fusion(&a, &[], RRF_K);
        assert_eq!(contents(&fused), ["x", "y", "z"]);
    }

    #[test]
    fn original_scores_are_ignored() {
        let a = vec![hit("p", 100.0), hit("q", 0.01)];
        let b = vec![hit("q", 0.99), hit("p", 0.01)];
        let fused = reciprocal_rank_fusion(&a, &b, RRF_K);
        assert!((fused[0].score - fused[1].score).abs() < 1e-9);
    }

    #[test]
    fn mirrored_ranks_tie_in_first_seen_order() {
        let a = vec![hit("A", 0.9), hit("B", 0.5)];
        let b = vec![hit("B", 0.8), hit("A", 0.3)];
        let fused = reciprocal_rank_fusion(&a, &b, RRF_K);
        assert_eq!(contents(&fused), ["A", "B"]);
        let expected = 1.0 / 61.0 + 1.0 / 62.0;
        assert!((fused[0].score - expected).abs() < 1e-7);
        assert!((fused[1].score - expected).abs() < 1e-7);
        // same inputs, same order
        assert_eq!(contents(&reciprocal_rank_fusion(&a, &b, RRF_K)), ["A", "B"]);
    }

    #[test]
    fn duplicate_content_from_other_documents_merges() {
        let a = vec![SearchResult::new(Chunk::new("same".to_string(), "a.txt", 1, 0), 1.0)];
        let b = vec![SearchResult::new(Chunk::new("same".to_string(), "b.txt", 4, 9), 1.0)];
        let fused = reciprocal_rank_fusion(&a, &b, RRF_K);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].chunk.source_id, "a.txt");
    }
}
