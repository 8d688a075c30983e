//! Reciprocal Rank Fusion.

use std::collections::HashMap;

use veritas_core::Passage;

/// Standard RRF constant.
pub const RRF_K: f32 = 60.0;

/// Fuse ranked lists: `score(p) = sum(1 / (k + rank))`, rank starting at 1.
///
/// Passages are matched by id. Output is sorted by fused score, ties keep the
/// order of first appearance, and each passage carries its fused score.
pub fn reciprocal_rank_fusion(lists: Vec<Vec<Passage>>, k: f32) -> Vec<Passage> {
    // id -> (first appearance, passage, fused score)
    let mut fused: HashMap<String, (usize, Passage, f32)> = HashMap::new();
    let mut next = 0usize;

    for list in lists {
        for (idx, passage) in list.into_iter().enumerate() {
            let contribution = 1.0 / (k + (idx + 1) as f32);
            match fused.get_mut(&passage.id) {
                Some((_, _, score)) => *score += contribution,
                None => {
                    fused.insert(passage.id.clone(), (next, passage, contribution));
                    next += 1;
                }
            }
        }
    }

    let mut ranked: Vec<(usize, Passage, f32)> = fused.into_values().collect();
    ranked.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .map(|(_, mut passage, score)| {
            passage.score = score;
            passage
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[&str]) -> Vec<Passage> {
        ids.iter().map(|id| Passage::new(*id, *id, 0.0)).collect()
    }

    fn ids(passages: &[Passage]) -> Vec<&str> {
        passages.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_shared_results_rise() {
        let fused = reciprocal_rank_fusion(vec![list(&["a", "b", "c"]), list(&["c", "d"])], RRF_K);
        assert_eq!(ids(&fused), vec!["c", "a", "b", "d"]);
        let expected = 1.0 / 63.0 + 1.0 / 61.0;
        assert!((fused[0].score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_first_appearance() {
        let fused = reciprocal_rank_fusion(vec![list(&["a", "b"]), list(&["b", "a"])], RRF_K);
        assert_eq!(ids(&fused), vec!["a", "b"]);
    }

    #[test]
    fn test_empty_lists() {
        assert!(reciprocal_rank_fusion(vec![], RRF_K).is_empty());
        assert_eq!(ids(&reciprocal_rank_fusion(vec![vec![], list(&["x"])], RRF_K)), vec!["x"]);
    }
}
