//! Bounded best-first ranking of scored images.

use crate::error::{BlurError, Result};
use crate::measure::ComparisonSense;
use image::DynamicImage;
use std::sync::Arc;

/// Shared, immutable image.
pub type ImageHandle = Arc<DynamicImage>;

/// An image together with the score it was ranked by.
#[derive(Debug, Clone)]
pub struct ScoredImage {
    pub score: f32,
    pub image: ImageHandle,
}

impl ScoredImage {
    pub fn new(score: f32, image: ImageHandle) -> Self {
        Self { score, image }
    }
}

/// Keeps at most `capacity` results ordered best to worst.
///
/// Insertion is O(capacity). A candidate is placed before the first member it
/// is strictly better than, so equal scores keep arrival order and a candidate
/// tied with the worst member of a full set is dropped.
#[derive(Debug, Clone)]
pub struct TopNRanker {
    capacity: usize,
    sense: ComparisonSense,
    items: Vec<ScoredImage>,
}

impl TopNRanker {
    pub fn new(capacity: usize, sense: ComparisonSense) -> Result<Self> {
        if capacity == 0 {
            return Err(BlurError::Configuration(
                "keep_top_n must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            sense,
            items: Vec::new(),
        })
    }

    /// Offers a candidate. Returns the rank it now holds, or `None` if it was
    /// worse than every member of a full set.
    pub fn insert(&mut self, candidate: ScoredImage) -> Option<usize> {
        let position = self
            .items
            .iter()
            .position(|held| self.sense.better(candidate.score, held.score));

        let rank = match position {
            Some(i) if i < self.capacity => {
                self.items.insert(i, candidate);
                Some(i)
            }
            _ if self.items.len() < self.capacity => {
                self.items.push(candidate);
                Some(self.items.len() - 1)
            }
            _ => None,
        };

        if self.items.len() > self.capacity {
            self.items.pop();
        }

        rank
    }

    pub fn reset(&mut self) {
        self.items.clear();
    }

    /// True only when the set is full and every member satisfies `predicate`.
    pub fn all_satisfy<F>(&self, predicate: F) -> bool
    where
        F: Fn(&ScoredImage) -> bool,
    {
        self.is_full() && self.items.iter().all(predicate)
    }

    pub fn items(&self) -> &[ScoredImage] {
        &self.items
    }

    pub fn scores(&self) -> Vec<f32> {
        self.items.iter().map(|item| item.score).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sense(&self) -> ComparisonSense {
        self.sense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(tag: u32) -> ImageHandle {
        // width doubles as an identity tag
        Arc::new(DynamicImage::new_luma8(tag, 1))
    }

    fn fill(ranker: &mut TopNRanker, scores: &[f32]) {
        for (i, &score) in scores.iter().enumerate() {
            ranker.insert(ScoredImage::new(score, image(i as u32 + 1)));
        }
    }

    fn tags(ranker: &TopNRanker) -> Vec<u32> {
        ranker.items().iter().map(|item| item.image.width()).collect()
    }

    fn assert_sorted(ranker: &TopNRanker) {
        for pair in ranker.items().windows(2) {
            assert!(!ranker.sense().better(pair[1].score, pair[0].score));
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = TopNRanker::new(0, ComparisonSense::HigherIsBetter).unwrap_err();
        assert!(matches!(err, BlurError::Configuration(_)));
    }

    #[test]
    fn test_higher_is_better_scenario() {
        let mut ranker = TopNRanker::new(2, ComparisonSense::HigherIsBetter).unwrap();
        fill(&mut ranker, &[5.0, 12.0, 3.0]);
        assert_eq!(ranker.scores(), vec![12.0, 5.0]);
    }

    #[test]
    fn test_lower_is_better_scenario() {
        let mut ranker = TopNRanker::new(2, ComparisonSense::LowerIsBetter).unwrap();
        fill(&mut ranker, &[0.8, 0.1, 0.5]);
        assert_eq!(ranker.scores(), vec![0.1, 0.5]);
    }

    #[test]
    fn test_worse_candidate_leaves_full_set_unchanged() {
        let mut ranker = TopNRanker::new(2, ComparisonSense::HigherIsBetter).unwrap();
        fill(&mut ranker, &[10.0, 20.0, 15.0, 12.0]);
        let before = tags(&ranker);
        let rank = ranker.insert(ScoredImage::new(1.0, image(99)));
        assert_eq!(rank, None);
        assert_eq!(tags(&ranker), before);
        assert_eq!(ranker.scores(), vec![20.0, 15.0]);
    }

    #[test]
    fn test_tie_with_worst_does_not_displace() {
        let mut ranker = TopNRanker::new(2, ComparisonSense::HigherIsBetter).unwrap();
        fill(&mut ranker, &[8.0, 4.0]);
        assert_eq!(ranker.insert(ScoredImage::new(4.0, image(50))), None);
        assert_eq!(tags(&ranker), vec![1, 2]);
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let mut ranker = TopNRanker::new(3, ComparisonSense::LowerIsBetter).unwrap();
        fill(&mut ranker, &[0.3, 0.3, 0.3]);
        assert_eq!(tags(&ranker), vec![1, 2, 3]);

        // strictly better goes in front of all equals and evicts the last one
        assert_eq!(ranker.insert(ScoredImage::new(0.2, image(9))), Some(0));
        assert_eq!(tags(&ranker), vec![9, 1, 2]);
    }

    #[test]
    fn test_length_is_min_of_count_and_capacity() {
        let scores = [3.0, 9.0, 1.0, 7.0, 7.0, 2.0, 11.0];
        for capacity in 1..=8 {
            for n in 0..=scores.len() {
                let mut ranker = TopNRanker::new(capacity, ComparisonSense::HigherIsBetter).unwrap();
                fill(&mut ranker, &scores[..n]);
                assert_eq!(ranker.len(), n.min(capacity));
                assert_sorted(&ranker);
            }
        }
    }

    #[test]
    fn test_retained_set_independent_of_arrival_order() {
        let scores = [4.0f32, 9.0, 1.0, 6.0, 8.0, 2.0];
        let forward: Vec<usize> = (0..scores.len()).collect();
        let backward: Vec<usize> = forward.iter().rev().copied().collect();
        let shuffled = vec![3, 0, 5, 1, 4, 2];

        let retained = |order: &[usize]| {
            let mut ranker = TopNRanker::new(3, ComparisonSense::HigherIsBetter).unwrap();
            for &i in order {
                ranker.insert(ScoredImage::new(scores[i], image(i as u32 + 1)));
            }
            let mut t = tags(&ranker);
            t.sort_unstable();
            t
        };

        let expected = retained(&forward);
        assert_eq!(expected, vec![2, 4, 5]);
        assert_eq!(retained(&backward), expected);
        assert_eq!(retained(&shuffled), expected);
    }

    #[test]
    fn test_all_satisfy_requires_full_set() {
        let mut ranker = TopNRanker::new(2, ComparisonSense::HigherIsBetter).unwrap();
        assert!(!ranker.all_satisfy(|_| true));

        ranker.insert(ScoredImage::new(100.0, image(1)));
        assert!(!ranker.all_satisfy(|_| true));

        ranker.insert(ScoredImage::new(50.0, image(2)));
        assert!(ranker.all_satisfy(|item| item.score > 10.0));
        assert!(!ranker.all_satisfy(|item| item.score > 60.0));
    }

    #[test]
    fn test_reset_clears() {
        let mut ranker = TopNRanker::new(2, ComparisonSense::HigherIsBetter).unwrap();
        fill(&mut ranker, &[1.0, 2.0]);
        ranker.reset();
        assert!(ranker.is_empty());
        assert!(!ranker.all_satisfy(|_| true));
        assert_eq!(ranker.capacity(), 2);
    }
}
