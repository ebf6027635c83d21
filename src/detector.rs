use crate::error::{BlurError, Result};
use crate::measure::BlurrinessMeasure;
use crate::ranker::{ImageHandle, ScoredImage, TopNRanker};
use crate::scorer::{BlurScorer, LaplacianScorer, ScoreRequest};
use crate::settings::DetectorSettings;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;

pub const DEFAULT_KEEP_TOP_N: usize = 2;

/// Ranker plus the generation it belongs to. A reset bumps the generation so
/// results submitted before it are not inserted after it.
struct RankState {
    generation: u64,
    ranker: TopNRanker,
}

/// Scores images one by one and keeps the best `keep_top_n` of them.
///
/// Clones share the same ranked set, so a detector can be handed to several
/// tasks that evaluate concurrently.
#[derive(Clone)]
pub struct SequentialBlurDetector {
    measure: BlurrinessMeasure,
    scorer: Arc<dyn BlurScorer>,
    state: Arc<Mutex<RankState>>,
}

impl SequentialBlurDetector {
    /// Creates a detector for `measure` using the built-in scorer.
    ///
    /// Only [`BlurrinessMeasure::EdgeVariance`] has one; the learned measure
    /// needs its model injected through [`SequentialBlurDetector::with_scorer`].
    pub fn new(measure: BlurrinessMeasure, keep_top_n: usize) -> Result<Self> {
        validate_keep_top_n(keep_top_n)?;
        match measure {
            BlurrinessMeasure::EdgeVariance => {
                Self::with_scorer(Arc::new(LaplacianScorer::new(None)?), keep_top_n)
            }
            BlurrinessMeasure::LearnedProbability => Err(BlurError::Configuration(
                "learned_probability requires a model scorer, see with_scorer".to_string(),
            )),
        }
    }

    /// Creates a detector bound to `scorer`. Ranking direction follows the
    /// scorer's measure.
    pub fn with_scorer(scorer: Arc<dyn BlurScorer>, keep_top_n: usize) -> Result<Self> {
        let measure = scorer.measure();
        let ranker = TopNRanker::new(keep_top_n, measure.sense())?;
        log::info!(
            "Blur detector created: measure={:?}, keep_top_n={}",
            measure,
            keep_top_n
        );
        Ok(Self {
            measure,
            scorer,
            state: Arc::new(Mutex::new(RankState {
                generation: 0,
                ranker,
            })),
        })
    }

    /// Creates an edge-variance detector from settings.
    pub fn from_settings(settings: &DetectorSettings) -> Result<Self> {
        settings.validate()?;
        match settings.measure {
            BlurrinessMeasure::EdgeVariance => {
                let scorer = LaplacianScorer::new(settings.worker_threads)?;
                Self::with_scorer(Arc::new(scorer), settings.keep_top_n)
            }
            BlurrinessMeasure::LearnedProbability => Err(BlurError::Configuration(
                "learned_probability cannot be built from settings alone, see with_scorer"
                    .to_string(),
            )),
        }
    }

    pub fn measure(&self) -> BlurrinessMeasure {
        self.measure
    }

    pub fn keep_top_n(&self) -> usize {
        self.lock().ranker.capacity()
    }

    fn lock(&self) -> MutexGuard<'_, RankState> {
        // Every mutation leaves the ranker consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scores `image` and offers it to the ranked set.
    ///
    /// Resolves once the ranked set reflects this evaluation. A failed score
    /// is returned to the caller and leaves the ranked set untouched.
    /// `request` only matters for the learned measure.
    pub async fn evaluate(&self, image: ImageHandle, request: &ScoreRequest) -> Result<f32> {
        let generation = self.lock().generation;

        let score = match self.scorer.score(Arc::clone(&image), request).await {
            Ok(score) => score,
            Err(e) => {
                log::warn!("Evaluation failed: {}", e);
                return Err(e);
            }
        };

        if !score.is_finite() {
            log::warn!("Scorer returned non-finite score {}", score);
            return Err(BlurError::Scorer(format!("non-finite score {}", score)));
        }

        let mut state = self.lock();
        if state.generation != generation {
            log::warn!(
                "Dropping score {} submitted before reset (generation {} != {})",
                score,
                generation,
                state.generation
            );
            return Ok(score);
        }

        match state.ranker.insert(ScoredImage::new(score, image)) {
            Some(rank) => log::debug!("Score {} ranked #{} of {}", score, rank + 1, state.ranker.len()),
            None => log::debug!("Score {} discarded", score),
        }

        Ok(score)
    }

    /// Evaluates all `images` concurrently. Results come back in input order.
    pub async fn evaluate_all(&self, images: Vec<ImageHandle>, request: ScoreRequest) -> Vec<Result<f32>> {
        let count = images.len();
        let mut tasks = JoinSet::new();
        for (index, image) in images.into_iter().enumerate() {
            let detector = self.clone();
            tasks.spawn(async move { (index, detector.evaluate(image, &request).await) });
        }

        let mut results: Vec<Option<Result<f32>>> = (0..count).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => log::error!("Evaluation task failed: {}", e),
            }
        }

        results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|| {
                    Err(BlurError::Scorer("evaluation task did not complete".to_string()))
                })
            })
            .collect()
    }

    /// Clears the ranked set. In-flight evaluations finish but are not inserted.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.ranker.reset();
        state.generation += 1;
        log::info!("Blur detector reset (generation {})", state.generation);
    }

    /// True only when `keep_top_n` results are held and all satisfy `predicate`.
    pub fn top_results_satisfy<F>(&self, predicate: F) -> bool
    where
        F: Fn(&ScoredImage) -> bool,
    {
        self.lock().ranker.all_satisfy(predicate)
    }

    /// Snapshot of the ranked set, best first.
    pub fn top_results(&self) -> Vec<ScoredImage> {
        self.lock().ranker.items().to_vec()
    }
}

fn validate_keep_top_n(keep_top_n: usize) -> Result<()> {
    if keep_top_n == 0 {
        return Err(BlurError::Configuration(
            "keep_top_n must be at least 1".to_string(),
        ));
    }
    Ok(())
}
