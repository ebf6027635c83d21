//! Scoring strategies the detector can be bound to.

use crate::error::{BlurError, Result};
use crate::laplacian::calculate_sharpness;
use crate::measure::BlurrinessMeasure;
use crate::ranker::ImageHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;

/// How patches are drawn from the region of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PatchSampling {
    Random,
    #[default]
    Uniform,
}

/// Pixel rectangle patches are drawn from. An empty rectangle means the whole image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RegionOfInterest {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RegionOfInterest {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Parameters for the learned measure. Local scorers ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreRequest {
    /// Number of patches to generate (uniform sampling may produce slightly more or fewer).
    pub patches: u32,
    pub sampling: PatchSampling,
    pub region_of_interest: RegionOfInterest,
}

impl Default for ScoreRequest {
    fn default() -> Self {
        Self {
            patches: 16,
            sampling: PatchSampling::Uniform,
            region_of_interest: RegionOfInterest::default(),
        }
    }
}

/// A source of blurriness scores.
///
/// Implementations deliver exactly one result per call. The learned
/// blurriness model plugs in here and reports
/// [`BlurrinessMeasure::LearnedProbability`], producing values in `[0, 1]`.
#[async_trait]
pub trait BlurScorer: Send + Sync + 'static {
    /// The measure this scorer produces; fixes the ranking direction.
    fn measure(&self) -> BlurrinessMeasure;

    async fn score(&self, image: ImageHandle, request: &ScoreRequest) -> Result<f32>;
}

/// Edge-variance scorer running the convolution on a dedicated rayon pool.
#[derive(Clone)]
pub struct LaplacianScorer {
    pool: Arc<rayon::ThreadPool>,
}

impl LaplacianScorer {
    /// Builds a scorer with `threads` workers, or one per CPU when `None`.
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let threads = threads.unwrap_or_else(num_cpus::get);
        if threads == 0 {
            return Err(BlurError::Configuration(
                "worker_threads must be at least 1".to_string(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("blur-score-{}", i))
            .build()
            .map_err(|e| BlurError::Configuration(format!("failed to start scoring pool: {}", e)))?;

        log::debug!("Laplacian scoring pool started with {} threads", threads);
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

#[async_trait]
impl BlurScorer for LaplacianScorer {
    fn measure(&self) -> BlurrinessMeasure {
        BlurrinessMeasure::EdgeVariance
    }

    async fn score(&self, image: ImageHandle, _request: &ScoreRequest) -> Result<f32> {
        let (tx, rx) = oneshot::channel();
        // Parallel iterators started on a pool worker stay on that pool.
        self.pool.spawn(move || {
            let _ = tx.send(calculate_sharpness(&image));
        });

        rx.await.map_err(|_| {
            BlurError::ImageProcessing("scoring worker exited before reporting".to_string())
        })?
    }
}
