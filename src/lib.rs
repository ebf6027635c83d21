mod detector;
mod error;
pub mod grayscale;
pub mod laplacian;
mod measure;
mod ranker;
mod scorer;
mod settings;

pub use detector::{SequentialBlurDetector, DEFAULT_KEEP_TOP_N};
pub use error::{BlurError, Result};
pub use laplacian::calculate_sharpness;
pub use measure::{BlurrinessMeasure, ComparisonSense};
pub use ranker::{ImageHandle, ScoredImage, TopNRanker};
pub use scorer::{BlurScorer, LaplacianScorer, PatchSampling, RegionOfInterest, ScoreRequest};
pub use settings::DetectorSettings;
