//! Ranks image files by sharpness and prints the sharpest as JSON.

use anyhow::{bail, Context, Result};
use clap::Parser;
use sequential_blur_detector::{DetectorSettings, ImageHandle, ScoreRequest, SequentialBlurDetector};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Debug, Parser)]
#[command(name = "blur-rank", version, about = "Keep the N sharpest of a set of images")]
struct Args {
    /// Number of images to keep (overrides the settings file)
    #[arg(long)]
    top: Option<usize>,

    /// Scoring threads (overrides the settings file)
    #[arg(long)]
    threads: Option<usize>,

    /// Settings file; defaults to the user config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Images to rank
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RankedFrame {
    rank: usize,
    path: String,
    score: f32,
}

fn resolve_settings(args: &Args) -> Result<DetectorSettings> {
    let mut settings = match &args.config {
        Some(path) => DetectorSettings::load_from(path)?,
        None => DetectorSettings::load()?,
    };
    if let Some(top) = args.top {
        settings.keep_top_n = top;
    }
    if args.threads.is_some() {
        settings.worker_threads = args.threads;
    }
    Ok(settings)
}

/// Decodes one file and offers it to the detector. The handle is returned so
/// the caller can record its path while the image is still alive.
async fn score_file(
    detector: SequentialBlurDetector,
    path: PathBuf,
    request: ScoreRequest,
) -> (PathBuf, Result<(ImageHandle, f32)>) {
    let decode_path = path.clone();
    let decoded = tokio::task::spawn_blocking(move || image::open(&decode_path)).await;

    let result = match decoded {
        Ok(Ok(img)) => {
            let handle = Arc::new(img);
            match detector.evaluate(Arc::clone(&handle), &request).await {
                Ok(score) => Ok((handle, score)),
                Err(e) => Err(e.into()),
            }
        }
        Ok(Err(e)) => Err(anyhow::Error::new(e).context("Failed to decode image")),
        Err(e) => Err(anyhow::Error::new(e).context("Decode task failed")),
    };
    (path, result)
}

/// Streams `paths` through the detector with at most `max_in_flight` images
/// decoded at once. Images that are not retained are dropped as soon as their
/// evaluation completes.
async fn rank_files(
    detector: &SequentialBlurDetector,
    paths: Vec<PathBuf>,
    request: ScoreRequest,
    max_in_flight: usize,
) -> Result<Vec<RankedFrame>> {
    let mut pending = paths.into_iter();
    let mut tasks = JoinSet::new();
    // Keyed by image address; pruned to the retained set after every completion.
    // A handle is alive when it is registered, so its address cannot be stale.
    let mut names: HashMap<usize, PathBuf> = HashMap::new();
    let mut scored = 0usize;

    loop {
        while tasks.len() < max_in_flight.max(1) {
            match pending.next() {
                Some(path) => {
                    tasks.spawn(score_file(detector.clone(), path, request));
                }
                None => break,
            }
        }

        let Some(joined) = tasks.join_next().await else {
            break;
        };
        let (path, result) = joined.context("Scoring task panicked")?;
        match result {
            Ok((handle, score)) => {
                log::debug!("{} scored {}", path.display(), score);
                names.insert(Arc::as_ptr(&handle) as usize, path);
                scored += 1;
            }
            Err(e) => log::warn!("Skipping {}: {:#}", path.display(), e),
        }

        let retained: Vec<usize> = detector
            .top_results()
            .iter()
            .map(|r| Arc::as_ptr(&r.image) as usize)
            .collect();
        names.retain(|key, _| retained.contains(key));
    }

    if scored == 0 {
        bail!("No image could be scored");
    }

    Ok(detector
        .top_results()
        .iter()
        .enumerate()
        .filter_map(|(rank, result)| {
            names
                .get(&(Arc::as_ptr(&result.image) as usize))
                .map(|path| RankedFrame {
                    rank: rank + 1,
                    path: path.display().to_string(),
                    score: result.score,
                })
        })
        .collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let settings = resolve_settings(&args)?;
    let detector = SequentialBlurDetector::from_settings(&settings)?;
    let max_in_flight = settings.worker_threads.unwrap_or_else(num_cpus::get);

    let ranked = rank_files(&detector, args.images, settings.request, max_in_flight).await?;
    println!("{}", serde_json::to_string_pretty(&ranked)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::path::Path;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("blur-rank-{}-{}", std::process::id(), name));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_stripes(dir: &Path, name: &str, period: u32) -> PathBuf {
        let path = dir.join(name);
        GrayImage::from_fn(24, 24, |x, _| {
            Luma([if (x / period) % 2 == 0 { 255 } else { 0 }])
        })
        .save(&path)
        .unwrap();
        path
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["blur-rank", "--top", "3", "--threads", "2", "a.png", "b.png"])
            .unwrap();
        assert_eq!(args.top, Some(3));
        assert_eq!(args.threads, Some(2));
        assert_eq!(args.images, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
        assert!(args.config.is_none());
    }

    #[test]
    fn test_args_require_images() {
        assert!(Args::try_parse_from(["blur-rank", "--top", "3"]).is_err());
        assert!(Args::try_parse_from(["blur-rank", "--top", "many", "a.png"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = temp_dir("override");
        let config = dir.join("settings.json");
        DetectorSettings {
            keep_top_n: 5,
            worker_threads: Some(4),
            ..DetectorSettings::default()
        }
        .save_to(&config)
        .unwrap();

        let config_arg = config.display().to_string();
        let args = Args::try_parse_from(["blur-rank", "--config", &config_arg, "--top", "3", "a.png"])
            .unwrap();
        let settings = resolve_settings(&args).unwrap();
        assert_eq!(settings.keep_top_n, 3);
        assert_eq!(settings.worker_threads, Some(4));

        let args = Args::try_parse_from(["blur-rank", "--config", &config_arg, "a.png"]).unwrap();
        assert_eq!(resolve_settings(&args).unwrap().keep_top_n, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rank_files_streams_and_names_results() {
        let dir = temp_dir("rank");
        let fine = write_stripes(&dir, "fine.png", 1);
        let medium = write_stripes(&dir, "medium.png", 3);
        let coarse = write_stripes(&dir, "coarse.png", 8);
        let missing = dir.join("missing.png");

        let settings = DetectorSettings {
            worker_threads: Some(2),
            ..DetectorSettings::default()
        };
        let detector = SequentialBlurDetector::from_settings(&settings).unwrap();
        let ranked = rank_files(
            &detector,
            vec![coarse, missing, fine.clone(), medium.clone()],
            ScoreRequest::default(),
            2,
        )
        .await
        .unwrap();

        let paths: Vec<&str> = ranked.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![fine.display().to_string(), medium.display().to_string()]
        );
        assert_eq!(ranked[0].rank, 1);
        assert!(ranked[0].score > ranked[1].score);
    }

    #[tokio::test]
    async fn test_rank_files_fails_when_nothing_scores() {
        let dir = temp_dir("empty");
        let detector = SequentialBlurDetector::from_settings(&DetectorSettings {
            worker_threads: Some(1),
            ..DetectorSettings::default()
        })
        .unwrap();
        let result = rank_files(&detector, vec![dir.join("nope.png")], ScoreRequest::default(), 1).await;
        assert!(result.is_err());
    }
}
