use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emolens::{ClassificationResult, ClassifierError, EmotionEngine, EngineConfig, Input, Outcome, VideoInput};
use log::{error, info};

/// Classify the emotion expressed in text, audio, an image or a video
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML engine configuration (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Give up on classification after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify text given inline, or read from a file with `@path`
    Text { text: String },
    /// Classify an audio clip (wav, mp3, ...)
    Audio { path: PathBuf },
    /// Classify a still image
    Image { path: PathBuf },
    /// Classify an animated GIF, or a directory of frame images
    Video { path: PathBuf },
    /// Print the loaded models and feature settings
    Info,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return report(Err(e)),
    };

    if let Command::Info = args.command {
        let engine = EmotionEngine::from_config(&config).context("Failed to load models")?;
        println!("{}", serde_json::to_string_pretty(&engine.info())?);
        return Ok(ExitCode::SUCCESS);
    }

    let started = Instant::now();
    let deadline = args.timeout_ms.map(Duration::from_millis);
    let result = classify(&config, args.command, deadline).await;
    info!("Finished in {:.2?}", started.elapsed());
    report(result)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, ClassifierError> {
    Ok(path.map(EngineConfig::load).transpose()?.unwrap_or_default())
}

/// Prints the result, or the neutral fallback with its error, as JSON.
fn report(result: Result<ClassificationResult, ClassifierError>) -> Result<ExitCode> {
    let (status, json) = render(result)?;
    println!("{}", json);
    Ok(ExitCode::from(status))
}

fn render(result: Result<ClassificationResult, ClassifierError>) -> Result<(u8, String)> {
    let status = match &result {
        Ok(_) => 0,
        Err(e) if e.is_client_error() => 2,
        Err(_) => 1,
    };
    if let Err(e) = &result {
        eprintln!("Error: {}", e);
    }
    Ok((status, serde_json::to_string_pretty(&Outcome::from(result))?))
}

async fn classify(
    config: &EngineConfig,
    command: Command,
    deadline: Option<Duration>,
) -> Result<ClassificationResult, ClassifierError> {
    let input = read_input(command)?;
    let engine = Arc::new(EmotionEngine::from_config(config)?);
    engine.classify_with_deadline(input, deadline).await
}

fn read_input(command: Command) -> Result<Input, ClassifierError> {
    Ok(match command {
        Command::Text { text } => match text.strip_prefix('@') {
            Some(path) => Input::Text(fs::read_to_string(path)?),
            None => Input::Text(text),
        },
        Command::Audio { path } => Input::Audio {
            bytes: fs::read(&path)?,
            extension: path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase()),
        },
        Command::Image { path } => Input::Image(fs::read(&path)?),
        Command::Video { path } if path.is_dir() => Input::Video(VideoInput::Frames(read_frames(&path)?)),
        Command::Video { path } => Input::Video(VideoInput::Encoded(fs::read(&path)?)),
        Command::Info => {
            return Err(ClassifierError::InvalidInput("info takes no payload".into()));
        }
    })
}

/// Reads every file in `dir` in name order as one frame.
fn read_frames(dir: &Path) -> Result<Vec<Vec<u8>>, ClassifierError> {
    let mut paths = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    paths.retain(|p| p.is_file());
    paths.sort();
    info!("Reading {} frames from {}", paths.len(), dir.display());
    paths.iter().map(|p| fs::read(p).map_err(ClassifierError::from)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(result: Result<ClassificationResult, ClassifierError>) -> (u8, serde_json::Value) {
        let (status, json) = render(result).unwrap();
        (status, serde_json::from_str(&json).unwrap())
    }

    #[test]
    fn test_config_failure_prints_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emolens.yaml");
        fs::write(&path, "video:\n  target_samples: 0\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        let (status, json) = rendered(Err(err));
        assert_eq!(status, 1);
        assert_eq!(json["label"], "neutral");
        assert_eq!(json["probabilities"]["neutral"], 1.0);
        assert!(json["error"].as_str().unwrap().contains("target_samples"));

        let err = load_config(Some(&dir.path().join("missing.yaml"))).unwrap_err();
        let (status, json) = rendered(Err(err));
        assert_eq!(status, 1);
        assert_eq!(json["label"], "neutral");
    }

    #[test]
    fn test_no_config_uses_defaults() {
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_client_errors_exit_with_two() {
        let (status, json) = rendered(Err(ClassifierError::Decode("bad gif".into())));
        assert_eq!(status, 2);
        assert_eq!(json["unit_count"], 0);
        assert!(json["error"].as_str().unwrap().contains("bad gif"));

        let (status, json) = rendered(Ok(ClassificationResult::neutral()));
        assert_eq!(status, 0);
        assert!(json.get("error").is_none());
    }
}
