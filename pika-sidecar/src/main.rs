//! Pika analysis sidecar
//!
//! Serves track analysis over HTTP for the desktop app, or analyzes a single
//! file from the command line.

mod cli;
mod server;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use pika_engine::{AnalysisEngine, Config};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let (config, source) = load_config(cli.config.as_deref())?;

    init_tracing(&config.logging.filter);
    tracing::debug!(%source, ?config, "configuration loaded");

    let engine = Arc::new(AnalysisEngine::with_config(&config.analysis));

    if let Some(path) = &cli.analyze {
        let report = analyze_one(&engine, path)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", report.json).context("failed to write result")?;
        return Ok(report.exit_code());
    }

    let port = cli.port.context("--port is required to run the server")?;
    let host = cli.host.unwrap_or(config.server.host);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(server::run(engine, &host, port))?;

    Ok(ExitCode::SUCCESS)
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq)]
enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => f.write_str("built-in defaults"),
        }
    }
}

/// Load the config file named on the command line, or the default one if present
fn load_config(explicit: Option<&Path>) -> anyhow::Result<(Config, ConfigSource)> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = Config::config_path();
            if !default.exists() {
                return Ok((Config::default(), ConfigSource::Defaults));
            }
            default
        }
    };

    let config = Config::load_from(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    Ok((config, ConfigSource::File(path)))
}

/// Result of a one-shot `--analyze` run
struct AnalyzeReport {
    json: String,
    success: bool,
}

impl AnalyzeReport {
    fn exit_code(&self) -> ExitCode {
        if self.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

fn analyze_one(engine: &AnalysisEngine, path: &Path) -> anyhow::Result<AnalyzeReport> {
    let outcome = engine.analyze_file(path);
    let json = serde_json::to_string_pretty(&outcome).context("failed to encode result")?;
    Ok(AnalyzeReport {
        json,
        success: outcome.is_success(),
    })
}

/// Log to stderr; stdout carries readiness lines and `--analyze` output
fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pika_sidecar_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_analyze_missing_file_reports_failure() {
        let path = temp_path("missing.wav");
        let report = analyze_one(&AnalysisEngine::new(), &path).unwrap();

        assert!(!report.success);
        assert_eq!(report.exit_code(), ExitCode::FAILURE);
        let json: serde_json::Value = serde_json::from_str(&report.json).unwrap();
        assert!(json["error"]
            .as_str()
            .unwrap()
            .contains(&path.display().to_string()));
        assert!(json["bpm"].is_null());
    }

    #[test]
    fn test_analyze_wav_reports_success() {
        let path = temp_path("tone.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..22050 * 2 {
            let s = 0.8 * (2.0 * PI * 440.0 * i as f32 / 22050.0).sin();
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let report = analyze_one(&AnalysisEngine::new(), &path).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(report.success);
        assert_eq!(report.exit_code(), ExitCode::SUCCESS);
        let json: serde_json::Value = serde_json::from_str(&report.json).unwrap();
        assert!(json["error"].is_null());
        assert!(json["bpm"].is_number());
    }

    #[test]
    fn test_load_config_from_explicit_file() {
        let path = temp_path("sidecar.toml");
        std::fs::write(&path, "[logging]\nfilter = \"debug\"\n").unwrap();

        let (config, source) = load_config(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.logging.filter, "debug");
        assert_eq!(source, ConfigSource::File(path));
    }

    #[test]
    fn test_load_config_missing_explicit_file_fails() {
        let err = load_config(Some(&temp_path("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
