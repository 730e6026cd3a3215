//! Runners for the record and encode commands

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use indicatif::{ProgressBar, ProgressDrawTarget};
use tokio::time::interval;
use tracing::{debug, error, warn};

use crate::application::ports::{ConfigStore, DeviceError};
use crate::application::{
    encode_wav_file, EncodeCallbacks, EncodeError, RecordError, RecordOutput, RecordSession,
};
use crate::domain::config::AppConfig;
use crate::domain::error::ConfigurationError;
use crate::domain::recording::{format_clock, ChannelMask, SampleFormat};
use crate::domain::session::{EncodeTiming, OutputMode, SessionParameters};
use crate::infrastructure::{create_backend, AacMp4Factory, WavSinkFactory, XdgConfigStore};

use super::args::Cli;
use super::presenter::Presenter;
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment override for the output directory
pub const OUTPUT_DIR_ENV: &str = "MICREC_OUTPUT_DIR";

/// Refresh period of the level meter
const METER_INTERVAL: StdDuration = StdDuration::from_millis(100);

/// Record until Ctrl+C or the configured duration, then finish the encode
pub async fn run_record(params: SessionParameters) -> ExitCode {
    let mut presenter = Presenter::new();
    let session = RecordSession::new(create_backend(), Arc::new(AacMp4Factory), WavSinkFactory);

    let progress = presenter.encode_progress();
    let timing = params.encode_timing;
    let handle = match session.start(params, encode_callbacks(&progress)) {
        Ok(handle) => handle,
        Err(e) => {
            report_record_error(&presenter, &e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    ShutdownSignal::with_flag(handle.stop_flag()).setup();
    presenter.show_recording("Recording");

    let peak = handle.max_amplitude();
    let mut ticker = interval(METER_INTERVAL);
    while handle.is_capturing() {
        ticker.tick().await;
        presenter.update_recording(peak.take(), handle.elapsed());
    }
    presenter.spinner_success(&format!("Captured {}", format_clock(handle.elapsed())));
    if timing == EncodeTiming::During {
        presenter.info("Finishing M4A...");
    }

    let result = tokio::task::spawn_blocking(move || handle.wait()).await;
    progress.finish_and_clear();

    match result {
        Ok(Ok(output)) => {
            print_output(&presenter, &output);
            ExitCode::from(EXIT_SUCCESS)
        }
        Ok(Err(RecordError::Interrupted { source, partial })) => {
            presenter.warn(&format!("Recording interrupted: {}", source));
            print_output(&presenter, &partial);
            presenter.hint("Check that no other program holds the microphone");
            ExitCode::from(EXIT_ERROR)
        }
        Ok(Err(RecordError::WavFailed { source, partial })) => {
            presenter.warn(&format!("WAV output failed: {}", source));
            print_output(&presenter, &partial);
            presenter.hint("Free disk space or choose another directory with -o");
            ExitCode::from(EXIT_ERROR)
        }
        Ok(Err(e)) => {
            report_record_error(&presenter, &e);
            ExitCode::from(EXIT_ERROR)
        }
        Err(e) => {
            presenter.error(&format!("Recording task failed: {}", e));
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Encode `input` to `<out_dir>/<stem>.m4a`, next to the input by default
pub async fn run_encode(input: PathBuf, out_dir: Option<PathBuf>, bit_rate: u32) -> ExitCode {
    let presenter = Presenter::new();
    let out_dir = out_dir.unwrap_or_else(|| default_encode_dir(&input));

    let progress = presenter.encode_progress();
    let callbacks = encode_callbacks(&progress);
    let result = tokio::task::spawn_blocking(move || {
        encode_wav_file(Arc::new(AacMp4Factory), &input, &out_dir, bit_rate, callbacks)
    })
    .await;
    progress.finish_and_clear();

    match result {
        Ok(Ok(summary)) => {
            presenter.success(&format!(
                "{} ({})",
                summary.path.display(),
                format_clock(StdDuration::from_micros(summary.duration_us))
            ));
            ExitCode::from(EXIT_SUCCESS)
        }
        Ok(Err(e)) => {
            presenter.error(&e.to_string());
            if let EncodeError::Configuration(c) = &e {
                if let Some(hint) = configuration_hint(c) {
                    presenter.hint(hint);
                }
            }
            ExitCode::from(EXIT_ERROR)
        }
        Err(e) => {
            presenter.error(&format!("Encode task failed: {}", e));
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn default_encode_dir(input: &Path) -> PathBuf {
    input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Callbacks driving the encode progress bar
fn encode_callbacks(progress: &ProgressBar) -> EncodeCallbacks {
    let bar = progress.clone();
    EncodeCallbacks::new()
        .with_progress(move |percent| {
            if bar.is_hidden() {
                bar.set_draw_target(ProgressDrawTarget::stderr());
            }
            bar.set_position(percent as u64);
        })
        .with_finished(|summary| {
            debug!(
                path = %summary.path.display(),
                samples = summary.samples_written,
                "M4A complete"
            )
        })
        .with_error(|e| error!(error = %e, "M4A encoding failed"))
}

fn print_output(presenter: &Presenter, output: &RecordOutput) {
    let clock = format_clock(output.duration);
    if let Some(path) = &output.wav_path {
        presenter.success(&format!("{} ({})", path.display(), clock));
    }
    match (&output.m4a_path, &output.encode) {
        (Some(_), Some(summary)) => presenter.success(&format!(
            "{} ({} AAC frames)",
            summary.path.display(),
            summary.samples_written
        )),
        (Some(path), None) => presenter.warn(&format!("{} was not completed", path.display())),
        _ => {}
    }
}

fn report_record_error(presenter: &Presenter, error: &RecordError) {
    presenter.error(&error.to_string());
    if let Some(hint) = record_hint(error) {
        presenter.hint(hint);
    }
}

fn configuration_hint(error: &ConfigurationError) -> Option<&'static str> {
    match error {
        ConfigurationError::InvalidGain(_) => {
            Some("Gain ranges from 0 to 40, e.g. `micrec config set gain 20`")
        }
        ConfigurationError::InvalidBitRate(_) => {
            Some("Pick a bit rate between 8000 and 512000, e.g. `micrec config set bit_rate 128000`")
        }
        ConfigurationError::UnknownValue { .. } => Some("Run `micrec --help` for accepted values"),
        _ => Some("Try a common format, e.g. `micrec config set sample_rate 44100`"),
    }
}

fn record_hint(error: &RecordError) -> Option<&'static str> {
    match error {
        RecordError::Configuration(c) => configuration_hint(c),
        RecordError::Device(DeviceError::NoDevice) => {
            Some("Connect a microphone or select a default input device")
        }
        RecordError::Device(_) => Some("Check that no other program holds the microphone"),
        RecordError::Filesystem(_) | RecordError::Sink(_) => {
            Some("Choose a writable directory with -o or `micrec config set output_dir <DIR>`")
        }
        _ => None,
    }
}

/// Config values given on the command line
pub fn cli_config(cli: &Cli) -> AppConfig {
    AppConfig {
        sample_rate: cli.sample_rate,
        channels: cli.channels.map(|c| ChannelMask::from(c).to_string()),
        encoding: cli.encoding.map(|e| SampleFormat::from(e).to_string()),
        gain: cli.gain,
        bit_rate: cli.bit_rate,
        output_dir: cli
            .output_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string()),
        output_mode: cli.format.map(|f| OutputMode::from(f).to_string()),
        encode_timing: cli.encode.map(|e| EncodeTiming::from(e).to_string()),
    }
}

/// Config values taken from the environment
pub fn env_config() -> AppConfig {
    AppConfig {
        output_dir: env::var(OUTPUT_DIR_ENV).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    }
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = store.load().await.unwrap_or_else(|e| {
        warn!(error = %e, path = %store.path().display(), "Ignoring unreadable config file");
        AppConfig::empty()
    });

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config())
        .merge(cli_config)
}
