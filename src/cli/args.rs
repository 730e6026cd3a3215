//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::recording::{ChannelMask, SampleFormat};
use crate::domain::session::{EncodeTiming, OutputMode};

/// micrec - record the microphone to WAV and AAC/M4A
#[derive(Parser, Debug)]
#[command(name = "micrec")]
#[command(version)]
#[command(about = "Record the microphone to WAV and AAC/M4A files")]
#[command(long_about = None)]
pub struct Cli {
    /// Stop after this long (e.g., 10s, 1m, 2m30s); records until Ctrl+C otherwise
    #[arg(short = 'd', long, value_name = "TIME")]
    pub duration: Option<String>,

    /// Directory the recordings are written to
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Base file name (default: Unix time in milliseconds)
    #[arg(short = 'n', long, value_name = "NAME")]
    pub name: Option<String>,

    /// Which files to write
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub format: Option<FormatArg>,

    /// When to encode the M4A: while recording or after it
    #[arg(short = 'e', long, value_name = "WHEN")]
    pub encode: Option<EncodeArg>,

    /// Capture sample rate in Hz
    #[arg(short = 'r', long, value_name = "HZ")]
    pub sample_rate: Option<u32>,

    /// Capture channel layout
    #[arg(short = 'c', long, value_name = "CHANNELS")]
    pub channels: Option<ChannelsArg>,

    /// Capture sample encoding
    #[arg(long, value_name = "ENCODING")]
    pub encoding: Option<EncodingArg>,

    /// Linear gain multiplier (1 = unchanged, max 40)
    #[arg(short = 'g', long, value_name = "GAIN")]
    pub gain: Option<u32>,

    /// AAC bit rate in bits per second
    #[arg(short = 'b', long, value_name = "BPS")]
    pub bit_rate: Option<u32>,

    /// Log pipeline activity to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode an existing WAV file to M4A
    Encode {
        /// WAV file to encode
        input: PathBuf,

        /// Directory for the M4A (default: next to the input)
        #[arg(short = 'o', long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// AAC bit rate in bits per second
        #[arg(short = 'b', long, value_name = "BPS")]
        bit_rate: Option<u32>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Output files argument
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Wav,
    M4a,
    Both,
}

impl From<FormatArg> for OutputMode {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Wav => OutputMode::Wav,
            FormatArg::M4a => OutputMode::M4a,
            FormatArg::Both => OutputMode::Both,
        }
    }
}

/// Encode timing argument
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EncodeArg {
    During,
    After,
}

impl From<EncodeArg> for EncodeTiming {
    fn from(arg: EncodeArg) -> Self {
        match arg {
            EncodeArg::During => EncodeTiming::During,
            EncodeArg::After => EncodeTiming::After,
        }
    }
}

/// Channel layout argument
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChannelsArg {
    Mono,
    Stereo,
}

impl From<ChannelsArg> for ChannelMask {
    fn from(arg: ChannelsArg) -> Self {
        match arg {
            ChannelsArg::Mono => ChannelMask::Mono,
            ChannelsArg::Stereo => ChannelMask::Stereo,
        }
    }
}

/// Sample encoding argument
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum EncodingArg {
    Pcm8,
    Pcm16,
    Float,
}

impl From<EncodingArg> for SampleFormat {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Pcm8 => SampleFormat::Pcm8,
            EncodingArg::Pcm16 => SampleFormat::Pcm16,
            EncodingArg::Float => SampleFormat::Float,
        }
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "sample_rate",
    "channels",
    "encoding",
    "gain",
    "bit_rate",
    "output_dir",
    "output_mode",
    "encode_timing",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
