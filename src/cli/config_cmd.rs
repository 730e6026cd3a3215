//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::AppConfig;
use crate::domain::encoding::check_bit_rate;
use crate::domain::error::ConfigError;
use crate::domain::recording::{CaptureFormat, ChannelMask, Gain, SampleFormat};
use crate::domain::session::{EncodeTiming, OutputMode};

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;
    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));
    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    let config = store.load().await?;
    presenter.output(&read_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()));
    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;
    for key in VALID_CONFIG_KEYS {
        presenter.key_value(
            key,
            &read_value(&config, key).unwrap_or_else(|| NOT_SET.to_string()),
        );
    }
    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

fn invalid(key: &str, message: impl ToString) -> ConfigError {
    ConfigError::ValidationError {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| invalid(key, "Value must be a whole number"))
}

/// Validate `value` for `key` and store it in normalized form
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "sample_rate" => {
            let rate = parse_number(key, value)?;
            CaptureFormat::new(rate, ChannelMask::Mono, SampleFormat::Pcm16)
                .map_err(|e| invalid(key, e))?;
            config.sample_rate = Some(rate);
        }
        "channels" => {
            let channels: ChannelMask = value.parse().map_err(|e| invalid(key, e))?;
            config.channels = Some(channels.to_string());
        }
        "encoding" => {
            let encoding: SampleFormat = value.parse().map_err(|e| invalid(key, e))?;
            config.encoding = Some(encoding.to_string());
        }
        "gain" => {
            let gain = parse_number(key, value)?;
            Gain::new(gain).map_err(|e| invalid(key, e))?;
            config.gain = Some(gain);
        }
        "bit_rate" => {
            let bit_rate = parse_number(key, value)?;
            config.bit_rate = Some(check_bit_rate(bit_rate).map_err(|e| invalid(key, e))?);
        }
        "output_dir" => config.output_dir = Some(value.to_string()),
        "output_mode" => {
            let mode: OutputMode = value.parse().map_err(|e| invalid(key, e))?;
            config.output_mode = Some(mode.to_string());
        }
        "encode_timing" => {
            let timing: EncodeTiming = value.parse().map_err(|e| invalid(key, e))?;
            config.encode_timing = Some(timing.to_string());
        }
        _ => return check_key(key),
    }
    Ok(())
}

fn read_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "sample_rate" => config.sample_rate.map(|v| v.to_string()),
        "channels" => config.channels.clone(),
        "encoding" => config.encoding.clone(),
        "gain" => config.gain.map(|v| v.to_string()),
        "bit_rate" => config.bit_rate.map(|v| v.to_string()),
        "output_dir" => config.output_dir.clone(),
        "output_mode" => config.output_mode.clone(),
        "encode_timing" => config.encode_timing.clone(),
        _ => None,
    }
}
