//! micrec CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use micrec::application::ports::ConfigStore;
use micrec::cli::{
    app::{cli_config, load_merged_config, run_encode, run_record, EXIT_ERROR, EXIT_USAGE_ERROR},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    presenter::Presenter,
};
use micrec::domain::recording::Duration;
use micrec::domain::session::timestamp_base_name;
use micrec::infrastructure::XdgConfigStore;

fn init_tracing(verbose: bool) {
    let default = if verbose { "micrec=debug" } else { "micrec=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let presenter = Presenter::new();

    // Handle subcommands
    match cli.command {
        Some(Commands::Config { action }) => {
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                presenter.hint(&format!("Config file: {}", store.path().display()));
                return ExitCode::from(EXIT_ERROR);
            }
            return ExitCode::SUCCESS;
        }
        Some(Commands::Encode {
            input,
            output_dir,
            bit_rate,
        }) => {
            let config = load_merged_config(Default::default()).await;
            let bit_rate = bit_rate.unwrap_or_else(|| config.bit_rate_or_default());
            return run_encode(input, output_dir, bit_rate).await;
        }
        None => {}
    }

    let config = load_merged_config(cli_config(&cli)).await;

    let max_duration = match cli.duration.as_deref().map(str::parse::<Duration>) {
        Some(Ok(d)) => Some(d),
        Some(Err(e)) => {
            presenter.error(&format!("Invalid duration: {}", e));
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
        None => None,
    };
    let base_name = cli.name.clone().unwrap_or_else(timestamp_base_name);

    let params = match config.session_parameters(base_name, max_duration) {
        Ok(params) => params,
        Err(e) => {
            presenter.error(&e.to_string());
            presenter.hint("Check `micrec config list`, e.g. `micrec config set sample_rate 44100`");
            return ExitCode::from(EXIT_ERROR);
        }
    };

    run_record(params).await
}
