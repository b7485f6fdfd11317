// Copyright 2024 Standard Bridge Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Standard Bridge Relayer Binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use tokio::signal::unix;

use bridge_relayer::service;
use bridge_relayer_config::cli::{load_config, setup_logger, Command, Opts};
use bridge_relayer_context::RelayerContext;
use bridge_relayer_utils::probe;

/// The main entry point for the relayer.
///
/// # Arguments
///
/// * `args` - The command line arguments.
#[paw::main]
#[tokio::main]
async fn main(args: Opts) -> anyhow::Result<()> {
    // Pull in a local .env before the config merge reads the environment.
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let Command::Start { config: config_file } = args.cmd;
    let config = load_config(config_file.as_deref())?;
    setup_logger(&config.log_level)?;

    if dotenv_loaded {
        tracing::trace!("Loaded .env file");
    }
    match &config_file {
        Some(path) => tracing::info!(
            config_file = %path.display(),
            "overriding env var config with file",
        ),
        None => tracing::info!("env var config will be used"),
    }

    // The RelayerContext takes the configuration and populates objects that
    // are needed throughout the lifetime of the relayer: the signing wallet
    // and the shutdown broadcast.
    let ctx = RelayerContext::new(config)?;

    // Start all background services. This does not block; the four workers
    // run on background tasks.
    let workers = service::ignite(&ctx).await?;
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        started = true,
    );

    // Watch for signals.
    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    tokio::select! {
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
        },
    }
    tracing::event!(
        target: probe::TARGET,
        tracing::Level::DEBUG,
        kind = %probe::Kind::Lifecycle,
        shutdown = true,
    );
    tracing::warn!("Shutting down...");
    ctx.shutdown();
    if let Err(e) = service::wait_for_shutdown(workers).await {
        tracing::error!("{e}");
    }
    tracing::info!("Clean Exit ..");
    Ok(())
}
