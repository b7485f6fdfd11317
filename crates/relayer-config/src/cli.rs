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

use std::path::{Path, PathBuf};

use structopt::StructOpt;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;

use bridge_relayer_utils::{Error, Result};

use crate::RelayerConfig;

/// The Standard Bridge Relayer command-line tool
///
/// Start the relayer from a config file:
///
/// $ bridge-relayer start -c <CONFIG_FILE_PATH>
#[derive(Debug, StructOpt)]
#[structopt(name = "Standard Bridge Relayer")]
pub struct Opts {
    /// The relayer subcommand to run.
    #[structopt(subcommand)]
    pub cmd: Command,
}

/// The supported relayer subcommands.
#[derive(Debug, StructOpt)]
pub enum Command {
    /// Start the bridge relayer.
    Start {
        /// Path to the relayer config file. Falls back to environment-only
        /// configuration when omitted.
        #[structopt(
            short = "c",
            long = "config",
            value_name = "PATH",
            env = "STANDARD_BRIDGE_RELAYER_CONFIG",
            parse(from_os_str)
        )]
        config: Option<PathBuf>,
    },
}

/// Loads the configuration from the environment and the given optional file.
///
/// Returns `Ok(RelayerConfig)` on success, or the underlying parse error on
/// failure.
pub fn load_config<P>(config_file: Option<P>) -> Result<RelayerConfig>
where
    P: AsRef<Path>,
{
    match &config_file {
        Some(path) => tracing::trace!(
            "Loading config from {} ..",
            path.as_ref().display()
        ),
        None => tracing::trace!("No config file given, env config only"),
    }
    let v = crate::utils::parse_from_sources(config_file)?;
    tracing::trace!("Config loaded..");
    Ok(v)
}

/// Maps a configured log level name onto a [`tracing::Level`].
///
/// `fatal` has no tracing counterpart and clamps to `error`.
pub fn parse_log_level(log_level: &str) -> Result<Level> {
    match log_level.to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" | "fatal" => Ok(Level::ERROR),
        _ => Err(Error::Generic("invalid log level")),
    }
}

/// Sets up the logger for the relayer, based on the configured level.
///
/// Returns `Ok(())` on success, or `Err` when the level is unknown.
pub fn setup_logger(log_level: &str) -> Result<()> {
    let log_level = parse_log_level(log_level)?;
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(LevelFilter::from_level(log_level).into());
    tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(log_level)
        .with_env_filter(env_filter)
        .init();
    Ok(())
}
