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

use std::path::Path;

use config::{Config, Environment, File, FileFormat};

use bridge_relayer_utils::{Error, Result};

use crate::RelayerConfig;

/// Environment variable prefix recognized by the relayer, e.g.
/// `BRIDGE_L1_RPC_URL`.
pub const ENV_PREFIX: &str = "BRIDGE";

/// Try to parse the [`RelayerConfig`] from the environment and the given
/// optional config file. File values take precedence over the environment.
pub fn parse_from_sources<P: AsRef<Path>>(
    config_file: Option<P>,
) -> Result<RelayerConfig> {
    let mut builder =
        Config::builder().add_source(Environment::with_prefix(ENV_PREFIX));

    if let Some(config_file) = config_file {
        let config_file = config_file.as_ref();
        tracing::trace!("Loading config file: {}", config_file.display());
        let ext = config_file
            .extension()
            .map(|e| e.to_str().unwrap_or(""))
            .unwrap_or("");
        let format = match ext {
            "toml" => FileFormat::Toml,
            "json" => FileFormat::Json,
            "yaml" | "yml" => FileFormat::Yaml,
            _ => {
                tracing::error!("Unknown config file extension: {}", ext);
                return Err(Error::Generic(
                    "config file must be .toml, .json or .yaml",
                ));
            }
        };
        builder = builder.add_source(File::from(config_file).format(format));
    }

    let cfg = builder.build()?;
    // and finally deserialize the config and post-process it
    let config: std::result::Result<
        RelayerConfig,
        serde_path_to_error::Error<config::ConfigError>,
    > = serde_path_to_error::deserialize(cfg);
    match config {
        Ok(c) => postloading_process(c),
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

/// The postloading_process exists to validate configuration and standardize
/// the format of the configuration
pub fn postloading_process(config: RelayerConfig) -> Result<RelayerConfig> {
    tracing::trace!("Checking configration sanity ...");
    config.chain_ids.validate().map_err(Error::Generic)?;
    if config.private_key_path.is_empty() {
        return Err(Error::MissingConfig("private_key_path"));
    }
    tracing::trace!(
        "postloaded config: {}",
        serde_json::to_string_pretty(&config)?
    );
    Ok(config)
}
