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

#![warn(missing_docs)]

//! # Relayer Configuration Module 🕸️
//!
//! A module for configuring the relayer.
//!
//! ## Overview
//!
//! Configuration is merged from two sources: `BRIDGE_`-prefixed environment
//! variables (lower priority) and an optional config file (higher priority,
//! toml/json/yaml by extension). Possible configuration includes:
//! * `private_key_path`: path to the hex-encoded relayer signing key.
//! * `log_level`: one of `trace|debug|info|warn|error|fatal`. Defaults to `info`.
//! * `l1_rpc_url` / `settlement_rpc_url`: HTTP JSON-RPC endpoints, one per chain.
//! * `l1_contract_addr` / `settlement_contract_addr`: the gateway addresses.
//! * `chain_ids`: the chain-id to chain mapping (file only; defaults cover
//!   the local L1, Holesky, and the settlement chain).

/// CLI configuration
pub mod cli;
/// Default values for the optional configuration keys.
pub mod defaults;
/// Utils for processing configuration
pub mod utils;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use bridge_relayer_types::chain::ChainIdMap;
use bridge_relayer_types::rpc_url::RpcUrl;

/// RelayerConfig is the relayer configuration, fully merged and validated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayerConfig {
    /// Path to a hex-encoded ECDSA key file. Supports `~/` expansion.
    #[serde(skip_serializing)]
    pub private_key_path: String,
    /// Log verbosity, one of `trace|debug|info|warn|error|fatal`.
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    /// Http(s) endpoint of the L1 chain node.
    #[serde(skip_serializing)]
    pub l1_rpc_url: RpcUrl,
    /// Http(s) endpoint of the settlement chain node.
    #[serde(skip_serializing)]
    pub settlement_rpc_url: RpcUrl,
    /// Address of the gateway contract deployed on L1.
    pub l1_contract_addr: Address,
    /// Address of the gateway contract deployed on the settlement chain.
    pub settlement_contract_addr: Address,
    /// The chain-id to chain mapping accepted by this relayer.
    #[serde(default)]
    pub chain_ids: ChainIdMap,
}
