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
//! Common error types and structured logging probes shared by every crate of
//! the standard bridge relayer.

use ethers::types::U256;

/// A module used for debugging relayer lifecycle, sync state, or other
/// relayer state in a machine-parseable way.
pub mod probe;
/// Retry functionality.
pub mod retry;

/// An enum of all possible errors that could be encountered during the
/// execution of the bridge relayer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An Io error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON Error occurred.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Config loading error.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Error while parsing the config file.
    #[error("Config parse error: {}", _0)]
    ParseConfig(#[from] serde_path_to_error::Error<config::ConfigError>),
    /// Error while parsing a URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),
    /// Ether wallet errors.
    #[error(transparent)]
    EtherWallet(#[from] ethers::signers::WalletError),
    /// Error in the underlying JSON-RPC provider.
    #[error(transparent)]
    Rpc(#[from] ethers::providers::ProviderError),
    /// Smart contract query or calldata error.
    #[error("Contract call error: {}", _0)]
    ContractCall(String),
    /// Chain id is not in the configured id-to-chain mapping.
    #[error("Unsupported chain id: {}", chain_id)]
    UnsupportedChainId {
        /// The chain id reported by the node.
        chain_id: U256,
    },
    /// The node's chain id resolves to the wrong side of the bridge.
    #[error("Chain id {} resolves to {}, expected {}", chain_id, resolved, expected)]
    ChainMismatch {
        /// The chain id reported by the node.
        chain_id: U256,
        /// The side the id resolved to.
        resolved: String,
        /// The side the worker was configured for.
        expected: String,
    },
    /// Broadcasting a signed transaction failed for a non-retryable reason.
    #[error("Tx submission failed: {}", _0)]
    Submission(String),
    /// Receipt was not observed within the retry budget.
    #[error("Tx not mined after {} attempts", attempts)]
    TxNotMined {
        /// How many submission attempts were consumed.
        attempts: usize,
    },
    /// A re-suggested base fee came out negative while boosting a tip.
    #[error("New base fee cannot be negative: tip {} exceeds gas price {}", tip, price)]
    NegativeBaseFee {
        /// The freshly suggested tip.
        tip: U256,
        /// The freshly suggested gas price.
        price: U256,
    },
    /// Pending transactions did not settle within the cancel wait window.
    #[error("Timeout waiting for pending transactions to be cancelled")]
    CancelTimeout,
    /// Workers did not drain within the shutdown grace period.
    #[error("Workers failed to shut down within the grace period")]
    ShutdownTimeout,
    /// Missing a required configuration value.
    #[error("Missing required {} in the config", _0)]
    MissingConfig(&'static str),
    /// Generic error.
    #[error("{}", _0)]
    Generic(&'static str),
}

impl Error {
    /// Collapses a typed [`ethers::contract::ContractError`] into the single
    /// contract-call error kind. The middleware type parameter would otherwise
    /// leak into every signature that touches a contract.
    pub fn contract<M: ethers::providers::Middleware>(
        err: ethers::contract::ContractError<M>,
    ) -> Self {
        Error::ContractCall(err.to_string())
    }
}

/// A type alias for the result of the bridge relayer, that uses the
/// [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;
