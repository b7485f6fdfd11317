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
//! # Relayer Context Module 🕸️
//!
//! A module for managing the context of the relayer: the loaded
//! configuration, the signing wallet shared by both transactors, chain
//! clients, and the shutdown broadcast.

use ethers::signers::{LocalWallet, Signer};
use tokio::sync::broadcast;

use bridge_chain_client::ChainClient;
use bridge_relayer_config::RelayerConfig;
use bridge_relayer_types::private_key;
use bridge_relayer_utils::Result;

/// RelayerContext contains the relayer's configuration and shutdown signal.
#[derive(Clone)]
pub struct RelayerContext {
    /// The configuration of the relayer.
    pub config: RelayerConfig,
    /// Broadcasts a shutdown signal to all active workers.
    ///
    /// Each worker is handed a broadcast receiver handle wrapped in
    /// [`Shutdown`]. When a graceful shutdown is initiated, a `()` value is
    /// sent via the `broadcast::Sender`; every worker receives it, reaches a
    /// safe terminal state, and completes its task.
    notify_shutdown: broadcast::Sender<()>,
    wallet: LocalWallet,
}

impl RelayerContext {
    /// Creates a new RelayerContext, loading the signing key named by the
    /// configuration.
    pub fn new(config: RelayerConfig) -> Result<Self> {
        let (notify_shutdown, _) = broadcast::channel(2);
        let key_path = private_key::expand_tilde(&config.private_key_path);
        let wallet = private_key::load_key_file(key_path)?;
        tracing::info!("Relayer signing address: {:?}", wallet.address());
        Ok(Self {
            config,
            notify_shutdown,
            wallet,
        })
    }

    /// Returns a broadcast receiver handle for the shutdown signal.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }

    /// Sends a shutdown signal to all subscribed workers.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }

    /// The wallet both transactors sign with.
    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }

    /// Connects a client to the configured L1 node.
    pub fn l1_client(&self) -> Result<ChainClient> {
        ChainClient::connect(self.config.l1_rpc_url.as_url())
    }

    /// Connects a client to the configured settlement node.
    pub fn settlement_client(&self) -> Result<ChainClient> {
        ChainClient::connect(self.config.settlement_rpc_url.as_url())
    }
}

/// Listens for the relayer shutdown signal.
///
/// Shutdown is signalled using a `broadcast::Receiver`. Only a single value
/// is ever sent; once it has been observed the signal is sticky, and every
/// later `recv` call returns immediately.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,
    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        // If the shutdown signal has already been received, then return
        // immediately.
        if self.shutdown {
            return;
        }

        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;

        // Remember that the signal has been received.
        self.shutdown = true;
    }
}
