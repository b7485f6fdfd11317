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
//! # Event Listener 👂
//!
//! Watches one chain's gateway for `TransferInitiated` events and forwards
//! them, in `(block_number, log_index)` order, to the counterparty chain's
//! transactor over a bounded channel.
//!
//! The listener never terminates on an RPC failure: it logs, resets its
//! block cursor to 0 and keeps polling. Re-emitting already-seen events is
//! harmless because the transactor is idempotent per `transferIdx`.

use std::time::Duration;

use ethers::providers::{Http, JsonRpcClient};
use ethers::types::U256;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use bridge_chain_client::{block_windows, ChainClient, MAX_BLOCK_RANGE};
use bridge_gateway::GatewayClient;
use bridge_relayer_context::Shutdown;
use bridge_relayer_types::{ChainIdMap, TransferInitiatedEvent};
use bridge_relayer_utils::{probe, Error, Result};

/// How often the listener checks the chain head for new blocks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Capacity of the listener's output channel. The listener blocks when the
/// consumer is slow, which is the intended backpressure.
pub const EVENT_CHANNEL_CAPACITY: usize = 10;

/// Outcome of forwarding a batch of events downstream.
enum Forward {
    /// Every event was handed to the channel.
    Delivered,
    /// The receiver is gone or shutdown was signalled mid-batch.
    Stopped,
}

/// Watches a single chain for `TransferInitiated` events.
pub struct Listener<P = Http> {
    client: ChainClient<P>,
    gateway: GatewayClient<P>,
    chain_ids: ChainIdMap,
    sync: bool,
}

impl<P: JsonRpcClient + 'static> Listener<P> {
    /// Creates a listener over `gateway` on the chain served by `client`.
    ///
    /// With `sync` set, startup emits all historical events from block 0
    /// before switching to head polling.
    pub fn new(
        client: ChainClient<P>,
        gateway: GatewayClient<P>,
        chain_ids: ChainIdMap,
        sync: bool,
    ) -> Self {
        Self {
            client,
            gateway,
            chain_ids,
            sync,
        }
    }

    /// Resolves the chain id, then spawns the polling task.
    ///
    /// Fails fast when the node's chain id is unknown or belongs to the
    /// other side of the bridge. The returned receiver yields events in
    /// `(block_number, log_index)` order; the channel closes when the
    /// listener shuts down.
    pub async fn start(
        self,
        shutdown: Shutdown,
    ) -> Result<(JoinHandle<()>, mpsc::Receiver<TransferInitiatedEvent>)>
    {
        let chain_id = self.client.chain_id().await?;
        let chain = self
            .chain_ids
            .resolve(chain_id)
            .ok_or(Error::UnsupportedChainId { chain_id })?;
        if chain != self.gateway.chain() {
            return Err(Error::ChainMismatch {
                chain_id,
                resolved: chain.to_string(),
                expected: self.gateway.chain().to_string(),
            });
        }
        tracing::info!(%chain_id, %chain, "Starting listener");
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = tokio::spawn(self.run(chain_id, events_tx, shutdown));
        Ok((handle, events_rx))
    }

    async fn run(
        self,
        chain_id: U256,
        events_tx: mpsc::Sender<TransferInitiatedEvent>,
        mut shutdown: Shutdown,
    ) {
        let chain = self.gateway.chain();
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(
            tokio::time::MissedTickBehavior::Delay,
        );

        // Blocks up to this value have been handled.
        let mut last_handled_block: u64 = 0;

        if self.sync {
            match self.sync_historical(&events_tx, &mut shutdown).await {
                Ok(Some(head)) => last_handled_block = head,
                Ok(None) => {
                    tracing::info!("Listener for {chain} shutting down");
                    return;
                }
                Err(e) => {
                    tracing::error!(
                        %chain,
                        error = %e,
                        "failed to fetch transfer initiated events during sync. Listener restarting from block 0...",
                    );
                }
            }
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {}
            }

            let current = match self.client.block_number().await {
                Ok(n) => n,
                Err(e) => {
                    tracing::error!(
                        %chain,
                        error = %e,
                        "failed to obtain block number. Listener restarting from block 0...",
                    );
                    last_handled_block = 0;
                    continue;
                }
            };
            if last_handled_block >= current {
                continue;
            }
            let from = last_handled_block + 1;
            match self
                .emit_range(from, current, &events_tx, &mut shutdown)
                .await
            {
                Ok(Forward::Delivered) => {
                    last_handled_block = current;
                    tracing::event!(
                        target: probe::TARGET,
                        tracing::Level::TRACE,
                        kind = %probe::Kind::Sync,
                        %chain_id,
                        block = last_handled_block,
                    );
                }
                Ok(Forward::Stopped) => break,
                Err(e) => {
                    tracing::error!(
                        %chain,
                        from,
                        to = current,
                        error = %e,
                        "failed to fetch transfer initiated events. Listener restarting from block 0...",
                    );
                    last_handled_block = 0;
                }
            }
        }
        tracing::info!("Listener for {chain} shutting down");
    }

    /// Emits every historical event from block 0 up to the current head.
    /// Returns the synced head, or `None` when the pipeline stopped
    /// mid-sync.
    async fn sync_historical(
        &self,
        events_tx: &mpsc::Sender<TransferInitiatedEvent>,
        shutdown: &mut Shutdown,
    ) -> Result<Option<u64>> {
        let head = self.client.block_number().await?;
        match self.emit_range(0, head, events_tx, shutdown).await? {
            Forward::Delivered => Ok(Some(head)),
            Forward::Stopped => Ok(None),
        }
    }

    async fn emit_range(
        &self,
        from: u64,
        to: u64,
        events_tx: &mpsc::Sender<TransferInitiatedEvent>,
        shutdown: &mut Shutdown,
    ) -> Result<Forward> {
        let chain = self.gateway.chain();
        for (window_from, window_to) in
            block_windows(from, to, MAX_BLOCK_RANGE)
        {
            let events = self
                .gateway
                .transfer_initiated_in_range(window_from, window_to)
                .await?;
            tracing::debug!(
                %chain,
                from = window_from,
                to = window_to,
                count = events.len(),
                "Fetched transfer initiated events",
            );
            for event in events {
                tracing::info!(
                    %chain,
                    transfer_idx = %event.transfer_idx,
                    recipient = ?event.recipient,
                    amount = %event.amount,
                    block = event.block_number,
                    "Transfer initiated event seen by listener",
                );
                tokio::select! {
                    sent = events_tx.send(event) => {
                        if sent.is_err() {
                            return Ok(Forward::Stopped);
                        }
                    }
                    _ = shutdown.recv() => return Ok(Forward::Stopped),
                }
            }
        }
        Ok(Forward::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use ethers::abi::Token;
    use ethers::contract::EthEvent;
    use ethers::providers::{MockProvider, Provider};
    use ethers::types::{Address, Bytes, Log, H256, U64};
    use tokio::sync::broadcast;

    use bridge_gateway::{u256_topic, TransferInitiatedFilter};
    use bridge_relayer_types::{ChainIdMap, ChainTag};

    use super::*;

    fn gateway_address() -> Address {
        "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap()
    }

    fn initiated_log(transfer_idx: u64, block: u64, log_index: u64) -> Log {
        Log {
            address: gateway_address(),
            topics: vec![
                TransferInitiatedFilter::signature(),
                H256::from(Address::zero()),
                H256::from(Address::zero()),
                u256_topic(U256::from(transfer_idx)),
            ],
            data: Bytes::from(ethers::abi::encode(&[Token::Uint(
                U256::exp10(15),
            )])),
            block_hash: Some(H256::zero()),
            block_number: Some(U64::from(block)),
            transaction_hash: Some(H256::zero()),
            transaction_index: Some(U64::zero()),
            log_index: Some(U256::from(log_index)),
            transaction_log_index: None,
            log_type: None,
            removed: None,
        }
    }

    fn listener(
        chain: ChainTag,
        sync: bool,
    ) -> (Listener<MockProvider>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let client = ChainClient::new(provider);
        let gateway = GatewayClient::new(gateway_address(), &client, chain);
        (
            Listener::new(client, gateway, ChainIdMap::default(), sync),
            mock,
        )
    }

    fn shutdown_pair() -> (broadcast::Sender<()>, Shutdown) {
        let (tx, rx) = broadcast::channel(2);
        (tx, Shutdown::new(rx))
    }

    #[tokio::test(start_paused = true)]
    async fn sync_emits_history_in_order() {
        let (listener, mock) = listener(ChainTag::L1, true);
        let (notify, shutdown) = shutdown_pair();
        // Responses pop in reverse push order: chain id, head, then logs.
        mock.push::<Vec<ethers::types::Log>, _>(vec![
            initiated_log(8, 110, 0),
            initiated_log(7, 100, 2),
        ])
        .unwrap();
        mock.push(U64::from(120u64)).unwrap();
        mock.push(U256::from(39999u64)).unwrap();

        let (handle, mut events) = listener.start(shutdown).await.unwrap();
        let first = events.recv().await.unwrap();
        let second = events.recv().await.unwrap();
        assert_eq!(first.transfer_idx, U256::from(7));
        assert_eq!(first.source_chain, ChainTag::L1);
        assert_eq!(second.transfer_idx, U256::from(8));
        assert!(first.ordering_key() < second.ordering_key());

        // Further polling hits an exhausted mock; the listener logs, resets
        // its cursor, and keeps running until told to stop.
        notify.send(()).unwrap();
        assert!(events.recv().await.is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn unknown_chain_id_fails_fast() {
        let (listener, mock) = listener(ChainTag::L1, true);
        let (_notify, shutdown) = shutdown_pair();
        mock.push(U256::from(555u64)).unwrap();
        let err = listener.start(shutdown).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedChainId { .. }));
    }

    #[tokio::test]
    async fn chain_id_must_match_the_gateway_side() {
        // Gateway configured for Settlement, but the node reports an L1 id.
        let (listener, mock) = listener(ChainTag::Settlement, true);
        let (_notify, shutdown) = shutdown_pair();
        mock.push(U256::from(39999u64)).unwrap();
        let err = listener.start(shutdown).await.unwrap_err();
        assert!(matches!(err, Error::ChainMismatch { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_the_event_channel() {
        let (listener, mock) = listener(ChainTag::Settlement, false);
        let (notify, shutdown) = shutdown_pair();
        mock.push(U256::from(17864u64)).unwrap();
        let (handle, mut events) = listener.start(shutdown).await.unwrap();
        notify.send(()).unwrap();
        assert!(events.recv().await.is_none());
        handle.await.unwrap();
    }
}
