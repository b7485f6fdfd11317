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
//! # Transactor 🖊️
//!
//! Consumes the counterparty chain's `TransferInitiated` stream and ensures
//! exactly one successful `FinalizeTransfer` per `transferIdx` on the chain
//! it owns. Before every submission an on-chain idempotency probe checks for
//! an existing `TransferFinalized` log; submissions retry with boosted tips
//! when they are not mined in time.
//!
//! Per-event failures are logged and skipped, never fatal: a restart
//! re-emits history from block 0 and the probe suppresses anything already
//! finalized.
//!
//! The shutdown signal interrupts the channel wait, the receipt wait, and
//! startup cancellation, so the worker drains within the supervisor's grace
//! period. A finalization that was already broadcast is left to mine on its
//! own; it is never revoked.

use std::time::Duration;

use ethers::providers::{Http, JsonRpcClient};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{TransactionReceipt, U256};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use bridge_chain_client::{block_windows, ChainClient, MAX_BLOCK_RANGE};
use bridge_gateway::GatewayClient;
use bridge_relayer_context::Shutdown;
use bridge_relayer_types::{
    ChainIdMap, TransferFinalizedEvent, TransferInitiatedEvent,
};
use bridge_relayer_utils::{probe, Error, Result};

pub mod cancel;
pub mod fees;

/// How many submissions a single finalization may consume before giving up.
pub const MAX_SUBMISSION_ATTEMPTS: usize = 5;

/// How long each submission may wait for a receipt before the tip is
/// boosted and the transaction replaced.
pub const MINE_TIMEOUT: Duration = Duration::from_secs(60);

/// Whether a node rejection means "same transaction is already queued" and a
/// replacement with a higher price should be attempted.
pub fn is_replacement_error(message: &str) -> bool {
    message.contains("replacement transaction underpriced")
        || message.contains("already known")
}

/// The most recently observed `TransferFinalized` event and the start of the
/// filter range that produced it.
///
/// Purely advisory: it bounds future idempotency scans, correctness never
/// depends on it. Events before `cache_start_block` were proven absent by an
/// earlier scan, and `transferIdx` values are unique per source gateway.
#[derive(Debug, Default)]
pub struct FinalizedCache {
    last_event: Option<TransferFinalizedEvent>,
    cache_start_block: u64,
}

impl FinalizedCache {
    /// Where the next idempotency scan should start.
    pub fn start_block(&self) -> u64 {
        self.cache_start_block
    }

    /// The last observed finalization, if any.
    pub fn last_event(&self) -> Option<&TransferFinalizedEvent> {
        self.last_event.as_ref()
    }

    /// Records an observed finalization and advances the scan start to its
    /// block.
    pub fn record(&mut self, event: TransferFinalizedEvent) {
        self.cache_start_block = event.block_number;
        self.last_event = Some(event);
    }
}

/// Outcome of one event iteration.
enum Step {
    /// Move on to the next event.
    Continue,
    /// Shutdown was signalled mid-flight.
    Stopped,
}

/// Finalizes transfers initiated on the counterparty chain.
pub struct Transactor<P = Http> {
    wallet: LocalWallet,
    client: ChainClient<P>,
    gateway: GatewayClient<P>,
    chain_ids: ChainIdMap,
}

impl<P: JsonRpcClient + 'static> Transactor<P> {
    /// Creates a transactor that signs with `wallet` and submits through
    /// `gateway` on the chain served by `client`.
    pub fn new(
        wallet: LocalWallet,
        client: ChainClient<P>,
        gateway: GatewayClient<P>,
        chain_ids: ChainIdMap,
    ) -> Self {
        Self {
            wallet,
            client,
            gateway,
            chain_ids,
        }
    }

    /// Resolves the chain id, then spawns the finalization task.
    ///
    /// Fails fast when the node's chain id is unknown or belongs to the
    /// other side of the bridge. The task drains `events` and exits when the
    /// channel closes or shutdown is signalled.
    pub async fn start(
        mut self,
        events: mpsc::Receiver<TransferInitiatedEvent>,
        shutdown: Shutdown,
    ) -> Result<JoinHandle<()>> {
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
        tracing::info!(%chain_id, %chain, "Starting transactor");
        self.wallet = self.wallet.with_chain_id(chain_id.as_u64());
        Ok(tokio::spawn(self.run(chain_id.as_u64(), events, shutdown)))
    }

    async fn run(
        self,
        chain_id: u64,
        mut events: mpsc::Receiver<TransferInitiatedEvent>,
        mut shutdown: Shutdown,
    ) {
        let chain = self.gateway.chain();

        // Unmined transactions from a crashed run would wedge our nonces.
        tokio::select! {
            cancelled = cancel::cancel_pending_transactions(
                &self.client,
                &self.wallet,
                chain_id,
            ) => {
                if let Err(e) = cancelled {
                    tracing::error!(
                        %chain,
                        error = %e,
                        "failed to cancel leftover pending transactions, continuing anyway",
                    );
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Transactor for {chain} shutting down");
                return;
            }
        }

        let mut finalized_cache = FinalizedCache::default();
        loop {
            let event = tokio::select! {
                maybe_event = events.recv() => match maybe_event {
                    Some(event) => event,
                    None => {
                        tracing::info!(
                            "Chan to transactor was closed, transactor for chain {chain} is exiting",
                        );
                        return;
                    }
                },
                _ = shutdown.recv() => break,
            };
            tracing::debug!(
                dest_chain = %chain,
                src_chain = %event.source_chain,
                recipient = ?event.recipient,
                amount = %event.amount,
                transfer_idx = %event.transfer_idx,
                "Received signal from listener to submit transfer finalization tx",
            );
            match self
                .process_event(
                    &event,
                    &mut finalized_cache,
                    chain_id,
                    &mut shutdown,
                )
                .await
            {
                Ok(Step::Continue) => {}
                Ok(Step::Stopped) => break,
                Err(e) => {
                    tracing::error!(
                        %chain,
                        transfer_idx = %event.transfer_idx,
                        error = %e,
                        "failed to finalize transfer",
                    );
                    tracing::warn!(
                        transfer_idx = %event.transfer_idx,
                        "skipping transfer finalization tx",
                    );
                }
            }
        }
        tracing::info!("Transactor for {chain} shutting down");
    }

    async fn process_event(
        &self,
        event: &TransferInitiatedEvent,
        finalized_cache: &mut FinalizedCache,
        chain_id: u64,
        shutdown: &mut Shutdown,
    ) -> Result<Step> {
        let mut opts =
            fees::create_transact_opts(&self.client, self.wallet.address())
                .await?;
        if self
            .is_already_finalized(event.transfer_idx, finalized_cache)
            .await?
        {
            return Ok(Step::Continue);
        }
        let Some(receipt) = self
            .send_finalize_transfer(&mut opts, event, chain_id, shutdown)
            .await?
        else {
            return Ok(Step::Stopped);
        };
        self.update_finalized_cache(
            &receipt,
            event.transfer_idx,
            finalized_cache,
        )
        .await;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Finalization,
            chain = %self.gateway.chain(),
            transfer_idx = %event.transfer_idx,
            finalized = true,
        );
        Ok(Step::Continue)
    }

    /// Scans destination-chain logs for an existing finalization of
    /// `transfer_idx`, in windows bounded by [`MAX_BLOCK_RANGE`], starting
    /// where the cache last left off.
    async fn is_already_finalized(
        &self,
        transfer_idx: U256,
        finalized_cache: &mut FinalizedCache,
    ) -> Result<bool> {
        let current_block = self.client.block_number().await?;
        for (from, to) in block_windows(
            finalized_cache.start_block(),
            current_block,
            MAX_BLOCK_RANGE,
        ) {
            let found = self
                .gateway
                .transfer_finalized_in_range(from, to, transfer_idx)
                .await?;
            if let Some(event) = found {
                tracing::debug!(
                    dest_chain = %self.gateway.chain(),
                    recipient = ?event.recipient,
                    amount = %event.amount,
                    transfer_idx = %event.counterparty_idx,
                    "Transfer already finalized",
                );
                finalized_cache.record(event);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Submits `FinalizeTransfer`, waiting up to [`MINE_TIMEOUT`] per
    /// attempt and boosting the tip between attempts.
    ///
    /// Returns `Ok(None)` when shutdown interrupts the receipt wait; the
    /// broadcast transaction is left to mine on its own.
    async fn send_finalize_transfer(
        &self,
        opts: &mut fees::TransactOpts,
        event: &TransferInitiatedEvent,
        chain_id: u64,
        shutdown: &mut Shutdown,
    ) -> Result<Option<TransactionReceipt>> {
        let chain = self.gateway.chain();
        for attempt in 0..MAX_SUBMISSION_ATTEMPTS {
            if attempt > 0 {
                tracing::info!(
                    attempt,
                    "Transaction not included within 60 seconds, boosting gas tip by 10%",
                );
                fees::boost_tip(opts, &self.client).await?;
            }

            let mut tx = self.gateway.finalize_transfer_calldata(
                event.recipient,
                event.amount,
                event.transfer_idx,
            );
            opts.apply(&mut tx, chain_id);
            let signature = self.wallet.sign_transaction(&tx).await?;
            let tx_hash = match self
                .client
                .send_raw_transaction(tx.rlp_signed(&signature))
                .await
            {
                Ok(hash) => hash,
                Err(e) if is_replacement_error(&e.to_string()) => {
                    tracing::warn!(
                        attempt,
                        error = %e,
                        "Tx submission failed, retrying",
                    );
                    continue;
                }
                Err(e) => return Err(Error::Submission(e.to_string())),
            };
            tracing::debug!(
                ?tx_hash,
                dest_chain = %chain,
                recipient = ?event.recipient,
                amount = %event.amount,
                transfer_idx = %event.transfer_idx,
                "Transfer finalization tx sent",
            );

            tokio::select! {
                mined = tokio::time::timeout(
                    MINE_TIMEOUT,
                    self.client.wait_mined(tx_hash),
                ) => match mined {
                    Ok(Ok(receipt)) => {
                        tracing::info!(
                            block = ?receipt.block_number,
                            ?tx_hash,
                            transfer_idx = %event.transfer_idx,
                            "Transfer finalization tx included in block",
                        );
                        return Ok(Some(receipt));
                    }
                    Ok(Err(e)) => return Err(e),
                    // Timed out; the next attempt replaces the transaction
                    // with a boosted tip at the same nonce.
                    Err(_) => continue,
                },
                _ = shutdown.recv() => {
                    tracing::info!(
                        ?tx_hash,
                        transfer_idx = %event.transfer_idx,
                        "Shutdown requested, leaving the broadcast transaction to mine on its own",
                    );
                    return Ok(None);
                }
            }
        }
        Err(Error::TxNotMined {
            attempts: MAX_SUBMISSION_ATTEMPTS,
        })
    }

    /// Re-reads the finalization log at the receipt's block and advances the
    /// cache. The cache is advisory, so failures only warn.
    async fn update_finalized_cache(
        &self,
        receipt: &TransactionReceipt,
        transfer_idx: U256,
        finalized_cache: &mut FinalizedCache,
    ) {
        let Some(block_number) = receipt.block_number else {
            tracing::warn!(
                transfer_idx = %transfer_idx,
                "Receipt has no block number, finalized cache left unchanged",
            );
            return;
        };
        let block = block_number.as_u64();
        match self
            .gateway
            .transfer_finalized_in_range(block, block, transfer_idx)
            .await
        {
            Ok(Some(event)) => finalized_cache.record(event),
            Ok(None) => tracing::warn!(
                transfer_idx = %transfer_idx,
                block,
                "Receipt present but TransferFinalized log missing, finalized cache left unchanged",
            ),
            Err(e) => tracing::warn!(
                transfer_idx = %transfer_idx,
                error = %e,
                "Failed to refresh finalized cache",
            ),
        }
    }
}
