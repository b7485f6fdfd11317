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

//! Cancellation of leftover pending transactions from a prior run.
//!
//! A crashed relayer can leave unmined transactions behind, wedging the
//! signer's nonce sequence. Startup resolves the gap between the pending and
//! latest nonces by replacing every intervening nonce with a zero-value
//! self-transfer, then waits for the mempool to settle.

use std::time::Duration;

use ethers::providers::JsonRpcClient;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{TransactionRequest, U256};

use bridge_chain_client::ChainClient;
use bridge_relayer_utils::{probe, retry, Error, Result};

use crate::is_replacement_error;

/// Gas for a plain value transfer.
pub const CANCEL_GAS_LIMIT: u64 = 21_000;

/// Per-nonce submission retries with a +10%+1 price bump each.
const CANCEL_MAX_RETRIES: usize = 5;

/// How long to wait for the pending nonce to settle, in 1-second polls.
const CANCEL_SETTLE_RETRIES: usize = 60;

/// Resolves any gap between the signer's pending and latest nonces.
///
/// Emits a replacement self-transfer at each gap nonce, then polls until
/// `pendingNonce == latestNonce` or the settle window runs out.
pub async fn cancel_pending_transactions<P: JsonRpcClient>(
    client: &ChainClient<P>,
    wallet: &LocalWallet,
    chain_id: u64,
) -> Result<()> {
    let from = wallet.address();
    let pending_nonce = client.pending_nonce(from).await?;
    let latest_nonce = client.latest_nonce(from).await?;
    if pending_nonce <= latest_nonce {
        tracing::debug!("No pending transactions to cancel");
        return Ok(());
    }
    tracing::info!(
        %pending_nonce,
        %latest_nonce,
        "Cancelling pending transactions left over from a previous run",
    );

    let suggested_gas_price = client.suggest_gas_price().await?;
    let mut nonce = latest_nonce;
    while nonce < pending_nonce {
        let mut gas_price = suggested_gas_price;
        for attempt in 0..CANCEL_MAX_RETRIES {
            if attempt > 0 {
                gas_price = gas_price + gas_price / 10u64 + U256::one();
                tracing::debug!(
                    attempt,
                    %gas_price,
                    "Increased gas price for cancel retry",
                );
            }
            let tx: TypedTransaction = TransactionRequest::new()
                .from(from)
                .to(from)
                .value(0u64)
                .gas(CANCEL_GAS_LIMIT)
                .gas_price(gas_price)
                .nonce(nonce)
                .chain_id(chain_id)
                .into();
            let signature = wallet.sign_transaction(&tx).await?;
            match client.send_raw_transaction(tx.rlp_signed(&signature)).await
            {
                Ok(hash) => {
                    tracing::info!(
                        %nonce,
                        ?hash,
                        %gas_price,
                        "Sent cancel transaction",
                    );
                    tracing::event!(
                        target: probe::TARGET,
                        tracing::Level::DEBUG,
                        kind = %probe::Kind::TxCancel,
                        %nonce,
                        tx_hash = ?hash,
                    );
                    break;
                }
                Err(e) if is_replacement_error(&e.to_string()) => {
                    tracing::warn!(
                        %nonce,
                        attempt,
                        error = %e,
                        "Cancel transaction rejected, increasing gas price",
                    );
                    if attempt + 1 == CANCEL_MAX_RETRIES {
                        tracing::warn!(
                            %nonce,
                            "Giving up replacing this nonce, it may settle on its own",
                        );
                    }
                }
                Err(e) => {
                    return Err(Error::Submission(e.to_string()));
                }
            }
        }
        nonce = nonce + U256::one();
    }

    // Poll until the mempool reflects the replacements.
    let backoff = retry::ConstantWithMaxRetryCount::new(
        Duration::from_secs(1),
        CANCEL_SETTLE_RETRIES,
    );
    backoff::future::retry(backoff, || async {
        let pending_nonce = client
            .pending_nonce(from)
            .await
            .map_err(backoff::Error::permanent)?;
        let latest_nonce = client
            .latest_nonce(from)
            .await
            .map_err(backoff::Error::permanent)?;
        if pending_nonce > latest_nonce {
            Err(backoff::Error::transient(Error::CancelTimeout))
        } else {
            Ok(())
        }
    })
    .await?;
    tracing::info!(
        "All pending transactions for the signing account have been cancelled",
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use ethers::providers::{MockProvider, Provider};
    use ethers::types::TxHash;

    use super::*;

    fn wallet() -> LocalWallet {
        LocalWallet::from_str(
            "0x0000000000000000000000000000000000000000000000000000000000000001",
        )
        .unwrap()
    }

    fn mocked() -> (ChainClient<MockProvider>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        (ChainClient::new(provider), mock)
    }

    #[tokio::test]
    async fn no_gap_is_a_no_op() {
        let (client, mock) = mocked();
        // Reverse push order: pending nonce, latest nonce.
        mock.push(U256::from(5u64)).unwrap();
        mock.push(U256::from(5u64)).unwrap();
        cancel_pending_transactions(&client, &wallet(), 17864)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn single_gap_nonce_is_replaced_and_settles() {
        let (client, mock) = mocked();
        // Call order: pending=2, latest=1, gas price, send raw, then one
        // settle poll with pending=2, latest=2. Pushed in reverse.
        mock.push(U256::from(2u64)).unwrap();
        mock.push(U256::from(2u64)).unwrap();
        mock.push(TxHash::zero()).unwrap();
        mock.push(U256::from(100u64)).unwrap();
        mock.push(U256::from(1u64)).unwrap();
        mock.push(U256::from(2u64)).unwrap();
        cancel_pending_transactions(&client, &wallet(), 17864)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_gap_times_out() {
        let (client, mock) = mocked();
        // The settle loop always observes pending > latest. One immediate
        // check plus sixty 1-second retries.
        for _ in 0..=CANCEL_SETTLE_RETRIES {
            mock.push(U256::from(1u64)).unwrap();
            mock.push(U256::from(2u64)).unwrap();
        }
        mock.push(TxHash::zero()).unwrap();
        mock.push(U256::from(100u64)).unwrap();
        mock.push(U256::from(1u64)).unwrap();
        mock.push(U256::from(2u64)).unwrap();
        let err = cancel_pending_transactions(&client, &wallet(), 17864)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CancelTimeout));
    }
}
