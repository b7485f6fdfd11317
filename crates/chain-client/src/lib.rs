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
//! # Chain Client 🛰️
//!
//! A thin adapter over an `ethers` JSON-RPC provider exposing exactly the
//! node operations the relayer needs. Every failure surfaces as the single
//! [`Error::Rpc`](bridge_relayer_utils::Error::Rpc) kind; callers decide
//! whether to retry or abort.

use std::cmp;
use std::sync::Arc;
use std::time::Duration;

use ethers::providers::{Http, JsonRpcClient, Middleware, Provider};
use ethers::types::{
    Address, BlockNumber, Bytes, TransactionReceipt, TxHash, U256,
};

use bridge_relayer_utils::Result;

/// Upper bound on the span of a single `eth_getLogs` query, chosen to stay
/// below common RPC provider log-range limits.
pub const MAX_BLOCK_RANGE: u64 = 40_000;

/// How often mined-receipt polling re-queries the node.
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Typed access to a single JSON-RPC node.
///
/// Generic over the transport so tests can drive it with
/// [`ethers::providers::MockProvider`].
pub struct ChainClient<P = Http> {
    provider: Arc<Provider<P>>,
}

impl<P> Clone for ChainClient<P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
        }
    }
}

impl ChainClient<Http> {
    /// Connects to an HTTP JSON-RPC endpoint.
    pub fn connect(url: &url::Url) -> Result<Self> {
        let provider = Provider::<Http>::try_from(url.as_str())?;
        Ok(Self::new(provider))
    }
}

impl<P: JsonRpcClient> ChainClient<P> {
    /// Wraps an existing provider.
    pub fn new(provider: Provider<P>) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// The underlying provider, for attaching contract bindings.
    pub fn provider(&self) -> Arc<Provider<P>> {
        self.provider.clone()
    }

    /// The chain id reported by the node.
    pub async fn chain_id(&self) -> Result<U256> {
        Ok(self.provider.get_chainid().await?)
    }

    /// The current head block number.
    pub async fn block_number(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }

    /// The account's nonce including mempool transactions.
    pub async fn pending_nonce(&self, address: Address) -> Result<U256> {
        let nonce = self
            .provider
            .get_transaction_count(address, Some(BlockNumber::Pending.into()))
            .await?;
        Ok(nonce)
    }

    /// The account's nonce as of the latest mined block.
    pub async fn latest_nonce(&self, address: Address) -> Result<U256> {
        let nonce = self
            .provider
            .get_transaction_count(address, Some(BlockNumber::Latest.into()))
            .await?;
        Ok(nonce)
    }

    /// The node's suggested priority fee per gas.
    pub async fn suggest_gas_tip(&self) -> Result<U256> {
        let tip = self
            .provider
            .request("eth_maxPriorityFeePerGas", ())
            .await?;
        Ok(tip)
    }

    /// The node's suggested gas price. Base fee included.
    pub async fn suggest_gas_price(&self) -> Result<U256> {
        Ok(self.provider.get_gas_price().await?)
    }

    /// Broadcasts a signed raw transaction and returns its hash.
    pub async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash> {
        let pending = self.provider.send_raw_transaction(raw).await?;
        Ok(*pending)
    }

    /// Fetches the receipt of a transaction. Absence is `Ok(None)`, not an
    /// error.
    pub async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>> {
        Ok(self.provider.get_transaction_receipt(hash).await?)
    }

    /// Polls the node until the transaction is mined.
    ///
    /// Runs until a receipt appears or an RPC call fails; callers bound it
    /// with a timeout.
    pub async fn wait_mined(
        &self,
        hash: TxHash,
    ) -> Result<TransactionReceipt> {
        loop {
            if let Some(receipt) = self.transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

/// Splits the inclusive block range `[from, to]` into consecutive windows of
/// at most `max` blocks each. Empty when `from > to`.
pub fn block_windows(from: u64, to: u64, max: u64) -> Vec<(u64, u64)> {
    debug_assert!(max > 0);
    let mut windows = Vec::new();
    let mut start = from;
    while start <= to {
        let end = cmp::min(start.saturating_add(max - 1), to);
        windows.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    windows
}

#[cfg(test)]
mod tests {
    use ethers::providers::MockProvider;
    use ethers::types::U64;

    use super::*;

    fn mocked() -> (ChainClient<MockProvider>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        (ChainClient::new(provider), mock)
    }

    #[test]
    fn windows_cover_the_range_exactly() {
        assert_eq!(block_windows(0, 99, 40), vec![(0, 39), (40, 79), (80, 99)]);
        assert_eq!(block_windows(5, 5, 40_000), vec![(5, 5)]);
        assert_eq!(block_windows(0, 79_999, 40_000), vec![(0, 39_999), (40_000, 79_999)]);
    }

    #[test]
    fn inverted_range_yields_no_windows() {
        assert!(block_windows(10, 9, 40_000).is_empty());
    }

    #[test]
    fn windows_saturate_at_the_top_of_the_block_space() {
        let windows = block_windows(u64::MAX - 1, u64::MAX, 40_000);
        assert_eq!(windows, vec![(u64::MAX - 1, u64::MAX)]);
    }

    #[tokio::test]
    async fn block_number_and_chain_id_round_trip() {
        let (client, mock) = mocked();
        // Responses pop in reverse push order.
        mock.push(U64::from(1234u64)).unwrap();
        assert_eq!(client.block_number().await.unwrap(), 1234);
        mock.push(U256::from(17864u64)).unwrap();
        assert_eq!(client.chain_id().await.unwrap(), U256::from(17864u64));
    }

    #[tokio::test]
    async fn gas_suggestions_come_from_the_node() {
        let (client, mock) = mocked();
        mock.push(U256::from(3_000_000_000u64)).unwrap();
        let tip = client.suggest_gas_tip().await.unwrap();
        assert_eq!(tip, U256::from(3_000_000_000u64));
        mock.push(U256::from(45_000_000_000u64)).unwrap();
        let price = client.suggest_gas_price().await.unwrap();
        assert_eq!(price, U256::from(45_000_000_000u64));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_mined_survives_a_missing_receipt() {
        let (client, mock) = mocked();
        let receipt = TransactionReceipt {
            block_number: Some(U64::from(200u64)),
            ..Default::default()
        };
        // First poll sees no receipt, second poll sees it mined.
        mock.push(receipt.clone()).unwrap();
        mock.push::<Option<TransactionReceipt>, _>(None).unwrap();
        let mined = client.wait_mined(TxHash::zero()).await.unwrap();
        assert_eq!(mined.block_number, Some(U64::from(200u64)));
    }

    #[tokio::test]
    async fn rpc_failures_surface_as_errors() {
        let (client, _mock) = mocked();
        // Nothing pushed: the mock returns an empty-responses error.
        assert!(client.block_number().await.is_err());
    }
}
