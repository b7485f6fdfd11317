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

//! # Gateway Bindings 📜
//!
//! Typed encoders and decoders for the bridge gateway contract. The L1 and
//! settlement gateways share one ABI, so a single binding serves both chains;
//! each [`GatewayClient`] instance is tagged with the chain it lives on.

use ethers::contract::abigen;
use ethers::providers::{Http, JsonRpcClient, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Eip1559TransactionRequest, H256, U256};

use bridge_chain_client::ChainClient;
use bridge_relayer_types::{
    ChainTag, TransferFinalizedEvent, TransferInitiatedEvent,
};
use bridge_relayer_utils::{Error, Result};

abigen!(
    Gateway,
    r#"[
        function initiateTransfer(address _recipient, uint256 _amount) external payable
        function finalizeTransfer(address _recipient, uint256 _amount, uint256 _counterpartyIdx) external
        event TransferInitiated(address indexed sender, address indexed recipient, uint256 amount, uint256 indexed transferIdx)
        event TransferFinalized(address indexed recipient, uint256 amount, uint256 indexed counterpartyIdx)
    ]"#
);

/// A gateway contract instance on one chain, exposing the filter and
/// calldata operations the relayer needs.
pub struct GatewayClient<P = Http> {
    contract: Gateway<Provider<P>>,
    chain: ChainTag,
}

impl<P> Clone for GatewayClient<P> {
    fn clone(&self) -> Self {
        Self {
            contract: self.contract.clone(),
            chain: self.chain,
        }
    }
}

impl<P: JsonRpcClient> GatewayClient<P> {
    /// Binds the gateway deployed at `address` on the chain served by
    /// `client`, tagged with `chain`.
    pub fn new(
        address: Address,
        client: &ChainClient<P>,
        chain: ChainTag,
    ) -> Self {
        Self {
            contract: Gateway::new(address, client.provider()),
            chain,
        }
    }

    /// The gateway's deployed address.
    pub fn address(&self) -> Address {
        self.contract.address()
    }

    /// The chain this gateway instance lives on.
    pub fn chain(&self) -> ChainTag {
        self.chain
    }

    /// Fetches all `TransferInitiated` events in the inclusive block range,
    /// ordered by `(block_number, log_index)`.
    pub async fn transfer_initiated_in_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<TransferInitiatedEvent>> {
        let raw = self
            .contract
            .transfer_initiated_filter()
            .from_block(from_block)
            .to_block(to_block)
            .query_with_meta()
            .await
            .map_err(Error::contract)?;
        let mut events: Vec<TransferInitiatedEvent> = raw
            .into_iter()
            .map(|(event, meta)| TransferInitiatedEvent {
                sender: event.sender,
                recipient: event.recipient,
                amount: event.amount,
                transfer_idx: event.transfer_idx,
                source_chain: self.chain,
                block_number: meta.block_number.as_u64(),
                log_index: meta.log_index.as_u64(),
            })
            .collect();
        events.sort_by_key(TransferInitiatedEvent::ordering_key);
        Ok(events)
    }

    /// Looks for a `TransferFinalized` event with the given counterparty
    /// index in the inclusive block range.
    ///
    /// `counterpartyIdx` is an indexed topic, so the node does the matching;
    /// the local equality check only guards against misbehaving providers.
    pub async fn transfer_finalized_in_range(
        &self,
        from_block: u64,
        to_block: u64,
        counterparty_idx: U256,
    ) -> Result<Option<TransferFinalizedEvent>> {
        let raw = self
            .contract
            .transfer_finalized_filter()
            .from_block(from_block)
            .to_block(to_block)
            .topic2(u256_topic(counterparty_idx))
            .query_with_meta()
            .await
            .map_err(Error::contract)?;
        let found = raw
            .into_iter()
            .find(|(event, _)| event.counterparty_idx == counterparty_idx)
            .map(|(event, meta)| TransferFinalizedEvent {
                recipient: event.recipient,
                amount: event.amount,
                counterparty_idx: event.counterparty_idx,
                destination_chain: self.chain,
                block_number: meta.block_number.as_u64(),
            });
        Ok(found)
    }

    /// Builds the unsigned `finalizeTransfer` transaction as an EIP-1559
    /// request. Nonce, gas and fee caps are filled in by the caller before
    /// signing.
    pub fn finalize_transfer_calldata(
        &self,
        recipient: Address,
        amount: U256,
        counterparty_idx: U256,
    ) -> TypedTransaction {
        let call = self
            .contract
            .finalize_transfer(recipient, amount, counterparty_idx);
        // The generated call builder yields a legacy request; tip and fee
        // caps only exist on the dynamic-fee variant.
        TypedTransaction::Eip1559(Eip1559TransactionRequest {
            to: call.tx.to().cloned(),
            data: call.tx.data().cloned(),
            ..Default::default()
        })
    }
}

/// Encodes a `uint256` event argument as a 32-byte log topic.
pub fn u256_topic(value: U256) -> H256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    H256::from(bytes)
}

#[cfg(test)]
mod tests {
    use ethers::abi::Token;
    use ethers::contract::EthEvent;
    use ethers::providers::MockProvider;
    use ethers::types::{Bytes, Log, U64};
    use ethers::utils::id;

    use super::*;

    fn gateway_address() -> Address {
        "0x1111111111111111111111111111111111111111"
            .parse()
            .unwrap()
    }

    fn mocked(chain: ChainTag) -> (GatewayClient<MockProvider>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        let client = ChainClient::new(provider);
        (GatewayClient::new(gateway_address(), &client, chain), mock)
    }

    fn initiated_log(
        sender: Address,
        recipient: Address,
        amount: U256,
        transfer_idx: U256,
        block: u64,
        log_index: u64,
    ) -> Log {
        Log {
            address: gateway_address(),
            topics: vec![
                TransferInitiatedFilter::signature(),
                H256::from(sender),
                H256::from(recipient),
                u256_topic(transfer_idx),
            ],
            data: Bytes::from(ethers::abi::encode(&[Token::Uint(amount)])),
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

    fn finalized_log(
        recipient: Address,
        amount: U256,
        counterparty_idx: U256,
        block: u64,
    ) -> Log {
        Log {
            address: gateway_address(),
            topics: vec![
                TransferFinalizedFilter::signature(),
                H256::from(recipient),
                u256_topic(counterparty_idx),
            ],
            data: Bytes::from(ethers::abi::encode(&[Token::Uint(amount)])),
            block_hash: Some(H256::zero()),
            block_number: Some(U64::from(block)),
            transaction_hash: Some(H256::zero()),
            transaction_index: Some(U64::zero()),
            log_index: Some(U256::zero()),
            transaction_log_index: None,
            log_type: None,
            removed: None,
        }
    }

    #[tokio::test]
    async fn initiated_events_decode_and_sort() {
        let (gateway, mock) = mocked(ChainTag::L1);
        let sender: Address =
            "0x00000000000000000000000000000000000000aa".parse().unwrap();
        let recipient: Address =
            "0x00000000000000000000000000000000000000bb".parse().unwrap();
        let amount = U256::exp10(15);
        // Node returns the later block first; the wrapper restores order.
        mock.push::<Vec<Log>, _>(vec![
            initiated_log(sender, recipient, amount, U256::from(8), 120, 0),
            initiated_log(sender, recipient, amount, U256::from(7), 100, 3),
        ])
        .unwrap();
        let events =
            gateway.transfer_initiated_in_range(0, 200).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].transfer_idx, U256::from(7));
        assert_eq!(events[0].block_number, 100);
        assert_eq!(events[0].log_index, 3);
        assert_eq!(events[0].source_chain, ChainTag::L1);
        assert_eq!(events[0].sender, sender);
        assert_eq!(events[0].recipient, recipient);
        assert_eq!(events[0].amount, amount);
        assert_eq!(events[1].transfer_idx, U256::from(8));
    }

    #[tokio::test]
    async fn finalized_lookup_matches_the_counterparty_idx() {
        let (gateway, mock) = mocked(ChainTag::Settlement);
        let recipient: Address =
            "0x00000000000000000000000000000000000000cc".parse().unwrap();
        mock.push::<Vec<Log>, _>(vec![finalized_log(
            recipient,
            U256::from(42u64),
            U256::from(7),
            200,
        )])
        .unwrap();
        let found = gateway
            .transfer_finalized_in_range(0, 250, U256::from(7))
            .await
            .unwrap()
            .expect("event should be found");
        assert_eq!(found.counterparty_idx, U256::from(7));
        assert_eq!(found.recipient, recipient);
        assert_eq!(found.amount, U256::from(42u64));
        assert_eq!(found.block_number, 200);
        assert_eq!(found.destination_chain, ChainTag::Settlement);
    }

    #[tokio::test]
    async fn finalized_lookup_ignores_foreign_indices() {
        let (gateway, mock) = mocked(ChainTag::Settlement);
        let recipient = Address::zero();
        // A provider that ignores topic filters must not produce a false hit.
        mock.push::<Vec<Log>, _>(vec![finalized_log(
            recipient,
            U256::zero(),
            U256::from(9),
            200,
        )])
        .unwrap();
        let found = gateway
            .transfer_finalized_in_range(0, 250, U256::from(7))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn finalized_lookup_with_no_logs_is_none() {
        let (gateway, mock) = mocked(ChainTag::L1);
        mock.push::<Vec<Log>, _>(Vec::<Log>::new()).unwrap();
        let found = gateway
            .transfer_finalized_in_range(0, 39_999, U256::zero())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn finalize_calldata_targets_the_gateway() {
        let (provider, _mock) = Provider::mocked();
        let client = ChainClient::new(provider);
        let gateway = GatewayClient::new(
            gateway_address(),
            &client,
            ChainTag::Settlement,
        );
        let tx = gateway.finalize_transfer_calldata(
            Address::zero(),
            U256::from(1u64),
            U256::from(7),
        );
        assert_eq!(gateway.address(), gateway_address());
        assert_eq!(tx.to(), Some(&gateway.address().into()));
        let data = tx.data().expect("calldata");
        let selector = id("finalizeTransfer(address,uint256,uint256)");
        assert_eq!(&data[0..4], selector.as_slice());
        // Fee caps are applied later; they require the dynamic-fee variant.
        assert!(matches!(tx, TypedTransaction::Eip1559(_)));
    }

    #[test]
    fn u256_topics_are_big_endian_padded() {
        let topic = u256_topic(U256::from(7));
        assert_eq!(topic.as_bytes()[31], 7);
        assert!(topic.as_bytes()[..31].iter().all(|b| *b == 0));
    }
}
