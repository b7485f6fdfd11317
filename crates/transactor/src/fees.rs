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

//! Fee and nonce discipline for finalization transactions.

use std::cmp;

use ethers::providers::JsonRpcClient;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, U256};

use bridge_chain_client::ChainClient;
use bridge_relayer_utils::{Error, Result};

/// Fixed gas ceiling for a `finalizeTransfer` call; the contract's
/// finalization is bounded.
pub const FINALIZE_GAS_LIMIT: u64 = 3_000_000;

/// Per-submission transaction parameters. Created from current chain state
/// right before a submission, mutated only by [`boost_tip`] on retries, and
/// discarded once a receipt is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactOpts {
    /// The signer's pending nonce.
    pub nonce: U256,
    /// EIP-1559 priority fee per gas.
    pub gas_tip_cap: U256,
    /// EIP-1559 maximum total fee per gas.
    pub gas_fee_cap: U256,
    /// Gas ceiling.
    pub gas_limit: U256,
}

impl TransactOpts {
    /// Stamps these parameters onto an unsigned transaction.
    pub fn apply(&self, tx: &mut TypedTransaction, chain_id: u64) {
        tx.set_nonce(self.nonce);
        tx.set_gas(self.gas_limit);
        tx.set_chain_id(chain_id);
        if let TypedTransaction::Eip1559(inner) = tx {
            inner.max_priority_fee_per_gas = Some(self.gas_tip_cap);
            inner.max_fee_per_gas = Some(self.gas_fee_cap);
        }
    }
}

/// Builds fresh transaction parameters for `signer` from current chain
/// state. The suggested gas price already includes the base fee.
pub async fn create_transact_opts<P: JsonRpcClient>(
    client: &ChainClient<P>,
    signer: Address,
) -> Result<TransactOpts> {
    let nonce = client.pending_nonce(signer).await?;
    let gas_tip = client.suggest_gas_tip().await?;
    let gas_price = client.suggest_gas_price().await?;
    Ok(TransactOpts {
        nonce,
        gas_tip_cap: gas_tip,
        gas_fee_cap: gas_price,
        gas_limit: U256::from(FINALIZE_GAS_LIMIT),
    })
}

/// Boosts the tip after a submission was not mined within the timeout.
///
/// Re-suggests fees from current mempool state, takes the larger of the new
/// and previous tips, and raises it by strictly more than 10% so replacement
/// rules accept the new transaction. The fee cap becomes the re-suggested
/// base fee plus the boosted tip.
pub async fn boost_tip<P: JsonRpcClient>(
    opts: &mut TransactOpts,
    client: &ChainClient<P>,
) -> Result<()> {
    let new_gas_tip = client.suggest_gas_tip().await?;
    let new_gas_price = client.suggest_gas_price().await?;
    let new_base_fee = new_gas_price.checked_sub(new_gas_tip).ok_or(
        Error::NegativeBaseFee {
            tip: new_gas_tip,
            price: new_gas_price,
        },
    )?;

    let max_gas_tip = cmp::max(new_gas_tip, opts.gas_tip_cap);
    let boosted_tip = max_gas_tip + max_gas_tip / 10u64 + U256::one();

    tracing::debug!(
        old_tip = %opts.gas_tip_cap,
        old_fee_cap = %opts.gas_fee_cap,
        %boosted_tip,
        %new_base_fee,
        "Tip will be boosted by 10%, base fee will be new suggestion",
    );

    opts.gas_tip_cap = boosted_tip;
    opts.gas_fee_cap = new_base_fee + boosted_tip;
    Ok(())
}

#[cfg(test)]
mod tests {
    use ethers::providers::{MockProvider, Provider};
    use ethers::types::Eip1559TransactionRequest;

    use super::*;

    fn mocked() -> (ChainClient<MockProvider>, MockProvider) {
        let (provider, mock) = Provider::mocked();
        (ChainClient::new(provider), mock)
    }

    fn signer() -> Address {
        "0x00000000000000000000000000000000000000aa".parse().unwrap()
    }

    #[tokio::test]
    async fn opts_come_from_current_chain_state() {
        let (client, mock) = mocked();
        // Reverse push order: pending nonce, tip, price.
        mock.push(U256::from(50_000_000_000u64)).unwrap();
        mock.push(U256::from(2_000_000_000u64)).unwrap();
        mock.push(U256::from(11u64)).unwrap();
        let opts = create_transact_opts(&client, signer()).await.unwrap();
        assert_eq!(opts.nonce, U256::from(11u64));
        assert_eq!(opts.gas_tip_cap, U256::from(2_000_000_000u64));
        assert_eq!(opts.gas_fee_cap, U256::from(50_000_000_000u64));
        assert_eq!(opts.gas_limit, U256::from(FINALIZE_GAS_LIMIT));
    }

    #[tokio::test]
    async fn boost_raises_the_old_tip_when_suggestions_are_stale() {
        let (client, mock) = mocked();
        let mut opts = TransactOpts {
            nonce: U256::zero(),
            gas_tip_cap: U256::from(1000u64),
            gas_fee_cap: U256::from(5000u64),
            gas_limit: U256::from(FINALIZE_GAS_LIMIT),
        };
        // New suggestions are below the old tip: price 900, tip 100.
        mock.push(U256::from(900u64)).unwrap();
        mock.push(U256::from(100u64)).unwrap();
        boost_tip(&mut opts, &client).await.unwrap();
        // max(100, 1000) boosted: 1000 + 100 + 1.
        assert_eq!(opts.gas_tip_cap, U256::from(1101u64));
        // New base fee 800 plus the boosted tip.
        assert_eq!(opts.gas_fee_cap, U256::from(1901u64));
    }

    #[tokio::test]
    async fn boost_adopts_a_larger_new_tip() {
        let (client, mock) = mocked();
        let mut opts = TransactOpts {
            nonce: U256::zero(),
            gas_tip_cap: U256::from(100u64),
            gas_fee_cap: U256::from(500u64),
            gas_limit: U256::from(FINALIZE_GAS_LIMIT),
        };
        mock.push(U256::from(9_000u64)).unwrap();
        mock.push(U256::from(2_000u64)).unwrap();
        boost_tip(&mut opts, &client).await.unwrap();
        assert_eq!(opts.gas_tip_cap, U256::from(2_201u64));
        assert_eq!(opts.gas_fee_cap, U256::from(7_000u64 + 2_201u64));
    }

    #[tokio::test]
    async fn boost_progression_is_strictly_increasing() {
        let (client, mock) = mocked();
        let mut opts = TransactOpts {
            nonce: U256::zero(),
            gas_tip_cap: U256::from(1_000_000u64),
            gas_fee_cap: U256::from(2_000_000u64),
            gas_limit: U256::from(FINALIZE_GAS_LIMIT),
        };
        let mut previous = opts.gas_tip_cap;
        for _ in 0..4 {
            mock.push(U256::from(1_500_000u64)).unwrap();
            mock.push(U256::from(1_000u64)).unwrap();
            boost_tip(&mut opts, &client).await.unwrap();
            // Strictly more than +10% each round.
            assert!(opts.gas_tip_cap > previous + previous / 10u64);
            previous = opts.gas_tip_cap;
        }
    }

    #[tokio::test]
    async fn negative_base_fee_is_rejected() {
        let (client, mock) = mocked();
        let mut opts = TransactOpts {
            nonce: U256::zero(),
            gas_tip_cap: U256::from(100u64),
            gas_fee_cap: U256::from(500u64),
            gas_limit: U256::from(FINALIZE_GAS_LIMIT),
        };
        // Suggested tip above the suggested price.
        mock.push(U256::from(100u64)).unwrap();
        mock.push(U256::from(500u64)).unwrap();
        let err = boost_tip(&mut opts, &client).await.unwrap_err();
        assert!(matches!(err, Error::NegativeBaseFee { .. }));
        // Opts are untouched on failure.
        assert_eq!(opts.gas_tip_cap, U256::from(100u64));
    }

    #[test]
    fn gateway_calldata_accepts_the_fee_caps() {
        use bridge_gateway::GatewayClient;
        use bridge_relayer_types::ChainTag;

        let (provider, _mock) = Provider::mocked();
        let client = ChainClient::new(provider);
        let gateway = GatewayClient::new(
            "0x1111111111111111111111111111111111111111"
                .parse()
                .unwrap(),
            &client,
            ChainTag::Settlement,
        );
        let mut tx = gateway.finalize_transfer_calldata(
            signer(),
            U256::one(),
            U256::from(7),
        );
        let opts = TransactOpts {
            nonce: U256::from(3u64),
            gas_tip_cap: U256::from(2u64),
            gas_fee_cap: U256::from(50u64),
            gas_limit: U256::from(FINALIZE_GAS_LIMIT),
        };
        opts.apply(&mut tx, 17864);
        match tx {
            TypedTransaction::Eip1559(inner) => {
                assert_eq!(
                    inner.max_priority_fee_per_gas,
                    Some(U256::from(2u64))
                );
                assert_eq!(inner.max_fee_per_gas, Some(U256::from(50u64)));
                assert_eq!(inner.nonce, Some(U256::from(3u64)));
                assert_eq!(inner.gas, Some(U256::from(FINALIZE_GAS_LIMIT)));
            }
            other => panic!("expected an EIP-1559 transaction, got {other:?}"),
        }
    }

    #[test]
    fn apply_stamps_every_field() {
        let opts = TransactOpts {
            nonce: U256::from(7u64),
            gas_tip_cap: U256::from(2u64),
            gas_fee_cap: U256::from(50u64),
            gas_limit: U256::from(FINALIZE_GAS_LIMIT),
        };
        let mut tx: TypedTransaction =
            Eip1559TransactionRequest::new().into();
        opts.apply(&mut tx, 17864);
        assert_eq!(tx.nonce(), Some(&U256::from(7u64)));
        assert_eq!(tx.gas(), Some(&U256::from(FINALIZE_GAS_LIMIT)));
        assert_eq!(tx.chain_id().map(|id| id.as_u64()), Some(17864));
        match tx {
            TypedTransaction::Eip1559(inner) => {
                assert_eq!(
                    inner.max_priority_fee_per_gas,
                    Some(U256::from(2u64))
                );
                assert_eq!(inner.max_fee_per_gas, Some(U256::from(50u64)));
            }
            _ => panic!("expected an EIP-1559 transaction"),
        }
    }
}
