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

use ethers::types::{Address, U256};

use crate::ChainTag;

/// A `TransferInitiated` log observed on a source chain, decoded and tagged
/// with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInitiatedEvent {
    /// Account that locked (or burned) funds on the source chain.
    pub sender: Address,
    /// Destination-chain account the funds are released to.
    pub recipient: Address,
    /// Transferred amount in wei.
    pub amount: U256,
    /// Monotonic index assigned by the source gateway. Unique per gateway;
    /// echoed verbatim as `counterpartyIdx` when finalizing.
    pub transfer_idx: U256,
    /// The chain the initiation happened on.
    pub source_chain: ChainTag,
    /// Block that contains the log.
    pub block_number: u64,
    /// Position of the log within its block.
    pub log_index: u64,
}

impl TransferInitiatedEvent {
    /// The key event streams are ordered by.
    pub fn ordering_key(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// A `TransferFinalized` log observed on a destination chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFinalizedEvent {
    /// Account the funds were released to.
    pub recipient: Address,
    /// Released amount in wei.
    pub amount: U256,
    /// The source-chain `transferIdx` this finalization corresponds to.
    pub counterparty_idx: U256,
    /// The chain the finalization happened on.
    pub destination_chain: ChainTag,
    /// Block that contains the log.
    pub block_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_key_sorts_by_block_then_log_index() {
        let event = |block, log| TransferInitiatedEvent {
            sender: Address::zero(),
            recipient: Address::zero(),
            amount: U256::zero(),
            transfer_idx: U256::zero(),
            source_chain: ChainTag::L1,
            block_number: block,
            log_index: log,
        };
        let mut events = vec![event(7, 2), event(5, 9), event(7, 0)];
        events.sort_by_key(TransferInitiatedEvent::ordering_key);
        let keys: Vec<_> =
            events.iter().map(|e| e.ordering_key()).collect();
        assert_eq!(keys, vec![(5, 9), (7, 0), (7, 2)]);
    }
}
