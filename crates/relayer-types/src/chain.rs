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

use ethers::types::U256;
use serde::{Deserialize, Serialize};

/// Which side of the bridge a chain belongs to.
///
/// The bridge pairs an outer L1 network with an inner settlement network;
/// every worker is tagged with exactly one of the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainTag {
    /// The outer settlement network users lock funds on.
    L1,
    /// The inner application-specific network paired with L1.
    Settlement,
}

impl std::fmt::Display for ChainTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainTag::L1 => write!(f, "L1"),
            ChainTag::Settlement => write!(f, "Settlement"),
        }
    }
}

/// The configured mapping from chain ids to [`ChainTag`]s.
///
/// The id sets are contract-environment dependent, so they are configuration
/// rather than constants. The defaults cover the local L1 (39999), the
/// Holesky testnet (17000) and the settlement chain (17864).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainIdMap {
    /// Chain ids resolving to [`ChainTag::L1`].
    pub l1: Vec<u64>,
    /// Chain ids resolving to [`ChainTag::Settlement`].
    pub settlement: Vec<u64>,
}

impl Default for ChainIdMap {
    fn default() -> Self {
        Self {
            l1: vec![39999, 17000],
            settlement: vec![17864],
        }
    }
}

impl ChainIdMap {
    /// Resolves a chain id reported by a node to its tag, or `None` when the
    /// id is not part of the bridge pair.
    pub fn resolve(&self, chain_id: U256) -> Option<ChainTag> {
        if self.l1.iter().any(|id| U256::from(*id) == chain_id) {
            Some(ChainTag::L1)
        } else if self.settlement.iter().any(|id| U256::from(*id) == chain_id)
        {
            Some(ChainTag::Settlement)
        } else {
            None
        }
    }

    /// Checks that the mapping is usable: both sides populated and no id
    /// claimed by both tags.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.l1.is_empty() {
            return Err("chain-ids.l1 must not be empty");
        }
        if self.settlement.is_empty() {
            return Err("chain-ids.settlement must not be empty");
        }
        if self.l1.iter().any(|id| self.settlement.contains(id)) {
            return Err("a chain id cannot map to both L1 and Settlement");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_resolves_known_ids() {
        let map = ChainIdMap::default();
        assert_eq!(map.resolve(U256::from(39999)), Some(ChainTag::L1));
        assert_eq!(map.resolve(U256::from(17000)), Some(ChainTag::L1));
        assert_eq!(
            map.resolve(U256::from(17864)),
            Some(ChainTag::Settlement)
        );
    }

    #[test]
    fn unknown_id_is_rejected() {
        let map = ChainIdMap::default();
        assert_eq!(map.resolve(U256::from(1u64)), None);
        assert_eq!(map.resolve(U256::MAX), None);
    }

    #[test]
    fn overlapping_map_fails_validation() {
        let map = ChainIdMap {
            l1: vec![1, 2],
            settlement: vec![2],
        };
        assert!(map.validate().is_err());
    }

    #[test]
    fn empty_side_fails_validation() {
        let map = ChainIdMap {
            l1: vec![],
            settlement: vec![17864],
        };
        assert!(map.validate().is_err());
        let map = ChainIdMap {
            l1: vec![39999],
            settlement: vec![],
        };
        assert!(map.validate().is_err());
    }

    #[test]
    fn tags_render_their_chain_name() {
        assert_eq!(ChainTag::L1.to_string(), "L1");
        assert_eq!(ChainTag::Settlement.to_string(), "Settlement");
    }
}
