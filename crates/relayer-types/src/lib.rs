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
//! # Relayer Types 🌉
//!
//! Core domain types for the standard bridge relayer: chain tags, transfer
//! events, the chain-id mapping, and small config-value wrappers.

/// Chain tags and the configurable chain-id mapping.
pub mod chain;
/// Decoded gateway transfer events.
pub mod events;
/// Signing-key file loading.
pub mod private_key;
/// RPC URL config-value wrapper.
pub mod rpc_url;

pub use chain::{ChainIdMap, ChainTag};
pub use events::{TransferFinalizedEvent, TransferInitiatedEvent};
