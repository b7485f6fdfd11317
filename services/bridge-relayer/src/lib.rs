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
//! # Standard Bridge Relayer 🌉
//!
//! The relayer hosts four workers wired as two independent pipelines in an X
//! pattern: each chain's listener feeds the counterparty chain's transactor.
//! See [`service`] for the wiring.

/// Worker construction and supervision.
pub mod service;
