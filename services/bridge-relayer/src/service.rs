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

//! Builds the two relay pipelines and supervises their workers.
//!
//! ```text
//! L1.Listener ──events──▶ Settlement.Transactor ──FinalizeTransfer──▶ Settlement chain
//! Settlement.Listener ──events──▶ L1.Transactor ──FinalizeTransfer──▶ L1 chain
//! ```
//!
//! The cross wiring uses two unidirectional channels, so neither side holds
//! a reference to the other.

use std::time::Duration;

use tokio::task::JoinHandle;

use bridge_event_listener::Listener;
use bridge_gateway::GatewayClient;
use bridge_relayer_context::RelayerContext;
use bridge_relayer_types::ChainTag;
use bridge_relayer_utils::{Error, Result};
use bridge_transactor::Transactor;

/// How long shutdown waits for the four workers to drain.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// A named worker task, for shutdown diagnostics.
pub type Worker = (&'static str, JoinHandle<()>);

/// Starts all background services required for the relayer.
///
/// Returns the four worker handles. Fails when either node reports a chain
/// id outside the configured mapping.
pub async fn ignite(ctx: &RelayerContext) -> Result<Vec<Worker>> {
    let config = &ctx.config;
    let chain_ids = config.chain_ids.clone();

    let l1_client = ctx.l1_client()?;
    let settlement_client = ctx.settlement_client()?;

    let l1_gateway = GatewayClient::new(
        config.l1_contract_addr,
        &l1_client,
        ChainTag::L1,
    );
    let settlement_gateway = GatewayClient::new(
        config.settlement_contract_addr,
        &settlement_client,
        ChainTag::Settlement,
    );

    let l1_listener = Listener::new(
        l1_client.clone(),
        l1_gateway.clone(),
        chain_ids.clone(),
        true,
    );
    let settlement_listener = Listener::new(
        settlement_client.clone(),
        settlement_gateway.clone(),
        chain_ids.clone(),
        true,
    );
    let (l1_listener_task, l1_events) =
        l1_listener.start(ctx.shutdown_signal()).await?;
    let (settlement_listener_task, settlement_events) =
        settlement_listener.start(ctx.shutdown_signal()).await?;

    // The X wiring: L1 initiations finalize on the settlement chain and
    // settlement initiations finalize on L1.
    let settlement_transactor = Transactor::new(
        ctx.wallet().clone(),
        settlement_client,
        settlement_gateway,
        chain_ids.clone(),
    );
    let l1_transactor = Transactor::new(
        ctx.wallet().clone(),
        l1_client,
        l1_gateway,
        chain_ids,
    );
    let settlement_transactor_task = settlement_transactor
        .start(l1_events, ctx.shutdown_signal())
        .await?;
    let l1_transactor_task = l1_transactor
        .start(settlement_events, ctx.shutdown_signal())
        .await?;

    Ok(vec![
        ("l1-listener", l1_listener_task),
        ("settlement-listener", settlement_listener_task),
        ("settlement-transactor", settlement_transactor_task),
        ("l1-transactor", l1_transactor_task),
    ])
}

/// Waits for every worker to finish, up to [`SHUTDOWN_GRACE`].
pub async fn wait_for_shutdown(workers: Vec<Worker>) -> Result<()> {
    let drain = futures::future::join_all(workers.into_iter().map(
        |(name, task)| async move {
            match task.await {
                Ok(()) => tracing::debug!(worker = name, "worker drained"),
                Err(e) => tracing::error!(
                    worker = name,
                    error = %e,
                    "worker task failed",
                ),
            }
        },
    ));
    match tokio::time::timeout(SHUTDOWN_GRACE, drain).await {
        Ok(_) => Ok(()),
        Err(_) => Err(Error::ShutdownTimeout),
    }
}
