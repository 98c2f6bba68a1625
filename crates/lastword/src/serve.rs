// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lastword serve` command implementation.
//!
//! Runs the processing tick and, when enabled, the HTTP gateway. Both stop
//! on SIGINT/SIGTERM; an in-flight cycle is allowed to finish.

use std::sync::Arc;
use std::time::Duration;

use lastword_config::model::LastwordConfig;
use lastword_core::LastwordError;
use lastword_gateway::GatewayState;
use lastword_scheduler::{Engine, ProcessRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app;
use crate::shutdown;

pub async fn run_serve(config: LastwordConfig) -> Result<(), LastwordError> {
    info!(service = %config.service.name, "starting lastword serve");

    let engine = Arc::new(app::build_engine(&config).await?);
    let cancel = shutdown::install_signal_handler();

    let tick = Duration::from_secs(config.scheduler.tick_interval_secs.max(1));
    let ticker = tokio::spawn(run_ticker(engine.clone(), tick, cancel.clone()));
    info!(interval_secs = tick.as_secs(), "processing loop started");

    let gateway = if config.gateway.enabled {
        let gateway_config = config.gateway.clone();
        let state = GatewayState::new(engine.clone());
        let token = cancel.clone();
        Some(tokio::spawn(async move {
            let result =
                lastword_gateway::start_server(&gateway_config, state, token.clone()).await;
            // A gateway that cannot bind takes the service down with it.
            token.cancel();
            result
        }))
    } else {
        info!("gateway disabled");
        None
    };

    let mut result = Ok(());
    if let Some(handle) = gateway {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => result = Err(e),
            Err(e) => {
                result = Err(LastwordError::Internal(format!("gateway task failed: {e}")));
            }
        }
    }
    if let Err(e) = ticker.await {
        warn!(error = %e, "processing loop task failed");
    }

    engine.storage().close().await?;
    info!("lastword serve shutdown complete");
    result
}

/// Run a processing cycle every `interval` until `cancel` fires.
pub async fn run_ticker(engine: Arc<Engine>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match engine.process(ProcessRequest::default()).await {
                    Ok(summary) if summary.processed > 0 => {
                        debug!(
                            processed = summary.processed,
                            failed = summary.failed,
                            "tick processed entries"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "processing cycle failed"),
                }
                let purged = engine.purge_expired_selections();
                if purged > 0 {
                    debug!(purged, "expired panic selections dropped");
                }
            }
            _ = cancel.cancelled() => {
                info!("processing loop shutting down");
                break;
            }
        }
    }
}
