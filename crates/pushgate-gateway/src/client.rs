//! Gateway client setup
//!
//! Wires configuration, gateway lookup, and the shard pool together for the
//! `pushgate` binary.

use crate::events::GatewayEvent;
use crate::pool::{PoolConfig, ShardPool};
use crate::rest::{GatewayInfoProvider, HttpGatewayInfo, StaticGatewayInfo};
use crate::shard::ShardConfig;
use crate::transport::TungsteniteConnector;
use pushgate_common::{AppConfig, AppError};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pick how the gateway URL and shard count are discovered
///
/// A fixed `GATEWAY_URL` skips the REST lookup and falls back to one shard
/// unless `SHARD_COUNT` says otherwise.
pub fn gateway_info_provider(config: &AppConfig) -> Result<Box<dyn GatewayInfoProvider>, AppError> {
    match &config.gateway.url {
        Some(url) => {
            info!(url = %url, "Using fixed gateway URL");
            let count = config.sharding.shard_count.unwrap_or(1);
            Ok(Box::new(StaticGatewayInfo::new(url.clone(), count)))
        }
        None => {
            let provider = HttpGatewayInfo::new(&config.gateway.api_url, &config.auth.token)
                .map_err(AppError::external)?;
            Ok(Box::new(provider))
        }
    }
}

/// Log one pool event
pub fn log_event(event: &GatewayEvent) {
    match event {
        GatewayEvent::Dispatch { shard_id, event } => debug!(
            shard_id,
            event_type = %event.event_type,
            seq = event.sequence,
            "Dispatch"
        ),
        GatewayEvent::Established {
            shard_id,
            session_id,
        } => info!(shard_id, session_id = %session_id, "Session established"),
        GatewayEvent::Resumed { shard_id, replayed } => {
            info!(shard_id, replayed, "Session resumed");
        }
        GatewayEvent::Disconnected {
            shard_id,
            code,
            recoverable,
        } => warn!(shard_id, code = ?code, recoverable, "Shard disconnected"),
        GatewayEvent::Debug { shard_id, message } => debug!(shard_id, "{message}"),
        GatewayEvent::Error {
            shard_id,
            error,
            recoverable,
        } => error!(shard_id, error = %error, recoverable, "Shard error"),
        GatewayEvent::AllShardsReady => info!("All shards ready"),
    }
}

/// Run the gateway client until Ctrl-C or until every shard is dead
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let provider = gateway_info_provider(&config)?;
    let shard_config = ShardConfig::from_app_config(&config);
    let pool_config = PoolConfig::from_app_config(&config);

    let (pool, mut events) = ShardPool::connect(
        shard_config,
        pool_config,
        provider.as_ref(),
        Arc::new(TungsteniteConnector::new()),
    )
    .await?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutdown requested");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                log_event(&event);
                if matches!(event, GatewayEvent::Error { recoverable: false, .. })
                    && pool.dead_shards().len() == pool.shard_ids().len()
                {
                    error!("Every shard has failed");
                    break;
                }
            }
        }
    }

    pool.shutdown().await;

    let dead = pool.dead_shards();
    if dead.is_empty() {
        Ok(())
    } else {
        Err(AppError::DeadShards(dead))
    }
}
