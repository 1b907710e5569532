//! Run orchestration: wire the shared state, serve challenges, schedule cycles

use crate::dispatcher::Dispatcher;
use crate::error::LoadResult;
use crate::report::LoadReport;
use crate::responder::ChallengeResponder;
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::state::EngineState;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use volley_config::VolleyConfig;

/// Drive the target for the configured duration and report what happened
///
/// `stop` ends the run early; in-flight cycles are still drained.
pub async fn run(config: &VolleyConfig, stop: CancellationToken) -> LoadResult<LoadReport> {
    let state = Arc::new(EngineState::new(config)?);

    let responder = ChallengeResponder::bind(
        &config.responder.listen_address(),
        state.challenges.clone(),
        state.rate.clone(),
    )
    .await?;
    let responder_stop = CancellationToken::new();
    let responder_task = tokio::spawn(responder.serve(responder_stop.clone()));

    info!(
        api_base = %state.api_base,
        rate = state.rate.get(),
        max_clients = state.registry.max_clients(),
        "Starting load run"
    );

    let scheduler = Scheduler::new(
        Arc::new(Dispatcher::new(state.clone())),
        state.rate.clone(),
        SchedulerConfig::from(&config.load),
    );
    let summary = scheduler.run(stop).await;

    // The responder outlives every cycle that might still be validated
    responder_stop.cancel();
    match responder_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Challenge responder stopped with an error"),
        Err(e) => warn!(error = %e, "Challenge responder task panicked"),
    }

    Ok(LoadReport::new(
        summary,
        state.registry.size(),
        state.latency.snapshot(),
    ))
}
