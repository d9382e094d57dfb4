use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{member_store::MemberStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a member store connected; games keep running in degraded mode while it is not.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn MemberStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_member_store(store.clone()).await;
                info!("member store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch_store(&state, store.as_ref()).await;
                warn!("member store lost; connecting from scratch");
            }
            Err(err) => warn!(error = %err, "member store connection attempt failed"),
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll the store until it stays unreachable after every reconnect attempt.
async fn watch_store(state: &SharedState, store: &dyn MemberStore) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded().await {
                info!("member store healthy again; leaving degraded mode");
                state.update_degraded(false).await;
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        if !reconnect(state, store).await {
            warn!("exhausted member store reconnect attempts; staying in degraded mode");
            return;
        }
        state.update_degraded(false).await;
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(state: &SharedState, store: &dyn MemberStore) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "member store reconnected after a failed health check");
                return true;
            }
            Err(err) if attempt == 0 => {
                warn!(attempt, error = %err, "member store reconnect failed; entering degraded mode");
                state.update_degraded(true).await;
            }
            Err(err) => warn!(attempt, error = %err, "member store reconnect failed"),
        }
        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
    false
}
