// Profile persistence worker. Store I/O happens here so the tick never awaits it.

use super::types::GameEvent;
use crate::domain::{ProfileRequest, ProfileStore};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub async fn profile_worker(
    store: Arc<dyn ProfileStore>,
    mut requests: mpsc::Receiver<ProfileRequest>,
    input_tx: mpsc::Sender<GameEvent>,
) {
    while let Some(request) = requests.recv().await {
        match request {
            ProfileRequest::Load { player_id } => match store.load(player_id).await {
                Ok(Some(profile)) => {
                    // Loaded profiles re-enter through the world's regular input channel.
                    if input_tx
                        .send(GameEvent::ProfileLoaded { player_id, profile })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(None) => debug!(player_id, "no stored profile; keeping defaults"),
                Err(e) => warn!(player_id, error = ?e, "profile load failed; keeping defaults"),
            },
            ProfileRequest::Save(profile) => {
                let player_id = profile.account_id;
                if let Err(e) = store.save(profile).await {
                    warn!(player_id, error = ?e, "profile save failed");
                }
            }
        }
    }
    debug!("profile worker exiting");
}
