use std::sync::Arc;

use serde_json::{json, Value};
use tracing::error;

use crate::model::response::{ApiStatus, ResponseWithStatus};
use crate::services::identity::IdentityService;
use crate::services::player_data::{PlayerDataService, UploadOutcome};
use crate::services::pokedex::PokedexService;
use crate::services::rankings::RankingService;
use crate::util::message;

pub async fn save_player_data(
    players: &Arc<PlayerDataService>,
    rankings: &Arc<RankingService>,
    payload: &Value,
) -> ResponseWithStatus {
    match players.save_player_data(payload).await {
        Ok(UploadOutcome::Saved { player_id, .. }) => {
            if let Err(err) = rankings.update_for_player(&player_id).await {
                error!(error = %err, "ranking update after upload failed");
            }
            ResponseWithStatus::new(ApiStatus::Ok, message::MESSAGE_DATA_SAVED.to_string(), None)
        }
        Ok(UploadOutcome::ConnectionTest) => ResponseWithStatus::new(
            ApiStatus::Ok,
            message::MESSAGE_CONNECTION_TEST.to_string(),
            None,
        ),
        Ok(UploadOutcome::MissingFields) => ResponseWithStatus::new(
            ApiStatus::BadRequest,
            message::MESSAGE_MISSING_FIELDS.to_string(),
            None,
        ),
        Err(err) => {
            error!(error = %err, "saving snapshot failed");
            ResponseWithStatus::new(
                ApiStatus::InternalServerError,
                message::MESSAGE_INTERNAL_SERVER_ERROR.to_string(),
                None,
            )
        }
    }
}

pub async fn get_rankings(rankings: &Arc<RankingService>) -> ResponseWithStatus {
    match rankings.get_rankings().await {
        Ok(doc) => ResponseWithStatus::new(
            ApiStatus::Ok,
            message::MESSAGE_RANKINGS_READY.to_string(),
            Some(json!(doc)),
        ),
        Err(err) => {
            error!(error = %err, "serving rankings failed");
            ResponseWithStatus::new(
                ApiStatus::InternalServerError,
                message::MESSAGE_INTERNAL_SERVER_ERROR.to_string(),
                None,
            )
        }
    }
}

pub async fn get_public_data(
    players: &Arc<PlayerDataService>,
    identity: &Arc<IdentityService>,
    pokedex: &Arc<PokedexService>,
) -> ResponseWithStatus {
    let dex = pokedex.data().await;
    match players.get_public_player_summaries(&dex, identity).await {
        Ok(summaries) => ResponseWithStatus::new(
            ApiStatus::Ok,
            message::MESSAGE_PUBLIC_DATA.to_string(),
            Some(json!(summaries)),
        ),
        Err(err) => {
            error!(error = %err, "serving public summaries failed");
            ResponseWithStatus::new(
                ApiStatus::InternalServerError,
                message::MESSAGE_INTERNAL_SERVER_ERROR.to_string(),
                None,
            )
        }
    }
}

pub async fn get_player_detail(
    players: &Arc<PlayerDataService>,
    identity: &Arc<IdentityService>,
    pokedex: &Arc<PokedexService>,
    public_id: &str,
) -> ResponseWithStatus {
    let Some(internal_id) = identity.internal_id_for(public_id).await else {
        return not_found();
    };
    let dex = pokedex.data().await;
    match players.get_player_detail(&internal_id, &dex).await {
        Ok(Some(detail)) => ResponseWithStatus::new(
            ApiStatus::Ok,
            message::MESSAGE_PLAYER_DATA.to_string(),
            Some(json!(detail)),
        ),
        Ok(None) => not_found(),
        Err(err) => {
            error!(error = %err, "serving player detail failed");
            ResponseWithStatus::new(
                ApiStatus::InternalServerError,
                message::MESSAGE_INTERNAL_SERVER_ERROR.to_string(),
                None,
            )
        }
    }
}

pub async fn get_private_player_data(
    players: &Arc<PlayerDataService>,
    identity: &Arc<IdentityService>,
    pokedex: &Arc<PokedexService>,
    public_id: &str,
) -> ResponseWithStatus {
    let Some(internal_id) = identity.internal_id_for(public_id).await else {
        return not_found();
    };
    let dex = pokedex.data().await;
    match players.get_private_player_data(&internal_id, &dex).await {
        Ok(Some(data)) => ResponseWithStatus::new(
            ApiStatus::Ok,
            message::MESSAGE_PLAYER_DATA.to_string(),
            Some(data),
        ),
        Ok(None) => not_found(),
        Err(err) => {
            error!(error = %err, "serving private player data failed");
            ResponseWithStatus::new(
                ApiStatus::InternalServerError,
                message::MESSAGE_INTERNAL_SERVER_ERROR.to_string(),
                None,
            )
        }
    }
}

fn not_found() -> ResponseWithStatus {
    ResponseWithStatus::new(
        ApiStatus::NotFound,
        message::MESSAGE_PLAYER_NOT_FOUND.to_string(),
        None,
    )
}

pub async fn get_health(pokedex: &Arc<PokedexService>) -> ResponseWithStatus {
    let health = pokedex.health().await;
    ResponseWithStatus::new(
        ApiStatus::Ok,
        message::MESSAGE_HEALTH_STATUS.to_string(),
        Some(json!(health)),
    )
}
