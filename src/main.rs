#[macro_use]
extern crate rocket;
extern crate lazy_static;

mod api;
mod config;
mod model;
mod middleware;
mod services;
mod util;

use std::sync::Arc;

use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{Json, Value};
use rocket::State;
use rocket_governor::RocketGovernor;
use tracing::info;

use api::wrapper;
use config::Config;
use middleware::{
    catcher::{exceed_rate_limit, internal_server_error, not_found},
    governor::RateLimitGuard,
};
use model::response::{Response, ResponseWithStatus};
use services::identity::IdentityService;
use services::player_data::PlayerDataService;
use services::pokedex::PokedexService;
use services::rankings::RankingService;

fn respond(r: ResponseWithStatus) -> status::Custom<Json<Response>> {
    status::Custom(Status::from_code(r.status_code).unwrap(), Json(r.response))
}

#[get("/")]
async fn index() -> &'static str {
    "POST /api/save-data\n\
     GET  /api/rankings\n\
     GET  /api/public-data\n\
     GET  /api/player-detail/<public_id>\n\
     GET  /api/my-data/<public_id>\n\
     GET  /api/health"
}

#[post("/api/save-data", format = "json", data = "<payload>")]
async fn save_data(
    _limitguard: RocketGovernor<'_, RateLimitGuard>,
    players: &State<Arc<PlayerDataService>>,
    rankings: &State<Arc<RankingService>>,
    payload: Json<Value>,
) -> status::Custom<Json<Response>> {
    respond(wrapper::save_player_data(players, rankings, &payload).await)
}

#[get("/api/rankings")]
async fn get_rankings(
    _limitguard: RocketGovernor<'_, RateLimitGuard>,
    rankings: &State<Arc<RankingService>>,
) -> status::Custom<Json<Response>> {
    respond(wrapper::get_rankings(rankings).await)
}

#[get("/api/public-data")]
async fn get_public_data(
    _limitguard: RocketGovernor<'_, RateLimitGuard>,
    players: &State<Arc<PlayerDataService>>,
    identity: &State<Arc<IdentityService>>,
    pokedex: &State<Arc<PokedexService>>,
) -> status::Custom<Json<Response>> {
    respond(wrapper::get_public_data(players, identity, pokedex).await)
}

#[get("/api/player-detail/<public_id>")]
async fn get_player_detail(
    _limitguard: RocketGovernor<'_, RateLimitGuard>,
    players: &State<Arc<PlayerDataService>>,
    identity: &State<Arc<IdentityService>>,
    pokedex: &State<Arc<PokedexService>>,
    public_id: &str,
) -> status::Custom<Json<Response>> {
    respond(wrapper::get_player_detail(players, identity, pokedex, public_id).await)
}

#[get("/api/my-data/<public_id>")]
async fn get_my_data(
    _limitguard: RocketGovernor<'_, RateLimitGuard>,
    players: &State<Arc<PlayerDataService>>,
    identity: &State<Arc<IdentityService>>,
    pokedex: &State<Arc<PokedexService>>,
    public_id: &str,
) -> status::Custom<Json<Response>> {
    respond(wrapper::get_private_player_data(players, identity, pokedex, public_id).await)
}

#[get("/api/health")]
async fn get_health(
    _limitguard: RocketGovernor<'_, RateLimitGuard>,
    pokedex: &State<Arc<PokedexService>>,
) -> status::Custom<Json<Response>> {
    respond(wrapper::get_health(pokedex).await)
}

#[rocket::main]
async fn main() -> Result<(), rocket::Error> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = Config::from_env();

    let pokedex = Arc::new(PokedexService::new(cfg.clone()));
    pokedex
        .initialize()
        .await
        .expect("failed to initialize the reference data cache");
    pokedex.schedule_daily_updates();

    let players = Arc::new(PlayerDataService::new(cfg.clone()));
    let known_ids = players
        .read_users()
        .await
        .expect("failed to read the user registry")
        .into_iter()
        .map(|u| u.player_id)
        .collect();
    let identity = Arc::new(IdentityService::new(&cfg));
    identity
        .initialize(known_ids)
        .await
        .expect("failed to initialize the public id map");

    let rankings = Arc::new(RankingService::new(
        cfg,
        players.clone(),
        identity.clone(),
        pokedex.clone(),
    ));
    rankings
        .initialize()
        .await
        .expect("failed to build the initial ranking document");

    info!("starting http server");
    let _rocket = rocket::build()
        .mount("/", routes![
            index, save_data, get_rankings, get_public_data, get_player_detail, get_my_data,
            get_health
        ])
        .register("/", catchers![
            not_found, exceed_rate_limit, internal_server_error
        ])
        .manage(players)
        .manage(identity)
        .manage(pokedex)
        .manage(rankings)
        .launch()
        .await?;
    Ok(())
}
