pub mod enrich;
pub mod identity;
pub mod normalize;
pub mod player_data;
pub mod pokedex;
pub mod rankings;
