pub mod pokedex;
pub mod rankings;
pub mod response;
pub mod snapshot;
