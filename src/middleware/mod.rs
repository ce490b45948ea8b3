pub mod catcher;
pub mod governor;
