mod api;
mod config;
mod game;
mod view;

pub use api::*;
pub use config::*;
pub use game::*;
pub use view::*;
