pub mod chat;
pub mod frames;
pub mod http;
pub mod state;
pub mod ws;

pub use state::AppState;
