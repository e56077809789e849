pub mod types;
pub mod auth;
pub mod socketio;
pub mod websocket;

pub use types::*;
pub use auth::AccountSigner;
pub use websocket::MarkPriceStream;
