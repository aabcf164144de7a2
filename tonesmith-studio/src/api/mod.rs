//! HTTP API handlers for the studio service

pub mod callback;
pub mod health;
pub mod stream;
pub mod tracks;
pub mod webhook;

pub use callback::callback_routes;
pub use health::health_routes;
pub use stream::stream_routes;
pub use tracks::track_routes;
pub use webhook::webhook_routes;
