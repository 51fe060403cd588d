pub mod routes;
pub mod slack;
pub mod state;

use axum::{routing::post, Router};

pub use state::BotState;

pub fn bot_routes() -> Router<BotState> {
    Router::new()
        .route("/slack/events", post(routes::events::slack_events))
        .route(
            "/slack/interactions",
            post(routes::interactions::slack_interactions),
        )
}
