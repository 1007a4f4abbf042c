use axum::{
    Router,
    extract::{FromRequest, FromRequestParts},
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{error::AppError, state::SharedState};

pub mod docs;
pub mod game;
pub mod health;
pub mod sse;
pub mod websocket;

/// JSON body extractor whose rejections use the API error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Query extractor whose rejections use the API error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// `?gameId=` parameter of the query-string routes.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct GameIdQuery {
    /// Game identifier, case-insensitive.
    pub game_id: Option<String>,
}

/// Compose all route trees and answer unknown paths and methods with the error envelope.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(game::router())
        .merge(sse::router())
        .merge(websocket::router())
        .merge(docs::router())
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed);

    api_router.with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("Not found".into())
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
