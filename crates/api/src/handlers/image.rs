//! Image generation.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use garde::Validate;
use shared::api::{ImagePayload, ImageResponse};

use crate::{
    error::AppError, handlers::admit, middleware::client::ClientKey, services::random_seed,
    state::AppState, stores::Category,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/generate-image", post(generate_image))
}

async fn generate_image(
    ClientKey(client): ClientKey,
    State(state): State<AppState>,
    payload: Result<Json<ImagePayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    admit(&state, &client, Category::Image)?;

    let Json(payload) = payload.map_err(AppError::bad_body)?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let png = match state.image.generate(&payload.prompt, random_seed()).await {
        Ok(png) => png,
        Err(e) => {
            tracing::error!(error = %state.redactor.scrub_error(&e), "image generation failed");
            return Err(AppError::image(e));
        }
    };

    let preview: String = payload.prompt.chars().take(50).collect();
    tracing::info!(prompt = %preview, bytes = png.len(), "image generated");

    Ok(Json(ImageResponse {
        success: true,
        image: format!("data:image/png;base64,{}", STANDARD.encode(&png)),
    }))
}
