//! Chat relay to the AI upstream.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};
use garde::Validate;
use shared::api::{ChatPayload, ChatResponse};

use crate::{
    error::AppError, handlers::admit, middleware::client::ClientKey, state::AppState,
    stores::Category,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}

async fn chat(
    ClientKey(client): ClientKey,
    State(state): State<AppState>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    admit(&state, &client, Category::Chat)?;

    let Json(payload) = payload.map_err(AppError::bad_body)?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let reply = state
        .chat
        .send(&payload.message)
        .await
        .map_err(AppError::chat)?;

    tracing::info!(client, attempts = reply.attempts, "chat answered");

    Ok(Json(ChatResponse {
        success: true,
        response: reply.text,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ChatError, MockChatUpstream};
    use crate::test_utils::{TestStateBuilder, response_json};
    use axum::http::StatusCode;
    use std::time::Duration;

    fn client(ip: &str) -> ClientKey {
        ClientKey(ip.to_string())
    }

    fn message(text: &str) -> Result<Json<ChatPayload>, JsonRejection> {
        Ok(Json(ChatPayload {
            message: text.to_string(),
        }))
    }

    #[tokio::test]
    async fn returns_upstream_reply() {
        let mut upstream = MockChatUpstream::new();
        upstream
            .expect_send()
            .withf(|_, message| message.to_string() == "hello")
            .times(1)
            .returning(|_, _| Ok("hi!".to_string()));

        let state = TestStateBuilder::new().with_chat_upstream(upstream).build();

        let response = chat(client("a"), State(state), message("hello"))
            .await
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response_json(response).await,
            serde_json::json!({ "success": true, "response": "hi!" })
        );
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_calling_upstream() {
        let state = TestStateBuilder::new()
            .with_chat_upstream(MockChatUpstream::new())
            .build();

        let result = chat(client("a"), State(state), message("")).await;

        assert_eq!(
            result.err().unwrap().into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn chat_rate_limit_scenario() {
        let mut upstream = MockChatUpstream::new();
        upstream
            .expect_send()
            .times(2)
            .returning(|_, _| Ok("ok".to_string()));

        let builder = TestStateBuilder::new().with_chat_upstream(upstream);
        let clock = builder.clock();
        let state = builder.build();

        assert!(chat(client("A"), State(state.clone()), message("1")).await.is_ok());

        clock.advance(Duration::from_secs(1));
        let rejected = chat(client("A"), State(state.clone()), message("2"))
            .await
            .err()
            .unwrap()
            .into_response();
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rejected.headers()["retry-after"], "1");

        clock.advance(Duration::from_millis(1100));
        assert!(chat(client("A"), State(state), message("3")).await.is_ok());
    }

    #[tokio::test]
    async fn exhausted_credentials_return_503() {
        let mut upstream = MockChatUpstream::new();
        upstream
            .expect_send()
            .times(2)
            .returning(|_, _| Err(ChatError::QuotaExceeded));

        let state = TestStateBuilder::new()
            .with_credentials(&["k1", "k2"])
            .with_chat_upstream(upstream)
            .build();

        let response = chat(client("a"), State(state), message("hello"))
            .await
            .err()
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn upstream_rejection_returns_502() {
        let mut upstream = MockChatUpstream::new();
        upstream
            .expect_send()
            .times(1)
            .returning(|_, _| Err(ChatError::Status(500)));

        let state = TestStateBuilder::new()
            .with_credentials(&["k1", "k2"])
            .with_chat_upstream(upstream)
            .build();

        let response = chat(client("a"), State(state), message("hello"))
            .await
            .err()
            .unwrap()
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
