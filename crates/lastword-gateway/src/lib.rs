// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Lastword engine.
//!
//! Exposes processing cycles, schedule maintenance, check-ins and panic
//! signals as a small JSON API. The gateway holds no scheduling state of its
//! own; every route is a thin call into a shared [`Engine`](lastword_scheduler::Engine).

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, router, start_server};

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::Duration;
    use lastword_test_utils::TestHarness;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn call(
        app: axum::Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn app(harness: &TestHarness, token: Option<&str>) -> axum::Router {
        router(
            GatewayState::new(harness.engine.clone()),
            AuthConfig {
                bearer_token: token.map(str::to_string),
            },
        )
    }

    #[tokio::test]
    async fn health_is_public() {
        let harness = TestHarness::builder().build().await.unwrap();
        let (status, body) = call(app(&harness, Some("t")), "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn v1_routes_require_the_configured_token() {
        let harness = TestHarness::builder().build().await.unwrap();
        let (status, _) = call(app(&harness, Some("t")), "GET", "/v1/stats", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) =
            call(app(&harness, Some("t")), "GET", "/v1/stats", None, Some("t")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["due_count"], 0);
    }

    #[tokio::test]
    async fn process_without_body_runs_a_cycle() {
        let harness = TestHarness::builder().build().await.unwrap();
        harness.arm_check_in("m1", 1, vec![]).await.unwrap();
        harness.advance(Duration::hours(1));

        let (status, body) = call(app(&harness, None), "POST", "/v1/process", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processed"], 1);
        assert_eq!(body["succeeded"], 1);
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn process_with_debug_includes_details() {
        let harness = TestHarness::builder().build().await.unwrap();
        harness.arm_check_in("m1", 1, vec![]).await.unwrap();

        let (status, body) = call(
            app(&harness, None),
            "POST",
            "/v1/process",
            Some(json!({"message_id": "m1", "force_send": true, "debug": true})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["details"][0]["message_id"], "m1");
        assert_eq!(body["details"][0]["outcome"], "sent");
    }

    #[tokio::test]
    async fn check_in_on_unknown_message_is_not_found() {
        let harness = TestHarness::builder().build().await.unwrap();
        let (status, body) = call(
            app(&harness, None),
            "POST",
            "/v1/messages/nope/check-in",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "not_found");
    }

    #[tokio::test]
    async fn check_in_returns_the_new_deadline() {
        let harness = TestHarness::builder().build().await.unwrap();
        harness.arm_check_in("m1", 24, vec![60]).await.unwrap();
        harness.advance(Duration::hours(3));

        let (status, body) = call(
            app(&harness, None),
            "POST",
            "/v1/messages/m1/check-in",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let deadline: chrono::DateTime<chrono::Utc> =
            serde_json::from_value(body["deadline"].clone()).unwrap();
        assert_eq!(deadline, harness.now() + Duration::hours(24));
    }

    #[tokio::test]
    async fn panic_without_conditions_reports_none_active() {
        let harness = TestHarness::builder().build().await.unwrap();
        let (status, body) = call(
            app(&harness, None),
            "POST",
            "/v1/panic",
            Some(json!({"user_id": "owner-1"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "no_active_condition");
    }
}
