use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::{referrals::ReferralRequest, ServiceError};

mod referrals;
mod users;

#[derive(Clone)]
pub struct AppState {
    referral_channel: mpsc::Sender<ReferralRequest>,
}

impl AppState {
    pub fn new(referral_channel: mpsc::Sender<ReferralRequest>) -> Self {
        AppState { referral_channel }
    }

    /// Sends a request to the referral service and waits for its reply.
    async fn dispatch<T>(
        &self,
        request: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> ReferralRequest,
    ) -> Result<T, ServiceError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.referral_channel
            .send(request(response_tx))
            .await
            .map_err(|e| ServiceError::Communication("HTTP => Referral".to_string(), e.to_string()))?;

        response_rx
            .await
            .map_err(|e| ServiceError::Communication("Referral => HTTP".to_string(), e.to_string()))?
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

fn error_response(error: ServiceError) -> (StatusCode, Json<Value>) {
    let status = match &error {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::Persistence(_) | ServiceError::Communication(..) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("Request failed: {}", error);
        return (
            status,
            Json(json!({
                "success": false,
                "description": "Internal server error. Please try again."
            })),
        );
    }

    (
        status,
        Json(json!({"success": false, "description": error.to_string()})),
    )
}

async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let result = state
        .dispatch(|response| ReferralRequest::DashboardStats { response })
        .await;

    match result {
        Ok(stats) => (StatusCode::OK, Json(json!(stats))),
        Err(e) => error_response(e),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/referrals/register", post(referrals::register))
        .route("/users/{wallet}", get(users::get_user))
        .route("/users/{wallet}/active", put(users::set_user_active))
        .route("/users/{wallet}/invitations", get(users::list_invitations))
        .route("/users/{wallet}/rewards", get(users::list_rewards))
        .route("/users/{wallet}/audit", get(users::audit_user))
        .route("/stats", get(get_stats))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    listen: &str,
    referral_channel: mpsc::Sender<ReferralRequest>,
) -> Result<(), anyhow::Error> {
    let app = router(AppState::new(referral_channel));

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::models::rewards::RewardSchedule;
    use crate::repositories::memory::MemoryStore;
    use crate::services::referrals::{ReferralEngine, ReferralRequestHandler, ReferralService};
    use crate::services::Service;

    fn wallet(n: u32) -> String {
        format!("0x{:040x}", n)
    }

    fn test_app() -> Router {
        let (referral_tx, mut referral_rx) = mpsc::channel(16);
        let engine = Arc::new(ReferralEngine::new(
            Arc::new(MemoryStore::new()),
            RewardSchedule::default(),
        ));
        let handler = ReferralRequestHandler::new(engine);

        tokio::spawn(async move {
            ReferralService::new().run(handler, &mut referral_rx).await;
        });

        router(AppState::new(referral_tx))
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                builder = builder.header("content-type", "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, json)
    }

    async fn register(app: &Router, new_user: u32, inviter: Option<u32>) -> (StatusCode, Value) {
        call(
            app,
            Method::POST,
            "/referrals/register",
            Some(json!({
                "newUserWallet": wallet(new_user),
                "inviterWallet": inviter.map(wallet),
            })),
        )
        .await
    }

    #[tokio::test]
    async fn test_register_then_repeat() {
        let app = test_app();

        let (status, body) = register(&app, 1, None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["created"], true);
        assert_eq!(body["user"]["angelBalance"], 100);

        let (status, body) = register(&app, 1, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["created"], false);
    }

    #[tokio::test]
    async fn test_register_with_invite_path() {
        let app = test_app();
        register(&app, 1, None).await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/referrals/register",
            Some(json!({
                "newUserWallet": wallet(2),
                "invitePath": format!("/invite/{}", wallet(1)),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["referral"]["status"], "applied");
        assert_eq!(body["referral"]["levelsPaid"], 1);

        let (status, body) = call(&app, Method::GET, &format!("/users/{}/invitations", wallet(1)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["status"], "accepted");
    }

    #[tokio::test]
    async fn test_register_invalid_wallet() {
        let app = test_app();

        let (status, body) = call(
            &app,
            Method::POST,
            "/referrals/register",
            Some(json!({"newUserWallet": "0xZZZZ"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (_, stats) = call(&app, Method::GET, "/stats", None).await;
        assert_eq!(stats["totalUsers"], 0);
    }

    #[tokio::test]
    async fn test_malformed_body_gets_json_error() {
        let app = test_app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/referrals/register")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"newUserWallet\": "))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["description"].as_str().is_some());

        let (status, body) = call(&app, Method::POST, "/referrals/register", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        register(&app, 1, None).await;
        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/users/{}/active", wallet(1)),
            Some(json!({"active": "no"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_user_queries() {
        let app = test_app();
        register(&app, 1, None).await;
        register(&app, 2, Some(1)).await;

        let (status, body) = call(&app, Method::GET, &format!("/users/{}", wallet(1)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["angelBalance"], 150);
        assert_eq!(body["invitesCount"], 1);

        let (status, body) = call(&app, Method::GET, &format!("/users/{}/rewards", wallet(1)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["rewardType"], "welcome");
        assert_eq!(body[1]["rewardType"], "referral_l1");

        let (status, body) = call(&app, Method::GET, &format!("/users/{}/audit", wallet(1)), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["consistent"], true);

        let (status, body) = call(&app, Method::GET, "/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["totalUsers"], 2);
        assert_eq!(body["totalInvitations"], 1);
        assert_eq!(body["totalDistributed"], 250);

        let (status, _) = call(&app, Method::GET, &format!("/users/{}", wallet(9)), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_set_user_active() {
        let app = test_app();
        register(&app, 1, None).await;

        let (status, body) = call(
            &app,
            Method::PUT,
            &format!("/users/{}/active", wallet(1)),
            Some(json!({"active": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isActive"], false);
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
