use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::{error_response, AppState};
use crate::models::server::referrals::SetActiveRequest;
use crate::services::referrals::ReferralRequest;

pub async fn get_user(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> impl IntoResponse {
    let result = state
        .dispatch(|response| ReferralRequest::GetUser { wallet, response })
        .await;

    match result {
        Ok(user) => (StatusCode::OK, Json(json!(user))),
        Err(e) => error_response(e),
    }
}

pub async fn set_user_active(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
    body: Result<Json<SetActiveRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(rejection.into()),
    };

    let result = state
        .dispatch(|response| ReferralRequest::SetUserActive {
            wallet,
            active: req.active,
            response,
        })
        .await;

    match result {
        Ok(user) => (StatusCode::OK, Json(json!(user))),
        Err(e) => error_response(e),
    }
}

pub async fn list_invitations(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> impl IntoResponse {
    let result = state
        .dispatch(|response| ReferralRequest::ListInvitations { wallet, response })
        .await;

    match result {
        Ok(invitations) => (StatusCode::OK, Json(json!(invitations))),
        Err(e) => error_response(e),
    }
}

pub async fn list_rewards(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> impl IntoResponse {
    let result = state
        .dispatch(|response| ReferralRequest::ListRewards { wallet, response })
        .await;

    match result {
        Ok(rewards) => (StatusCode::OK, Json(json!(rewards))),
        Err(e) => error_response(e),
    }
}

pub async fn audit_user(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> impl IntoResponse {
    let result = state
        .dispatch(|response| ReferralRequest::AuditUser { wallet, response })
        .await;

    match result {
        Ok(report) => (StatusCode::OK, Json(json!(report))),
        Err(e) => error_response(e),
    }
}
