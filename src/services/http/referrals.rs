use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::{error_response, AppState};
use crate::models::server::referrals::RegisterRequest;
use crate::services::referrals::ReferralRequest;

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(rejection.into()),
    };
    let inviter_wallet = req.inviter_hint();

    let result = state
        .dispatch(|response| ReferralRequest::Register {
            new_user_wallet: req.new_user_wallet,
            inviter_wallet,
            response,
        })
        .await;

    match result {
        Ok(outcome) => {
            let status = if outcome.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };

            (
                status,
                Json(json!({
                    "success": true,
                    "created": outcome.created,
                    "referral": outcome.referral,
                    "user": outcome.user,
                    "rewards": outcome.rewards,
                })),
            )
        }
        Err(e) => error_response(e),
    }
}
