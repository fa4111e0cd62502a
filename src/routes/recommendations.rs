use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{GetRecommendations, RecommendationReply},
    routes::AppState,
};

/// Handler for recommendations endpoint
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<GetRecommendations>, JsonRejection>,
) -> AppResult<Json<RecommendationReply>> {
    let Json(call) = match payload {
        Ok(call) => call,
        Err(rejection) => {
            tracing::info!(
                request_id = %request_id,
                reason = %rejection.body_text(),
                "Rejected undecodable recommendation request"
            );
            let reply = state.service.reject_undecodable(rejection.body_text());
            return Err(AppError::from_reply(reply)
                .unwrap_or_else(|| AppError::BadRequest("invalid request body".to_string())));
        }
    };

    tracing::info!(
        request_id = %request_id,
        count = call.count,
        exclusions = call.exclusion_ids.len(),
        "Processing recommendation request"
    );

    let reply = state.service.get_recommendations(call).await;

    tracing::info!(
        request_id = %request_id,
        status = %reply.status,
        returned = reply.product_ids.len(),
        "Recommendation request completed"
    );

    if reply.status.is_success() {
        Ok(Json(reply))
    } else {
        Err(AppError::from_reply(reply)
            .unwrap_or_else(|| AppError::Internal("unmapped reply status".to_string())))
    }
}
