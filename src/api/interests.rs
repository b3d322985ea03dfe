use axum::extract::State;
use axum::Json;

use crate::error::Result;
use crate::models::InterestProfile;

use super::ApiState;

pub async fn get_interests(State(state): State<ApiState>) -> Result<Json<InterestProfile>> {
    Ok(Json(state.interests.load()?))
}

/// Save the profile; a structural topic change arms the rescore
/// coordinator for the next background cycle.
pub async fn put_interests(
    State(state): State<ApiState>,
    Json(profile): Json<InterestProfile>,
) -> Result<Json<serde_json::Value>> {
    state.interests.save(&state.repo, &profile).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
