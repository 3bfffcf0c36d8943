use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::store::{DailyActivity, UserStats};
use crate::AppState;

/// Aggregated KPI counters for one user's dashboard.
pub async fn get_user_kpis(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Json<UserStats> {
    Json(state.store.kpis(&user_id).await)
}

/// Daily activity log backing the streak heatmap.
pub async fn get_user_activity(
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Json<Vec<DailyActivity>> {
    Json(state.store.activity(&user_id).await)
}
