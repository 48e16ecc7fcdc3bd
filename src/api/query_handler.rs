use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::AppState;
use crate::error::ApiResult;
use crate::models::{Intent, QueryRequest, QueryResponse, StoreSelection};
use crate::query::classifier;

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Liveness check", body = String)),
    tag = "System"
)]
pub async fn liveness() -> &'static str {
    "floatchat is running"
}

/// Natural-language query endpoint (spec §6). Classifies intent, routes to
/// SQL, vector, or hybrid retrieval, and attaches a short narrated summary.
#[utoipa::path(
    post,
    path = "/",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Query answered", body = QueryResponse),
        (status = 500, description = "Server fault")
    ),
    tag = "Query"
)]
pub async fn answer_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<QueryResponse>> {
    let (intent, entities) = classifier::classify(&request.query, &state.gazetteer);

    let outcome = state.query_executor.execute(intent, &entities, StoreSelection::Dev).await?;

    let message = state.narrator.narrate(intent, &entities, outcome.table_data.as_ref()).await;

    let has_data = outcome.table_data.as_ref().map(|t| t.total_rows > 0).unwrap_or(false);
    let show_map = outcome.map_data.is_some();

    Ok(Json(QueryResponse {
        status: "ok".to_string(),
        message,
        query_type: intent.as_str().to_string(),
        has_data,
        show_map,
        table_data: outcome.table_data,
        map_data: outcome.map_data,
    }))
}

#[allow(dead_code)]
fn is_data_intent(intent: Intent) -> bool {
    intent != Intent::Informational
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn informational_intent_is_not_a_data_intent() {
        assert!(!is_data_intent(Intent::Informational));
        assert!(is_data_intent(Intent::Spatial));
    }
}
