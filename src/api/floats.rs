//! Read-only spatial/profile API (C10, spec §4.10, §6). Thin, hand-written
//! wrappers over the relational store — bypasses C6-C9 entirely.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::{FloatDetail, FloatRadiusRow, TrajectoryPoint};

const INDIAN_OCEAN_BBOX: (f64, f64, f64, f64) = (-40.0, 30.0, 20.0, 120.0);
const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct RadiusParams {
    pub lat: f64,
    pub lon: f64,
    pub radius: f64,
    pub limit: Option<i64>,
}

fn validate_radius_params(lat: f64, lon: f64, radius: f64) -> ApiResult<()> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ApiError::InvalidParameter(format!("lat {lat} out of bounds [-90, 90]")));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(ApiError::InvalidParameter(format!("lon {lon} out of bounds [-180, 180]")));
    }
    if radius <= 0.0 {
        return Err(ApiError::InvalidParameter(format!("radius {radius} must be positive")));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/floats/radius",
    params(("lat" = f64, Query), ("lon" = f64, Query), ("radius" = f64, Query), ("limit" = Option<i64>, Query)),
    responses((status = 200, description = "Floats within radius", body = Vec<FloatRadiusRow>)),
    tag = "Floats"
)]
pub async fn radius(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RadiusParams>,
) -> ApiResult<Json<Vec<FloatRadiusRow>>> {
    validate_radius_params(params.lat, params.lon, params.radius)?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);

    let rows = state.dev_store.profiles_within_radius(params.lat, params.lon, params.radius, limit).await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/floats/indian-ocean",
    params(("limit" = Option<i64>, Query)),
    responses((status = 200, description = "Floats in the Indian Ocean bounding box", body = Vec<FloatRadiusRow>)),
    tag = "Floats"
)]
pub async fn indian_ocean(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let (lat_min, lat_max, lon_min, lon_max) = INDIAN_OCEAN_BBOX;

    let profiles = state.dev_store.profiles_in_bbox(lat_min, lat_max, lon_min, lon_max, limit).await?;
    Ok(Json(profiles.into_iter().map(|p| serde_json::json!(p)).collect()))
}

#[utoipa::path(
    get,
    path = "/floats/all",
    params(("limit" = Option<i64>, Query)),
    responses((status = 200, description = "All floats in the dev snapshot", body = Vec<FloatRadiusRow>)),
    tag = "Floats"
)]
pub async fn all_floats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let profiles = state.dev_store.profiles_in_bbox(-90.0, 90.0, -180.0, 180.0, limit).await?;
    Ok(Json(profiles.into_iter().map(|p| serde_json::json!(p)).collect()))
}

#[derive(Debug, Deserialize)]
pub struct DepthWindowParams {
    pub min_depth: Option<f64>,
    pub max_depth: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/floats/{float_id}",
    params(("float_id" = String, Path), ("min_depth" = Option<f64>, Query), ("max_depth" = Option<f64>, Query)),
    responses(
        (status = 200, description = "Float detail", body = FloatDetail),
        (status = 404, description = "Unknown float")
    ),
    tag = "Floats"
)]
pub async fn float_detail(
    State(state): State<Arc<AppState>>,
    Path(float_id): Path<String>,
    Query(params): Query<DepthWindowParams>,
) -> ApiResult<Json<FloatDetail>> {
    let detail = state.dev_store.float_detail(&float_id, params.min_depth, params.max_depth).await?;
    detail.map(Json).ok_or_else(|| ApiError::NotFound(format!("unknown float: {float_id}")))
}

#[utoipa::path(
    get,
    path = "/floats/trajectories/radius",
    params(("lat" = f64, Query), ("lon" = f64, Query), ("radius" = f64, Query), ("limit" = Option<i64>, Query)),
    responses((status = 200, description = "Trajectory points, group by floatId client-side", body = Vec<TrajectoryPoint>)),
    tag = "Floats"
)]
pub async fn trajectories_radius(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RadiusParams>,
) -> ApiResult<Json<serde_json::Value>> {
    validate_radius_params(params.lat, params.lon, params.radius)?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);

    let points =
        state.dev_store.trajectories_within_radius(params.lat, params.lon, params.radius, limit).await?;
    Ok(Json(serde_json::json!({ "trajectories": points })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_latitude_out_of_bounds() {
        assert!(validate_radius_params(200.0, 70.0, 100.0).is_err());
    }

    #[test]
    fn rejects_non_positive_radius() {
        assert!(validate_radius_params(15.0, 70.0, 0.0).is_err());
    }

    #[test]
    fn accepts_valid_params() {
        assert!(validate_radius_params(15.0, 70.0, 100.0).is_ok());
    }
}
