//! Dashboard Device List Route
//!
//! Read-only view over the latest-state projection, ordered by most
//! recently updated. The caller may lower the row limit; the server caps it.

use axum::{
    extract::{Query, State},
    Json,
};

use crate::constants::MAX_DEVICE_LIST_LIMIT;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{ApiResponse, DeviceListData, ListDevicesQuery};

/// GET /api/v1/devices - List device latest states
#[utoipa::path(
    get,
    path = "/api/v1/devices",
    tag = "Devices",
    params(ListDevicesQuery),
    responses(
        (status = 200, description = "Latest state per device, most recently updated first", body = ApiResponse<DeviceListData>),
        (status = 401, description = "Missing or invalid API key", body = ApiError),
        (status = 503, description = "Storage unavailable", body = ApiError),
    ),
    security(("api_key" = []))
)]
pub async fn list_devices(
    State(state): State<AppState>,
    Query(query): Query<ListDevicesQuery>,
) -> ApiResult<Json<ApiResponse<DeviceListData>>> {
    let limit = query
        .limit
        .unwrap_or(state.config.device_list_limit)
        .clamp(1, MAX_DEVICE_LIST_LIMIT);

    let devices = state.store.list_latest_states(limit).await?;
    let total = devices.len();

    Ok(Json(ApiResponse::ok(DeviceListData { devices, total })))
}
