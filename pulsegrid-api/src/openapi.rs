//! OpenAPI documentation assembly.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::types::{ApiResponse, DeviceListData, IngestAccepted};
use pulsegrid_core::{DeviceLatestState, FieldError, ValidationReport};

/// OpenAPI document for the pulsegrid API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pulsegrid API",
        description = "Telemetry webhook ingestion and device dashboard API"
    ),
    paths(
        crate::routes::ingest::ingest_pulsetrak,
        crate::routes::devices::list_devices,
        crate::routes::health::ping,
        crate::routes::health::live,
        crate::routes::health::ready,
    ),
    components(schemas(
        ApiError,
        ErrorCode,
        ApiResponse<IngestAccepted>,
        ApiResponse<DeviceListData>,
        IngestAccepted,
        DeviceListData,
        DeviceLatestState,
        FieldError,
        ValidationReport,
        HealthResponse,
        HealthStatus,
        HealthDetails,
        ComponentHealth,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Ingest", description = "Webhook ingestion"),
        (name = "Devices", description = "Latest-state dashboard reads"),
        (name = "Health", description = "Liveness and readiness probes"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Api-Key"))),
            );
        }
    }
}
