//! Pulsegrid Storage Layer
//!
//! Sole owner of the four persisted entities: the raw audit log, the two
//! append-only reading histories, and the latest-state projection. The
//! [`TelemetryStore`] trait is the seam the API and the normalizer program
//! against; [`PgTelemetryStore`] is the PostgreSQL implementation backed by
//! a deadpool connection pool constructed once at process start.

pub mod config;
pub mod error;
pub mod pg;
pub mod schema;
pub mod store;

pub use config::DbConfig;
pub use error::{StorageError, StorageResult};
pub use pg::PgTelemetryStore;
pub use schema::ensure_schema;
pub use store::{RawPayloadRecord, TelemetryStore};
