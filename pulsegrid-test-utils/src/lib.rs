//! Pulsegrid Test Utilities
//!
//! Centralized test infrastructure for the pulsegrid workspace:
//! - In-memory `TelemetryStore` with fault injection
//! - Inline task dispatcher that runs handlers synchronously
//! - Payload fixtures for the PulseTrak wire format

pub mod dispatcher;
pub mod fixtures;
pub mod store;

pub use dispatcher::InlineTaskDispatcher;
pub use fixtures::{valid_tracker_document, TEST_API_KEY, TEST_IMEI};
pub use store::InMemoryTelemetryStore;
