//! Clinic HTTP API.
//!
//! Staff-facing schedule, patient, report, staff and carry-forward
//! endpoints. Routes are
//! nested under `/api/` and protected by a middleware stack:
//! Auth → Audit → Handler.
//!
//! The router is composable: `clinic_api_router()` returns a `Router`
//! that can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::clinic_api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
