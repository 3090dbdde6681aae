// API module
//
// This module contains the HTTP surface of the node and the client used to
// fetch peer chains during reconciliation

pub mod handlers;
pub mod peer;
pub mod routes;

// Re-export main components for easier access
pub use routes::configure_routes;
