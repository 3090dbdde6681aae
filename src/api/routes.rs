use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// Routes live at the root so that peers can fetch each other's chains from
/// a fixed `/chain` path.
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/chain", web::get().to(handlers::get_chain))
        .route("/transactions/pending", web::get().to(handlers::get_pending_transactions))
        .route("/transactions/new", web::post().to(handlers::new_transaction))
        .route("/mine", web::post().to(handlers::mine_block))
        .route("/validate", web::get().to(handlers::validate_chain))
        .route("/nodes/register", web::post().to(handlers::register_nodes))
        .route("/nodes", web::get().to(handlers::get_nodes))
        .route("/nodes/resolve", web::get().to(handlers::resolve_conflicts));
}
