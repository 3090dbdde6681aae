use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

mod api;
mod blockchain;

/// Default address the node binds to when PROOFCHAIN_ADDR is not set
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_pending_transactions,
        api::handlers::new_transaction,
        api::handlers::mine_block,
        api::handlers::validate_chain,
        api::handlers::register_nodes,
        api::handlers::get_nodes,
        api::handlers::resolve_conflicts
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            api::handlers::ChainResponse,
            api::handlers::TransactionRequest,
            api::handlers::TransactionResponse,
            api::handlers::MineRequest,
            api::handlers::MineResponse,
            api::handlers::RegisterNodesRequest,
            api::handlers::RegisterNodesResponse,
            api::handlers::ResolveResponse
        )
    ),
    tags(
        (name = "blockchain", description = "Blockchain node endpoints")
    ),
    info(
        title = "Proofchain API",
        version = "1.0.0",
        description = "A minimal proof-of-work blockchain node",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Generate a globally unique identifier for this node
    let node_id = Uuid::new_v4().simple().to_string();

    // Create the shared ledger, constructed once and passed to every handler
    let blockchain = web::Data::new(blockchain::Blockchain::new(node_id));

    let bind_addr =
        std::env::var("PROOFCHAIN_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    info!("Starting HTTP server at http://{}", bind_addr);

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(blockchain.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}
