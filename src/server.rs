use actix_web::{web, App, HttpServer, middleware::Logger, Result};
use actix_cors::Cors;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::storage::MemoryStorage;
use crate::services::{ToolRegistry, TransactionDispatcher};
use crate::handlers;

pub struct ConsoleServer {
    storage: MemoryStorage,
    dispatcher: Arc<TransactionDispatcher>,
    registry: Arc<ToolRegistry>,
    config: AppConfig,
}

impl ConsoleServer {
    pub fn new(
        storage: MemoryStorage,
        dispatcher: Arc<TransactionDispatcher>,
        registry: Arc<ToolRegistry>,
        config: AppConfig,
    ) -> Self {
        Self {
            storage,
            dispatcher,
            registry,
            config,
        }
    }

    pub async fn run(self) -> std::io::Result<()> {
        let bind_address = format!("{}:{}", self.config.server.host, self.config.server.port);

        tracing::info!("Starting HTTP server on {}", bind_address);

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .app_data(web::Data::new(self.storage.clone()))
                .app_data(web::Data::new(self.dispatcher.clone()))
                .app_data(web::Data::new(self.registry.clone()))
                .app_data(web::Data::new(self.config.clone()))
                .wrap(cors)
                .wrap(Logger::default())
                .configure(handlers::health::config)
                .configure(handlers::sessions::config)
                .configure(handlers::tools::config)
                .configure(handlers::wallet::config)
                .route("/", web::get().to(api_info))
        })
        .bind(&bind_address)?
        .run()
        .await
    }
}

async fn api_info() -> Result<actix_web::HttpResponse> {
    Ok(actix_web::HttpResponse::Ok().json(serde_json::json!({
        "name": "Lending Pool Console",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Tool runner and transaction dispatcher for the LendingPool and TrustMint SBT contracts",
        "endpoints": {
            "health": "GET /api/v1/health",
            "chain_health": "GET /api/v1/health/chain",
            "create_session": "POST /api/v1/sessions",
            "get_session": "GET /api/v1/sessions/{id}",
            "end_session": "DELETE /api/v1/sessions/{id}",
            "list_tools": "GET /api/v1/tools",
            "invoke_tool": "POST /api/v1/sessions/{id}/tools/{name}",
            "wallet_command": "POST /api/v1/sessions/{id}/wallet/{slot}/commands",
            "wallet_outcome": "POST /api/v1/sessions/{id}/wallet/{slot}/outcome",
            "receipt": "GET /api/v1/receipts/{hash}?timeout_seconds=N"
        }
    })))
}
