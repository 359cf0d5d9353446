use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::{RoleAddresses, RoleSigners, SessionContext};
use crate::storage::MemoryStorage;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    /// Addresses the browser wallet assigned to roles.
    #[serde(default)]
    pub roles: RoleAddresses,
}

pub(crate) fn parse_session_id(raw: &str) -> std::result::Result<Uuid, HttpResponse> {
    Uuid::from_str(raw).map_err(|_| {
        HttpResponse::BadRequest().json(json!({
            "error": "Invalid session ID format"
        }))
    })
}

pub(crate) fn session_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "error": "Session not found"
    }))
}

pub async fn create_session(
    req_body: Option<web::Json<CreateSessionRequest>>,
    storage: web::Data<MemoryStorage>,
    config: web::Data<AppConfig>,
) -> Result<HttpResponse> {
    let request = req_body.map(|body| body.into_inner()).unwrap_or_default();
    let signers = RoleSigners::resolve(&config.signers, &request.roles);
    let session = SessionContext::new(signers);
    let summary = session.summary();

    storage.store_session(session).await;
    tracing::info!("Session {} created with {} role(s)", summary.id, summary.roles.len());

    Ok(HttpResponse::Created().json(summary))
}

pub async fn get_session(path: web::Path<String>, storage: web::Data<MemoryStorage>) -> Result<HttpResponse> {
    let session_id = match parse_session_id(&path.into_inner()) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    match storage.get_summary(session_id).await {
        Some(summary) => Ok(HttpResponse::Ok().json(summary)),
        None => Ok(session_not_found()),
    }
}

pub async fn delete_session(path: web::Path<String>, storage: web::Data<MemoryStorage>) -> Result<HttpResponse> {
    let session_id = match parse_session_id(&path.into_inner()) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };

    if storage.remove_session(session_id).await {
        tracing::info!("Session {} ended", session_id);
        Ok(HttpResponse::NoContent().finish())
    } else {
        Ok(session_not_found())
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/sessions", web::post().to(create_session))
        .route("/api/v1/sessions/{id}", web::get().to(get_session))
        .route("/api/v1/sessions/{id}", web::delete().to(delete_session));
}
