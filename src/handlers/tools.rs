use actix_web::{web, HttpResponse, Result};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::handlers::sessions::{parse_session_id, session_not_found};
use crate::services::ToolRegistry;
use crate::storage::MemoryStorage;

pub async fn list_tools(registry: web::Data<Arc<ToolRegistry>>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "tools": registry.definitions()
    })))
}

/// Runs one tool inside a session. The session lock is held for the whole
/// invocation so writes within a session never interleave.
pub async fn invoke_tool(
    path: web::Path<(String, String)>,
    req_body: Option<web::Json<Value>>,
    storage: web::Data<MemoryStorage>,
    registry: web::Data<Arc<ToolRegistry>>,
) -> Result<HttpResponse> {
    let (session_id, tool_name) = path.into_inner();
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let Some(session) = storage.get_session(session_id).await else {
        return Ok(session_not_found());
    };

    let args = req_body.map(|body| body.into_inner()).unwrap_or(Value::Null);
    let mut session = session.lock().await;
    let response = registry.invoke(&mut session, &tool_name, &args).await;

    if let Some(error) = response.error_message() {
        tracing::info!("Tool {} returned error: {}", tool_name, error);
    }
    Ok(HttpResponse::Ok().json(response))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/tools", web::get().to(list_tools))
        .route("/api/v1/sessions/{id}/tools/{name}", web::post().to(invoke_tool));
}
