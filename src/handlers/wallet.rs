use actix_web::{web, HttpResponse, Result};
use alloy::primitives::TxHash;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::handlers::sessions::{parse_session_id, session_not_found};
use crate::models::{TxResult, WalletCommand, WalletOutcome};
use crate::services::{Reconciliation, TransactionDispatcher};
use crate::storage::MemoryStorage;

/// Commands the dashboard may issue directly. Transaction requests only come
/// from tool dispatch.
#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CommandRequest {
    Connect,
    SwitchNetwork {
        #[serde(default)]
        require_chain_id: Option<u64>,
    },
}

#[derive(Debug, Default, Deserialize)]
pub struct ReceiptQuery {
    pub timeout_seconds: Option<u64>,
}

pub async fn issue_command(
    path: web::Path<(String, String)>,
    req_body: web::Json<CommandRequest>,
    storage: web::Data<MemoryStorage>,
    dispatcher: web::Data<Arc<TransactionDispatcher>>,
) -> Result<HttpResponse> {
    let (session_id, slot) = path.into_inner();
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let Some(session) = storage.get_session(session_id).await else {
        return Ok(session_not_found());
    };

    let command = match req_body.into_inner() {
        CommandRequest::Connect => WalletCommand::Connect,
        CommandRequest::SwitchNetwork { require_chain_id } => WalletCommand::SwitchNetwork {
            require_chain_id: require_chain_id.unwrap_or_else(|| dispatcher.chain_id()),
        },
    };

    let mut session = session.lock().await;
    let pending = dispatcher.issue_command(&mut session, &slot, command);
    Ok(HttpResponse::Ok().json(pending))
}

/// Wallet component reports back. Stale sequences are acknowledged and
/// dropped. A transaction hash is optionally followed by a bounded receipt
/// wait, run after the session lock is released.
pub async fn submit_outcome(
    path: web::Path<(String, String)>,
    req_body: web::Json<WalletOutcome>,
    query: web::Query<ReceiptQuery>,
    storage: web::Data<MemoryStorage>,
    dispatcher: web::Data<Arc<TransactionDispatcher>>,
) -> Result<HttpResponse> {
    let (session_id, slot) = path.into_inner();
    let session_id = match parse_session_id(&session_id) {
        Ok(id) => id,
        Err(response) => return Ok(response),
    };
    let Some(session) = storage.get_session(session_id).await else {
        return Ok(session_not_found());
    };

    let outcome = req_body.into_inner();
    let reconciliation = {
        let mut session = session.lock().await;
        dispatcher.reconcile_slot(&mut session, &slot, &outcome)
    };

    let reconciliation = match (reconciliation, query.timeout_seconds) {
        (
            Reconciliation::Transaction {
                result: TxResult::Sent { transaction_hash, .. },
            },
            Some(timeout),
        ) if timeout > 0 => Reconciliation::Transaction {
            result: dispatcher
                .wait_for_receipt(transaction_hash, Duration::from_secs(timeout))
                .await,
        },
        (other, _) => other,
    };

    let receipt_pending = matches!(
        &reconciliation,
        Reconciliation::Transaction { result } if result.error().is_some_and(|e| e.is_retryable_poll())
    );
    if receipt_pending {
        Ok(HttpResponse::Accepted().json(reconciliation))
    } else {
        Ok(HttpResponse::Ok().json(reconciliation))
    }
}

pub async fn get_receipt(
    path: web::Path<String>,
    query: web::Query<ReceiptQuery>,
    dispatcher: web::Data<Arc<TransactionDispatcher>>,
) -> Result<HttpResponse> {
    let hash = match TxHash::from_str(path.into_inner().trim()) {
        Ok(hash) => hash,
        Err(_) => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "error": "Invalid transaction hash"
            })))
        }
    };

    let policy = dispatcher.receipt_policy();
    let timeout = query
        .timeout_seconds
        .map(Duration::from_secs)
        .unwrap_or(policy.wait_after_send);

    let result = dispatcher.wait_for_receipt(hash, timeout).await;
    match result.error() {
        // Not mined yet; the caller can poll again.
        Some(error) if error.is_retryable_poll() => Ok(HttpResponse::Accepted().json(result)),
        _ => Ok(HttpResponse::Ok().json(result)),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/sessions/{id}/wallet/{slot}/commands", web::post().to(issue_command))
        .route("/api/v1/sessions/{id}/wallet/{slot}/outcome", web::post().to(submit_outcome))
        .route("/api/v1/receipts/{hash}", web::get().to(get_receipt));
}
