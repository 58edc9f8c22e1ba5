use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{sse::Event, IntoResponse, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use uuid::Uuid;

use crate::db::transaction::PgTransactionRepository;
use crate::db::user::PgUserRepository;
use crate::domain::transaction::TransactionStatus;
use crate::usecases::ask_trade::{AskTrade, AskTradeRequest};
use crate::usecases::queries::ListPendingTransactions;
use crate::usecases::{FindUserQuery, ListTransactionsQuery, TransactionRepository, UserRepository};

use super::auth::AuthService;
use super::utils::{bearer_token, status_for, validate_auth_token};

#[derive(Clone)]
pub struct TradeState {
    pub service: Arc<AuthService>,
    pub ask_trade: Arc<AskTrade>,
    pub pending: Arc<ListPendingTransactions>,
    pub users: Arc<PgUserRepository>,
    pub transactions: Arc<PgTransactionRepository>,
}

async fn create_trade(
    headers: HeaderMap,
    State(state): State<TradeState>,
    Json(request): Json<AskTradeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!(announcement = %request.announcement_id, "incoming trade request");

    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(err) => {
            tracing::error!("Missing or unreadable token");
            return Err((err, "Invalid token".to_string()));
        }
    };

    match state.ask_trade.exec(request, token).await {
        Ok(record) => {
            // failed and rejected settlements are reported with their
            // record, not as an anonymous error
            let code = if record.status == TransactionStatus::Accepted {
                StatusCode::CREATED
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            Ok((code, Json(record)))
        }
        Err(err) => {
            tracing::warn!("trade request refused: {err}");
            Err((status_for(&err), err.to_string()))
        }
    }
}

// pending transactions where the caller is the receiving party
async fn pending_trades(
    headers: HeaderMap,
    State(state): State<TradeState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(err) => return Err((err, "Invalid token".to_string())),
    };

    match state.pending.exec(token).await {
        Ok(records) => Ok((StatusCode::OK, Json(records))),
        Err(err) => {
            tracing::error!("Failed to list pending transactions: {err}");
            Err((status_for(&err), err.to_string()))
        }
    }
}

// return a specific transaction by id, visible only to its two parties
async fn get_trade(
    headers: HeaderMap,
    State(state): State<TradeState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = match validate_auth_token(&headers, &state.service) {
        Ok(val) => val,
        Err(err) => return Err((err, "Invalid token".to_string())),
    };

    let wallet_id = match state.users.find_by(FindUserQuery::by_id(user_id)).await {
        Ok(Some(user)) => user.wallet.id(),
        Ok(None) => return Err((StatusCode::NOT_FOUND, "User not found".to_string())),
        Err(err) => return Err((status_for(&err), err.to_string())),
    };

    match state.transactions.find_by_id(transaction_id).await {
        Ok(Some(record))
            if record.from_wallet == wallet_id || record.to_wallet == wallet_id =>
        {
            Ok((StatusCode::OK, Json(record)))
        }
        Ok(_) => Err((StatusCode::NOT_FOUND, "Transaction not found".to_string())),
        Err(err) => {
            tracing::error!("Failed to retrieve transaction: {err}");
            Err((status_for(&err), err.to_string()))
        }
    }
}

// stream every transaction the caller took part in, either side
async fn list_trades(
    headers: HeaderMap,
    State(state): State<TradeState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = match validate_auth_token(&headers, &state.service) {
        Ok(val) => val,
        Err(err) => return Err((err, "Invalid token".to_string())),
    };

    let wallet_id = match state.users.find_by(FindUserQuery::by_id(user_id)).await {
        Ok(Some(user)) => user.wallet.id(),
        Ok(None) => return Err((StatusCode::NOT_FOUND, "User not found".to_string())),
        Err(err) => return Err((status_for(&err), err.to_string())),
    };

    let records = match state
        .transactions
        .list(ListTransactionsQuery::involving(wallet_id))
        .await
    {
        Ok(records) => records,
        Err(err) => {
            tracing::error!("Failed to retrieve transactions: {err}");
            return Err((status_for(&err), err.to_string()));
        }
    };

    let stream = futures::stream::iter(records).map(|record| Event::default().json_data(record));

    let sse = Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(std::time::Duration::from_secs(2))
            .text("keep-alive-text"),
    );

    Ok(sse)
}

pub fn trade_routes(state: TradeState) -> Router {
    Router::new()
        .route("/trades", post(create_trade).get(list_trades))
        .route("/trades/pending", get(pending_trades))
        .route("/trades/:uid", get(get_trade))
        .with_state(state)
}
