use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
    store::ItemSummary,
};
use finlink_core::{Item, Region};
use finlink_plaid::{Account, AccountKind, Liabilities, LinkToken, LinkTokenRequest};
use finlink_webhooks::SyncKind;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkTokenBody {
    user_id: String,
    #[serde(default)]
    region: Region,
    country: Option<String>,
    language: Option<String>,
    account_kind: Option<AccountKind>,
}

async fn create_link_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LinkTokenBody>,
) -> ApiResult<Json<LinkToken>> {
    if body.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("userId must not be empty".to_string()));
    }
    let client = state.providers.for_region(body.region)?;

    let mut request = LinkTokenRequest::for_user(
        body.user_id,
        body.country.as_deref().unwrap_or_default(),
        body.language.as_deref().unwrap_or_default(),
        body.account_kind,
    );
    if let Some(url) = state.webhook_urls.get(&body.region) {
        request = request.with_webhook(url.clone());
    }
    if let Some(url) = &state.redirect_url {
        request = request.with_redirect_uri(url.clone());
    }

    let token = client.create_link_token(request).await?;
    Ok(Json(token))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeBody {
    public_token: String,
    #[serde(default)]
    region: Region,
}

/// Exchange a Link public token and queue the initial transaction sync.
async fn exchange_public_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExchangeBody>,
) -> ApiResult<(StatusCode, Json<ItemSummary>)> {
    let client = state.providers.for_region(body.region)?;
    let exchange = client.exchange_public_token(&body.public_token).await?;

    let summary = state.store.insert_item(Item::new(
        exchange.item_id,
        exchange.access_token,
        body.region,
    ));
    tracing::info!("Linked item {} ({})", summary.id, summary.region);
    state.jobs.enqueue(&summary.id, SyncKind::Transactions)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn list_items(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ItemSummary>>> {
    Ok(Json(state.store.summaries()))
}

async fn get_item(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ItemSummary>> {
    state.store.summary(&id).map(Json).ok_or(ApiError::NotFound)
}

/// Revoke the item at the provider, then forget it locally.
async fn delete_item(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    let item = linked_item(&state, &id)?;
    let client = state.providers.for_region(item.region)?;
    client.remove_item(&item.access_token).await?;
    state.store.remove_item(&id);
    tracing::info!("Removed item {}", id);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncQuery {
    kind: Option<SyncKind>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub item_id: String,
    pub kind: SyncKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holdings: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investment_transactions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub securities: Option<usize>,
}

impl SyncReport {
    fn new(item_id: &str, kind: SyncKind) -> Self {
        Self {
            item_id: item_id.to_string(),
            kind,
            added: None,
            modified: None,
            removed: None,
            holdings: None,
            investment_transactions: None,
            securities: None,
        }
    }
}

/// Run a sync in the request and report what changed. An unknown item is a
/// 404, a busy one a 409.
async fn sync_item(
    Path(id): Path<String>,
    Query(query): Query<SyncQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SyncReport>> {
    let kind = query.kind.unwrap_or(SyncKind::Transactions);
    let mut report = SyncReport::new(&id, kind);

    match kind {
        SyncKind::Transactions => {
            let delta = state.sync_service.sync_transactions(&id).await?;
            report.added = Some(delta.added.len());
            report.modified = Some(delta.modified.len());
            report.removed = Some(delta.removed.len());
        }
        SyncKind::Investments | SyncKind::Holdings => {
            let result = if kind == SyncKind::Investments {
                state
                    .sync_service
                    .sync_investments(&id, query.start_date, query.end_date)
                    .await?
            } else {
                state.sync_service.sync_holdings(&id).await?
            };
            report.holdings = Some(result.holdings.len());
            report.investment_transactions = Some(result.transactions.len());
            report.securities = Some(result.securities.len());
        }
    }
    Ok(Json(report))
}

async fn get_accounts(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<Account>>> {
    let item = linked_item(&state, &id)?;
    Ok(Json(state.sync_service.fetch_accounts(&item).await?))
}

async fn get_liabilities(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Liabilities>> {
    let item = linked_item(&state, &id)?;
    Ok(Json(state.sync_service.fetch_liabilities(&item).await?))
}

fn linked_item(state: &AppState, id: &str) -> ApiResult<Item> {
    state.store.get_item(id).ok_or(ApiError::NotFound)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/link/token", post(create_link_token))
        .route("/items", get(list_items).post(exchange_public_token))
        .route("/items/{id}", get(get_item).delete(delete_item))
        .route("/items/{id}/sync", post(sync_item))
        .route("/items/{id}/accounts", get(get_accounts))
        .route("/items/{id}/liabilities", get(get_liabilities))
}
