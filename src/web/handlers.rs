use crate::reports::{INVENTORY_EXPORT_FILENAME, SALES_EXPORT_FILENAME};
use crate::storage::LedgerStorage;
use crate::web::error::ApiError;
use crate::web::extract::{ItemId, JsonBody, Session};
use crate::{
    Account, ChartData, Credentials, Dashboard, InventoryItem, ItemForm, Registration, Sale,
    SaleForm, StockLedger,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

type Ledger<S> = State<Arc<StockLedger<S>>>;
type ApiResult<T> = Result<T, ApiError>;

/// Envelope for page views: every one carries the owner's current low-stock items.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: T,
    pub low_stock_items: Vec<InventoryItem>,
}

async fn page<S, T>(ledger: &StockLedger<S>, account: &Account, data: T) -> ApiResult<Json<Page<T>>>
where
    S: LedgerStorage,
    T: Serialize + Send,
{
    let low_stock_items = ledger.low_stock(account).await?;
    Ok(Json(Page {
        data,
        low_stock_items,
    }))
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: Uuid,
    pub account: Account,
}

pub async fn register<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    JsonBody(form): JsonBody<Registration>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    let account = ledger.register(&form).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn login<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    JsonBody(credentials): JsonBody<Credentials>,
) -> ApiResult<Json<LoginResponse>> {
    let (token, account) = ledger.login(&credentials).await?;
    Ok(Json(LoginResponse { token, account }))
}

pub async fn logout<S: LedgerStorage>(State(ledger): Ledger<S>, session: Session) -> StatusCode {
    ledger.logout(&session.token);
    StatusCode::NO_CONTENT
}

pub async fn dashboard<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    session: Session,
) -> ApiResult<Json<Page<Dashboard>>> {
    let dashboard = ledger.dashboard(&session.account).await?;
    page(&ledger, &session.account, dashboard).await
}

pub async fn list_inventory<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    session: Session,
) -> ApiResult<Json<Page<Vec<InventoryItem>>>> {
    let items = ledger.inventory(&session.account).await?;
    page(&ledger, &session.account, items).await
}

pub async fn add_inventory<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    session: Session,
    JsonBody(form): JsonBody<ItemForm>,
) -> ApiResult<(StatusCode, Json<InventoryItem>)> {
    let item = ledger.add_item(&session.account, &form).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn edit_inventory<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    session: Session,
    ItemId(id): ItemId,
    JsonBody(form): JsonBody<ItemForm>,
) -> ApiResult<Json<InventoryItem>> {
    let item = ledger.edit_item(&session.account, id, &form).await?;
    Ok(Json(item))
}

pub async fn delete_inventory<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    session: Session,
    ItemId(id): ItemId,
) -> ApiResult<StatusCode> {
    ledger.delete_item(&session.account, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_sales<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    session: Session,
) -> ApiResult<Json<Page<Vec<Sale>>>> {
    let sales = ledger.sales(&session.account).await?;
    page(&ledger, &session.account, sales).await
}

/// Items the owner can choose from when recording a sale.
pub async fn new_sale<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    session: Session,
) -> ApiResult<Json<Page<Vec<InventoryItem>>>> {
    let items = ledger.inventory(&session.account).await?;
    page(&ledger, &session.account, items).await
}

pub async fn add_sale<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    session: Session,
    JsonBody(form): JsonBody<SaleForm>,
) -> ApiResult<(StatusCode, Json<Sale>)> {
    let sale = ledger.record_sale(&session.account, &form).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn charts<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    session: Session,
) -> ApiResult<Json<Page<ChartData>>> {
    let data = ledger.chart_data(&session.account).await?;
    page(&ledger, &session.account, data).await
}

fn csv_attachment(filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        body,
    )
        .into_response()
}

pub async fn export_inventory<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    session: Session,
) -> ApiResult<Response> {
    let body = ledger.export_inventory(&session.account).await?;
    Ok(csv_attachment(INVENTORY_EXPORT_FILENAME, body))
}

pub async fn export_sales<S: LedgerStorage>(
    State(ledger): Ledger<S>,
    session: Session,
) -> ApiResult<Response> {
    let body = ledger.export_sales(&session.account).await?;
    Ok(csv_attachment(SALES_EXPORT_FILENAME, body))
}
