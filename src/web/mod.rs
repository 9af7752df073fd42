//! JSON HTTP surface over a shared [`StockLedger`].

pub mod error;
pub mod extract;
pub mod handlers;

use crate::storage::LedgerStorage;
use crate::StockLedger;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router<S: LedgerStorage + 'static>(ledger: Arc<StockLedger<S>>) -> Router {
    Router::new()
        .route("/register", post(handlers::register::<S>))
        .route("/login", post(handlers::login::<S>))
        .route("/logout", post(handlers::logout::<S>))
        .route("/dashboard", get(handlers::dashboard::<S>))
        .route(
            "/inventory",
            get(handlers::list_inventory::<S>).post(handlers::add_inventory::<S>),
        )
        .route(
            "/inventory/:id",
            put(handlers::edit_inventory::<S>).delete(handlers::delete_inventory::<S>),
        )
        .route(
            "/sales",
            get(handlers::list_sales::<S>).post(handlers::add_sale::<S>),
        )
        .route("/sales/new", get(handlers::new_sale::<S>))
        .route("/charts", get(handlers::charts::<S>))
        .route("/export/inventory", get(handlers::export_inventory::<S>))
        .route("/export/sales", get(handlers::export_sales::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ledger)
}
