//! Order creation and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{AccountId, OrderId};
use order_service::{InMemoryAccountDirectory, InMemoryProductCatalog, OrderLine, OrderService};
use order_store::{Order, OrderRepository, OrderedProduct};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Order service wired to the collaborators the server runs with.
pub type AppOrderService<R> = OrderService<R, InMemoryAccountDirectory, InMemoryProductCatalog>;

/// Shared application state accessible from all handlers.
pub struct AppState<R: OrderRepository> {
    pub order_service: AppOrderService<R>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub products: Vec<OrderProductRequest>,
}

#[derive(Deserialize)]
pub struct OrderProductRequest {
    pub id: String,
    pub quantity: u32,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub created_at: String,
    pub account_id: String,
    pub total_price_cents: i64,
    pub products: Vec<OrderedProductResponse>,
}

#[derive(Debug, Serialize)]
pub struct OrderedProductResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub quantity: u32,
}

impl From<&OrderedProduct> for OrderedProductResponse {
    fn from(product: &OrderedProduct) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            description: product.description.clone(),
            price_cents: product.price.cents(),
            quantity: product.quantity,
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            created_at: order.created_at.to_rfc3339(),
            account_id: order.account_id.to_string(),
            total_price_cents: order.total_price.cents(),
            products: order.products.iter().map(Into::into).collect(),
        }
    }
}

// -- Handlers --

/// POST /accounts/:account_id/orders — place a new order.
#[tracing::instrument(skip(state, body))]
pub async fn create<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(account_id): Path<String>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = body?;
    let lines = req
        .products
        .into_iter()
        .map(|p| OrderLine::new(p.id, p.quantity))
        .collect();

    let order = state
        .order_service
        .post_order(AccountId::new(account_id), lines)
        .await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /accounts/:account_id/orders — list an account's orders, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_account<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(account_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state
        .order_service
        .get_orders_for_account(&AccountId::new(account_id))
        .await?;

    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/:id — load one order.
#[tracing::instrument(skip(state))]
pub async fn get<R: OrderRepository + 'static>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.order_service.get_order(order_id).await?;

    Ok(Json(OrderResponse::from(&order)))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    OrderId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
