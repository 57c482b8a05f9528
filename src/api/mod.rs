//! HTTP surface: shared state, routes and middleware.

mod auth;
mod cart;
mod catalog;
mod chat;
mod error;
pub mod extract;
mod merchants;
mod orders;
mod uploads;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::Config;
use crate::services::{
    AuthService, CartService, CatalogService, ChatClient, ChatService, ImageStore, MerchantService, OrderService,
    TokenSigner, UploadService,
};
use crate::store::Store;
use crate::Result;

const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub auth: AuthService,
    pub merchants: MerchantService,
    pub catalog: CatalogService,
    pub cart: CartService,
    pub orders: OrderService,
    pub uploads: UploadService,
    pub chat: ChatService,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn Store>) -> Result<Self> {
        let signer = TokenSigner::new(config.token_secret.clone(), config.token_ttl);
        let chat_client = ChatClient::new(config.chat.clone())?;
        Ok(Self {
            auth: AuthService::new(store.clone(), signer, config.initial_balance),
            merchants: MerchantService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            cart: CartService::new(store.clone()),
            orders: OrderService::new(store.clone()),
            uploads: UploadService::new(store.clone(), ImageStore::new(config.upload_dir.clone())),
            chat: ChatService::new(store.clone(), chat_client),
            config: Arc::new(config),
            store,
        })
    }
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Furniture Shopping API", "version": env!("CARGO_PKG_VERSION") }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/merchants/me", get(merchants::profile).put(merchants::update_profile))
        .route("/categories", get(catalog::list_categories).post(catalog::create_category))
        .route("/categories/:id", get(catalog::get_category))
        .route("/products", get(catalog::list_products).post(catalog::create_product))
        .route("/products/merchant/my-products", get(catalog::my_products))
        .route(
            "/products/:id",
            get(catalog::get_product).put(catalog::update_product).delete(catalog::delete_product),
        )
        .route("/search", get(catalog::search))
        .route("/cart", get(cart::get_cart))
        .route("/cart/items", post(cart::add_item))
        .route("/cart/items/:item_id", put(cart::update_item).delete(cart::remove_item))
        .route("/cart/clear", delete(cart::clear))
        .route("/orders", post(orders::create_order))
        .route("/orders/my-orders", get(orders::my_orders))
        .route("/orders/merchant/orders", get(orders::merchant_orders))
        .route("/orders/:id/status", put(orders::update_status))
        .route(
            "/upload/product/:id/images",
            post(uploads::upload_images).delete(uploads::delete_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/chat", post(chat::chat));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
