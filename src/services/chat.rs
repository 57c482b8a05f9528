//! Shopping assistant chat backed by an OpenAI-style completion API.
//!
//! The assistant only knows a merchant's online products, which are passed to
//! the model as a plain-text system prompt. Failures of the completion API
//! never fail the request: they come back as the reply text.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::ChatConfig;
use crate::domain::aggregates::{ChatMessage, ChatRecord, ChatRole, Product, ProductStatus, User};
use crate::store::Store;
use crate::{Result, ShopError};

pub const NOT_CONFIGURED_REPLY: &str = "Chat assistant is not configured. Please contact the administrator.";
const TEMPERATURE: f32 = 0.7;

/// Plain-text product list the assistant answers from.
pub fn product_context(products: &[Product]) -> String {
    if products.is_empty() {
        return "No products available.".to_owned();
    }
    let mut context = String::from("Available products:\n");
    for product in products {
        let description = product.description.as_deref().unwrap_or("No description");
        context.push_str(&format!("- {}: {} (Price: ${})\n", product.name, description, product.price));
    }
    context
}

fn system_prompt(context: &str) -> String {
    format!(
        "You are a helpful furniture shopping assistant. Help customers find the right furniture based on \
         their needs. Here are the products available from this merchant:\n\n{context}\n\n\
         Provide recommendations based on these products and the customer's requirements."
    )
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Error communicating with the chat service: {0}")]
    Status(u16),
    #[error("Error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Error: {0}")]
    Malformed(String),
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ShopError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn is_configured(&self) -> bool { self.config.api_key.is_some() }

    /// The assistant's answer, or a description of why there is none.
    #[instrument(skip_all, fields(model = %self.config.model))]
    pub async fn reply(&self, context: &str, question: &str) -> String {
        let Some(api_key) = self.config.api_key.as_ref() else {
            return NOT_CONFIGURED_REPLY.to_owned();
        };
        let messages = [ChatMessage::new(ChatRole::System, system_prompt(context)), ChatMessage::new(ChatRole::User, question)];
        match self.complete(api_key.expose_secret(), &messages).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "chat completion failed");
                e.to_string()
            }
        }
    }

    async fn complete(&self, api_key: &str, messages: &[ChatMessage]) -> std::result::Result<String, ChatError> {
        let request = CompletionRequest { model: &self.config.model, messages, temperature: TEMPERATURE };
        let response = self.http.post(&self.config.api_url).bearer_auth(api_key).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ChatError::Status(status.as_u16()));
        }
        let body: CompletionResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ChatError::Malformed("completion has no choices".into()))
    }
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn Store>,
    client: ChatClient,
}

impl ChatService {
    pub fn new(store: Arc<dyn Store>, client: ChatClient) -> Self { Self { store, client } }

    #[instrument(skip(self, user, message), fields(user_id = %user.id))]
    pub async fn chat(&self, user: &User, merchant_id: Uuid, message: &str) -> Result<ChatReply> {
        let merchant = self.store.find_merchant(merchant_id).await?.ok_or_else(|| ShopError::not_found("Merchant"))?;
        let products = self.store.products_by_merchant(merchant.id, Some(ProductStatus::Online)).await?;
        let reply = self.client.reply(&product_context(&products), message).await;
        self.store.insert_chat_record(&ChatRecord::exchange(user.id, merchant.id, message, &reply)).await?;
        info!(merchant_id = %merchant.id, "chat exchange stored");
        Ok(ChatReply { reply })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Merchant, NewProduct, NewUser, Role};
    use crate::domain::value_objects::Money;
    use crate::store::MemoryStore;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use std::time::Duration;

    fn config(api_url: &str, api_key: Option<&str>) -> ChatConfig {
        ChatConfig {
            api_key: api_key.map(|k| SecretString::from(k.to_owned())),
            api_url: api_url.to_owned(),
            model: "test-model".into(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Serves `router` on an ephemeral local port and returns its URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}/v1/chat/completions")
    }

    fn product(name: &str, description: Option<&str>, price: i64) -> Product {
        Product::create(Uuid::now_v7(), NewProduct {
            name: name.into(), description: description.map(Into::into),
            price: Money::positive(Decimal::from(price)).unwrap(), category_id: None,
        })
    }

    #[test]
    fn test_product_context() {
        assert_eq!(product_context(&[]), "No products available.");
        let context = product_context(&[product("Sofa", Some("Three-seat"), 450), product("Stool", None, 20)]);
        assert_eq!(context, "Available products:\n- Sofa: Three-seat (Price: $450)\n- Stool: No description (Price: $20)\n");
    }

    #[tokio::test]
    async fn test_unconfigured_client_apologises() {
        let client = ChatClient::new(config("http://127.0.0.1:1/", None)).unwrap();
        assert!(!client.is_configured());
        assert_eq!(client.reply("ctx", "hello").await, NOT_CONFIGURED_REPLY);
    }

    #[tokio::test]
    async fn test_transport_failure_becomes_text() {
        let client = ChatClient::new(config("http://127.0.0.1:1/v1/chat/completions", Some("sk-test"))).unwrap();
        assert!(client.reply("ctx", "hello").await.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_completion_success() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["content"], "need a desk");
                Json(serde_json::json!({"choices": [{"message": {"role": "assistant", "content": "Try the oak desk."}}]}))
            }),
        );
        let url = serve(router).await;
        let client = ChatClient::new(config(&url, Some("sk-test"))).unwrap();
        assert_eq!(client.reply("ctx", "need a desk").await, "Try the oak desk.");
    }

    #[tokio::test]
    async fn test_status_failure_becomes_text() {
        let router = Router::new().route("/v1/chat/completions", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let url = serve(router).await;
        let client = ChatClient::new(config(&url, Some("sk-test"))).unwrap();
        assert_eq!(client.reply("ctx", "hi").await, "Error communicating with the chat service: 500");
    }

    #[tokio::test]
    async fn test_chat_stores_exchange() {
        let store = Arc::new(MemoryStore::new());
        let seller = User::register(NewUser {
            username: "sam".into(), email: "sam@example.com".into(), password_hash: "x".into(),
            role: Role::Merchant, balance: Money::ZERO,
        });
        let merchant = Merchant::for_user(&seller);
        store.insert_user(&seller, Some(&merchant)).await.unwrap();

        let service = ChatService::new(store.clone(), ChatClient::new(config("http://127.0.0.1:1/", None)).unwrap());
        let reply = service.chat(&seller, merchant.id, "any sofas?").await.unwrap();
        assert_eq!(reply.reply, NOT_CONFIGURED_REPLY);

        let records = store.chat_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].messages[0].content, "any sofas?");
        assert_eq!(records[0].messages[1].role, ChatRole::Assistant);

        let err = service.chat(&seller, Uuid::now_v7(), "hello").await.unwrap_err();
        assert_eq!(err.to_string(), "Merchant not found");
    }
}
