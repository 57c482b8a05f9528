//! Application services. Each one owns a handle to the [`Store`](crate::store::Store)
//! and implements one area of the HTTP surface.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod chat;
pub mod merchants;
pub mod orders;
pub mod uploads;

pub use auth::{AuthService, LoginOutcome, Registration, TokenSigner, UserProfile};
pub use cart::{CartService, CartView};
pub use catalog::CatalogService;
pub use chat::{ChatClient, ChatReply, ChatService};
pub use merchants::{require_merchant, MerchantService};
pub use orders::{LineRequest, OrderItemView, OrderService, OrderView};
pub use uploads::{ImageStore, UploadService, UploadSummary, UploadedFile};
