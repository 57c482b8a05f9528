//! Aggregates module
pub mod user;
pub mod merchant;
pub mod category;
pub mod product;
pub mod cart;
pub mod order;
pub mod chat;

pub use user::{NewUser, Role, User};
pub use merchant::{Merchant, MerchantPatch};
pub use category::Category;
pub use product::{NewProduct, Product, ProductPatch, ProductStatus, SearchFilter};
pub use cart::{Cart, CartItem};
pub use order::{Order, OrderDraft, OrderItem, OrderLine, OrderStatus, ShippingDetails};
pub use chat::{ChatMessage, ChatRecord, ChatRole};
