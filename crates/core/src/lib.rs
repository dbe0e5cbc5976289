//! Domain types shared by the admin API, the storage layer and the dashboard client.
//!
//! Nothing in this crate performs I/O: it holds the catalogue entities, the
//! input validation rules applied on both sides of the REST boundary, and the
//! parsing of payment-provider webhook events into [`payment::PaymentEvent`].

pub mod address;
pub mod entities;
pub mod payment;
pub mod validation;

pub use address::{format_address, ShippingAddress};
pub use entities::{
    format_usd, Billboard, BillboardInput, Category, CategoryInput, Order, OrderItem,
    OrderSummary, Product, ProductInput, Store, StoreInput,
};
pub use payment::{CompletedCheckout, EventParseError, PaymentEvent, CHECKOUT_COMPLETED};
pub use validation::{FieldError, Validate, ValidationErrors};
