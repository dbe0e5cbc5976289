pub mod checkout;

pub use checkout::{
    CheckoutClient, CheckoutError, CheckoutLineItem, CheckoutSession, CreateSessionRequest,
};
