//! Headless dashboard: the state and request logic behind the admin forms.
//!
//! Rendering is left to whatever UI hosts these controllers; they expose the
//! copy to display, whether controls are disabled, and the notification and
//! navigation that should follow each request.

pub mod client;
pub mod forms;
pub mod modal;
pub mod setup;

pub use client::{ApiClient, ApiError, Resource};
pub use forms::{
    BillboardForm, CategoryForm, EntityForm, FormController, FormOutcome, FormRejection,
    Notification, PendingRequest, ProductForm,
};
pub use modal::ModalState;
pub use setup::{Landing, SetupFlow};
