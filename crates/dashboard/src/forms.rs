use std::marker::PhantomData;

use serde::Serialize;
use tracing::warn;

use store_admin_core::{BillboardInput, CategoryInput, ProductInput, Validate, ValidationErrors};

use crate::client::{ApiClient, ApiError, Resource};
use crate::modal::ModalState;

/// Generic failure text shown when a save request fails.
pub const GENERIC_ERROR: &str = "Something went wrong.";

/// Per-entity configuration of a dashboard form.
pub trait EntityForm {
    type Values: Validate + Serialize + Clone + Default;

    const RESOURCE: Resource;
    /// Capitalised singular, e.g. `Billboard`.
    const NOUN: &'static str;
    /// Shown when the delete request fails. The server does not say why, so
    /// the text names the most likely cause.
    const DELETE_FAILED_MESSAGE: &'static str;
}

pub struct BillboardForm;

impl EntityForm for BillboardForm {
    type Values = BillboardInput;

    const RESOURCE: Resource = Resource::Billboards;
    const NOUN: &'static str = "Billboard";
    const DELETE_FAILED_MESSAGE: &'static str =
        "Make sure you removed all categories using this billboard first.";
}

pub struct CategoryForm;

impl EntityForm for CategoryForm {
    type Values = CategoryInput;

    const RESOURCE: Resource = Resource::Categories;
    const NOUN: &'static str = "Category";
    const DELETE_FAILED_MESSAGE: &'static str =
        "Make sure you removed all products using this category first.";
}

pub struct ProductForm;

impl EntityForm for ProductForm {
    type Values = ProductInput;

    const RESOURCE: Resource = Resource::Products;
    const NOUN: &'static str = "Product";
    const DELETE_FAILED_MESSAGE: &'static str = GENERIC_ERROR;
}

/// Toast to display after a request settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Error(String),
}

impl Notification {
    pub fn message(&self) -> &str {
        match self {
            Self::Success(message) | Self::Error(message) => message,
        }
    }
}

/// Why a request was not started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormRejection {
    /// A request from this form is still in flight.
    Busy,
    /// Local validation failed; nothing was sent.
    Invalid(ValidationErrors),
    /// Delete was requested on a form that has not been saved yet.
    NotPersisted,
}

/// What the UI should do once a submit or delete settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    /// Refresh server data, navigate, then show the notification.
    Completed {
        notification: Notification,
        navigate_to: String,
    },
    Failed { notification: Notification },
    Rejected(FormRejection),
}

impl FormOutcome {
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            Self::Completed { notification, .. } | Self::Failed { notification } => {
                Some(notification)
            }
            Self::Rejected(_) => None,
        }
    }

    pub fn navigate_to(&self) -> Option<&str> {
        match self {
            Self::Completed { navigate_to, .. } => Some(navigate_to),
            _ => None,
        }
    }

    pub fn refresh_requested(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// A request prepared by a controller. Sending it does not touch the controller,
/// so the UI can keep rendering the disabled state meanwhile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRequest<V> {
    Create {
        store_id: String,
        resource: Resource,
        body: V,
    },
    Update {
        store_id: String,
        resource: Resource,
        id: String,
        body: V,
    },
    Delete {
        store_id: String,
        resource: Resource,
        id: String,
    },
}

impl<V: Serialize> PendingRequest<V> {
    pub async fn send(&self, client: &ApiClient) -> Result<(), ApiError> {
        match self {
            Self::Create {
                store_id,
                resource,
                body,
            } => client.create(store_id, *resource, body).await,
            Self::Update {
                store_id,
                resource,
                id,
                body,
            } => client.update(store_id, *resource, id, body).await,
            Self::Delete {
                store_id,
                resource,
                id,
            } => client.delete(store_id, *resource, id).await,
        }
    }
}

enum FormMode<V> {
    Create,
    Edit { entity_id: String, initial: V },
}

/// State behind one create/edit form page.
pub struct FormController<F: EntityForm> {
    store_id: String,
    mode: FormMode<F::Values>,
    loading: bool,
    delete_alert: ModalState,
    _form: PhantomData<F>,
}

impl<F: EntityForm> FormController<F> {
    /// Form for a new entity in `store_id`.
    pub fn create(store_id: impl Into<String>) -> Self {
        Self::with_mode(store_id.into(), FormMode::Create)
    }

    /// Form editing an existing entity, pre-filled with `initial`.
    pub fn edit(
        store_id: impl Into<String>,
        entity_id: impl Into<String>,
        initial: F::Values,
    ) -> Self {
        Self::with_mode(
            store_id.into(),
            FormMode::Edit {
                entity_id: entity_id.into(),
                initial,
            },
        )
    }

    fn with_mode(store_id: String, mode: FormMode<F::Values>) -> Self {
        Self {
            store_id,
            mode,
            loading: false,
            delete_alert: ModalState::default(),
            _form: PhantomData,
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(self.mode, FormMode::Edit { .. })
    }

    /// Values the fields start with.
    pub fn initial_values(&self) -> F::Values {
        match &self.mode {
            FormMode::Create => F::Values::default(),
            FormMode::Edit { initial, .. } => initial.clone(),
        }
    }

    pub fn title(&self) -> String {
        let noun = F::NOUN.to_lowercase();
        if self.is_edit() {
            format!("Edit {noun}")
        } else {
            format!("Create {noun}")
        }
    }

    pub fn description(&self) -> String {
        let noun = F::NOUN.to_lowercase();
        if self.is_edit() {
            format!("Edit a {noun}.")
        } else {
            format!("Add a new {noun}")
        }
    }

    pub fn action_label(&self) -> &'static str {
        if self.is_edit() {
            "Save changes"
        } else {
            "Create"
        }
    }

    fn saved_message(&self) -> String {
        if self.is_edit() {
            format!("{} updated.", F::NOUN)
        } else {
            format!("{} created.", F::NOUN)
        }
    }

    /// Every input and button is disabled while a request is in flight.
    pub fn is_disabled(&self) -> bool {
        self.loading
    }

    /// The delete button only exists for saved entities.
    pub fn shows_delete(&self) -> bool {
        self.is_edit()
    }

    pub fn delete_alert(&self) -> ModalState {
        self.delete_alert
    }

    /// Dashboard route of the entity list.
    pub fn list_path(&self) -> String {
        format!("/{}/{}", self.store_id, F::RESOURCE.as_str())
    }

    /// Validates `values` and marks the form busy. Nothing is sent on rejection.
    pub fn begin_submit(
        &mut self,
        values: F::Values,
    ) -> Result<PendingRequest<F::Values>, FormRejection> {
        if self.loading {
            return Err(FormRejection::Busy);
        }
        values.validate().map_err(FormRejection::Invalid)?;

        self.loading = true;
        let request = match &self.mode {
            FormMode::Create => PendingRequest::Create {
                store_id: self.store_id.clone(),
                resource: F::RESOURCE,
                body: values,
            },
            FormMode::Edit { entity_id, .. } => PendingRequest::Update {
                store_id: self.store_id.clone(),
                resource: F::RESOURCE,
                id: entity_id.clone(),
                body: values,
            },
        };
        Ok(request)
    }

    pub fn finish_submit(&mut self, result: Result<(), ApiError>) -> FormOutcome {
        self.loading = false;
        match result {
            Ok(()) => FormOutcome::Completed {
                notification: Notification::Success(self.saved_message()),
                navigate_to: self.list_path(),
            },
            Err(err) => {
                warn!(stage = "form", resource = F::RESOURCE.as_str(), error = %err, "save request failed");
                FormOutcome::Failed {
                    notification: Notification::Error(GENERIC_ERROR.to_string()),
                }
            }
        }
    }

    /// Validates, sends and settles a create or update.
    pub async fn submit(&mut self, client: &ApiClient, values: F::Values) -> FormOutcome {
        let request = match self.begin_submit(values) {
            Ok(request) => request,
            Err(rejection) => return FormOutcome::Rejected(rejection),
        };
        let result = request.send(client).await;
        self.finish_submit(result)
    }

    /// Opens the confirmation dialog. Returns `false` when deleting is not possible right now.
    pub fn request_delete(&mut self) -> bool {
        if !self.shows_delete() || self.loading {
            return false;
        }
        self.delete_alert.open();
        true
    }

    pub fn cancel_delete(&mut self) {
        self.delete_alert.close();
    }

    pub fn begin_delete(&mut self) -> Result<PendingRequest<F::Values>, FormRejection> {
        if self.loading {
            return Err(FormRejection::Busy);
        }
        let FormMode::Edit { entity_id, .. } = &self.mode else {
            return Err(FormRejection::NotPersisted);
        };

        self.loading = true;
        Ok(PendingRequest::Delete {
            store_id: self.store_id.clone(),
            resource: F::RESOURCE,
            id: entity_id.clone(),
        })
    }

    /// Settles a delete. The confirmation dialog closes whatever the result.
    pub fn finish_delete(&mut self, result: Result<(), ApiError>) -> FormOutcome {
        self.loading = false;
        self.delete_alert.close();
        match result {
            Ok(()) => FormOutcome::Completed {
                notification: Notification::Success(format!("{} deleted.", F::NOUN)),
                navigate_to: self.list_path(),
            },
            Err(err) => {
                warn!(stage = "form", resource = F::RESOURCE.as_str(), error = %err, "delete request failed");
                FormOutcome::Failed {
                    notification: Notification::Error(F::DELETE_FAILED_MESSAGE.to_string()),
                }
            }
        }
    }

    /// Sends and settles the delete confirmed in the alert dialog.
    pub async fn confirm_delete(&mut self, client: &ApiClient) -> FormOutcome {
        let request = match self.begin_delete() {
            Ok(request) => request,
            Err(rejection) => return FormOutcome::Rejected(rejection),
        };
        let result = request.send(client).await;
        self.finish_delete(result)
    }
}
