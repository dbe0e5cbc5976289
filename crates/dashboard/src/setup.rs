use tracing::warn;

use store_admin_core::{StoreInput, Validate};

use crate::client::ApiClient;
use crate::forms::{FormOutcome, FormRejection, Notification, GENERIC_ERROR};
use crate::modal::ModalState;

/// Where a signed-in user lands on the dashboard root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Landing {
    /// Redirect to the store dashboard at `path`.
    Store { path: String },
    /// The user owns no store yet; the create-store modal is shown.
    CreateStore,
}

/// First-run flow: send the user to a store, or make them create one.
#[derive(Debug, Default)]
pub struct SetupFlow {
    modal: ModalState,
    loading: bool,
}

impl SetupFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modal(&self) -> ModalState {
        self.modal
    }

    pub fn is_disabled(&self) -> bool {
        self.loading
    }

    /// Picks the landing page from the user's stores, opening the modal when there are none.
    pub async fn resolve(&mut self, client: &ApiClient) -> Result<Landing, crate::ApiError> {
        let stores = client.list_stores().await?;
        match stores.first() {
            Some(store) => {
                self.modal.close();
                Ok(Landing::Store {
                    path: format!("/{}", store.id),
                })
            }
            None => {
                self.modal.open();
                Ok(Landing::CreateStore)
            }
        }
    }

    /// Submits the create-store modal. On success the modal closes and the user
    /// is sent to the new store.
    pub async fn create_store(&mut self, client: &ApiClient, input: StoreInput) -> FormOutcome {
        if self.loading {
            return FormOutcome::Rejected(FormRejection::Busy);
        }
        if let Err(errors) = input.validate() {
            return FormOutcome::Rejected(FormRejection::Invalid(errors));
        }

        self.loading = true;
        let result = client.create_store(&input).await;
        self.loading = false;

        match result {
            Ok(store) => {
                self.modal.close();
                FormOutcome::Completed {
                    notification: Notification::Success("Store created.".to_string()),
                    navigate_to: format!("/{}", store.id),
                }
            }
            Err(err) => {
                warn!(stage = "setup", error = %err, "create store failed");
                FormOutcome::Failed {
                    notification: Notification::Error(GENERIC_ERROR.to_string()),
                }
            }
        }
    }
}
