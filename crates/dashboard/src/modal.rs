/// Visibility of a single modal dialog.
///
/// Owned by the controller that renders the dialog; there is no shared
/// instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModalState {
    open: bool,
}

impl ModalState {
    pub fn is_open(self) -> bool {
        self.open
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }
}
