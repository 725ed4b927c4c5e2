use std::sync::Arc;

use crate::withdrawal::WithdrawalManager;

/// Shared gateway state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<WithdrawalManager>,
}

impl AppState {
    pub fn new(manager: Arc<WithdrawalManager>) -> Self {
        Self { manager }
    }
}
