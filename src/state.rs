//! Shared application state cloned into every handler.

use crate::orm::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    /// Secret keying session-cookie digests.
    pub session_secret: String,
}
