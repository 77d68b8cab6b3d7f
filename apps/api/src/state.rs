use std::sync::Arc;

use docwell_application::{
    DocumentService, IdentityService, SecurityAdminRepository, SecurityAdminService, UserService,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub document_service: DocumentService,
    pub security_admin_service: SecurityAdminService,
    pub identity_service: IdentityService,
    pub user_service: UserService,
    /// Direct repository access for the token-guarded bootstrap path.
    pub security_admin_repository: Arc<dyn SecurityAdminRepository>,
    pub frontend_url: String,
    pub bootstrap_token: String,
}
