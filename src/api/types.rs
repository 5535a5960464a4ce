use std::sync::Arc;

use crate::ai::TextGenerator;
use crate::mail::MailTransport;
use crate::store::Store;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub mailer: Arc<dyn MailTransport>,
    pub tips: Arc<dyn TextGenerator>,
    pub mail_from: String,
    pub notify_to: Option<String>,
}
