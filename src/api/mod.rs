mod handlers;
mod helpers;
mod router;
mod types;

pub use router::{build_router, cors_layer};
pub use types::AppState;
