pub mod handler;
pub mod server;
pub mod types;

pub use handler::AppState;
pub use server::{router, PatchServer};
pub use types::{ApiError, RssQuery};
