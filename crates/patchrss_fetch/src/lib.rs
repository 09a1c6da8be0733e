pub mod content_type;
pub mod fetcher;
pub mod guard;
pub mod policy;
pub mod resolver;

pub use content_type::{decode_body, downstream_content_type, output_encoding, output_label};
pub use fetcher::{Fetcher, UpstreamResponse};
pub use guard::{validate, ValidatedUrl};
pub use policy::blocked_reason;
