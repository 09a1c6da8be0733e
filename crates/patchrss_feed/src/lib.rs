pub mod parser;
pub mod rewriter;

pub use parser::parse_feed;
pub use rewriter::{derive_link, rewrite, rewrite_with_encoding};
