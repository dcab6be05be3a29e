pub mod cookies;
pub mod tokens;

pub use tokens::{Claims, TokenPair, TokenService};
