pub mod output;
pub mod parse;
pub mod types;

pub use parse::parse_bounds;
