//! Source-analysis parsers used only by the Harness Generator.

pub mod function;
pub mod input;

pub use function::parse_function;
pub use input::{ParsedInput, parse_input};
