//! DDL parsing for the catalog shell.
//!
//! Uses the `sqlparser` crate for the standard statements, then converts to
//! our own [`Statement`]. `SHOW` and `DESCRIBE` forms are matched by hand.

mod ast;
mod error;
mod parser;

pub use ast::*;
pub use error::{ParseError, ParseResult};
pub use parser::Parser;
