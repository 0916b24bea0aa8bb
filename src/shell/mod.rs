//! Interactive catalog shell.
//!
//! A [`Session`] runs DDL statements against one catalog; the [`Repl`]
//! reads them from stdin.

mod repl;
mod session;

pub use repl::{render, Repl, ReplConfig};
pub use session::{Session, ShellError, ShellOutput, ShellResult};
