//! Tree-walking evaluation with in-place rewriting.

mod eval;
mod value;

pub use eval::Interpreter;
pub use value::Value;

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A read intrinsic received something that does not parse as a scalar.
    #[error("invalid input")]
    InvalidInput,
    #[error("division by zero")]
    DivisionByZero,
    #[error(transparent)]
    Io(#[from] io::Error),
}
