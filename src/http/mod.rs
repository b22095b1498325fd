//! The HTTP error envelope shared by every handler in [`crate::rest`].

pub mod error;

pub use error::{AppErrorResponse, ProblemDetails};
