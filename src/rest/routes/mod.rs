//! One module per route group (spec.md §6), mirroring `rest::build_router`'s
//! grouping comments.

pub mod admin;
pub mod auth;
pub mod client;
pub mod health;
pub mod iam;
pub mod public;
pub mod worker;
