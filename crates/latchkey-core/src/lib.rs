//! Domain types, validation rules and port traits for Latchkey.
//!
//! Nothing in this crate performs I/O. Storage and delivery adapters
//! live in `latchkey-db` and `latchkey-auth`.

pub mod error;
pub mod models;
pub mod ports;
pub mod repository;
pub mod validation;
