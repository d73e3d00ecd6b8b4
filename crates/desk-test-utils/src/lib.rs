//! Testing utilities for the desk workspace
//!
//! Shared fixtures and an in-process mock of the desk API.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

pub mod fixtures;
pub mod server;

pub use fixtures::*;
pub use server::{MockDeskServer, RecordedRequest, Route};
