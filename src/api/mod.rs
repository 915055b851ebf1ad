//! HTTP surface of the service.
//!
//! Each resource gets its own router, nested under the crate-level
//! router built in [`crate::build_router`]. Handlers stay thin: they
//! deserialize the request, call the matching service operation and
//! serialize the result. All error mapping lives in [`crate::error`].

pub mod films;
pub mod genres;
pub mod ratings;
pub mod users;
