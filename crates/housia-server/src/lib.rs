//! HTTP boundary: job submission, status queries and health.

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;
