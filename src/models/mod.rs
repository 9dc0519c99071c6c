//! Request and Response models for the cache API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::PutRequest;
pub use responses::{
    ClearResponse, ErrorResponse, GetResponse, HealthResponse, KeysResponse, PutResponse,
    RemoveResponse, SessionStatus, SizeResponse, ValuesResponse,
};
