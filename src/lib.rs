//! File upload and metadata service.
//!
//! An axum application exposing `GET /healthz` and a small `/v1/file` API.
//! Payloads go to an object store (S3 or local disk), metadata to Postgres.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
