//! Request / response bodies of the HTTP API, with their OpenAPI schemas.

pub mod auth;
pub mod chat;
pub mod history;
pub mod models;
