//! # Web Middleware

pub mod auth;
