//! Observability for token validation.
//!
//! Metrics go through the `metrics` facade; no exporter is installed here.
//! The embedding service decides where they end up.
//!
//! # Privacy
//!
//! Tokens, key material, subjects and email addresses never appear in log
//! fields or metric labels. Labels are restricted to the bounded value sets
//! documented in [`metrics`].

pub mod metrics;
