//! Seams the generic pipeline depends on.
//!
//! Providers plug in through [`adapter::ProviderAdapter`] and, for job-based
//! providers, [`backend::JobBackend`]. Network access goes through
//! [`transport::Transport`] so tests can script replies.

pub mod adapter;
pub mod backend;
pub mod diagnostics;
pub mod transport;
