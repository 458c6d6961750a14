//! # wagate-core
//!
//! Core types, collaborator traits, configuration, and error handling for the
//! wagate WhatsApp gateway.

pub mod config;
pub mod error;
pub mod group;
pub mod jid;
pub mod session;
pub mod traits;
