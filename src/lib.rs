//! shelfsync - third-party game libraries to Steam shortcuts
//!
//! Reads the installed-game manifests maintained by the Epic (legendary),
//! GOG (Heroic) and Amazon (nile) launchers and reconciles them into the
//! Steam binary shortcuts container, with an atomic validated write
//! protocol and a JSON registry index mapping store identities to
//! shortcut slots.

pub mod config;
pub mod connectors;
pub mod identity;
pub mod merge;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod service;
pub mod shortcuts;
