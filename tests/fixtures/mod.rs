//! Test Fixtures Module
//!
//! - Audio fixtures (programmatically generated)
//! - In-memory collaborator doubles and a server harness

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod audio_fixtures;
pub mod collaborators;
pub mod server;

pub use audio_fixtures::*;
pub use collaborators::*;
pub use server::*;
