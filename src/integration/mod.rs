//! Integration tests driving whole runs with fake media and a scripted service.

pub mod e2e;
pub mod fixtures;
