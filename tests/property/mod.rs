//! Property-based tests for version ordering and blacklist persistence

mod blacklist;
mod version_policy;
