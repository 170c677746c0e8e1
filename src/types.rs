//! Core data types shared across the refresher.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Integer form of a stub format version (`major << 8 | minor`).
pub type FormatVersion = u32;

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// A binary module reported by the lister for one refresh run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryModule {
    /// Dotted module name, unique within a listing.
    pub name: String,
    /// Path of the binary the module is loaded from.
    pub origin_path: String,
    pub byte_size: u64,
    pub modified_at_millis: Millis,
}

impl BinaryModule {
    pub fn new(
        name: impl Into<String>,
        origin_path: impl Into<String>,
        byte_size: u64,
        modified_at_millis: Millis,
    ) -> Self {
        Self {
            name: name.into(),
            origin_path: origin_path.into(),
            byte_size,
            modified_at_millis,
        }
    }
}

/// Output of the binary lister: generator version plus the module set.
///
/// Modules are keyed by name in a `BTreeMap` so iteration is already in
/// lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub generator_version: FormatVersion,
    pub modules: BTreeMap<String, BinaryModule>,
}

impl Listing {
    pub fn new(generator_version: FormatVersion) -> Self {
        Self {
            generator_version,
            modules: BTreeMap::new(),
        }
    }

    pub fn with_module(mut self, module: BinaryModule) -> Self {
        self.modules.insert(module.name.clone(), module);
        self
    }
}

/// A module that could not be brought up to date in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub module_name: String,
    pub origin_path: String,
    pub modified_at_millis: Millis,
    /// `true` when generation was attempted and failed in this run,
    /// `false` when the attempt was suppressed by the blacklist.
    pub fresh: bool,
}

impl UpdateResult {
    pub fn fresh(module: &BinaryModule) -> Self {
        Self::from_module(module, true)
    }

    pub fn suppressed(module: &BinaryModule) -> Self {
        Self::from_module(module, false)
    }

    fn from_module(module: &BinaryModule, fresh: bool) -> Self {
        Self {
            module_name: module.name.clone(),
            origin_path: module.origin_path.clone(),
            modified_at_millis: module.modified_at_millis,
            fresh,
        }
    }
}
