//! Render bin factory
//!
//! Bins are created by name when a render stage first needs a bin number.
//! The registry is an ordinary value built at startup and handed to the
//! cull visitor, so contexts can carry different bin setups.

use std::collections::HashMap;
use std::fmt;

use crate::render::depth_sorted_bin::{DepthSortedBin, DrawOrder};
use crate::render::render_bin::{BinSortMode, RenderBin, StateSortedBin};

/// Name of the default state-sorted bin, also the fallback for unknown names
pub const DEFAULT_BIN_NAME: &str = "RenderBin";

type BinConstructor = Box<dyn Fn() -> Box<dyn RenderBin>>;

/// Name to bin-constructor map
pub struct RenderBinRegistry {
    constructors: HashMap<String, BinConstructor>,
}

impl RenderBinRegistry {
    /// Registry with the built-in bin types
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(DEFAULT_BIN_NAME, || {
            Box::new(StateSortedBin::new(BinSortMode::SortByState))
        });
        registry.register("TraversalOrderBin", || {
            Box::new(StateSortedBin::new(BinSortMode::TraversalOrder))
        });
        registry.register("DepthSortedBin", || {
            Box::new(DepthSortedBin::new(DrawOrder::BackToFront))
        });
        registry.register("FrontToBackBin", || {
            Box::new(DepthSortedBin::new(DrawOrder::FrontToBack))
        });
        registry
    }

    /// Registry with no bin types at all
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Add or replace a bin type
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn RenderBin> + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Create a bin by name
    ///
    /// Unknown names produce the default state-sorted bin.
    pub fn create(&self, name: &str) -> Box<dyn RenderBin> {
        if let Some(constructor) = self.constructors.get(name) {
            return constructor();
        }

        log::warn!("Unknown render bin '{}', using '{}'", name, DEFAULT_BIN_NAME);
        match self.constructors.get(DEFAULT_BIN_NAME) {
            Some(constructor) => constructor(),
            None => Box::new(StateSortedBin::new(BinSortMode::SortByState)),
        }
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for RenderBinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RenderBinRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderBinRegistry")
            .field("bins", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_bins() {
        let registry = RenderBinRegistry::new();
        assert_eq!(
            registry.names(),
            vec!["DepthSortedBin", "FrontToBackBin", "RenderBin", "TraversalOrderBin"]
        );
        assert_eq!(registry.create("FrontToBackBin").name(), "FrontToBackBin");
        assert_eq!(registry.create("TraversalOrderBin").name(), "TraversalOrderBin");
    }

    #[test]
    fn test_unknown_name_falls_back() {
        let registry = RenderBinRegistry::new();
        assert_eq!(registry.create("NoSuchBin").name(), DEFAULT_BIN_NAME);
        assert_eq!(RenderBinRegistry::empty().create("NoSuchBin").name(), DEFAULT_BIN_NAME);
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = RenderBinRegistry::new();
        registry.register("DepthSortedBin", || {
            Box::new(DepthSortedBin::new(DrawOrder::FrontToBack))
        });
        assert_eq!(registry.create("DepthSortedBin").name(), "FrontToBackBin");
    }
}
