//! Global filter registry for resolving configured filter names.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use super::FilterPair;
use crate::error::{FilterError, Result};

/// Global filter registry.
static REGISTRY: Lazy<RwLock<FilterRegistry>> = Lazy::new(|| {
    let mut registry = FilterRegistry::new();
    registry.register_builtin_filters();
    RwLock::new(registry)
});

/// Registry mapping configuration-supplied names to filter pairs.
///
/// The built-in `"text"` and `"binary"` pairs are pre-registered. A plugin
/// loading mechanism resolves its implementations into [`FilterPair`]s and
/// [`register`](Self::register)s them here before the session starts.
#[derive(Default)]
pub struct FilterRegistry {
    filters: HashMap<String, FilterPair>,
}

impl FilterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            filters: HashMap::new(),
        }
    }

    /// Get the global registry.
    pub fn global() -> &'static RwLock<FilterRegistry> {
        &REGISTRY
    }

    /// Resolve a name through the global registry.
    pub fn resolve(name: &str) -> Result<FilterPair> {
        let registry = Self::global()
            .read()
            .map_err(|_| FilterError::Registry {
                message: "failed to acquire registry lock".to_string(),
            })?;
        registry.get(name).ok_or_else(|| {
            FilterError::Unknown {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Register built-in filter pairs.
    fn register_builtin_filters(&mut self) {
        self.filters
            .insert("text".to_string(), FilterPair::text());
        self.filters
            .insert("binary".to_string(), FilterPair::binary());
    }

    /// Register a filter pair under its name.
    pub fn register(&mut self, pair: FilterPair) -> Result<()> {
        if self.filters.contains_key(&pair.name) {
            return Err(FilterError::AlreadyRegistered {
                name: pair.name.clone(),
            }
            .into());
        }
        self.filters.insert(pair.name.clone(), pair);
        Ok(())
    }

    /// Get a filter pair by name.
    pub fn get(&self, name: &str) -> Option<FilterPair> {
        self.filters.get(name).cloned()
    }

    /// Check if a filter pair is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// List all registered filter names.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.filters.keys()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::filter::{DelimitedInput, LineOutput};

    #[test]
    fn test_builtin_filters_resolve() {
        assert_eq!(FilterRegistry::resolve("text").unwrap().name, "text");
        assert_eq!(FilterRegistry::resolve("binary").unwrap().name, "binary");
    }

    #[test]
    fn test_unknown_filter_is_an_error() {
        assert!(FilterRegistry::resolve("no-such-filter").is_err());
    }

    #[test]
    fn test_register_and_resolve_custom_pair() {
        let pair = FilterPair::new(
            "crlf",
            Arc::new(DelimitedInput::with_delimiter(b"\r\n".to_vec())),
            Arc::new(LineOutput::with_terminator(b"\r\n".to_vec())),
        );
        FilterRegistry::global()
            .write()
            .unwrap()
            .register(pair)
            .unwrap();

        assert!(FilterRegistry::resolve("crlf").is_ok());
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let result = FilterRegistry::global()
            .write()
            .unwrap()
            .register(FilterPair::text());
        assert!(result.is_err());
    }
}
