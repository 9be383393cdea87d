//! Pass type registry.
//!
//! Maps pass type names to factories. The registry is an ordinary owned value:
//! populate it at startup (typically through a plugin's `register_passes`
//! function) and pass it by reference to the graph builder afterwards.

use std::collections::HashMap;
use std::fmt;

use crate::error::{GraphError, Result};
use crate::graph::{PassType, RenderPass};
use crate::options::Options;

/// Factory producing a configured pass from a configuration record.
pub type PassFactory = Box<dyn Fn(&Options) -> Result<Box<dyn RenderPass>> + Send + Sync>;

/// Table of pass factories keyed by type name.
#[derive(Default)]
pub struct PassRegistry {
    factories: HashMap<String, PassFactory>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `type_name` with `factory`.
    ///
    /// Registering a name twice replaces the earlier factory, which is returned.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F) -> Option<PassFactory>
    where
        F: Fn(&Options) -> Result<Box<dyn RenderPass>> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        let previous = self.factories.insert(type_name.clone(), Box::new(factory));
        if previous.is_some() {
            log::debug!("pass type '{type_name}' re-registered, previous factory replaced");
        } else {
            log::debug!("pass type '{type_name}' registered");
        }
        previous
    }

    /// Register a [`PassType`] under its `TYPE_NAME`.
    pub fn register_type<P: PassType>(&mut self) -> Option<PassFactory> {
        self.register(P::TYPE_NAME, |options| {
            P::from_options(options).map(|pass| Box::new(pass) as Box<dyn RenderPass>)
        })
    }

    /// Create a pass of `type_name` configured with `options`.
    pub fn create(&self, type_name: &str, options: &Options) -> Result<Box<dyn RenderPass>> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| GraphError::UnknownPassType(type_name.to_string()))?;
        factory(options)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for PassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
