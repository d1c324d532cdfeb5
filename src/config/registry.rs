use crate::net::Sim;
use crate::runtime::SimError;
use fxhash::FxHashMap;
use std::fmt;

type NetworkFn = Box<dyn Fn(&mut Sim)>;

struct NetworkEntry {
    description: String,
    build: NetworkFn,
}

///
/// A registry binding type names to network constructors and module
/// descriptions.
///
/// Configurations instantiate their network through this registry; the
/// CLI uses it to answer `describe` queries.
///
#[derive(Default)]
pub struct Registry {
    networks: FxHashMap<String, NetworkEntry>,
    modules: FxHashMap<String, String>,
}

impl Registry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Registry {
        Registry::default()
    }

    ///
    /// Registers a network type: a constructor that builds the module
    /// tree of the named network into a fresh simulation.
    ///
    pub fn network(
        mut self,
        name: impl AsRef<str>,
        description: impl Into<String>,
        build: impl Fn(&mut Sim) + 'static,
    ) -> Self {
        self.networks.insert(
            name.as_ref().to_string(),
            NetworkEntry {
                description: description.into(),
                build: Box::new(build),
            },
        );
        self
    }

    ///
    /// Registers a module type description, answering `describe`
    /// queries for types that are not standalone networks.
    ///
    pub fn module_type(mut self, name: impl AsRef<str>, description: impl Into<String>) -> Self {
        self.modules
            .insert(name.as_ref().to_string(), description.into());
        self
    }

    ///
    /// Builds the named network into the given simulation.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if no such network type is
    /// registered.
    ///
    pub fn build_network(&self, name: &str, sim: &mut Sim) -> Result<(), SimError> {
        let Some(entry) = self.networks.get(name) else {
            return Err(SimError::Config(format!("unknown network type '{name}'")));
        };
        (entry.build)(sim);
        Ok(())
    }

    /// The description of a registered network or module type.
    #[must_use]
    pub fn describe(&self, name: &str) -> Option<&str> {
        self.networks
            .get(name)
            .map(|entry| entry.description.as_str())
            .or_else(|| self.modules.get(name).map(String::as_str))
    }

    /// The names of all registered types, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names = self
            .networks
            .keys()
            .chain(self.modules.keys())
            .map(String::as_str)
            .collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("networks", &self.networks.len())
            .field("modules", &self.modules.len())
            .finish()
    }
}
