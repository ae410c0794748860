//! The registry of mechanisms a [`Factory`](crate::Factory) is able to construct.

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use dashmap::{mapref::entry::Entry, DashMap};
use strum::IntoEnumIterator;

use crate::{error::BoxError, factory::Builtin, Config, Credentials, Error, Mechanism, Result};

/// Maximum length of a mechanism name, from RFC 4422 §3.1.
const MAX_NAME_LEN: usize = 20;

/// A case-insensitive SASL mechanism name.
///
/// Names are normalized to upper-case and validated
/// against the syntax of RFC 4422 §3.1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MechanismName(String);

impl MechanismName {
    /// Validate and normalize a mechanism name.
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("empty mechanism name"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(Error::InvalidArgument(
                "mechanism name longer than 20 characters",
            ));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(Error::InvalidArgument(
                "mechanism name with characters outside of `A-Z`, `0-9`, `-` and `_`",
            ));
        }

        Ok(Self(name.to_ascii_uppercase()))
    }

    /// The normalized, upper-case name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for MechanismName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl AsRef<str> for MechanismName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for MechanismName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored constructor for an externally registered mechanism.
pub type Constructor =
    Arc<dyn Fn(Credentials, &Config) -> Result<Box<dyn Mechanism>, BoxError> + Send + Sync>;

/// The way to construct a registered mechanism.
#[derive(Clone)]
pub enum Descriptor {
    /// One of the mechanisms shipped with this crate.
    Builtin(Builtin),

    /// A mechanism registered with [`Registry::register`].
    External(Constructor),
}

impl std::fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin(builtin) => f.debug_tuple("Builtin").field(builtin).finish(),
            Self::External(_) => f.write_str("External(..)"),
        }
    }
}

struct Registered {
    index: usize,
    descriptor: Descriptor,
}

/// A set of mechanisms, indexed by their case-insensitive name.
///
/// # Note
/// The built-in mechanisms are always registered, and registrations are never removed.
/// Registering while other threads look mechanisms up is safe.
pub struct Registry {
    entries: DashMap<MechanismName, Registered>,
    counter: AtomicUsize,
}

impl Registry {
    /// Create a [`Registry`] containing the built-in mechanisms.
    pub fn new() -> Self {
        let registry = Self {
            entries: Default::default(),
            counter: Default::default(),
        };

        for builtin in Builtin::iter() {
            registry.entries.insert(
                MechanismName(builtin.as_ref().into()),
                Registered {
                    index: registry.counter.fetch_add(1, Ordering::Relaxed),
                    descriptor: Descriptor::Builtin(builtin),
                },
            );
        }

        registry
    }

    /// Register a mechanism under the provided _name_, with its _constructor_.
    ///
    /// The constructor must return a fresh, unstarted instance on each call.
    pub fn register<F>(&self, name: &str, constructor: F) -> Result<()>
    where
        F: Fn(Credentials, &Config) -> Result<Box<dyn Mechanism>, BoxError>
            + Send
            + Sync
            + 'static,
    {
        let name = MechanismName::new(name)?;

        match self.entries.entry(name) {
            Entry::Occupied(entry) => {
                tracing::debug!("Refused to register `{}` twice", entry.key());

                Err(Error::DuplicateMechanism(entry.key().to_string()))
            }
            Entry::Vacant(entry) => {
                tracing::debug!("Registered the `{}` mechanism", entry.key());

                entry.insert(Registered {
                    index: self.counter.fetch_add(1, Ordering::Relaxed),
                    descriptor: Descriptor::External(Arc::new(constructor)),
                });

                Ok(())
            }
        }
    }

    /// Look the mechanism up by its case-insensitive _name_.
    pub fn lookup(&self, name: &str) -> Option<Descriptor> {
        let name = MechanismName::new(name).ok()?;

        self.entries
            .get(&name)
            .map(|entry| entry.descriptor.clone())
    }

    /// Whether a mechanism goes by this case-insensitive _name_.
    pub fn contains(&self, name: &str) -> bool {
        MechanismName::new(name).is_ok_and(|name| self.entries.contains_key(&name))
    }

    /// Names of the registered mechanisms, built-ins first then in registration order.
    pub fn names(&self) -> Vec<MechanismName> {
        let mut names = self
            .entries
            .iter()
            .map(|entry| (entry.value().index, entry.key().clone()))
            .collect::<Vec<_>>();
        names.sort_unstable_by_key(|(index, _)| *index);

        names.into_iter().map(|(_, name)| name).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}
