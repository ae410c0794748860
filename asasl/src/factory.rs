//! Resolution of mechanism names into live [`Mechanism`] instances.

use std::sync::Arc;

use strum::{AsRefStr, Display, EnumIter, EnumString, EnumVariantNames};

use crate::{
    mechanism::{DigestMd5, Plain, ScramSha1},
    registry::Descriptor,
    Config, Credentials, Error, Mechanism, Registry, Result, State,
};

/// The mechanisms shipped with this crate, strongest first.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Display, EnumIter, EnumVariantNames,
)]
#[strum(ascii_case_insensitive)]
pub enum Builtin {
    /// Salted challenge-response with sha-1 digest, see [`ScramSha1`].
    #[strum(serialize = "SCRAM-SHA-1")]
    ScramSha1,

    /// Digest challenge with md5 digest, see [`DigestMd5`].
    #[strum(serialize = "DIGEST-MD5")]
    DigestMd5,

    /// Plain-text credentials, see [`Plain`].
    #[strum(serialize = "PLAIN")]
    Plain,
}

impl Builtin {
    fn construct(self, credentials: Credentials, config: &Config) -> Box<dyn Mechanism> {
        match self {
            Self::ScramSha1 => Box::new(ScramSha1::new(credentials, config)),
            Self::DigestMd5 => Box::new(DigestMd5::new(credentials, config)),
            Self::Plain => Box::new(Plain::new(credentials)),
        }
    }
}

/// The entry point to create mechanisms, from a [`Registry`] and a [`Config`].
#[derive(Debug, Clone, Default)]
pub struct Factory {
    registry: Arc<Registry>,
    config: Config,
}

impl Factory {
    /// Create a [`Factory`] resolving names through the provided _registry_.
    pub fn new(registry: Arc<Registry>, config: Config) -> Self {
        Self { registry, config }
    }

    /// The registry resolving mechanism names.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The policy handed to the created mechanisms.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a fresh mechanism named _name_, authenticating with _credentials_.
    ///
    /// Built-in mechanisms, which every [`Registry`] holds, are constructed directly,
    /// the registered ones through their constructor.
    pub fn create(
        &self,
        name: &str,
        credentials: impl Into<Credentials>,
    ) -> Result<Box<dyn Mechanism>> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("empty mechanism name"));
        }

        let credentials = credentials.into();

        match self.registry.lookup(name) {
            Some(Descriptor::Builtin(builtin)) => {
                tracing::debug!("Creating built-in mechanism `{builtin}`");

                Ok(builtin.construct(credentials, &self.config))
            }
            Some(Descriptor::External(constructor)) => {
                tracing::debug!("Creating registered mechanism `{name}`");

                let mechanism = constructor(credentials, &self.config).map_err(|source| {
                    Error::MechanismConstruction {
                        name: name.into(),
                        source,
                    }
                })?;

                if mechanism.state() != State::Initial {
                    return Err(Error::MechanismConstruction {
                        name: name.into(),
                        source: format!(
                            "constructed in the {:?} state instead of {:?}",
                            mechanism.state(),
                            State::Initial
                        )
                        .into(),
                    });
                }

                Ok(mechanism)
            }
            None => Err(Error::UnknownMechanism(name.into())),
        }
    }

    /// Pick the preferred mechanism among the ones _offered_ by the server, and create it.
    ///
    /// Mechanisms are tried in the order of [`Config::preference`],
    /// skipping the ones failing to construct.
    pub fn negotiate<I, S>(
        &self,
        offered: I,
        credentials: impl Into<Credentials>,
    ) -> Result<Box<dyn Mechanism>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let offered = offered.into_iter().collect::<Vec<_>>();
        let credentials = credentials.into();

        let mut last = None;
        for preferred in self.config.preference.iter().filter(|preferred| {
            offered
                .iter()
                .any(|name| name.as_ref().trim().eq_ignore_ascii_case(preferred))
        }) {
            match self.create(preferred, credentials.clone()) {
                Ok(mechanism) => {
                    tracing::debug!("Negotiated the `{}` mechanism", mechanism.name());

                    return Ok(mechanism);
                }
                Err(err) => {
                    tracing::warn!("Skipping mechanism `{preferred}`: {err}");

                    last = Some(err);
                }
            }
        }

        Err(last.unwrap_or(Error::NoCommonMechanism))
    }
}
