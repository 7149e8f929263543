use anyhow::{bail, Error, Result};

/// Determines what counts as a probeable target.
///
/// The same mode must be used to build a snapshot's allow-list and to admit
/// targets against it, so the mode travels with each snapshot.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DerivationMode {
    /// Each backend reference yields a composed `http://{name}.{namespace}:{port}`
    /// address, and targets must match one verbatim.
    #[default]
    Address,

    /// Every hostname declared on a route is allowed, and a target is admitted
    /// when its host matches one.
    ///
    /// This trusts the hostnames a route declares rather than the backends it
    /// forwards to: the probe dials whatever address the declared hostname
    /// resolves to from this process.
    Hostname,
}

// === impl DerivationMode ===

impl DerivationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Hostname => "hostname",
        }
    }
}

impl std::str::FromStr for DerivationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "address" => Ok(Self::Address),
            "hostname" => Ok(Self::Hostname),
            s => bail!("invalid derivation mode: {s}"),
        }
    }
}

impl std::fmt::Display for DerivationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
