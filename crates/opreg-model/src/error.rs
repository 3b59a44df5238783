use crate::{ChannelName, CsvName, PackageName};

/// The error taxonomy shared by every crate that touches the catalog.
/// Mirrors `spec.md` §7 exactly; there is deliberately no `Panic` variant —
/// panics are caught at each public entry point with `catch_unwind` and
/// turned into `Error::Generic`, replacing the source's panic-based
/// capture with scoped recovery (see `spec.md` §9).
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error(
        "package {package}, channel {channel}: bundle {replacing} declares replaces={missing}, but no such bundle was loaded"
    )]
    MissingReplacee {
        package: PackageName,
        channel: ChannelName,
        replacing: CsvName,
        missing: CsvName,
    },

    #[error("package {package}, channel {channel}: head bundle {csv} does not resolve to a loaded bundle")]
    MissingChannelEntry {
        package: PackageName,
        channel: ChannelName,
        csv: CsvName,
    },

    #[error("package {0} declares no default channel")]
    NoDefaultChannel(PackageName),

    #[error("package {package}, channel {channel}: replaces chain contains a cycle at {csv}")]
    Cycle {
        package: PackageName,
        channel: ChannelName,
        csv: CsvName,
    },

    #[error("deprecating bundle {csv} in package {package} would leave the default channel {channel} without a head bundle")]
    DeprecationWouldRemoveDefaultChannel {
        package: PackageName,
        channel: ChannelName,
        csv: CsvName,
    },

    #[error("validation failed: {0}")]
    ValidationFailure(String),

    #[error("store transaction failed: {0}")]
    TransactionFailure(String),

    #[error("internal error: {0}")]
    Generic(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The aggregated per-bundle load errors produced by ingesting a directory
/// or a package in permissive mode.
#[derive(Debug, Default)]
pub struct LoadErrors {
    pub errors: Vec<(CsvName, Error)>,
}

impl LoadErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, csv: CsvName, err: Error) {
        self.errors.push((csv, err));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Strict-mode behavior: surface the first recorded error, if any.
    pub fn into_first_result(mut self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            let (_, err) = self.errors.remove(0);
            Err(err)
        }
    }
}

impl std::fmt::Display for LoadErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (csv, err) in &self.errors {
            writeln!(f, "{csv}: {err}")?;
        }
        Ok(())
    }
}
