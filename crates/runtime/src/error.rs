//! Error types for the Firefox session runtime.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while bootstrapping or driving a browser session.
///
/// Every collaborator failure is re-tagged into one of these five kinds at
/// the boundary where it occurs, so callers get a stable taxonomy regardless
/// of which collaborator failed. There is no internal recovery or retry;
/// failures surface immediately.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed configuration, e.g. an empty remote endpoint.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Binary resolution or download failure.
    #[error("provisioning failed: {0}")]
    Provisioning(String),

    /// Browser process spawn or orchestration failure.
    #[error("launch failed: {0}")]
    Launch(String),

    /// Dial or remote-endpoint failure, including dial timeout.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Post-connection handshake failure.
    #[error("attach failed: {0}")]
    Attach(String),
}

impl Error {
    /// Returns the kind this error belongs to in the public taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Error::Provisioning(_) => ErrorKind::Provisioning,
            Error::Launch(_) => ErrorKind::Launch,
            Error::Connect(_) => ErrorKind::Connect,
            Error::Attach(_) => ErrorKind::Attach,
        }
    }
}

/// The five error kinds exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Provisioning,
    Launch,
    Connect,
    Attach,
}

/// Descriptor for one error kind in the registry.
#[derive(Debug, Clone, Copy)]
pub struct ErrorKindInfo {
    pub kind: ErrorKind,
    /// Stable public name of the kind.
    pub name: &'static str,
    /// One-line description of when the kind is raised.
    pub summary: &'static str,
}

/// The complete error-kind registry, compiled once and never mutated.
pub const ERROR_KINDS: &[ErrorKindInfo] = &[
    ErrorKindInfo {
        kind: ErrorKind::InvalidArgument,
        name: "InvalidArgument",
        summary: "a required field was missing or a supplied option was malformed",
    },
    ErrorKindInfo {
        kind: ErrorKind::Provisioning,
        name: "ProvisioningError",
        summary: "the browser binary could not be resolved or downloaded",
    },
    ErrorKindInfo {
        kind: ErrorKind::Launch,
        name: "LaunchError",
        summary: "the browser process could not be spawned or never became ready",
    },
    ErrorKindInfo {
        kind: ErrorKind::Connect,
        name: "ConnectError",
        summary: "the remote endpoint could not be dialed before the timeout",
    },
    ErrorKindInfo {
        kind: ErrorKind::Attach,
        name: "AttachError",
        summary: "the handshake after connecting to the browser failed",
    },
];

impl ErrorKind {
    /// Returns the stable public name of this kind.
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Returns the registry entry for this kind.
    pub fn info(self) -> &'static ErrorKindInfo {
        ERROR_KINDS
            .iter()
            .find(|info| info.kind == self)
            .expect("every kind has a registry entry")
    }

    /// Looks up a registry entry by its public name.
    pub fn by_name(name: &str) -> Option<&'static ErrorKindInfo> {
        ERROR_KINDS.iter().find(|info| info.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_one_entry_per_kind() {
        assert_eq!(ERROR_KINDS.len(), 5);
        let mut names: Vec<_> = ERROR_KINDS.iter().map(|info| info.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 5, "kind names must be unique");
    }

    #[test]
    fn by_name_inverts_name() {
        for info in ERROR_KINDS {
            let found = ErrorKind::by_name(info.name).expect("name resolves");
            assert_eq!(found.kind, info.kind);
        }
        assert!(ErrorKind::by_name("NoSuchError").is_none());
    }

    #[test]
    fn errors_map_to_their_kind() {
        assert_eq!(
            Error::InvalidArgument("x".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(Error::Provisioning("x".into()).kind(), ErrorKind::Provisioning);
        assert_eq!(Error::Launch("x".into()).kind(), ErrorKind::Launch);
        assert_eq!(Error::Connect("x".into()).kind(), ErrorKind::Connect);
        assert_eq!(Error::Attach("x".into()).kind(), ErrorKind::Attach);
    }
}
