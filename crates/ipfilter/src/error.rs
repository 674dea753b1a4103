use std::{net::IpAddr, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Malformed or incomplete rule definitions. Fatal at setup time.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An IP range expression that does not reduce to IPv4 bounds.
    #[error("can't parse IPv4 address: {0:?}")]
    InvalidAddress(String),

    /// None of the candidate client addresses could be parsed.
    #[error("unable to parse any client address from {0:?}")]
    NoParsableAddress(String),

    #[error("country lookup failed for {ip}: {source}")]
    LookupFailed {
        ip: IpAddr,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to stream block page {}: {source}", path.display())]
    StreamingFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error aborts a single request rather than the setup.
    #[must_use]
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            Self::NoParsableAddress(_) | Self::LookupFailed { .. } | Self::StreamingFailed { .. }
        )
    }

    /// Short label used for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Toml(_) => "toml",
            Self::Config(_) => "config",
            Self::InvalidAddress(_) => "invalid_address",
            Self::NoParsableAddress(_) => "no_parsable_address",
            Self::LookupFailed { .. } => "lookup_failed",
            Self::StreamingFailed { .. } => "streaming_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn setup_errors_have_stable_kinds() {
        let io: Error = std::fs::read("/nowhere/rules.toml").unwrap_err().into();
        let cases = [
            (io, "io"),
            (Error::config("no rules"), "config"),
            (Error::InvalidAddress("1.1.1-10".into()), "invalid_address"),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{err}");
            assert!(!err.is_request_failure(), "{err}");
        }
        assert_eq!(
            Error::InvalidAddress("1.1.1-10".into()).to_string(),
            "can't parse IPv4 address: \"1.1.1-10\""
        );
    }

    #[test]
    fn toml_error_converts() {
        let toml_err = toml::from_str::<toml::Value>("= nope").unwrap_err();
        let err: Error = toml_err.into();
        assert!(matches!(err, Error::Toml(_)));
        assert_eq!(err.kind(), "toml");
    }

    #[test]
    fn config_error() {
        let err = Error::config("no rules");
        assert_eq!(err.to_string(), "invalid configuration: no rules");
        assert!(!err.is_request_failure());
    }

    #[test]
    fn request_failures() {
        assert!(Error::NoParsableAddress("junk".into()).is_request_failure());
        let lookup = Error::LookupFailed {
            ip: "1.2.3.4".parse().unwrap(),
            source: "corrupt".into(),
        };
        assert!(lookup.is_request_failure());
        assert_eq!(
            lookup.to_string(),
            "country lookup failed for 1.2.3.4: corrupt"
        );
        let streaming = Error::StreamingFailed {
            path: PathBuf::from("/tmp/page.html"),
            source: std::io::Error::other("boom"),
        };
        assert!(streaming.is_request_failure());
        assert_eq!(streaming.kind(), "streaming_failed");
        assert!(!Error::InvalidAddress("x".into()).is_request_failure());
    }
}
