//! Country resolution for client addresses.

use std::{
    fmt,
    net::IpAddr,
    path::{Path, PathBuf},
};

use {
    maxminddb::{MaxMindDBError, Reader, geoip2},
    tracing::{debug, info},
};

use crate::{Error, Result};

/// Resolves the ISO country code of an address.
///
/// `Ok(None)` means the address is unknown to the backing data and can never
/// match a configured code. Failures of the backing store are errors.
pub trait CountryLookup: Send + Sync {
    fn lookup_country(&self, ip: IpAddr) -> Result<Option<String>>;
}

/// A MaxMind (`.mmdb`) country or city database loaded into memory.
pub struct CountryDatabase {
    path: PathBuf,
    reader: Reader<Vec<u8>>,
}

impl CountryDatabase {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = Reader::open_readfile(path).map_err(|e| {
            Error::config(format!("can't open database {}: {e}", path.display()))
        })?;
        info!(
            path = %path.display(),
            database_type = %reader.metadata.database_type,
            "country database opened"
        );
        Ok(Self {
            path: path.to_path_buf(),
            reader,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CountryLookup for CountryDatabase {
    fn lookup_country(&self, ip: IpAddr) -> Result<Option<String>> {
        match self.reader.lookup::<geoip2::Country>(ip) {
            Ok(record) => {
                let code = record.country.and_then(|c| c.iso_code).map(str::to_owned);
                debug!(%ip, country = ?code, "country lookup");
                Ok(code)
            },
            Err(MaxMindDBError::AddressNotFoundError(_)) => {
                debug!(%ip, "address not in country database");
                Ok(None)
            },
            Err(e) => Err(Error::LookupFailed {
                ip,
                source: Box::new(e),
            }),
        }
    }
}

impl fmt::Debug for CountryDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountryDatabase")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_database_is_config_error() {
        let err = CountryDatabase::open("/definitely/not/here.mmdb").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("can't open database"));
    }

    #[test]
    fn open_garbage_database_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.mmdb");
        std::fs::write(&path, b"this is not a maxmind database").unwrap();
        let err = CountryDatabase::open(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
