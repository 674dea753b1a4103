//! Responding to blocked requests.

use std::{
    fs::File,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{Error, Result};

/// A payload file served in place of the requested resource when blocking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPage {
    path: PathBuf,
}

impl BlockPage {
    /// Reference a block page, which must exist now.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Err(Error::config(format!("no such file: {}", path.display())));
        }
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy the page into `out`, returning the number of bytes written.
    pub fn copy_to<W: Write + ?Sized>(&self, out: &mut W) -> Result<u64> {
        let mut file = File::open(&self.path).map_err(|e| self.streaming_failed(e))?;
        io::copy(&mut file, out).map_err(|e| self.streaming_failed(e))
    }

    pub(crate) fn streaming_failed(&self, source: io::Error) -> Error {
        Error::StreamingFailed {
            path: self.path.clone(),
            source,
        }
    }
}

/// How a blocked request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    /// The block page was written as the body.
    PageServed,
    /// No block page; the request is refused.
    Forbidden,
}

impl BlockStatus {
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::PageServed => 200,
            Self::Forbidden => 403,
        }
    }
}

/// Status code for a request that failed while being filtered or blocked.
pub const INTERNAL_ERROR_STATUS: u16 = 500;

/// Answer a blocked request, writing the block page to `out` if there is one.
///
/// A page that can't be streamed is a [`Error::StreamingFailed`], which the
/// caller reports as [`INTERNAL_ERROR_STATUS`].
pub fn respond_blocked<W: Write + ?Sized>(
    page: Option<&BlockPage>,
    out: &mut W,
) -> Result<BlockStatus> {
    match page {
        Some(page) => {
            let written = page.copy_to(out)?;
            debug!(path = %page.path().display(), bytes = written, "block page served");
            Ok(BlockStatus::PageServed)
        },
        None => Ok(BlockStatus::Forbidden),
    }
}
