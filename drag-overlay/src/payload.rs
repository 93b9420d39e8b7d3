//! Drag payloads offered to drop targets.

use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

pub const URI_LIST_MIME: &str = "text/uri-list";

/// Typed bytes handed to the compositor when a drag starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentProvider {
    mime_type: String,
    bytes: Vec<u8>,
}

impl ContentProvider {
    pub fn for_bytes(mime_type: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Bytes for `mime`, or `None` if this provider does not offer that type.
    pub fn bytes_for(&self, mime: &str) -> Option<&[u8]> {
        (mime == self.mime_type).then_some(self.bytes.as_slice())
    }

    /// Writes the payload for `mime` into `writer`. Returns `false` without
    /// writing anything when the type is not offered.
    pub fn write_to<W: Write>(&self, mime: &str, mut writer: W) -> Result<bool> {
        let Some(bytes) = self.bytes_for(mime) else {
            return Ok(false);
        };
        writer
            .write_all(bytes)
            .with_context(|| format!("Failed to write {} payload", mime))?;
        writer.flush()?;
        Ok(true)
    }
}

/// `file://` URI for `path`. Relative paths are resolved against the
/// current directory first.
pub fn file_uri(path: &Path) -> Result<Url> {
    let absolute: PathBuf = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to resolve current directory")?
            .join(path)
    };

    Url::from_file_path(&absolute)
        .map_err(|_| anyhow!("{} cannot be expressed as a file URI", absolute.display()))
}

/// Single-entry `text/uri-list` body: the file URI followed by CRLF.
pub fn uri_list_payload(path: &Path) -> Result<ContentProvider> {
    let uri = file_uri(path)?;
    let body = format!("{}\r\n", uri);
    Ok(ContentProvider::for_bytes(URI_LIST_MIME, body.into_bytes()))
}
