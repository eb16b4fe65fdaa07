//! Gateway connect URL

use std::fmt;

/// Protocol version the codec speaks
pub const DEFAULT_API_VERSION: u8 = 10;

/// The only payload encoding supported
pub const ENCODING: &str = "json";

/// Connect URL with its query string parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayUrl {
    base: String,
    version: u8,
    /// Transport compression, e.g. `zlib-stream`
    compress: Option<String>,
}

impl GatewayUrl {
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            version: DEFAULT_API_VERSION,
            compress: None,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_compress(mut self, compress: impl Into<String>) -> Self {
        self.compress = Some(compress.into());
        self
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Same query parameters against another host, used for resume URLs
    #[must_use]
    pub fn rebase(&self, base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for GatewayUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = self.base.trim_end_matches('/');
        write!(f, "{base}/?v={}&encoding={ENCODING}", self.version)?;
        if let Some(compress) = &self.compress {
            write!(f, "&compress={compress}")?;
        }
        Ok(())
    }
}
