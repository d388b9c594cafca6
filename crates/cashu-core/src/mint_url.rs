//! Mint URL

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{ParseError, Url};

use crate::ensure;

/// Url error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Url parse error
    #[error(transparent)]
    Url(#[from] ParseError),
    /// Invalid URL structure
    #[error("Invalid URL")]
    InvalidUrl,
}

/// Mint URL
///
/// Stored in normalized form: lowercased scheme and host, no trailing
/// slashes. Two spellings of the same mint compare equal, which is what the
/// wrong-mint check on receive relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MintUrl(String);

impl MintUrl {
    fn format_url(url: &str) -> Result<String, Error> {
        ensure!(!url.is_empty(), Error::InvalidUrl);

        let url = url.trim_end_matches('/');
        let (protocol, rest) = url.split_once("://").ok_or(Error::InvalidUrl)?;
        let mut parts = rest.split('/');
        let host = parts.next().ok_or(Error::InvalidUrl)?;
        ensure!(!host.is_empty(), Error::InvalidUrl);
        let path = parts.collect::<Vec<&str>>().join("/");

        let mut formatted = format!("{}://{}", protocol.to_lowercase(), host.to_lowercase());
        if !path.is_empty() {
            formatted.push('/');
            formatted.push_str(&path);
        }
        Ok(formatted)
    }

    /// Join a path onto the url
    pub fn join(&self, path: &str) -> Result<Url, Error> {
        let url = Url::parse(&self.0)?;

        let base_path = url.path();
        let normalized_path = if base_path.ends_with('/') {
            format!("{base_path}{path}")
        } else {
            format!("{base_path}/{path}")
        };

        let mut result = url.clone();
        result.set_path(&normalized_path);
        Ok(result)
    }

    /// Append path elements onto the URL
    pub fn join_paths(&self, path_elements: &[&str]) -> Result<Url, Error> {
        self.join(&path_elements.join("/"))
    }
}

impl FromStr for MintUrl {
    type Err = Error;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        Self::format_url(url).map(Self).map_err(|_| Error::InvalidUrl)
    }
}

impl fmt::Display for MintUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for MintUrl {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MintUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MintUrl::from_str(&s).map_err(serde::de::Error::custom)
    }
}
