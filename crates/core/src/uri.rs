//! Resource locators
//!
//! Content held by the catalog's own storage is addressed as
//! `content:<id>` for primary content and `content:<id>#<qualifier>` for
//! derived content. Other schemes point outside the catalog.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Scheme of locators served by the catalog's content storage
pub const CONTENT_SCHEME: &str = "content";

/// A parsed resource locator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceUri(Url);

impl ResourceUri {
    /// Parse a locator
    pub fn parse(input: &str) -> Result<Self, url::ParseError> {
        Url::parse(input).map(ResourceUri)
    }

    /// Locator of stored content, optionally qualified by a derived role
    pub fn content(id: &str, qualifier: Option<&str>) -> Result<Self, url::ParseError> {
        match qualifier {
            Some(q) => Self::parse(&format!("{}:{}#{}", CONTENT_SCHEME, id, q)),
            None => Self::parse(&format!("{}:{}", CONTENT_SCHEME, id)),
        }
    }

    /// Scheme name
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// True for locators served by the catalog's content storage
    pub fn is_content(&self) -> bool {
        self.scheme() == CONTENT_SCHEME
    }

    /// Everything between the scheme separator and the fragment
    pub fn scheme_specific_part(&self) -> &str {
        let full = self.0.as_str();
        let start = self.scheme().len() + 1;
        let end = full.find('#').unwrap_or(full.len());
        &full[start..end]
    }

    /// Fragment, if any
    pub fn fragment(&self) -> Option<&str> {
        self.0.fragment().filter(|f| !f.is_empty())
    }

    /// The locator text
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceUri {
    type Err = url::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResourceUri {
    type Error = url::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ResourceUri> for String {
    fn from(uri: ResourceUri) -> Self {
        uri.0.into()
    }
}
