//! Content items and resources
//!
//! A `ContentItem` is a byte stream on its way into content storage; a
//! `Resource` is a byte stream on its way out. Both own their reader and are
//! consumed by whichever stage transfers the bytes, so a stream is read once
//! and never buffered by the types themselves.

use crate::metacard::Metacard;
use crate::uri::ResourceUri;
use std::fmt;
use std::io::Read;

/// Fallback MIME type for content of unknown type
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Owned byte stream
pub type ByteStream = Box<dyn Read + Send>;

/// Content to be written to content storage
pub struct ContentItem {
    /// Id of the record the content belongs to
    pub id: String,
    /// Derived role, `None` for primary content
    pub qualifier: Option<String>,
    /// File name presented to readers
    pub filename: String,
    /// MIME type
    pub mime_type: String,
    /// Size in bytes, when known up front
    pub size: Option<u64>,
    /// Record to associate with the content
    pub metacard: Option<Metacard>,
    /// The bytes
    pub stream: ByteStream,
}

impl ContentItem {
    /// Primary content for a record
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        stream: impl Read + Send + 'static,
    ) -> Self {
        ContentItem {
            id: id.into(),
            qualifier: None,
            filename: filename.into(),
            mime_type: mime_type.into(),
            size: None,
            metacard: None,
            stream: Box::new(stream),
        }
    }

    /// Builder: mark as derived content with the given role
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Builder: attach the owning record
    pub fn with_metacard(mut self, metacard: Metacard) -> Self {
        self.metacard = Some(metacard);
        self
    }

    /// Builder: set the size
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Reference to where this item lands in content storage
    pub fn content_ref(&self) -> ContentRef {
        ContentRef {
            id: self.id.clone(),
            qualifier: self.qualifier.clone(),
        }
    }
}

impl fmt::Debug for ContentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentItem")
            .field("id", &self.id)
            .field("qualifier", &self.qualifier)
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Address of stored content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentRef {
    /// Id of the owning record
    pub id: String,
    /// Derived role, `None` for primary content
    pub qualifier: Option<String>,
}

impl ContentRef {
    /// Primary content of a record
    pub fn primary(id: impl Into<String>) -> Self {
        ContentRef {
            id: id.into(),
            qualifier: None,
        }
    }

    /// Address named by a `content:` locator
    pub fn from_uri(uri: &ResourceUri) -> Self {
        ContentRef {
            id: uri.scheme_specific_part().to_string(),
            qualifier: uri.fragment().map(str::to_string),
        }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}#{}", self.id, q),
            None => f.write_str(&self.id),
        }
    }
}

/// Content fetched from storage
pub struct Resource {
    /// File name
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// Size in bytes, when known
    pub size: Option<u64>,
    /// The bytes
    pub stream: ByteStream,
}

impl Resource {
    /// Wrap a stream
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        stream: impl Read + Send + 'static,
    ) -> Self {
        Resource {
            name: name.into(),
            mime_type: mime_type.into(),
            size: None,
            stream: Box::new(stream),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
