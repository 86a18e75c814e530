use std::fmt::{Debug, Display};

/// A location in the hierarchical store, such as `Rides/{rideID}` or
/// `Rent A Car/{uid}/Cars/{registration}`.
///
/// Segments may contain spaces, since the historical store layout uses them.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// The root of the store, containing every top-level collection.
    pub fn root() -> Self {
        Self { segments: vec![] }
    }

    pub fn new<S>(segments: impl IntoIterator<Item = S>) -> Self
    where
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a `/`-separated path. Empty segments are discarded.
    pub fn parse(raw: &str) -> Self {
        Self {
            segments: raw
                .split('/')
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
        }
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());

        Self { segments }
    }

    pub fn parent(&self) -> Option<Self> {
        let mut segments = self.segments.clone();

        segments.pop().map(|_| Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns true if `self` is `other` or a descendant of it.
    pub fn starts_with(&self, other: &StorePath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    /// Returns true if a write at `written` is observable from a
    /// subscription rooted at `self`, which is the case when either path
    /// contains the other.
    pub fn intersects(&self, written: &StorePath) -> bool {
        self.starts_with(written) || written.starts_with(self)
    }
}

impl Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }

        write!(f, "/{}", self.segments.join("/"))
    }
}

impl Debug for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<&str> for StorePath {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
