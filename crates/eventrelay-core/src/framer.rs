//! Framer: splits a received chunk into candidate record texts.
//!
//! Framing is best-effort. A chunk is only looked at if it contains the
//! event marker; it is then split on the delimiter and every fragment that
//! does not end in `}` is dropped. Nothing is carried across reads, so a
//! record cut in two by a read boundary is lost.

use serde::{Deserialize, Serialize};

/// Framing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramingConfig {
    /// Substring a chunk must contain to be considered at all
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Literal separator between concatenated JSON objects
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Also skip chunks that contain no delimiter
    #[serde(default)]
    pub require_delimiter: bool,
}

fn default_marker() -> String {
    "live_event".into()
}

fn default_delimiter() -> String {
    "$$$".into()
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            delimiter: default_delimiter(),
            require_delimiter: false,
        }
    }
}

/// Stateless chunk splitter.
#[derive(Debug, Clone, Default)]
pub struct Framer {
    config: FramingConfig,
}

impl Framer {
    pub fn new(config: FramingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FramingConfig {
        &self.config
    }

    /// Returns `true` if the chunk passes the marker pre-filter.
    pub fn accepts(&self, chunk: &str) -> bool {
        chunk.contains(self.config.marker.as_str())
            && (!self.config.require_delimiter || chunk.contains(self.config.delimiter.as_str()))
    }

    /// Lazily yield the complete record texts in `chunk`, in order.
    ///
    /// A chunk rejected by the pre-filter yields nothing and is reported by
    /// [`Frames::skipped`].
    pub fn frames<'a>(&'a self, chunk: &'a str) -> Frames<'a> {
        let inner = if self.accepts(chunk) {
            Some(chunk.split(self.config.delimiter.as_str()))
        } else {
            None
        };
        Frames { inner, dropped: 0 }
    }
}

/// Iterator over accepted fragments of one chunk.
#[derive(Debug)]
pub struct Frames<'a> {
    inner: Option<std::str::Split<'a, &'a str>>,
    dropped: usize,
}

impl<'a> Frames<'a> {
    /// `true` if the whole chunk failed the pre-filter.
    pub fn skipped(&self) -> bool {
        self.inner.is_none()
    }

    /// Fragments discarded so far because they did not end in `}`.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let split = self.inner.as_mut()?;
        for fragment in split.by_ref() {
            if fragment.ends_with('}') {
                return Some(fragment);
            }
            if !fragment.is_empty() {
                self.dropped += 1;
            }
        }
        None
    }
}
