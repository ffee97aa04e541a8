//! Head contributions (scripts, styles) gathered while preparing a response.

/// Ordered, de-duplicated head entries for the response being prepared.
///
/// The engine clears them when the preparing phase starts, so only components
/// prepared for this response contribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Returns `false` if it was already present.
    pub fn add(&mut self, entry: impl Into<String>) -> bool {
        let entry = entry.into();
        if self.entries.contains(&entry) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
