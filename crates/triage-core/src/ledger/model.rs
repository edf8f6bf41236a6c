//! The symptom ledger.

/// Case-insensitive, whitespace-trimmed set of symptom names.
///
/// Insertion order is kept and the first spelling seen wins, so
/// `["Nausea", "nausea"]` stays `["Nausea"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymptomLedger {
    names: Vec<String>,
}

fn normalize(name: &str) -> Option<(&str, String)> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some((trimmed, trimmed.to_lowercase()))
    }
}

impl SymptomLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from stored names, deduplicating as it goes.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ledger = Self::new();
        ledger.merge(names);
        ledger
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        match normalize(name) {
            Some((_, key)) => self.names.iter().any(|n| n.to_lowercase() == key),
            None => false,
        }
    }

    /// Adds names not already present. Returns how many were added.
    pub fn merge<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for name in names {
            let Some((trimmed, _)) = normalize(name.as_ref()) else {
                continue;
            };
            if !self.contains(trimmed) {
                self.names.push(trimmed.to_string());
                added += 1;
            }
        }
        added
    }

    /// Replaces the whole ledger with an authoritative list.
    pub fn replace<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.names.clear();
        self.merge(names);
    }

    pub fn reset(&mut self) {
        self.names.clear();
    }
}
