//! Cross-step source aggregation.
//!
//! Sources are appended in the order steps complete. Deduplication keys on the
//! URI: the entry that arrived last supplies the title, while the URI keeps the
//! position where it was first seen.

use std::collections::HashMap;

use crate::types::Source;

/// Running list of every source seen during a run.
#[derive(Debug, Clone, Default)]
pub struct SourceAggregate {
    sources: Vec<Source>,
}

impl SourceAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the sources of one completed step.
    pub fn extend<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = Source>,
    {
        self.sources.extend(sources);
    }

    /// Every source in arrival order, duplicates included.
    pub fn all(&self) -> &[Source] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }

    pub fn deduplicated(&self) -> Vec<Source> {
        dedupe_sources(&self.sources)
    }
}

/// Deduplicate by URI; the last occurrence of each URI wins.
pub fn dedupe_sources(sources: &[Source]) -> Vec<Source> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut unique: Vec<Source> = Vec::new();

    for source in sources {
        match position.get(source.uri.as_str()) {
            Some(&index) => unique[index] = source.clone(),
            None => {
                position.insert(source.uri.as_str(), unique.len());
                unique.push(source.clone());
            }
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_last_occurrence_wins() {
        let sources = vec![
            Source::new("https://a.example", "First title"),
            Source::new("https://b.example", "B"),
            Source::new("https://a.example", "Later title"),
        ];
        assert_eq!(
            dedupe_sources(&sources),
            vec![
                Source::new("https://a.example", "Later title"),
                Source::new("https://b.example", "B"),
            ]
        );
    }

    #[test]
    fn test_distinct_sources_keep_order() {
        let sources = vec![
            Source::new("https://c.example", "C"),
            Source::new("https://a.example", "A"),
        ];
        assert_eq!(dedupe_sources(&sources), sources);
    }

    #[test]
    fn test_empty() {
        assert!(dedupe_sources(&[]).is_empty());
    }

    #[test]
    fn test_aggregate_across_steps() {
        let mut aggregate = SourceAggregate::new();
        aggregate.extend(vec![Source::new("u1", "one"), Source::new("u2", "two")]);
        aggregate.extend(vec![Source::new("u1", "one (updated)")]);

        assert_eq!(aggregate.len(), 3);
        let unique = aggregate.deduplicated();
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].title, "one (updated)");

        aggregate.clear();
        assert!(aggregate.is_empty());
    }
}
