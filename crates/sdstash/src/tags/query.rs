//! Query text parsing.
//!
//! Query text is a whitespace-separated list of tags. A leading `-` marks a tag
//! as excluded:
//!
//! ```
//! use sdstash::tags::TagQuery;
//!
//! let q = TagQuery::parse("cat_ears -dog  solo");
//! assert_eq!(q.include, vec!["cat_ears", "solo"]);
//! assert_eq!(q.exclude, vec!["dog"]);
//! ```

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagQuery {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl TagQuery {
    pub fn parse(text: &str) -> Self {
        let mut query = TagQuery::default();
        for segment in text.split_whitespace() {
            match segment.strip_prefix('-') {
                Some("") => {}
                Some(tag) => query.exclude.push(tag.to_string()),
                None => query.include.push(segment.to_string()),
            }
        }
        query
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert!(TagQuery::parse("   ").is_empty());
    }

    #[test]
    fn test_parse_lone_dash_ignored() {
        let q = TagQuery::parse("- cat");
        assert_eq!(q.include, vec!["cat"]);
        assert!(q.exclude.is_empty());
    }

    #[test]
    fn test_parse_only_negative() {
        let q = TagQuery::parse("-dog -bird");
        assert!(q.include.is_empty());
        assert_eq!(q.exclude, vec!["dog", "bird"]);
    }
}
