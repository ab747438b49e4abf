//! Engine settings.

use serde::{Deserialize, Serialize};
use sqlds_core::TextMatchStyle;
use sqlds_query::DEFAULT_MAX_RELATION_DEPTH;

/// Settings for [`SqlDataSourceEngine`](crate::SqlDataSourceEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bound on include-from hops and on nested sub-entity fetch depth.
    pub max_relation_depth: usize,

    /// Match style when a request does not name one.
    pub default_text_match_style: TextMatchStyle,

    /// Upper bound on rows per page; also applied to unbounded requests.
    pub max_page_size: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_relation_depth: DEFAULT_MAX_RELATION_DEPTH,
            default_text_match_style: TextMatchStyle::default(),
            max_page_size: None,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_max_relation_depth(mut self, depth: usize) -> Self {
        self.max_relation_depth = depth;
        self
    }

    #[must_use]
    pub fn with_default_text_match_style(mut self, style: TextMatchStyle) -> Self {
        self.default_text_match_style = style;
        self
    }

    #[must_use]
    pub fn with_max_page_size(mut self, max: Option<u64>) -> Self {
        self.max_page_size = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_relation_depth, 8);
        assert_eq!(config.default_text_match_style, TextMatchStyle::StartsWith);
        assert_eq!(config.max_page_size, None);
    }

    #[test]
    fn test_partial_deserialization() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"default_text_match_style": "substring", "max_page_size": 500}"#)
                .unwrap();
        assert_eq!(config.default_text_match_style, TextMatchStyle::Substring);
        assert_eq!(config.max_page_size, Some(500));
        assert_eq!(config.max_relation_depth, 8);
    }
}
