use std::collections::BTreeSet;
use serde::Deserialize;
use shared::protocol::{BROWSE_TYPE, MATCH_ALL};
use shared::types::ServiceName;
use super::classify::Fragment;

/// Which side of a TXT attribute the content filter looks at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchScope {
    #[default]
    Keys,
    Values,
    Both,
}

/// Cheap gate that drops responses from unrelated devices before decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentFilter {
    Any,
    Substring { needle: String, scope: MatchScope },
}

impl ContentFilter {
    /// `"*"` accepts everything. Any other value, including the empty
    /// string, is a substring that must appear in some attribute.
    pub fn new(content: &str, scope: MatchScope) -> Self {
        if content == MATCH_ALL {
            Self::Any
        } else {
            Self::Substring {
                needle: content.to_string(),
                scope,
            }
        }
    }

    pub fn accepts(&self, fragments: &[Fragment]) -> bool {
        let (needle, scope) = match self {
            Self::Any => return true,
            Self::Substring { needle, scope } => (needle.as_str(), *scope),
        };
        if needle.is_empty() {
            return false;
        }

        fragments.iter().any(|fragment| match fragment {
            Fragment::Attributes { attributes, .. } => attributes.iter().any(|(key, value)| {
                let in_key = scope != MatchScope::Values && key.contains(needle);
                let in_value = scope != MatchScope::Keys && value.contains(needle);
                in_key || in_value
            }),
            _ => false,
        })
    }
}

/// Set of service types the scanner cares about.
/// Empty, or containing the browse meta-type, matches any service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceFilter {
    names: BTreeSet<ServiceName>,
}

impl ServiceFilter {
    pub fn new<I>(names: I) -> Self
    where
        I: IntoIterator<Item = ServiceName>,
    {
        Self {
            names: names.into_iter().collect(),
        }
    }

    pub fn set<I>(&mut self, names: I)
    where
        I: IntoIterator<Item = ServiceName>,
    {
        self.names = names.into_iter().collect();
    }

    pub fn add(&mut self, name: ServiceName) {
        self.names.insert(name);
    }

    pub fn matches_any(&self) -> bool {
        self.names.is_empty() || self.names.iter().any(|n| n.as_str() == BROWSE_TYPE)
    }

    pub fn matches(&self, service: &ServiceName) -> bool {
        self.matches_any() || self.names.contains(service)
    }

    /// Names to query on every rescan
    pub fn query_names(&self) -> Vec<ServiceName> {
        if self.names.is_empty() {
            vec![ServiceName::new(BROWSE_TYPE)]
        } else {
            self.names.iter().cloned().collect()
        }
    }
}
