//! Selectable result attributes

use crate::error::{Result, RetrieveError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A named output attribute, or a group of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Uuid,
    Index,
    TargetHostname,
    TargetUri,
    PageRank,
    SpamRank,
    TitleHighlighted,
    TitleText,
    SnippetHighlighted,
    SnippetText,
    Explanation,
    Html,
    HtmlPlain,

    // Groups
    None,
    Target,
    Ranks,
    Title,
    Snippet,
    All,
}

impl Feature {
    /// Every concrete feature, in column order
    pub const CONCRETE: [Feature; 13] = [
        Feature::Uuid,
        Feature::Index,
        Feature::TargetHostname,
        Feature::TargetUri,
        Feature::PageRank,
        Feature::SpamRank,
        Feature::TitleHighlighted,
        Feature::TitleText,
        Feature::SnippetHighlighted,
        Feature::SnippetText,
        Feature::Explanation,
        Feature::Html,
        Feature::HtmlPlain,
    ];

    const GROUPS: [Feature; 6] = [
        Feature::None,
        Feature::Target,
        Feature::Ranks,
        Feature::Title,
        Feature::Snippet,
        Feature::All,
    ];

    /// Concrete features this one stands for
    pub fn expand(self) -> &'static [Feature] {
        match self {
            Feature::None => &[],
            Feature::Target => &[Feature::TargetHostname, Feature::TargetUri],
            Feature::Ranks => &[Feature::PageRank, Feature::SpamRank],
            Feature::Title => &[Feature::TitleHighlighted, Feature::TitleText],
            Feature::Snippet => &[Feature::SnippetHighlighted, Feature::SnippetText],
            Feature::All => &Self::CONCRETE,
            Feature::Uuid => &[Feature::Uuid],
            Feature::Index => &[Feature::Index],
            Feature::TargetHostname => &[Feature::TargetHostname],
            Feature::TargetUri => &[Feature::TargetUri],
            Feature::PageRank => &[Feature::PageRank],
            Feature::SpamRank => &[Feature::SpamRank],
            Feature::TitleHighlighted => &[Feature::TitleHighlighted],
            Feature::TitleText => &[Feature::TitleText],
            Feature::SnippetHighlighted => &[Feature::SnippetHighlighted],
            Feature::SnippetText => &[Feature::SnippetText],
            Feature::Explanation => &[Feature::Explanation],
            Feature::Html => &[Feature::Html],
            Feature::HtmlPlain => &[Feature::HtmlPlain],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::Uuid => "uuid",
            Feature::Index => "index",
            Feature::TargetHostname => "target_hostname",
            Feature::TargetUri => "target_uri",
            Feature::PageRank => "page_rank",
            Feature::SpamRank => "spam_rank",
            Feature::TitleHighlighted => "title_highlighted",
            Feature::TitleText => "title_text",
            Feature::SnippetHighlighted => "snippet_highlighted",
            Feature::SnippetText => "snippet_text",
            Feature::Explanation => "explanation",
            Feature::Html => "html",
            Feature::HtmlPlain => "html_plain",
            Feature::None => "none",
            Feature::Target => "target",
            Feature::Ranks => "ranks",
            Feature::Title => "title",
            Feature::Snippet => "snippet",
            Feature::All => "all",
        }
    }

    /// Output column, for concrete features
    pub fn column(self) -> Option<&'static str> {
        if Self::GROUPS.contains(&self) {
            None
        } else {
            Some(self.name())
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = RetrieveError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::CONCRETE
            .into_iter()
            .chain(Self::GROUPS)
            .find(|feature| feature.name() == wanted)
            .ok_or_else(|| RetrieveError::Config(format!("Unknown feature '{}'", s)))
    }
}

/// Set of concrete features; groups are expanded on insertion
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Feature>", into = "Vec<Feature>")]
pub struct FeatureSet(BTreeSet<Feature>);

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self::from(Feature::All)
    }

    pub fn insert(&mut self, feature: Feature) {
        self.0.extend(feature.expand().iter().copied());
    }

    pub fn union(&self, other: &FeatureSet) -> FeatureSet {
        FeatureSet(self.0.union(&other.0).copied().collect())
    }

    /// Whether every concrete feature behind `feature` is present
    pub fn contains(&self, feature: Feature) -> bool {
        feature.expand().iter().all(|f| self.0.contains(f))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.0.iter().copied()
    }

    /// Output columns in fixed order
    pub fn columns(&self) -> Vec<&'static str> {
        self.0.iter().filter_map(|f| f.column()).collect()
    }
}

impl From<Feature> for FeatureSet {
    fn from(feature: Feature) -> Self {
        let mut set = Self::new();
        set.insert(feature);
        set
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        let mut set = Self::new();
        for feature in iter {
            set.insert(feature);
        }
        set
    }
}

impl From<Vec<Feature>> for FeatureSet {
    fn from(features: Vec<Feature>) -> Self {
        features.into_iter().collect()
    }
}

impl From<FeatureSet> for Vec<Feature> {
    fn from(set: FeatureSet) -> Self {
        set.0.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_expansion() {
        let set = FeatureSet::from(Feature::Target);
        assert_eq!(set.columns(), vec!["target_hostname", "target_uri"]);
        assert!(set.contains(Feature::Target));
        assert!(set.contains(Feature::TargetUri));
        assert!(!set.contains(Feature::Title));
    }

    #[test]
    fn test_union_is_order_independent_and_idempotent() {
        let a: FeatureSet = [Feature::TitleText, Feature::Target].into_iter().collect();
        let b: FeatureSet = [Feature::Target, Feature::TitleText, Feature::TargetUri]
            .into_iter()
            .collect();
        assert_eq!(a, b);
        assert_eq!(a.union(&a), a);

        let c = FeatureSet::from(Feature::Explanation);
        assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
    }

    #[test]
    fn test_all_and_none() {
        assert_eq!(FeatureSet::all().columns().len(), Feature::CONCRETE.len());
        assert!(FeatureSet::from(Feature::None).is_empty());
        // The empty group is trivially contained
        assert!(FeatureSet::new().contains(Feature::None));
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("title_text".parse::<Feature>().unwrap(), Feature::TitleText);
        assert_eq!("HTML-PLAIN".parse::<Feature>().unwrap(), Feature::HtmlPlain);
        assert_eq!("snippet".parse::<Feature>().unwrap(), Feature::Snippet);
        assert!("bogus".parse::<Feature>().is_err());
    }

    #[test]
    fn test_serde_expands_groups() {
        let set: FeatureSet = serde_json::from_str(r#"["ranks", "uuid"]"#).unwrap();
        assert_eq!(set.columns(), vec!["uuid", "page_rank", "spam_rank"]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["uuid","page_rank","spam_rank"]"#);
    }
}
