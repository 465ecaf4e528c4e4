//! Inventory object kinds and include/exclude selection lists.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryKind {
    Node,
    Group,
    Site,
    /// Never exported; listed so that `-credential` parses.
    Credential,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KindError {
    #[error("invalid inventory type name: ({0})")]
    Invalid(String),
}

impl InventoryKind {
    pub const ALL: [InventoryKind; 4] = [
        InventoryKind::Node,
        InventoryKind::Group,
        InventoryKind::Site,
        InventoryKind::Credential,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryKind::Node => "node",
            InventoryKind::Group => "group",
            InventoryKind::Site => "site",
            InventoryKind::Credential => "credential",
        }
    }
}

impl fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InventoryKind {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| KindError::Invalid(s.to_string()))
    }
}

/// Which kinds an export covers.
///
/// An empty include list selects every kind that is not excluded.
/// Credentials are always excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSelection {
    pub include: Vec<InventoryKind>,
    pub exclude: Vec<InventoryKind>,
}

impl Default for KindSelection {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: vec![InventoryKind::Credential],
        }
    }
}

impl KindSelection {
    /// Parse entries such as `["node", "-group"]`.
    pub fn parse<'a>(entries: impl IntoIterator<Item = &'a str>) -> Result<Self, KindError> {
        let mut selection = Self::default();
        for raw in entries {
            let entry = raw.trim();
            if entry.is_empty() {
                return Err(KindError::Invalid(raw.to_string()));
            }
            match entry.strip_prefix('-') {
                Some(excluded) => {
                    let kind = excluded
                        .parse::<InventoryKind>()
                        .map_err(|_| KindError::Invalid(entry.to_string()))?;
                    selection.exclude.push(kind);
                }
                None => selection.include.push(entry.parse()?),
            }
        }
        Ok(selection)
    }

    /// Parse a comma-separated list (`node,-group`).
    pub fn parse_list(list: &str) -> Result<Self, KindError> {
        Self::parse(list.split(','))
    }

    pub fn wants(&self, kind: InventoryKind) -> bool {
        if self.exclude.contains(&kind) {
            return false;
        }
        self.include.is_empty() || self.include.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_selects_everything_but_credentials() {
        let sel = KindSelection::default();
        assert!(sel.wants(InventoryKind::Node));
        assert!(sel.wants(InventoryKind::Group));
        assert!(sel.wants(InventoryKind::Site));
        assert!(!sel.wants(InventoryKind::Credential));
    }

    #[test]
    fn include_and_exclude() {
        let sel = KindSelection::parse_list("node, -group").unwrap();
        assert_eq!(sel.include, vec![InventoryKind::Node]);
        assert!(sel.wants(InventoryKind::Node));
        assert!(!sel.wants(InventoryKind::Group));
        assert!(!sel.wants(InventoryKind::Site));
    }

    #[test]
    fn only_exclusions_keep_the_rest() {
        let sel = KindSelection::parse_list("-site").unwrap();
        assert!(sel.wants(InventoryKind::Node));
        assert!(!sel.wants(InventoryKind::Site));
    }

    #[test]
    fn credentials_cannot_be_included() {
        let sel = KindSelection::parse_list("credential").unwrap();
        assert!(!sel.wants(InventoryKind::Credential));
    }

    #[test]
    fn rejects_blank_and_unknown() {
        assert!(matches!(KindSelection::parse_list("node,,group"), Err(KindError::Invalid(_))));
        assert_eq!(
            KindSelection::parse_list("osimage"),
            Err(KindError::Invalid("osimage".to_string()))
        );
        assert_eq!(
            KindSelection::parse_list("-bogus"),
            Err(KindError::Invalid("-bogus".to_string()))
        );
    }
}
