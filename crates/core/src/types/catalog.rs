//! Catalog reference data and specification snapshots.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::status::{ItemType, SelectionMode};

/// Errors that can occur when parsing a [`CatalogItemId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogItemIdError {
    /// The input string is empty or whitespace.
    #[error("catalog item id cannot be empty")]
    Empty,
}

/// Identifier of a catalog item.
///
/// Always non-empty; parsing is the only way to build one from arbitrary
/// input, so code holding a `CatalogItemId` never needs to re-check it.
///
/// ```
/// use countertop_core::CatalogItemId;
///
/// assert!(CatalogItemId::parse("latte").is_ok());
/// assert!(CatalogItemId::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct CatalogItemId(String);

impl CatalogItemId {
    /// Parse a `CatalogItemId` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogItemIdError::Empty`] for empty or whitespace-only input.
    pub fn parse(s: &str) -> Result<Self, CatalogItemIdError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CatalogItemIdError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CatalogItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CatalogItemId {
    type Err = CatalogItemIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CatalogItemId {
    type Error = CatalogItemIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CatalogItemId> for String {
    fn from(id: CatalogItemId) -> Self {
        id.0
    }
}

impl AsRef<str> for CatalogItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A sellable item. Owned by the catalog; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: CatalogItemId,
    pub name: String,
    /// Base price before specification adjustments. Negative for
    /// redemption discounts.
    pub base_price: Decimal,
    #[serde(default)]
    pub kind: ItemType,
    /// Groups shipped with the item. When present they are used as-is
    /// instead of asking the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specification_groups: Option<Vec<SpecificationGroup>>,
}

impl CatalogItem {
    /// Create a regular catalog item.
    #[must_use]
    pub fn new(id: CatalogItemId, name: impl Into<String>, base_price: Decimal) -> Self {
        Self {
            id,
            name: name.into(),
            base_price,
            kind: ItemType::Regular,
            specification_groups: None,
        }
    }

    /// Attach an embedded snapshot of the item's specification groups.
    #[must_use]
    pub fn with_specification_groups(mut self, groups: Vec<SpecificationGroup>) -> Self {
        self.specification_groups = Some(groups);
        self
    }

    /// Create a redemption item.
    #[must_use]
    pub fn redemption(id: CatalogItemId, name: impl Into<String>, base_price: Decimal) -> Self {
        Self {
            kind: ItemType::Redemption,
            ..Self::new(id, name, base_price)
        }
    }
}

/// A priced option within a [`SpecificationGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationOption {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub price_adjustment: Decimal,
}

/// A named set of options attached to a catalog item (size, milk, toppings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationGroup {
    pub id: String,
    pub name: String,
    pub mode: SelectionMode,
    #[serde(default)]
    pub required: bool,
    /// Options in display order.
    #[serde(default)]
    pub options: Vec<SpecificationOption>,
}

impl SpecificationGroup {
    /// Find an option by id.
    #[must_use]
    pub fn option(&self, option_id: &str) -> Option<&SpecificationOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    /// Find an option by display name.
    #[must_use]
    pub fn option_named(&self, name: &str) -> Option<&SpecificationOption> {
        self.options.iter().find(|o| o.name == name)
    }
}

/// Snapshot of one chosen option, taken when the choice was made.
///
/// Not re-resolved against the catalog later, so historical carts stay valid
/// when the catalog changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedSpecification {
    pub group_name: String,
    pub option_name: String,
    pub price_adjustment: Decimal,
}

impl SelectedSpecification {
    /// Snapshot `option` as chosen within `group`.
    #[must_use]
    pub fn snapshot(group: &SpecificationGroup, option: &SpecificationOption) -> Self {
        Self {
            group_name: group.name.clone(),
            option_name: option.name.clone(),
            price_adjustment: option.price_adjustment,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_whitespace() {
        let id = CatalogItemId::parse("  latte ").unwrap();
        assert_eq!(id.as_str(), "latte");
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(CatalogItemId::parse(""), Err(CatalogItemIdError::Empty));
        assert_eq!(CatalogItemId::parse("\t"), Err(CatalogItemIdError::Empty));
    }

    #[test]
    fn test_deserialize_rejects_empty_id() {
        let result: Result<CatalogItemId, _> = serde_json::from_str(r#""""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_item_embedded_groups_are_optional() {
        let bare: CatalogItem =
            serde_json::from_str(r#"{"id":"cookie","name":"Cookie","base_price":"40"}"#).unwrap();
        assert_eq!(bare.kind, ItemType::Regular);
        assert!(bare.specification_groups.is_none());

        let latte: CatalogItem = serde_json::from_str(
            r#"{"id":"latte","name":"Latte","base_price":"100","specification_groups":[{"id":"size","name":"Size","mode":"single"}]}"#,
        )
        .unwrap();
        assert_eq!(latte.specification_groups.unwrap()[0].name, "Size");
    }

    #[test]
    fn test_group_deserializes_with_defaults() {
        let group: SpecificationGroup = serde_json::from_str(
            r#"{"id":"g1","name":"Size","mode":"single","options":[{"id":"o1","name":"Large","price_adjustment":"20"}]}"#,
        )
        .unwrap();
        assert!(!group.required);
        assert_eq!(group.option("o1").unwrap().price_adjustment, Decimal::new(20, 0));
        assert!(group.option_named("Large").is_some());
    }
}
