//! Composite cart-line identity.
//!
//! A [`VariantKey`] is the item id alone when nothing was selected, otherwise
//! `itemId_signature`. The signature renders each selection as
//! `group:option`, escapes the separator characters, removes duplicates,
//! sorts, and joins with `|`. The item id has `_` escaped so that it never
//! reads as an item id followed by a signature. Sorting makes the key independent of the order
//! in which options were picked; escaping keeps distinct selections from ever
//! rendering to the same text.

use std::collections::BTreeSet;

use countertop_core::{CatalogItemId, SelectedSpecification};
use serde::{Deserialize, Serialize};

const ITEM_SEPARATOR: char = '_';
const PAIR_SEPARATOR: char = ':';
const SELECTION_SEPARATOR: char = '|';
const ESCAPE: char = '\\';

/// Identity of "this catalog item with exactly these options".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantKey(String);

impl VariantKey {
    /// Compute the key for `item_id` with `selections`.
    #[must_use]
    pub fn resolve(item_id: &CatalogItemId, selections: &[SelectedSpecification]) -> Self {
        let item = escape(item_id.as_str(), &[ITEM_SEPARATOR]);
        if selections.is_empty() {
            return Self(item);
        }

        let pairs: BTreeSet<String> = selections
            .iter()
            .map(|s| {
                format!(
                    "{}{PAIR_SEPARATOR}{}",
                    escape(&s.group_name, &[PAIR_SEPARATOR, SELECTION_SEPARATOR]),
                    escape(&s.option_name, &[PAIR_SEPARATOR, SELECTION_SEPARATOR])
                )
            })
            .collect();

        let signature = pairs
            .into_iter()
            .collect::<Vec<_>>()
            .join(&SELECTION_SEPARATOR.to_string());

        Self(format!("{item}{ITEM_SEPARATOR}{signature}"))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Put `ESCAPE` before itself and before every char in `special`.
fn escape(part: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(part.len());
    for c in part.chars() {
        if c == ESCAPE || special.contains(&c) {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn item(id: &str) -> CatalogItemId {
        CatalogItemId::parse(id).unwrap()
    }

    fn pick(group: &str, option: &str) -> SelectedSpecification {
        SelectedSpecification {
            group_name: group.to_string(),
            option_name: option.to_string(),
            price_adjustment: Decimal::ZERO,
        }
    }

    #[test]
    fn test_no_selections_is_item_id() {
        assert_eq!(VariantKey::resolve(&item("latte"), &[]).as_str(), "latte");
    }

    #[test]
    fn test_signature_format() {
        let key = VariantKey::resolve(&item("latte"), &[pick("Size", "Large")]);
        assert_eq!(key.as_str(), "latte_Size:Large");
    }

    #[test]
    fn test_selection_order_does_not_matter() {
        let a = VariantKey::resolve(
            &item("latte"),
            &[pick("Size", "Large"), pick("Milk", "Oat")],
        );
        let b = VariantKey::resolve(
            &item("latte"),
            &[pick("Milk", "Oat"), pick("Size", "Large")],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_selections_never_collide() {
        let cases = [
            vec![pick("Size", "Large")],
            vec![pick("Size", "Small")],
            vec![pick("Size", "Large"), pick("Milk", "Oat")],
            vec![pick("Milk", "Oat")],
            // Separator characters inside names must not forge another key.
            vec![pick("Size", "Large|Milk:Oat")],
            vec![pick("Size:Large", "x")],
            vec![pick("Size", "Large:x")],
        ];

        let keys: Vec<_> = cases
            .iter()
            .map(|s| VariantKey::resolve(&item("latte"), s))
            .collect();

        for (i, a) in keys.iter().enumerate() {
            for (j, b) in keys.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "cases {i} and {j} collided");
                }
            }
        }
    }

    #[test]
    fn test_item_id_cannot_forge_a_signature() {
        let bare = VariantKey::resolve(&item("latte_Size:Large"), &[]);
        let chosen = VariantKey::resolve(&item("latte"), &[pick("Size", "Large")]);
        assert_ne!(bare, chosen);
        assert_eq!(bare.as_str(), r"latte\_Size:Large");

        let nested = VariantKey::resolve(&item("iced_latte"), &[pick("Size", "Large")]);
        let split = VariantKey::resolve(&item("iced"), &[pick("latte_Size", "Large")]);
        assert_ne!(nested, split);
    }

    #[test]
    fn test_same_selection_differs_across_items() {
        let s = [pick("Size", "Large")];
        assert_ne!(
            VariantKey::resolve(&item("latte"), &s),
            VariantKey::resolve(&item("mocha"), &s)
        );
    }
}
