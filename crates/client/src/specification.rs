//! Specification groups: loading, validation, pricing and selection state.
//!
//! Groups are loaded per catalog item and cached for a few minutes. A load
//! failure is not fatal to ordering: it is logged and treated as "this item
//! has no specifications", so the item can still be added directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use countertop_core::{
    CatalogItem, CatalogItemId, SelectedSpecification, SelectionMode, SpecificationGroup, SpecificationOption,
};
use moka::future::Cache;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use crate::error::ValidationError;
use crate::transport::CatalogSource;

/// Loads and caches specification groups from a [`CatalogSource`].
pub struct SpecificationResolver<C> {
    source: Arc<C>,
    cache: Cache<CatalogItemId, Arc<Vec<SpecificationGroup>>>,
}

impl<C> std::fmt::Debug for SpecificationResolver<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecificationResolver")
            .field("cached_items", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl<C: CatalogSource> SpecificationResolver<C> {
    /// Create a resolver whose cache entries live for `ttl`.
    #[must_use]
    pub fn new(source: Arc<C>, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1000).time_to_live(ttl).build();
        Self { source, cache }
    }

    /// Specification groups for `item_id`, or an empty list if loading fails.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn load_groups(&self, item_id: &CatalogItemId) -> Vec<SpecificationGroup> {
        if let Some(groups) = self.cache.get(item_id).await {
            debug!("Cache hit for specification groups");
            return groups.as_ref().clone();
        }

        match self.source.specification_groups(item_id).await {
            Ok(groups) => {
                self.cache
                    .insert(item_id.clone(), Arc::new(groups.clone()))
                    .await;
                groups
            }
            Err(e) => {
                // Not cached, so the next attempt retries the load.
                warn!(error = %e, "Specification load failed; adding item without options");
                Vec::new()
            }
        }
    }

    /// Groups for `item`: its embedded snapshot if it has one, otherwise
    /// [`SpecificationResolver::load_groups`].
    pub async fn groups_for(&self, item: &CatalogItem) -> Vec<SpecificationGroup> {
        match &item.specification_groups {
            Some(groups) => groups.clone(),
            None => self.load_groups(&item.id).await,
        }
    }
}

/// Returns true if the customer has anything to choose.
#[must_use]
pub fn has_selectable_specifications(groups: &[SpecificationGroup]) -> bool {
    groups.iter().any(|g| !g.options.is_empty())
}

/// Check `selections` against `groups`.
///
/// Groups are checked in declaration order and the first violation is
/// returned. Selections naming unknown options do not count.
///
/// # Errors
///
/// Returns `ValidationError::MissingSelection` for a required group with no
/// selection, or `ValidationError::TooManySelections` for a single-select
/// group with more than one.
pub fn validate(
    groups: &[SpecificationGroup],
    selections: &[SelectedSpecification],
) -> Result<(), ValidationError> {
    for group in groups {
        let chosen = chosen_options(group, selections).len();

        if group.required && chosen == 0 {
            return Err(ValidationError::MissingSelection {
                group: group.name.clone(),
            });
        }
        if group.mode == SelectionMode::Single && chosen > 1 {
            return Err(ValidationError::TooManySelections {
                group: group.name.clone(),
            });
        }
    }
    Ok(())
}

/// Σ catalog price adjustments of the selected options.
///
/// Single-select groups count their first selection only; multiple-select
/// groups count each distinct option once.
#[must_use]
pub fn compute_adjustment(
    groups: &[SpecificationGroup],
    selections: &[SelectedSpecification],
) -> Decimal {
    groups
        .iter()
        .flat_map(|group| {
            let chosen = chosen_options(group, selections);
            let limit = match group.mode {
                SelectionMode::Single => 1,
                SelectionMode::Multiple => chosen.len(),
            };
            chosen.into_iter().take(limit)
        })
        .map(|option| option.price_adjustment)
        .sum()
}

/// Distinct known options of `group` named by `selections`, in selection order.
fn chosen_options<'a>(
    group: &'a SpecificationGroup,
    selections: &[SelectedSpecification],
) -> Vec<&'a SpecificationOption> {
    let mut chosen: Vec<&SpecificationOption> = Vec::new();
    for selection in selections.iter().filter(|s| s.group_name == group.name) {
        if let Some(option) = group.option_named(&selection.option_name)
            && !chosen.iter().any(|c| c.id == option.id)
        {
            chosen.push(option);
        }
    }
    chosen
}

/// Selection state of the option picker for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecificationSelection {
    groups: Vec<SpecificationGroup>,
    /// Option ids per group id.
    chosen: HashMap<String, Vec<String>>,
}

impl SpecificationSelection {
    /// Start with nothing selected.
    #[must_use]
    pub fn new(groups: Vec<SpecificationGroup>) -> Self {
        Self {
            groups,
            chosen: HashMap::new(),
        }
    }

    /// Groups being chosen from.
    #[must_use]
    pub fn groups(&self) -> &[SpecificationGroup] {
        &self.groups
    }

    /// Tap an option.
    ///
    /// Single-select groups replace their selection; multiple-select groups
    /// toggle the option. Returns false if the group or option is unknown.
    pub fn toggle(&mut self, group_id: &str, option_id: &str) -> bool {
        let Some(group) = self.groups.iter().find(|g| g.id == group_id) else {
            return false;
        };
        if group.option(option_id).is_none() {
            return false;
        }

        let chosen = self.chosen.entry(group.id.clone()).or_default();
        match group.mode {
            SelectionMode::Single => {
                chosen.clear();
                chosen.push(option_id.to_string());
            }
            SelectionMode::Multiple => {
                if let Some(index) = chosen.iter().position(|id| id == option_id) {
                    chosen.remove(index);
                } else {
                    chosen.push(option_id.to_string());
                }
            }
        }
        true
    }

    /// Returns true if the option is currently selected.
    #[must_use]
    pub fn is_selected(&self, group_id: &str, option_id: &str) -> bool {
        self.chosen
            .get(group_id)
            .is_some_and(|ids| ids.iter().any(|id| id == option_id))
    }

    /// Snapshots of the selected options, in group then option order.
    #[must_use]
    pub fn selected(&self) -> Vec<SelectedSpecification> {
        self.groups
            .iter()
            .flat_map(|group| {
                group
                    .options
                    .iter()
                    .filter(|option| self.is_selected(&group.id, &option.id))
                    .map(move |option| SelectedSpecification::snapshot(group, option))
            })
            .collect()
    }

    /// Validate the current selection.
    ///
    /// # Errors
    ///
    /// See [`validate`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate(&self.groups, &self.selected())
    }

    /// Price adjustment of the current selection.
    #[must_use]
    pub fn adjustment(&self) -> Decimal {
        compute_adjustment(&self.groups, &self.selected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::TransportError;

    use super::*;

    fn option(id: &str, name: &str, adjustment: i64) -> SpecificationOption {
        SpecificationOption {
            id: id.to_string(),
            name: name.to_string(),
            price_adjustment: Decimal::from(adjustment),
        }
    }

    fn size_group() -> SpecificationGroup {
        SpecificationGroup {
            id: "size".to_string(),
            name: "Size".to_string(),
            mode: SelectionMode::Single,
            required: true,
            options: vec![option("small", "Small", 0), option("large", "Large", 20)],
        }
    }

    fn toppings_group() -> SpecificationGroup {
        SpecificationGroup {
            id: "toppings".to_string(),
            name: "Toppings".to_string(),
            mode: SelectionMode::Multiple,
            required: false,
            options: vec![option("pearl", "Pearl", 10), option("jelly", "Jelly", 15)],
        }
    }

    fn pick(group: &str, option: &str) -> SelectedSpecification {
        SelectedSpecification {
            group_name: group.to_string(),
            option_name: option.to_string(),
            price_adjustment: Decimal::ZERO,
        }
    }

    #[test]
    fn test_required_single_group() {
        let groups = vec![size_group()];

        let err = validate(&groups, &[]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingSelection {
                group: "Size".to_string()
            }
        );

        let chosen = [pick("Size", "Large")];
        assert!(validate(&groups, &chosen).is_ok());
        assert_eq!(compute_adjustment(&groups, &chosen), Decimal::from(20));
    }

    #[test]
    fn test_first_violation_in_declaration_order() {
        let mut milk = size_group();
        milk.id = "milk".to_string();
        milk.name = "Milk".to_string();
        let groups = vec![size_group(), milk];

        let err = validate(&groups, &[pick("Milk", "Small")]).unwrap_err();
        assert_eq!(err.group(), "Size");
    }

    #[test]
    fn test_single_group_rejects_two_selections() {
        let groups = vec![size_group()];
        let err = validate(&groups, &[pick("Size", "Small"), pick("Size", "Large")]).unwrap_err();
        assert!(matches!(err, ValidationError::TooManySelections { .. }));
    }

    #[test]
    fn test_adjustment_uses_catalog_prices() {
        let groups = vec![size_group(), toppings_group()];
        let selections = [
            pick("Size", "Large"),
            pick("Size", "Small"),
            pick("Toppings", "Pearl"),
            pick("Toppings", "Jelly"),
            pick("Toppings", "Pearl"),
            pick("Sauce", "Chili"),
        ];
        // Large (first single pick) + Pearl + Jelly; the unknown group is ignored.
        assert_eq!(compute_adjustment(&groups, &selections), Decimal::from(45));
    }

    #[test]
    fn test_has_selectable_specifications() {
        assert!(!has_selectable_specifications(&[]));
        let mut empty = toppings_group();
        empty.options.clear();
        assert!(!has_selectable_specifications(&[empty]));
        assert!(has_selectable_specifications(&[size_group()]));
    }

    #[test]
    fn test_selection_single_replaces_multiple_toggles() {
        let mut selection = SpecificationSelection::new(vec![size_group(), toppings_group()]);

        assert!(selection.toggle("size", "small"));
        assert!(selection.toggle("size", "large"));
        assert!(selection.toggle("toppings", "jelly"));
        assert!(selection.toggle("toppings", "pearl"));
        assert!(selection.toggle("toppings", "jelly"));
        assert!(!selection.toggle("toppings", "mochi"));
        assert!(!selection.toggle("sauce", "chili"));

        let picked: Vec<_> = selection
            .selected()
            .into_iter()
            .map(|s| (s.group_name, s.option_name))
            .collect();
        assert_eq!(
            picked,
            [
                ("Size".to_string(), "Large".to_string()),
                ("Toppings".to_string(), "Pearl".to_string())
            ]
        );
        assert!(selection.validate().is_ok());
        assert_eq!(selection.adjustment(), Decimal::from(30));
    }

    #[test]
    fn test_selection_validates_required_group() {
        let mut selection = SpecificationSelection::new(vec![toppings_group(), size_group()]);
        selection.toggle("toppings", "pearl");
        assert_eq!(selection.validate().unwrap_err().group(), "Size");
    }

    struct FlakyCatalog {
        calls: AtomicUsize,
        fail_first: bool,
    }

    impl CatalogSource for FlakyCatalog {
        async fn specification_groups(
            &self,
            _item_id: &CatalogItemId,
        ) -> Result<Vec<SpecificationGroup>, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && call == 0 {
                return Err(TransportError::Unavailable("catalog offline".to_string()));
            }
            Ok(vec![size_group()])
        }
    }

    #[tokio::test]
    async fn test_load_groups_caches_success() {
        let catalog = Arc::new(FlakyCatalog {
            calls: AtomicUsize::new(0),
            fail_first: false,
        });
        let resolver = SpecificationResolver::new(Arc::clone(&catalog), Duration::from_secs(300));
        let id = CatalogItemId::parse("latte").unwrap();

        assert_eq!(resolver.load_groups(&id).await.len(), 1);
        assert_eq!(resolver.load_groups(&id).await.len(), 1);
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_failure_downgrades_and_is_not_cached() {
        let catalog = Arc::new(FlakyCatalog {
            calls: AtomicUsize::new(0),
            fail_first: true,
        });
        let resolver = SpecificationResolver::new(Arc::clone(&catalog), Duration::from_secs(300));
        let id = CatalogItemId::parse("latte").unwrap();

        assert!(resolver.load_groups(&id).await.is_empty());
        assert_eq!(resolver.load_groups(&id).await.len(), 1);
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 2);
    }
}
