//! Mask Aggregate
//!
//! The attribute state of a mask record, rebuilt by folding events over a
//! seed taken from the initial snapshot. Handlers are pure: no clock, no
//! randomness and no lookups, so the same seed and events always produce
//! the same attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::{fields, Attributes, MaskEvent, SetAction, SetUpdate};

use super::Aggregate;

/// Projection of a mask at a point in time
///
/// Computed on demand and never stored itself; `serialize()` hands a copy
/// to whoever writes the materialized record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskProjection {
    /// Mask aggregate ID
    aggregate_id: Uuid,

    /// Events created after this instant are not folded in
    as_of: DateTime<Utc>,

    /// Current attributes
    attributes: Attributes,

    /// Number of events applied on top of the seed
    version: i64,
}

impl MaskProjection {
    /// Start a projection from a seed.
    ///
    /// The seed is cloned so successive projections never share state.
    pub fn from_seed(aggregate_id: Uuid, as_of: DateTime<Utc>, seed: &Attributes) -> Self {
        Self {
            aggregate_id,
            as_of,
            attributes: seed.clone(),
            version: 0,
        }
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Copy of the attributes suitable for writing onto the materialized record
    pub fn serialize(&self) -> Attributes {
        self.attributes.clone()
    }

    pub fn into_attributes(self) -> Attributes {
        self.attributes
    }

    fn replace(&mut self, field: &str, value: Value) {
        self.attributes.insert(field.to_string(), value);
    }

    fn update_set(&mut self, field: &str, update: SetUpdate) {
        let existing: Vec<Value> = self
            .attributes
            .get(field)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let updated = match update.action {
            SetAction::Set => update.items,
            SetAction::Add => {
                let mut merged: Vec<Value> = Vec::with_capacity(existing.len() + update.items.len());
                for item in existing.into_iter().chain(update.items) {
                    if !merged.contains(&item) {
                        merged.push(item);
                    }
                }
                merged
            }
            SetAction::Remove => existing
                .into_iter()
                .filter(|item| !update.items.contains(item))
                .collect(),
        };

        self.replace(field, Value::Array(updated));
    }

    fn replace_breakdown(&mut self, breakdown: Vec<Value>) {
        let current_state = self
            .attributes
            .entry(fields::CURRENT_STATE)
            .or_insert_with(|| Value::Object(Map::new()));

        if !current_state.is_object() {
            *current_state = Value::Object(Map::new());
        }
        if let Value::Object(state) = current_state {
            state.insert(fields::BREAKDOWN.to_string(), Value::Array(breakdown));
        }
    }
}

impl Aggregate for MaskProjection {
    type Event = MaskEvent;

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(mut self, event: Self::Event) -> Self {
        match event {
            MaskEvent::ColorUpdated { color } => self.replace(fields::COLOR, color),
            MaskEvent::PerimeterUpdated { perimeter_mm } => {
                self.replace(fields::PERIMETER, perimeter_mm)
            }
            MaskEvent::StyleUpdated { style } => self.replace(fields::STYLE, style),
            MaskEvent::ExhalationValveUpdated { has_exhalation_valve } => {
                self.replace(fields::HAS_EXHALATION_VALVE, has_exhalation_valve)
            }
            MaskEvent::UniqueInternalModelCodeUpdated { unique_internal_model_code } => {
                self.replace(fields::MODEL_CODE, unique_internal_model_code)
            }
            MaskEvent::AuthorUpdated { author_id } => self.replace(fields::AUTHOR_ID, author_id),
            MaskEvent::BrandUpdated { brand_id } => self.replace(fields::BRAND_ID, brand_id),
            MaskEvent::StrapTypeUpdated { strap_type } => {
                self.replace(fields::STRAP_TYPE, strap_type)
            }
            MaskEvent::MassUpdated { mass_grams } => self.replace(fields::MASS, mass_grams),
            MaskEvent::HasGasketUpdated { has_gasket } => {
                self.replace(fields::HAS_GASKET, has_gasket)
            }
            MaskEvent::ModificationsUpdated { modifications } => {
                self.replace(fields::MODIFICATIONS, modifications)
            }
            MaskEvent::NotesUpdated { notes } => self.replace(fields::NOTES, notes),
            MaskEvent::FilterTypeUpdated { filter_type } => {
                self.replace(fields::FILTER_TYPE, filter_type)
            }
            MaskEvent::AgeRangeUpdated { age_range } => self.replace(fields::AGE_RANGE, age_range),
            MaskEvent::AvailableUpdated { available } => self.replace(fields::AVAILABLE, available),
            MaskEvent::BulkImportUpdated { bulk_import_id } => {
                self.replace(fields::BULK_IMPORT_ID, bulk_import_id)
            }

            // Absent keys are left untouched
            MaskEvent::DimensionsUpdated(patch) => {
                for (field, value) in patch.into_present() {
                    self.replace(field, value);
                }
            }

            MaskEvent::ColorsUpdated(update) => self.update_set(fields::COLORS, update),
            MaskEvent::ImageUrlsUpdated(update) => self.update_set(fields::IMAGE_URLS, update),
            MaskEvent::WhereToBuyUrlsUpdated(update) => {
                self.update_set(fields::WHERE_TO_BUY_URLS, update)
            }
            MaskEvent::FiltrationEfficienciesUpdated(update) => {
                self.update_set(fields::FILTRATION_EFFICIENCIES, update)
            }
            MaskEvent::SourcesUpdated(update) => self.update_set(fields::SOURCES, update),
            MaskEvent::PayableDatetimesUpdated(update) => {
                self.update_set(fields::PAYABLE_DATETIMES, update)
            }

            MaskEvent::CostUpdated {
                initial_cost,
                filter_change_cost,
            } => {
                if let Some(cost) = initial_cost {
                    self.replace(fields::INITIAL_COST, cost);
                }
                if let Some(cost) = filter_change_cost {
                    self.replace(fields::FILTER_CHANGE_COST, cost);
                }
            }

            MaskEvent::BreakdownUpdated { breakdown } => self.replace_breakdown(breakdown),

            MaskEvent::DuplicateMarked { duplicate_of } => {
                self.replace(fields::DUPLICATE_OF, duplicate_of)
            }
            MaskEvent::DuplicateUnmarked => self.replace(fields::DUPLICATE_OF, Value::Null),
        }

        self.version += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn projection(seed: Value) -> MaskProjection {
        let seed = seed.as_object().cloned().unwrap();
        MaskProjection::from_seed(Uuid::new_v4(), Utc::now(), &seed)
    }

    fn event(event_type: &str, data: Value) -> MaskEvent {
        MaskEvent::parse(event_type, &data).unwrap()
    }

    #[test]
    fn test_scalar_replace_last_write_wins() {
        let mask = projection(json!({}))
            .apply(event("color_updated", json!({"color": "A"})))
            .apply(event("color_updated", json!({"color": "B"})));

        assert_eq!(mask.attributes()["color"], json!("B"));
        assert_eq!(mask.version(), 2);
    }

    #[test]
    fn test_set_add_then_remove_then_set() {
        let mask = projection(json!({"colors": []}))
            .apply(event("colors_updated", json!({"action": "add", "colors": ["X", "Y"]})))
            .apply(event("colors_updated", json!({"action": "remove", "colors": ["X"]})));
        assert_eq!(mask.attributes()["colors"], json!(["Y"]));

        let mask = mask.apply(event("colors_updated", json!({"action": "set", "colors": ["Z"]})));
        assert_eq!(mask.attributes()["colors"], json!(["Z"]));
    }

    #[test]
    fn test_set_add_dedups_in_first_seen_order() {
        let mask = projection(json!({"sources": ["b", "a"]}))
            .apply(event("sources_updated", json!({"action": "add", "sources": ["c", "a", "c"]})));

        assert_eq!(mask.attributes()["sources"], json!(["b", "a", "c"]));
    }

    #[test]
    fn test_set_add_on_missing_field() {
        let mask = projection(json!({}))
            .apply(event("image_urls_updated", json!({"action": "add", "image_urls": ["u1"]})));

        assert_eq!(mask.attributes()["image_urls"], json!(["u1"]));
    }

    #[test]
    fn test_set_remove_matches_structured_items() {
        let efficiency = json!({"filtration_efficiency_percent": 99.5, "source": "lab"});
        let mask = projection(json!({"filtration_efficiencies": [efficiency.clone(), {"filtration_efficiency_percent": 95}]}))
            .apply(event(
                "filtration_efficiencies_updated",
                json!({"action": "remove", "filtration_efficiencies": [efficiency]}),
            ));

        assert_eq!(
            mask.attributes()["filtration_efficiencies"],
            json!([{"filtration_efficiency_percent": 95}])
        );
    }

    #[test]
    fn test_dimensions_partial_update() {
        let mask = projection(json!({"height": 10, "width": 20}))
            .apply(event("dimensions_updated", json!({"depth": 5})));

        assert_eq!(
            Value::Object(mask.serialize()),
            json!({"height": 10, "width": 20, "depth": 5})
        );
    }

    #[test]
    fn test_cost_updated_gated_by_key_presence() {
        let mask = projection(json!({"initial_cost_us_dollars": 10, "filter_change_cost_us_dollars": 2}))
            .apply(event("cost_updated", json!({"filter_change_cost_us_dollars": 3})));

        assert_eq!(mask.attributes()["initial_cost_us_dollars"], json!(10));
        assert_eq!(mask.attributes()["filter_change_cost_us_dollars"], json!(3));
    }

    #[test]
    fn test_breakdown_creates_nested_container() {
        let mask = projection(json!({"current_state": "garbage"})).apply(event(
            "breakdown_updated",
            json!({"breakdown": [{"3M": "brand"}, {"Aura": "model"}]}),
        ));

        assert_eq!(
            mask.attributes()["current_state"]["breakdown"],
            json!([{"3M": "brand"}, {"Aura": "model"}])
        );
    }

    #[test]
    fn test_breakdown_keeps_sibling_state() {
        let mask = projection(json!({"current_state": {"status": "ok"}}))
            .apply(event("breakdown_updated", json!({"breakdown": []})));

        assert_eq!(mask.attributes()["current_state"]["status"], json!("ok"));
        assert_eq!(mask.attributes()["current_state"]["breakdown"], json!([]));
    }

    #[test]
    fn test_duplicate_marked_and_unmarked() {
        let other = Uuid::new_v4().to_string();
        let mask = projection(json!({}))
            .apply(event("duplicate_marked", json!({"duplicate_of": other})));
        assert_eq!(mask.attributes()["duplicate_of"], json!(other));

        let mask = mask.apply(event("duplicate_unmarked", json!({})));
        assert_eq!(mask.attributes()["duplicate_of"], Value::Null);
    }

    #[test]
    fn test_seed_is_not_aliased() {
        let seed = json!({"colors": ["A"]}).as_object().cloned().unwrap();
        let mask = MaskProjection::from_seed(Uuid::new_v4(), Utc::now(), &seed)
            .apply(event("colors_updated", json!({"action": "add", "colors": ["B"]})));

        assert_eq!(mask.attributes()["colors"], json!(["A", "B"]));
        assert_eq!(seed["colors"], json!(["A"]));
    }
}
