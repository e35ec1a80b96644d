//! Domain Events
//!
//! Event definitions for Event Sourcing.
//! Events are immutable facts about a mask record. Each event kind carries
//! its own payload; the raw `(event_type, data)` pair received at the
//! ingestion boundary is validated into a [`MaskEvent`] before it is stored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::DomainError;

/// Attribute map of a mask record.
///
/// `serde_json::Map` keeps keys sorted, so identical contents always
/// serialize to identical bytes.
pub type Attributes = Map<String, Value>;

/// Attribute names written by the event handlers
pub mod fields {
    pub const COLOR: &str = "color";
    pub const PERIMETER: &str = "perimeter_mm";
    pub const STYLE: &str = "style";
    pub const HAS_EXHALATION_VALVE: &str = "has_exhalation_valve";
    pub const MODEL_CODE: &str = "unique_internal_model_code";
    pub const AUTHOR_ID: &str = "author_id";
    pub const BRAND_ID: &str = "brand_id";
    pub const STRAP_TYPE: &str = "strap_type";
    pub const MASS: &str = "mass_grams";
    pub const HAS_GASKET: &str = "has_gasket";
    pub const MODIFICATIONS: &str = "modifications";
    pub const NOTES: &str = "notes";
    pub const FILTER_TYPE: &str = "filter_type";
    pub const AGE_RANGE: &str = "age_range";
    pub const AVAILABLE: &str = "available";
    pub const BULK_IMPORT_ID: &str = "bulk_import_id";

    pub const HEIGHT: &str = "height";
    pub const WIDTH: &str = "width";
    pub const DEPTH: &str = "depth";

    pub const COLORS: &str = "colors";
    pub const IMAGE_URLS: &str = "image_urls";
    pub const WHERE_TO_BUY_URLS: &str = "where_to_buy_urls";
    pub const FILTRATION_EFFICIENCIES: &str = "filtration_efficiencies";
    pub const SOURCES: &str = "sources";
    pub const PAYABLE_DATETIMES: &str = "payable_datetimes";

    pub const INITIAL_COST: &str = "initial_cost_us_dollars";
    pub const FILTER_CHANGE_COST: &str = "filter_change_cost_us_dollars";

    pub const CURRENT_STATE: &str = "current_state";
    pub const BREAKDOWN: &str = "breakdown";
    pub const DUPLICATE_OF: &str = "duplicate_of";
}

/// The fixed event-type vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ColorUpdated,
    PerimeterUpdated,
    StyleUpdated,
    ExhalationValveUpdated,
    UniqueInternalModelCodeUpdated,
    AuthorUpdated,
    BrandUpdated,
    StrapTypeUpdated,
    MassUpdated,
    HasGasketUpdated,
    ModificationsUpdated,
    NotesUpdated,
    FilterTypeUpdated,
    AgeRangeUpdated,
    AvailableUpdated,
    BulkImportUpdated,
    DimensionsUpdated,
    ColorsUpdated,
    ImageUrlsUpdated,
    WhereToBuyUrlsUpdated,
    FiltrationEfficienciesUpdated,
    SourcesUpdated,
    PayableDatetimesUpdated,
    CostUpdated,
    BreakdownUpdated,
    DuplicateMarked,
    DuplicateUnmarked,
}

impl EventType {
    pub const ALL: [EventType; 27] = [
        EventType::ColorUpdated,
        EventType::PerimeterUpdated,
        EventType::StyleUpdated,
        EventType::ExhalationValveUpdated,
        EventType::UniqueInternalModelCodeUpdated,
        EventType::AuthorUpdated,
        EventType::BrandUpdated,
        EventType::StrapTypeUpdated,
        EventType::MassUpdated,
        EventType::HasGasketUpdated,
        EventType::ModificationsUpdated,
        EventType::NotesUpdated,
        EventType::FilterTypeUpdated,
        EventType::AgeRangeUpdated,
        EventType::AvailableUpdated,
        EventType::BulkImportUpdated,
        EventType::DimensionsUpdated,
        EventType::ColorsUpdated,
        EventType::ImageUrlsUpdated,
        EventType::WhereToBuyUrlsUpdated,
        EventType::FiltrationEfficienciesUpdated,
        EventType::SourcesUpdated,
        EventType::PayableDatetimesUpdated,
        EventType::CostUpdated,
        EventType::BreakdownUpdated,
        EventType::DuplicateMarked,
        EventType::DuplicateUnmarked,
    ];

    /// Get the event type as stored on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ColorUpdated => "color_updated",
            EventType::PerimeterUpdated => "perimeter_updated",
            EventType::StyleUpdated => "style_updated",
            EventType::ExhalationValveUpdated => "exhalation_valve_updated",
            EventType::UniqueInternalModelCodeUpdated => "unique_internal_model_code_updated",
            EventType::AuthorUpdated => "author_updated",
            EventType::BrandUpdated => "brand_updated",
            EventType::StrapTypeUpdated => "strap_type_updated",
            EventType::MassUpdated => "mass_updated",
            EventType::HasGasketUpdated => "has_gasket_updated",
            EventType::ModificationsUpdated => "modifications_updated",
            EventType::NotesUpdated => "notes_updated",
            EventType::FilterTypeUpdated => "filter_type_updated",
            EventType::AgeRangeUpdated => "age_range_updated",
            EventType::AvailableUpdated => "available_updated",
            EventType::BulkImportUpdated => "bulk_import_updated",
            EventType::DimensionsUpdated => "dimensions_updated",
            EventType::ColorsUpdated => "colors_updated",
            EventType::ImageUrlsUpdated => "image_urls_updated",
            EventType::WhereToBuyUrlsUpdated => "where_to_buy_urls_updated",
            EventType::FiltrationEfficienciesUpdated => "filtration_efficiencies_updated",
            EventType::SourcesUpdated => "sources_updated",
            EventType::PayableDatetimesUpdated => "payable_datetimes_updated",
            EventType::CostUpdated => "cost_updated",
            EventType::BreakdownUpdated => "breakdown_updated",
            EventType::DuplicateMarked => "duplicate_marked",
            EventType::DuplicateUnmarked => "duplicate_unmarked",
        }
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DomainError::UnknownEventType(s.to_string()))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action carried by collection-update events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetAction {
    Add,
    Remove,
    Set,
}

impl FromStr for SetAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(SetAction::Add),
            "remove" => Ok(SetAction::Remove),
            "set" => Ok(SetAction::Set),
            other => Err(format!("action must be add, remove or set, got {:?}", other)),
        }
    }
}

/// Payload of a collection-update event
#[derive(Debug, Clone, PartialEq)]
pub struct SetUpdate {
    pub action: SetAction,
    pub items: Vec<Value>,
}

impl SetUpdate {
    fn from_data(event_type: EventType, data: &Map<String, Value>, field: &str) -> Result<Self, DomainError> {
        let action = data
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| DomainError::invalid_data(event_type.as_str(), "action must be a string"))?
            .parse::<SetAction>()
            .map_err(|reason| DomainError::invalid_data(event_type.as_str(), reason))?;

        let items = data
            .get(field)
            .and_then(Value::as_array)
            .ok_or_else(|| DomainError::invalid_data(event_type.as_str(), format!("{} must be a list", field)))?
            .clone();

        Ok(Self { action, items })
    }
}

/// Payload of `dimensions_updated`: only the keys present are written
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DimensionsPatch {
    pub height: Option<Value>,
    pub width: Option<Value>,
    pub depth: Option<Value>,
}

impl DimensionsPatch {
    fn from_data(data: &Map<String, Value>) -> Self {
        Self {
            height: data.get(fields::HEIGHT).cloned(),
            width: data.get(fields::WIDTH).cloned(),
            depth: data.get(fields::DEPTH).cloned(),
        }
    }

    /// Present keys paired with their attribute names
    pub fn into_present(self) -> impl Iterator<Item = (&'static str, Value)> {
        [
            (fields::HEIGHT, self.height),
            (fields::WIDTH, self.width),
            (fields::DEPTH, self.depth),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
    }
}

/// Mask-related events
#[derive(Debug, Clone, PartialEq)]
pub enum MaskEvent {
    ColorUpdated { color: Value },
    PerimeterUpdated { perimeter_mm: Value },
    StyleUpdated { style: Value },
    ExhalationValveUpdated { has_exhalation_valve: Value },
    UniqueInternalModelCodeUpdated { unique_internal_model_code: Value },
    AuthorUpdated { author_id: Value },
    BrandUpdated { brand_id: Value },
    StrapTypeUpdated { strap_type: Value },
    MassUpdated { mass_grams: Value },
    HasGasketUpdated { has_gasket: Value },
    ModificationsUpdated { modifications: Value },
    NotesUpdated { notes: Value },
    FilterTypeUpdated { filter_type: Value },
    AgeRangeUpdated { age_range: Value },
    AvailableUpdated { available: Value },
    BulkImportUpdated { bulk_import_id: Value },

    /// Partial replace of height/width/depth
    DimensionsUpdated(DimensionsPatch),

    ColorsUpdated(SetUpdate),
    ImageUrlsUpdated(SetUpdate),
    WhereToBuyUrlsUpdated(SetUpdate),
    FiltrationEfficienciesUpdated(SetUpdate),
    SourcesUpdated(SetUpdate),
    PayableDatetimesUpdated(SetUpdate),

    /// Either cost is written only when its key is present
    CostUpdated {
        initial_cost: Option<Value>,
        filter_change_cost: Option<Value>,
    },

    /// Breakdown written beneath `current_state`
    BreakdownUpdated { breakdown: Vec<Value> },

    DuplicateMarked { duplicate_of: Value },
    DuplicateUnmarked,
}

impl MaskEvent {
    /// Validate a raw `(event_type, data)` pair into a typed event
    pub fn parse(event_type: &str, data: &Value) -> Result<Self, DomainError> {
        let event_type: EventType = event_type.parse()?;
        Self::from_typed(event_type, data)
    }

    /// Validate `data` against the shape `event_type` requires
    pub fn from_typed(event_type: EventType, data: &Value) -> Result<Self, DomainError> {
        let data = data
            .as_object()
            .ok_or_else(|| DomainError::invalid_data(event_type.as_str(), "data must be an object"))?;
        let scalar = |field: &str| data.get(field).cloned().unwrap_or(Value::Null);
        let set = |field: &str| SetUpdate::from_data(event_type, data, field);

        let event = match event_type {
            EventType::ColorUpdated => MaskEvent::ColorUpdated {
                color: scalar(fields::COLOR),
            },
            EventType::PerimeterUpdated => MaskEvent::PerimeterUpdated {
                perimeter_mm: scalar(fields::PERIMETER),
            },
            EventType::StyleUpdated => MaskEvent::StyleUpdated {
                style: scalar(fields::STYLE),
            },
            EventType::ExhalationValveUpdated => MaskEvent::ExhalationValveUpdated {
                has_exhalation_valve: scalar(fields::HAS_EXHALATION_VALVE),
            },
            EventType::UniqueInternalModelCodeUpdated => MaskEvent::UniqueInternalModelCodeUpdated {
                unique_internal_model_code: scalar(fields::MODEL_CODE),
            },
            EventType::AuthorUpdated => MaskEvent::AuthorUpdated {
                author_id: scalar(fields::AUTHOR_ID),
            },
            EventType::BrandUpdated => MaskEvent::BrandUpdated {
                brand_id: scalar(fields::BRAND_ID),
            },
            EventType::StrapTypeUpdated => MaskEvent::StrapTypeUpdated {
                strap_type: scalar(fields::STRAP_TYPE),
            },
            EventType::MassUpdated => MaskEvent::MassUpdated {
                mass_grams: scalar(fields::MASS),
            },
            EventType::HasGasketUpdated => MaskEvent::HasGasketUpdated {
                has_gasket: scalar(fields::HAS_GASKET),
            },
            EventType::ModificationsUpdated => MaskEvent::ModificationsUpdated {
                modifications: scalar(fields::MODIFICATIONS),
            },
            EventType::NotesUpdated => MaskEvent::NotesUpdated {
                notes: scalar(fields::NOTES),
            },
            EventType::FilterTypeUpdated => MaskEvent::FilterTypeUpdated {
                filter_type: scalar(fields::FILTER_TYPE),
            },
            EventType::AgeRangeUpdated => MaskEvent::AgeRangeUpdated {
                age_range: scalar(fields::AGE_RANGE),
            },
            EventType::AvailableUpdated => MaskEvent::AvailableUpdated {
                available: scalar(fields::AVAILABLE),
            },
            EventType::BulkImportUpdated => MaskEvent::BulkImportUpdated {
                bulk_import_id: scalar(fields::BULK_IMPORT_ID),
            },
            EventType::DimensionsUpdated => {
                MaskEvent::DimensionsUpdated(DimensionsPatch::from_data(data))
            }
            EventType::ColorsUpdated => MaskEvent::ColorsUpdated(set(fields::COLORS)?),
            EventType::ImageUrlsUpdated => MaskEvent::ImageUrlsUpdated(set(fields::IMAGE_URLS)?),
            EventType::WhereToBuyUrlsUpdated => {
                MaskEvent::WhereToBuyUrlsUpdated(set(fields::WHERE_TO_BUY_URLS)?)
            }
            EventType::FiltrationEfficienciesUpdated => {
                MaskEvent::FiltrationEfficienciesUpdated(set(fields::FILTRATION_EFFICIENCIES)?)
            }
            EventType::SourcesUpdated => MaskEvent::SourcesUpdated(set(fields::SOURCES)?),
            EventType::PayableDatetimesUpdated => {
                MaskEvent::PayableDatetimesUpdated(set(fields::PAYABLE_DATETIMES)?)
            }
            EventType::CostUpdated => MaskEvent::CostUpdated {
                initial_cost: data.get(fields::INITIAL_COST).cloned(),
                filter_change_cost: data.get(fields::FILTER_CHANGE_COST).cloned(),
            },
            EventType::BreakdownUpdated => {
                let breakdown = data
                    .get(fields::BREAKDOWN)
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        DomainError::invalid_data(event_type.as_str(), "breakdown must be a list")
                    })?;
                MaskEvent::BreakdownUpdated {
                    breakdown: breakdown.clone(),
                }
            }
            EventType::DuplicateMarked => MaskEvent::DuplicateMarked {
                duplicate_of: scalar(fields::DUPLICATE_OF),
            },
            EventType::DuplicateUnmarked => MaskEvent::DuplicateUnmarked,
        };

        Ok(event)
    }

    /// Get the event type of this event
    pub fn event_type(&self) -> EventType {
        match self {
            MaskEvent::ColorUpdated { .. } => EventType::ColorUpdated,
            MaskEvent::PerimeterUpdated { .. } => EventType::PerimeterUpdated,
            MaskEvent::StyleUpdated { .. } => EventType::StyleUpdated,
            MaskEvent::ExhalationValveUpdated { .. } => EventType::ExhalationValveUpdated,
            MaskEvent::UniqueInternalModelCodeUpdated { .. } => {
                EventType::UniqueInternalModelCodeUpdated
            }
            MaskEvent::AuthorUpdated { .. } => EventType::AuthorUpdated,
            MaskEvent::BrandUpdated { .. } => EventType::BrandUpdated,
            MaskEvent::StrapTypeUpdated { .. } => EventType::StrapTypeUpdated,
            MaskEvent::MassUpdated { .. } => EventType::MassUpdated,
            MaskEvent::HasGasketUpdated { .. } => EventType::HasGasketUpdated,
            MaskEvent::ModificationsUpdated { .. } => EventType::ModificationsUpdated,
            MaskEvent::NotesUpdated { .. } => EventType::NotesUpdated,
            MaskEvent::FilterTypeUpdated { .. } => EventType::FilterTypeUpdated,
            MaskEvent::AgeRangeUpdated { .. } => EventType::AgeRangeUpdated,
            MaskEvent::AvailableUpdated { .. } => EventType::AvailableUpdated,
            MaskEvent::BulkImportUpdated { .. } => EventType::BulkImportUpdated,
            MaskEvent::DimensionsUpdated(_) => EventType::DimensionsUpdated,
            MaskEvent::ColorsUpdated(_) => EventType::ColorsUpdated,
            MaskEvent::ImageUrlsUpdated(_) => EventType::ImageUrlsUpdated,
            MaskEvent::WhereToBuyUrlsUpdated(_) => EventType::WhereToBuyUrlsUpdated,
            MaskEvent::FiltrationEfficienciesUpdated(_) => EventType::FiltrationEfficienciesUpdated,
            MaskEvent::SourcesUpdated(_) => EventType::SourcesUpdated,
            MaskEvent::PayableDatetimesUpdated(_) => EventType::PayableDatetimesUpdated,
            MaskEvent::CostUpdated { .. } => EventType::CostUpdated,
            MaskEvent::BreakdownUpdated { .. } => EventType::BreakdownUpdated,
            MaskEvent::DuplicateMarked { .. } => EventType::DuplicateMarked,
            MaskEvent::DuplicateUnmarked => EventType::DuplicateUnmarked,
        }
    }
}
