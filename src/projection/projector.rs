//! State projector
//!
//! Pure fold of a seed and an ordered event sequence. Safe to call from any
//! thread; the only input is what is passed in.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregate::{Aggregate, MaskProjection};
use crate::domain::{Attributes, MaskEvent};
use crate::event_store::StoredEvent;

/// Fold typed events over a copy of `seed`
pub fn project(seed: &Attributes, events: &[MaskEvent]) -> Attributes {
    events
        .iter()
        .cloned()
        .fold(
            MaskProjection::from_seed(Uuid::nil(), DateTime::<Utc>::MIN_UTC, seed),
            |projection, event| projection.apply(event),
        )
        .into_attributes()
}

/// Fold stored events for one aggregate.
///
/// Unknown event types are skipped. Stored payloads that no longer
/// validate are skipped with a warning rather than failing the replay.
pub fn project_stored(
    aggregate_id: Uuid,
    as_of: DateTime<Utc>,
    seed: &Attributes,
    events: &[StoredEvent],
) -> MaskProjection {
    let mut projection = MaskProjection::from_seed(aggregate_id, as_of, seed);

    for stored in events {
        match stored.decode() {
            Ok(Some(event)) => projection = projection.apply(event),
            Ok(None) => {
                tracing::debug!(
                    event_id = %stored.id,
                    event_type = %stored.event_type,
                    "Skipping unknown event type"
                );
            }
            Err(e) => {
                tracing::warn!(
                    event_id = %stored.id,
                    aggregate_id = %aggregate_id,
                    error = %e,
                    "Skipping stored event with invalid payload"
                );
            }
        }
    }

    projection
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn seed(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    fn event(event_type: &str, data: Value) -> MaskEvent {
        MaskEvent::parse(event_type, &data).unwrap()
    }

    fn stored(aggregate_id: Uuid, event_type: &str, data: Value) -> StoredEvent {
        StoredEvent {
            id: Uuid::new_v4(),
            aggregate_id,
            actor_id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            data,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_project_is_deterministic() {
        let seed = seed(json!({"colors": ["White"], "style": "Bifold"}));
        let events = vec![
            event("colors_updated", json!({"action": "add", "colors": ["Blue", "White"]})),
            event("dimensions_updated", json!({"height": 12.5})),
            event("cost_updated", json!({"initial_cost_us_dollars": 3})),
        ];

        let first = serde_json::to_vec(&project(&seed, &events)).unwrap();
        let second = serde_json::to_vec(&project(&seed, &events)).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_project_is_order_sensitive() {
        let a = event("color_updated", json!({"color": "A"}));
        let b = event("color_updated", json!({"color": "B"}));

        let forward = project(&Attributes::new(), &[a.clone(), b.clone()]);
        let reversed = project(&Attributes::new(), &[b, a]);

        assert_eq!(forward["color"], json!("B"));
        assert_eq!(reversed["color"], json!("A"));
    }

    #[test]
    fn test_project_leaves_seed_untouched() {
        let seed = seed(json!({"colors": []}));
        let _ = project(
            &seed,
            &[event("colors_updated", json!({"action": "add", "colors": ["X"]}))],
        );

        assert_eq!(seed["colors"], json!([]));
    }

    #[test]
    fn test_project_stored_skips_unknown_and_invalid() {
        let id = Uuid::new_v4();
        let events = vec![
            stored(id, "color_updated", json!({"color": "Red"})),
            stored(id, "fit_test_recorded", json!({"passed": true})),
            stored(id, "colors_updated", json!({"action": "add", "colors": "oops"})),
            stored(id, "notes_updated", json!({"notes": "ok"})),
        ];

        let projection = project_stored(id, Utc::now(), &Attributes::new(), &events);

        assert_eq!(
            Value::Object(projection.serialize()),
            json!({"color": "Red", "notes": "ok"})
        );
        assert_eq!(projection.version(), 2);
    }
}
