use super::{EventProcessor, ELISION_PLACEHOLDER};
use crate::protocol::{Context, Event, Value};

// Structures nested deeper than this carry no diagnostic value and are
// replaced wholesale.
const MAX_DEPTH: usize = 8;

/// Replaces overly deep substructures with a placeholder.
///
/// This is the general-purpose termination pass over arbitrary nested
/// data the host application handed in: whatever shape it has, walking
/// it is guaranteed to end, and the cut point is marked instead of
/// silently dropped.
pub struct ElideDeepStructures;

fn elide(value: &mut Value, depth: usize) {
    match value {
        Value::Object(_) | Value::Array(_) if depth >= MAX_DEPTH => {
            *value = Value::String(ELISION_PLACEHOLDER.into());
        }
        Value::Object(map) => {
            for value in map.values_mut() {
                elide(value, depth + 1);
            }
        }
        Value::Array(values) => {
            for value in values {
                elide(value, depth + 1);
            }
        }
        _ => {}
    }
}

impl EventProcessor for ElideDeepStructures {
    fn name(&self) -> &'static str {
        "elide-deep-structures"
    }

    fn process(&self, mut event: Event<'static>) -> Event<'static> {
        for value in event.extra.values_mut() {
            elide(value, 0);
        }
        for breadcrumb in event.breadcrumbs.iter_mut() {
            for value in breadcrumb.data.values_mut() {
                elide(value, 0);
            }
        }
        if let Some(user) = event.user.as_mut() {
            for value in user.other.values_mut() {
                elide(value, 0);
            }
        }
        for context in event.contexts.values_mut() {
            if let Context::Other(map) = context {
                for value in map.values_mut() {
                    elide(value, 0);
                }
            }
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_structure_is_elided() {
        let mut deep = json!(1);
        for _ in 0..32 {
            deep = json!([deep]);
        }
        let mut event = Event::default();
        event.extra.insert("deep".into(), deep);
        let event = ElideDeepStructures.process(event);
        let serialized = serde_json::to_string(&event.extra["deep"]).unwrap();
        assert!(serialized.contains(ELISION_PLACEHOLDER));
    }

    #[test]
    fn test_shallow_structure_is_untouched() {
        let mut event = Event::default();
        event
            .extra
            .insert("shallow".into(), json!({"a": [1, 2, {"b": 3}]}));
        let event = ElideDeepStructures.process(event);
        assert_eq!(event.extra["shallow"], json!({"a": [1, 2, {"b": 3}]}));
    }
}
