// Copyright 2025 Contextor Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ingestion-time importance scoring
//!
//! Pure and deterministic over an event's type, data, and tags. The score is
//! computed once when the event is stored and used as a ranking signal by
//! retrieval; it is never recomputed afterwards.
//!
//! Additive rules over a base of 1.0, applied in fixed order:
//! - +2.5 failure/error outcome
//! - +1.0 confidence-like field > 0.8
//! - +0.5 non-empty recommendations list
//! - +1.5 recurring-failure tag
//!
//! The result is clamped to [0.0, 5.0].

use serde_json::{Map, Value};

/// Lower bound of the importance range
pub const IMPORTANCE_MIN: f32 = 0.0;

/// Upper bound of the importance range
pub const IMPORTANCE_MAX: f32 = 5.0;

const BASE_SCORE: f32 = 1.0;
const FAILURE_BONUS: f32 = 2.5;
const CONFIDENCE_BONUS: f32 = 1.0;
const RECOMMENDATION_BONUS: f32 = 0.5;
const RECURRING_BONUS: f32 = 1.5;

const CONFIDENCE_THRESHOLD: f64 = 0.8;

/// Compute the relevance weight for an event at ingestion time.
pub fn score(event_type: &str, data: &Map<String, Value>, tags: &[String]) -> f32 {
    let mut raw = BASE_SCORE;

    if is_failure(event_type, data) {
        raw += FAILURE_BONUS;
    }
    if has_high_confidence(data) {
        raw += CONFIDENCE_BONUS;
    }
    if has_recommendations(data) {
        raw += RECOMMENDATION_BONUS;
    }
    if is_recurring(tags) {
        raw += RECURRING_BONUS;
    }

    raw.clamp(IMPORTANCE_MIN, IMPORTANCE_MAX)
}

fn is_failure(event_type: &str, data: &Map<String, Value>) -> bool {
    if event_type == "test_failure" {
        return true;
    }
    ["status", "result"].iter().any(|field| {
        matches!(
            data.get(*field).and_then(Value::as_str),
            Some("error") | Some("failed")
        )
    })
}

fn has_high_confidence(data: &Map<String, Value>) -> bool {
    ["confidence", "confidence_score"].iter().any(|field| {
        data.get(*field)
            .and_then(Value::as_f64)
            .map(|c| c > CONFIDENCE_THRESHOLD)
            .unwrap_or(false)
    })
}

fn has_recommendations(data: &Map<String, Value>) -> bool {
    ["recommendations", "suggested_fixes"].iter().any(|field| {
        data.get(*field)
            .and_then(Value::as_array)
            .map(|list| !list.is_empty())
            .unwrap_or(false)
    })
}

fn is_recurring(tags: &[String]) -> bool {
    tags.iter()
        .any(|t| t == "recurring" || t == "recurring-failure")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn data_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_base_score() {
        assert_eq!(score("test_execution", &Map::new(), &[]), 1.0);
    }

    #[test]
    fn test_failure_by_type() {
        assert_eq!(score("test_failure", &Map::new(), &[]), 3.5);
    }

    #[test]
    fn test_failure_by_status_field() {
        let data = data_map(json!({"status": "error"}));
        assert_eq!(score("agent_action", &data, &[]), 3.5);

        let data = data_map(json!({"result": "failed"}));
        assert_eq!(score("agent_action", &data, &[]), 3.5);

        let data = data_map(json!({"status": "passed"}));
        assert_eq!(score("agent_action", &data, &[]), 1.0);
    }

    #[test]
    fn test_confidence_threshold_is_strict() {
        let above = data_map(json!({"confidence": 0.95}));
        assert_eq!(score("agent_action", &above, &[]), 2.0);

        // Exactly 0.8 does not qualify
        let at = data_map(json!({"confidence": 0.8}));
        assert_eq!(score("agent_action", &at, &[]), 1.0);
    }

    #[test]
    fn test_recommendations_must_be_non_empty() {
        let full = data_map(json!({"recommendations": ["fix X"]}));
        assert_eq!(score("agent_action", &full, &[]), 1.5);

        let empty = data_map(json!({"recommendations": []}));
        assert_eq!(score("agent_action", &empty, &[]), 1.0);
    }

    #[test]
    fn test_recurring_tag() {
        let tags = vec!["recurring-failure".to_string()];
        assert_eq!(score("agent_action", &Map::new(), &tags), 2.5);

        let tags = vec!["recurring".to_string()];
        assert_eq!(score("agent_action", &Map::new(), &tags), 2.5);
    }

    #[test]
    fn test_spec_scenario_failure_event() {
        // {type: "test_failure", data: {status: "error"}, tags: ["auth"]}
        let data = data_map(json!({"status": "error"}));
        let tags = vec!["auth".to_string()];
        assert_eq!(score("test_failure", &data, &tags), 3.5);
    }

    #[test]
    fn test_spec_scenario_stacked_bonuses() {
        // {type: "agent_action", data: {confidence: 0.95, recommendations:
        // ["fix X"]}, tags: ["recurring-failure"]} -> min(1+1+0.5+1.5, 5) = 4.0
        let data = data_map(json!({"confidence": 0.95, "recommendations": ["fix X"]}));
        let tags = vec!["recurring-failure".to_string()];
        assert_eq!(score("agent_action", &data, &tags), 4.0);
    }

    #[test]
    fn test_all_bonuses_clamped_at_max() {
        let data = data_map(json!({
            "status": "error",
            "confidence": 0.99,
            "recommendations": ["fix X", "fix Y"],
        }));
        let tags = vec!["recurring-failure".to_string()];
        // 1.0 + 2.5 + 1.0 + 0.5 + 1.5 = 6.5, clamped
        assert_eq!(score("test_failure", &data, &tags), 5.0);
    }

    proptest! {
        #[test]
        fn prop_score_always_in_bounds(
            event_type in "[a-z_]{0,20}",
            status in proptest::option::of("[a-z]{0,10}"),
            confidence in proptest::option::of(-1.0f64..2.0),
            tags in proptest::collection::vec("[a-z-]{0,18}", 0..5),
        ) {
            let mut data = Map::new();
            if let Some(s) = status {
                data.insert("status".to_string(), json!(s));
            }
            if let Some(c) = confidence {
                data.insert("confidence".to_string(), json!(c));
            }
            let s = score(&event_type, &data, &tags);
            prop_assert!((IMPORTANCE_MIN..=IMPORTANCE_MAX).contains(&s));
        }

        #[test]
        fn prop_failure_events_score_at_least_3_5(
            tags in proptest::collection::vec("[a-z-]{0,18}", 0..5),
        ) {
            let data = data_map(json!({"status": "error"}));
            prop_assert!(score("anything", &data, &tags) >= 3.5);
        }
    }
}
