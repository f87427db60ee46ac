//! Deltas uploaded by clients and acceptance counters.
use crate::{error::FedkickError, Identity, ParamSpec, Roster};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `POST /update`.
///
/// Integers are signed so that malformed values are rejected by validation
/// rather than by the decoder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    /// Participant the delta belongs to.
    pub who: String,

    /// Model version the delta was computed against.
    pub base_version: i64,

    /// Number of samples the delta averages over.
    pub count: i64,

    /// Per-parameter differences.
    pub delta: BTreeMap<String, Vec<f32>>,
}

impl UpdateRequest {
    /// Creates a request for `who`.
    pub fn new(
        who: &Identity,
        base_version: u64,
        count: usize,
        delta: BTreeMap<String, Vec<f32>>,
    ) -> Self {
        Self {
            who: who.as_str().to_string(),
            base_version: base_version as i64,
            count: count as i64,
            delta,
        }
    }
}

/// A pending delta, stored as an independent record until aggregated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    /// Model version the delta was computed against.
    pub base_version: u64,

    /// Number of samples the delta averages over; always positive.
    pub count: u64,

    /// Per-parameter differences.
    pub delta: BTreeMap<String, Vec<f32>>,
}

impl Delta {
    /// Checks every entry declared in `spec` against its shape.
    ///
    /// Entries absent from the delta and entries not declared in `spec` are
    /// not errors.
    pub fn validate(&self, spec: &[ParamSpec]) -> Result<(), FedkickError> {
        for p in spec.iter() {
            if let Some(values) = self.delta.get(&p.name) {
                if values.len() != p.numel() {
                    return Err(FedkickError::ShapeMismatch {
                        name: p.name.clone(),
                        expected: p.numel(),
                        actual: values.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Counters of accepted updates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Number of accepted updates.
    pub total: u64,

    /// Number of accepted updates per participant.
    pub per_agent: BTreeMap<String, u64>,
}

impl Stats {
    /// Zero counters for both participants.
    pub fn empty(roster: &Roster) -> Self {
        Self {
            total: 0,
            per_agent: roster.iter().map(|m| (m.to_string(), 0)).collect(),
        }
    }

    /// Counts one accepted update of `who`.
    pub fn record(&mut self, who: &Identity) {
        self.total += 1;
        *self.per_agent.entry(who.to_string()).or_insert(0) += 1;
    }
}

/// Response of a successful `POST /update`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateAck {
    /// Always `true`.
    pub ok: bool,

    /// Counters after accepting the update, absent if they could not be
    /// written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Model;

    fn delta(entries: &[(&str, usize)]) -> Delta {
        Delta {
            base_version: 0,
            count: 1,
            delta: entries
                .iter()
                .map(|(k, n)| (k.to_string(), vec![0.0; *n]))
                .collect(),
        }
    }

    #[test]
    fn test_validate_checks_each_layer() {
        let spec = Model::dense_spec(2, &[3], 2);
        assert!(delta(&[("dense_1.weight", 6), ("dense_1.bias", 2)]).validate(&spec).is_ok());
        assert!(delta(&[("dense_1.weight", 5), ("dense_1.bias", 2)]).validate(&spec).is_err());
        assert!(delta(&[("dense_1.weight", 6), ("dense_1.bias", 3)]).validate(&spec).is_err());
    }

    #[test]
    fn test_validate_ignores_absent_and_unknown_layers() {
        let spec = Model::dense_spec(2, &[3], 2);
        assert!(delta(&[]).validate(&spec).is_ok());
        assert!(delta(&[("dense_1.bias", 2)]).validate(&spec).is_ok());
        assert!(delta(&[("extra", 99)]).validate(&spec).is_ok());
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let roster = Roster::default();
        let who = roster.parse("fred").unwrap();
        let req = UpdateRequest::new(&who, 3, 32, BTreeMap::new());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["baseVersion"], 3);
        assert_eq!(json["count"], 32);
        assert_eq!(json["who"], "fred");

        let mut stats = Stats::empty(&roster);
        stats.record(&who);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total"], 1);
        assert_eq!(json["perAgent"]["fred"], 1);
        assert_eq!(json["perAgent"]["gregory"], 0);
    }
}
