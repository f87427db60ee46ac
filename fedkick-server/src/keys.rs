//! Layout of the blob store.
use fedkick_core::Identity;
use uuid::Uuid;

/// Key of the counters of accepted updates.
pub const STATS: &str = "stats/training.json";

/// Key of the canonical model of `who`.
pub fn model(who: &Identity) -> String {
    format!("models/{}/latest.json", who)
}

/// Prefix of the pending deltas of `who`.
pub fn updates_prefix(who: &Identity) -> String {
    format!("updates/{}/", who)
}

/// Key of one pending delta of `who`.
pub fn update(who: &Identity, id: &Uuid) -> String {
    format!("{}{}.json", updates_prefix(who), id)
}
