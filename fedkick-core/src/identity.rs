//! Participant identities.
use crate::error::FedkickError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of one of the two participants.
///
/// Values are only obtained through [`Roster::parse`], so holding an
/// [`Identity`] means the name has been validated.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Returns the name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two participants of the experiment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Roster {
    members: [Identity; 2],
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            members: [Identity("gregory".into()), Identity("fred".into())],
        }
    }
}

impl Roster {
    /// Creates a roster of two distinct, non-empty names.
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> anyhow::Result<Self> {
        let (first, second) = (first.into(), second.into());
        if first.is_empty() || second.is_empty() || first == second {
            anyhow::bail!("Roster needs two distinct names, got {:?} and {:?}", first, second);
        }
        Ok(Self {
            members: [Identity(first), Identity(second)],
        })
    }

    /// Validates a name against the roster.
    pub fn parse(&self, who: &str) -> Result<Identity, FedkickError> {
        self.members
            .iter()
            .find(|m| m.0 == who)
            .cloned()
            .ok_or_else(|| FedkickError::UnknownIdentity(who.to_string()))
    }

    /// Both participants, in configuration order.
    pub fn members(&self) -> &[Identity; 2] {
        &self.members
    }

    /// Iterates over both participants.
    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        self.members.iter()
    }

    /// Position of the participant in the roster.
    pub fn index_of(&self, who: &Identity) -> Option<usize> {
        self.members.iter().position(|m| m == who)
    }

    /// The participant that is not `who`.
    pub fn other(&self, who: &Identity) -> Option<&Identity> {
        match self.index_of(who)? {
            0 => Some(&self.members[1]),
            _ => Some(&self.members[0]),
        }
    }
}

impl TryFrom<Vec<String>> for Roster {
    type Error = anyhow::Error;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        match <[String; 2]>::try_from(names) {
            Ok([first, second]) => Self::new(first, second),
            Err(names) => anyhow::bail!("Roster needs exactly two names, got {}", names.len()),
        }
    }
}

impl From<Roster> for Vec<String> {
    fn from(roster: Roster) -> Self {
        roster.members.into_iter().map(|m| m.0).collect()
    }
}
