//! Choice of the two seats of an episode.
use anyhow::{Context, Result};
use fedkick_core::{Identity, Roster};
use rand::{distributions::WeightedIndex, prelude::Distribution, rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration of [`PairingSampler`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct PairingConfig {
    /// Relative weights of drawing each participant for the first seat.
    pub weights: Vec<(String, f64)>,

    /// Participant whose first-seat draw forces the other participant into
    /// the second seat.
    pub favored: String,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            weights: vec![("gregory".into(), 1.0), ("fred".into(), 1.5)],
            favored: "gregory".into(),
        }
    }
}

/// Draws `(p1, p2)` for each episode.
///
/// The first seat follows the configured weights. If it goes to the favored
/// participant the second seat is the other participant, otherwise the second
/// seat is uniform over both, so self-play is possible.
pub struct PairingSampler {
    roster: Roster,
    first: Vec<Identity>,
    dist: WeightedIndex<f64>,
    favored: Identity,
    rng: SmallRng,
}

impl PairingSampler {
    /// Builds the sampler, validating the names against the roster.
    pub fn build(roster: &Roster, config: &PairingConfig, seed: u64) -> Result<Self> {
        let first = config
            .weights
            .iter()
            .map(|(who, _)| roster.parse(who))
            .collect::<Result<Vec<_>, _>>()?;
        let dist = WeightedIndex::new(config.weights.iter().map(|(_, w)| *w))
            .context("Invalid pairing weights")?;
        let favored = roster.parse(&config.favored)?;

        Ok(Self {
            roster: roster.clone(),
            first,
            dist,
            favored,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// Draws the participants of the next episode.
    pub fn sample(&mut self) -> (Identity, Identity) {
        let p1 = self.first[self.dist.sample(&mut self.rng)].clone();
        let p2 = match self.roster.other(&p1) {
            Some(other) if p1 == self.favored => other.clone(),
            _ => {
                let members = self.roster.members();
                members[self.rng.gen_range(0..members.len())].clone()
            }
        };
        (p1, p2)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_favored_always_faces_the_other() -> Result<()> {
        let roster = Roster::default();
        let mut sampler = PairingSampler::build(&roster, &PairingConfig::default(), 0)?;
        let gregory = roster.parse("gregory")?;
        let fred = roster.parse("fred")?;

        let (mut n_gregory_first, mut n_fred_self_play) = (0, 0);
        for _ in 0..5000 {
            let (p1, p2) = sampler.sample();
            if p1 == gregory {
                n_gregory_first += 1;
                assert_eq!(p2, fred);
            } else if p2 == fred {
                n_fred_self_play += 1;
            }
        }

        // 1.0 / 2.5 of first draws
        assert!((1700..2300).contains(&n_gregory_first), "{}", n_gregory_first);
        // half of the remaining 3000
        assert!((1200..1800).contains(&n_fred_self_play), "{}", n_fred_self_play);
        Ok(())
    }

    #[test]
    fn test_rejects_unknown_names() {
        let roster = Roster::default();
        let config = PairingConfig {
            favored: "alice".into(),
            ..Default::default()
        };
        assert!(PairingSampler::build(&roster, &config, 0).is_err());

        let config = PairingConfig {
            weights: vec![("gregory".into(), 0.0), ("fred".into(), 0.0)],
            ..Default::default()
        };
        assert!(PairingSampler::build(&roster, &config, 0).is_err());
    }
}
