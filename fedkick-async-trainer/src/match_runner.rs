//! Self-play episodes.
use crate::AgentRegistry;
use anyhow::{anyhow, Result};
use fedkick_core::{
    replay_buffer::Transition,
    soccer::{SoccerEnv, Winner},
    Identity, Policy,
};
use serde::{Deserialize, Serialize};

/// Terminal rewards.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RewardConfig {
    /// Reward of the scoring side.
    pub win: f32,

    /// Reward of the conceding side.
    pub loss: f32,

    /// Reward of both sides when the step cap is reached.
    pub draw: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            win: 500.0,
            loss: -500.0,
            draw: -50.0,
        }
    }
}

impl RewardConfig {
    /// Rewards of seat 0 and seat 1.
    pub fn terminal(&self, winner: Winner) -> [f32; 2] {
        match winner {
            Winner::Player1 => [self.win, self.loss],
            Winner::Player2 => [self.loss, self.win],
            Winner::Draw => [self.draw, self.draw],
        }
    }
}

/// Participants and exploration rate of one episode.
#[derive(Clone, Debug)]
pub struct Pairing {
    /// Player 1, attacking the right goal.
    pub p1: Identity,

    /// Player 2, attacking the left goal.
    pub p2: Identity,

    /// Exploration rate of both players.
    pub epsilon: f64,
}

/// Result of [`run_episode`].
#[derive(Clone, Debug)]
pub struct EpisodeResult {
    /// Transitions of each seat, labelled with the seat's identity.
    pub transitions: [(Identity, Vec<Transition>); 2],

    /// Number of environment steps.
    pub steps: usize,

    /// Outcome of the episode.
    pub winner: Winner,
}

/// Plays one episode between the learners of the pairing.
///
/// Every non-terminal step gives each seat a zero-reward transition; the
/// terminal step gives each seat one `done` transition with its terminal
/// reward. If both seats belong to the same identity, both streams are that
/// identity's.
pub fn run_episode<P: Policy>(
    env: &mut SoccerEnv,
    seed: u64,
    agents: &mut AgentRegistry<P>,
    pairing: &Pairing,
    rewards: &RewardConfig,
) -> Result<EpisodeResult> {
    let mut obs = env.reset(seed);
    let mut seats: [Vec<Transition>; 2] = Default::default();
    let ids = [&pairing.p1, &pairing.p2];

    loop {
        let mut acts = [0usize; 2];
        for (act, who) in acts.iter_mut().zip(ids.iter()) {
            let agent = agents
                .get_mut(who)
                .ok_or_else(|| anyhow!("No learner for {}", who))?;
            *act = agent.epsilon_greedy(&obs, pairing.epsilon)?;
        }

        let result = env.step(acts[0], acts[1]);
        let reward = match result.winner {
            Some(winner) if result.done => rewards.terminal(winner),
            _ => [0.0, 0.0],
        };

        for (i, seat) in seats.iter_mut().enumerate() {
            seat.push(Transition {
                state: obs.clone(),
                action: acts[i],
                next_state: result.observation.clone(),
                reward: reward[i],
                done: result.done,
            });
        }

        obs = result.observation;
        if let (true, Some(winner)) = (result.done, result.winner) {
            let [s1, s2] = seats;
            return Ok(EpisodeResult {
                transitions: [(pairing.p1.clone(), s1), (pairing.p2.clone(), s2)],
                steps: result.step_count,
                winner,
            });
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use fedkick_core::{dummy::DummyLearner, soccer::SoccerConfig, Roster};

    fn setup(max_steps: usize) -> Result<(SoccerEnv, AgentRegistry<DummyLearner>, Roster)> {
        let config = SoccerConfig::default().max_steps(max_steps);
        let obs_dim = config.obs_dim();
        let n_actions = config.n_actions();
        let roster = Roster::default();
        let agents =
            AgentRegistry::build(&roster, |_| Ok(DummyLearner::new(obs_dim, &[4], n_actions)))?;
        Ok((SoccerEnv::new(config), agents, roster))
    }

    #[test]
    fn test_draw_gives_terminal_signal() -> Result<()> {
        let (mut env, mut agents, roster) = setup(20)?;
        let pairing = Pairing {
            p1: roster.parse("gregory")?,
            p2: roster.parse("fred")?,
            epsilon: 0.0,
        };
        let result = run_episode(&mut env, 1, &mut agents, &pairing, &RewardConfig::default())?;

        assert_eq!(result.steps, 20);
        assert_eq!(result.winner, Winner::Draw);
        for (_, trs) in result.transitions.iter() {
            assert_eq!(trs.len(), 20);
            assert!(trs[..19].iter().all(|t| !t.done && t.reward == 0.0));
            assert!(trs[19].done);
            assert_eq!(trs[19].reward, -50.0);
        }
        assert_eq!(result.transitions[0].0.as_str(), "gregory");
        assert_eq!(result.transitions[1].0.as_str(), "fred");

        // next_state chains into the following state
        let trs = &result.transitions[0].1;
        assert_eq!(trs[0].next_state, trs[1].state);
        Ok(())
    }

    #[test]
    fn test_self_play_labels_both_seats() -> Result<()> {
        let (mut env, mut agents, roster) = setup(5)?;
        let fred = roster.parse("fred")?;
        let pairing = Pairing {
            p1: fred.clone(),
            p2: fred.clone(),
            epsilon: 1.0,
        };
        let result = run_episode(&mut env, 2, &mut agents, &pairing, &RewardConfig::default())?;
        assert!(result.transitions.iter().all(|(who, _)| *who == fred));
        Ok(())
    }

    #[test]
    fn test_terminal_rewards() {
        let r = RewardConfig::default();
        assert_eq!(r.terminal(Winner::Player1), [500.0, -500.0]);
        assert_eq!(r.terminal(Winner::Player2), [-500.0, 500.0]);
        assert_eq!(r.terminal(Winner::Draw), [-50.0, -50.0]);
    }
}
