use anyhow::Result;
use fedkick_core::{Identity, Roster};

/// The learners of both participants, indexed by identity.
pub struct AgentRegistry<L> {
    roster: Roster,
    agents: Vec<L>,
}

impl<L> AgentRegistry<L> {
    /// Builds one learner per participant.
    pub fn build(roster: &Roster, mut f: impl FnMut(&Identity) -> Result<L>) -> Result<Self> {
        let agents = roster.iter().map(&mut f).collect::<Result<Vec<_>>>()?;
        Ok(Self {
            roster: roster.clone(),
            agents,
        })
    }

    /// The roster the registry was built for.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The learner of `who`.
    pub fn get(&self, who: &Identity) -> Option<&L> {
        self.roster.index_of(who).map(|i| &self.agents[i])
    }

    /// The learner of `who`.
    pub fn get_mut(&mut self, who: &Identity) -> Option<&mut L> {
        self.roster.index_of(who).map(|i| &mut self.agents[i])
    }

    /// Iterates over `(identity, learner)` in roster order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Identity, &mut L)> {
        self.roster.iter().zip(self.agents.iter_mut())
    }
}
