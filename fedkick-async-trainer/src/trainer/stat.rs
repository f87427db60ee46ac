use std::time::Duration;

/// Stats of [`AsyncTrainer`](crate::AsyncTrainer)`::train()`.
#[derive(Clone, Debug, Default)]
pub struct AsyncTrainStat {
    /// Number of training iterations.
    pub iterations: usize,

    /// Number of episodes played.
    pub episodes: usize,

    /// Number of environment steps.
    pub env_steps: usize,

    /// Number of deltas queued for upload.
    pub queued: usize,

    /// Duration of training.
    pub duration: Duration,
}

impl AsyncTrainStat {
    /// Environment steps per second of wall time.
    pub fn steps_per_sec(&self) -> f32 {
        self.env_steps as f32 / self.duration.as_secs_f32().max(f32::EPSILON)
    }

    /// Returns a formatted string.
    pub fn fmt(&self) -> String {
        let mut s = "iterations, episodes, env_steps, steps/sec, queued, duration\n".to_string();
        s += format!(
            "{}, {}, {}, {}, {}, {}\n",
            self.iterations,
            self.episodes,
            self.env_steps,
            self.steps_per_sec(),
            self.queued,
            self.duration.as_secs_f32()
        )
        .as_str();
        s
    }
}
