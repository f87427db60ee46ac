//! Configuration of [`SoccerEnv`](super::SoccerEnv).
use super::Action;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Physical constants of the soccer environment.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SoccerConfig {
    /// Width of the field; the origin is at its centre.
    pub field_width: f64,

    /// Height of the field.
    pub field_height: f64,

    /// Simulation ticks per second.
    pub tick_rate: f64,

    /// Episode length cap in steps.
    pub max_steps: usize,

    /// Radius of the ball.
    pub ball_radius: f64,

    /// Radius of a player.
    pub player_radius: f64,

    /// Radius of a cone.
    pub cone_radius: f64,

    /// Velocity multiplier applied to players every step.
    pub friction: f64,

    /// Velocity multiplier applied to the ball every step.
    pub ball_friction: f64,

    /// Half of the goal mouth width.
    pub goal_half_width: f64,

    /// Acceleration of a directional action.
    pub thrust: f64,

    /// Speed given to the ball by a successful kick.
    pub kick_impulse: f64,

    /// Extra reach of a kick beyond touching distance.
    pub kick_margin: f64,

    /// Restitution of the ball against walls.
    pub wall_restitution: f64,

    /// Restitution of cones against walls.
    pub cone_restitution: f64,

    /// Velocity multiplier applied to cones every step.
    pub cone_friction: f64,

    /// Angular velocity multiplier applied to cones every step.
    pub cone_angular_damping: f64,

    /// Amplitude of the random spin a cone receives on contact.
    pub cone_spin: f64,

    /// Velocity injected into the ball per unit of player overlap.
    pub player_ball_push: f64,

    /// Velocity injected into each player per unit of player overlap.
    pub player_push: f64,

    /// Velocity injected into a body per unit of cone overlap.
    pub cone_push: f64,

    /// Recoil of a cone hit by the ball, per unit of overlap.
    pub cone_bounce_ball: f64,

    /// Recoil of a cone hit by a player, per unit of overlap.
    pub cone_bounce_player: f64,
}

impl Default for SoccerConfig {
    fn default() -> Self {
        Self {
            field_width: 60.0,
            field_height: 36.0,
            tick_rate: 60.0,
            max_steps: 60 * 30,
            ball_radius: 1.2,
            player_radius: 1.5,
            cone_radius: 0.8,
            friction: 0.96,
            ball_friction: 0.985,
            goal_half_width: 5.0,
            thrust: 18.0,
            kick_impulse: 20.0,
            kick_margin: 0.3,
            wall_restitution: 0.8,
            cone_restitution: 0.5,
            cone_friction: 0.9,
            cone_angular_damping: 0.92,
            cone_spin: 0.2,
            player_ball_push: 8.0,
            player_push: 6.0,
            cone_push: 6.0,
            cone_bounce_ball: 0.4,
            cone_bounce_player: 0.6,
        }
    }
}

impl SoccerConfig {
    /// Number of players.
    pub const N_PLAYERS: usize = 2;

    /// Number of cones.
    pub const N_CONES: usize = 4;

    /// Sets the episode length cap.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Half of the field width.
    pub fn half_width(&self) -> f64 {
        self.field_width / 2.0
    }

    /// Half of the field height.
    pub fn half_height(&self) -> f64 {
        self.field_height / 2.0
    }

    /// Duration of one step.
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate
    }

    /// Maximum distance between player and ball centres for a kick.
    pub fn kick_reach(&self) -> f64 {
        self.player_radius + self.ball_radius + self.kick_margin
    }

    /// Width of the observation vector.
    pub fn obs_dim(&self) -> usize {
        5 * Self::N_PLAYERS + 4 + 4 * Self::N_CONES + 3 + 1
    }

    /// Number of discrete actions.
    pub fn n_actions(&self) -> usize {
        Action::COUNT
    }

    /// Constructs [`SoccerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`SoccerConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
