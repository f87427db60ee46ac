//! Stepping and observation of the soccer environment.
use super::{
    body::{contact, normalise, Body},
    Action, Ball, Cone, Player, SoccerConfig,
};
use log::trace;

/// Outcome of a finished episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winner {
    /// The step cap was reached.
    Draw,
    /// The ball went through the right goal.
    Player1,
    /// The ball went through the left goal.
    Player2,
}

impl Winner {
    /// Numeric code: 0 for a draw, otherwise the scoring player's number.
    pub fn code(&self) -> u8 {
        match self {
            Self::Draw => 0,
            Self::Player1 => 1,
            Self::Player2 => 2,
        }
    }

    /// Seat index (0 or 1) of the winner, `None` for a draw.
    pub fn seat(&self) -> Option<usize> {
        match self {
            Self::Draw => None,
            Self::Player1 => Some(0),
            Self::Player2 => Some(1),
        }
    }
}

/// Returned by [`SoccerEnv::step`].
#[derive(Clone, Debug)]
pub struct StepResult {
    /// Observation after the step.
    pub observation: Vec<f32>,

    /// `true` if the episode has ended.
    pub done: bool,

    /// Set on the terminal step.
    pub winner: Option<Winner>,

    /// Number of steps taken in this episode.
    pub step_count: usize,
}

/// Two-player soccer match.
///
/// The state lives for one episode and is rebuilt by [`SoccerEnv::reset`].
#[derive(Debug)]
pub struct SoccerEnv {
    config: SoccerConfig,
    ball: Ball,
    players: [Player; 2],
    cones: [Cone; 4],
    possession: usize,
    step_count: usize,
    winner: Option<Winner>,
    rng: fastrand::Rng,
}

impl SoccerEnv {
    /// Creates an environment already reset with seed 0.
    pub fn new(config: SoccerConfig) -> Self {
        let mut env = Self {
            config,
            ball: Ball::default(),
            players: Default::default(),
            cones: Default::default(),
            possession: 0,
            step_count: 0,
            winner: None,
            rng: fastrand::Rng::with_seed(0),
        };
        env.reset(0);
        env
    }

    /// Configuration of this environment.
    pub fn config(&self) -> &SoccerConfig {
        &self.config
    }

    /// Starts a new episode and returns the first observation.
    ///
    /// The seed drives the random spin of the cones, so identical seeds and
    /// action sequences produce identical episodes.
    pub fn reset(&mut self, seed: u64) -> Vec<f32> {
        let hw = self.config.half_width();
        let hh = self.config.half_height();
        let quarter = self.config.field_width * 0.25;

        self.ball = Ball::default();
        self.players = [
            Player {
                x: -quarter,
                ..Default::default()
            },
            Player {
                x: quarter,
                facing: std::f64::consts::PI,
                ..Default::default()
            },
        ];
        self.cones = [
            Cone::at(-hw + 4.0, -hh + 4.0),
            Cone::at(hw - 4.0, -hh + 4.0),
            Cone::at(-hw + 4.0, hh - 4.0),
            Cone::at(hw - 4.0, hh - 4.0),
        ];
        self.possession = 0;
        self.step_count = 0;
        self.winner = None;
        self.rng = fastrand::Rng::with_seed(seed);
        self.observation()
    }

    /// Advances the match by one tick with the actions of player 1 and 2.
    ///
    /// Action indices outside the action set are treated as idle. Once the
    /// episode has ended the state is frozen and the terminal result is
    /// returned again.
    pub fn step(&mut self, a1: usize, a2: usize) -> StepResult {
        if self.winner.is_none() {
            self.step_count += 1;
            self.apply_action(0, Action::from_index(a1));
            self.apply_action(1, Action::from_index(a2));
            self.integrate();
            self.resolve_player_ball();
            self.resolve_players();
            self.resolve_cones();
            self.winner = self.check_terminal();
            if let Some(w) = self.winner {
                trace!("Episode finished at step {}, winner {}", self.step_count, w.code());
            }
        }

        StepResult {
            observation: self.observation(),
            done: self.winner.is_some(),
            winner: self.winner,
            step_count: self.step_count,
        }
    }

    /// Kicks the ball if player `ix` (0 or 1) is within reach.
    ///
    /// Returns `true` on success. A successful kick sends the ball directly
    /// away from the player at the kick speed and gives possession to the
    /// kicker. Otherwise nothing changes.
    pub fn try_kick(&mut self, ix: usize) -> bool {
        let p = &self.players[ix];
        let dx = self.ball.x - p.x;
        let dy = self.ball.y - p.y;
        if dx.hypot(dy) < self.config.kick_reach() {
            let (nx, ny) = normalise(dx, dy);
            self.ball.vx = nx * self.config.kick_impulse;
            self.ball.vy = ny * self.config.kick_impulse;
            self.possession = ix + 1;
            true
        } else {
            false
        }
    }

    /// 0 when nobody has touched the ball, otherwise the number of the last
    /// player who touched or kicked it.
    pub fn possession(&self) -> usize {
        self.possession
    }

    /// Steps taken in this episode.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Winner, once decided.
    pub fn winner(&self) -> Option<Winner> {
        self.winner
    }

    /// The ball.
    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    /// Mutable access to the ball, for scripted situations.
    pub fn ball_mut(&mut self) -> &mut Ball {
        &mut self.ball
    }

    /// The players.
    pub fn players(&self) -> &[Player; 2] {
        &self.players
    }

    /// Mutable access to the players, for scripted situations.
    pub fn players_mut(&mut self) -> &mut [Player; 2] {
        &mut self.players
    }

    /// The cones.
    pub fn cones(&self) -> &[Cone; 4] {
        &self.cones
    }

    fn apply_action(&mut self, ix: usize, action: Action) {
        if action == Action::Kick {
            self.try_kick(ix);
            return;
        }
        let (ax, ay) = action.direction();
        if ax != 0.0 || ay != 0.0 {
            let (nx, ny) = normalise(ax, ay);
            let dv = self.config.thrust * self.config.dt();
            let p = &mut self.players[ix];
            p.vx += nx * dv;
            p.vy += ny * dv;
            p.facing = ny.atan2(nx);
        }
    }

    fn integrate(&mut self) {
        let cfg = &self.config;
        let dt = cfg.dt();
        let hw = cfg.half_width();
        let hh = cfg.half_height();

        for p in self.players.iter_mut() {
            p.x += p.vx * dt;
            p.y += p.vy * dt;
            p.vx *= cfg.friction;
            p.vy *= cfg.friction;
            p.x = p.x.clamp(-hw + cfg.player_radius, hw - cfg.player_radius);
            p.y = p.y.clamp(-hh + cfg.player_radius, hh - cfg.player_radius);
        }

        let b = &mut self.ball;
        let r = cfg.ball_radius;
        b.x += b.vx * dt;
        b.y += b.vy * dt;
        b.vx *= cfg.ball_friction;
        b.vy *= cfg.ball_friction;

        // The goal mouth is open on both short walls.
        if b.x.abs() > hw - r && b.y.abs() >= cfg.goal_half_width {
            b.x = b.x.clamp(-hw + r, hw - r);
            b.vx *= -cfg.wall_restitution;
        }
        if b.y.abs() > hh - r {
            b.y = b.y.clamp(-hh + r, hh - r);
            b.vy *= -cfg.wall_restitution;
        }
    }

    fn resolve_player_ball(&mut self) {
        let min_dist = self.config.player_radius + self.config.ball_radius;
        let push = self.config.player_ball_push;
        for (i, p) in self.players.iter().enumerate() {
            if let Some((nx, ny, overlap)) = contact(p.position(), self.ball.position(), min_dist)
            {
                self.ball
                    .nudge(nx * overlap, ny * overlap, nx * overlap * push, ny * overlap * push);
                self.possession = i + 1;
            }
        }
    }

    fn resolve_players(&mut self) {
        let min_dist = 2.0 * self.config.player_radius;
        let [a, b] = &mut self.players;
        if let Some((nx, ny, overlap)) = contact(a.position(), b.position(), min_dist) {
            let half = overlap * 0.5;
            let impulse = overlap * self.config.player_push;
            a.nudge(-nx * half, -ny * half, -nx * impulse, -ny * impulse);
            b.nudge(nx * half, ny * half, nx * impulse, ny * impulse);
        }
    }

    fn resolve_cones(&mut self) {
        let Self {
            config: cfg,
            ball,
            players,
            cones,
            rng,
            ..
        } = self;
        let dt = cfg.dt();
        let hw = cfg.half_width();
        let hh = cfg.half_height();
        let r = cfg.cone_radius;

        for cone in cones.iter_mut() {
            cone.x += cone.vx * dt;
            cone.y += cone.vy * dt;
            cone.vx *= cfg.cone_friction;
            cone.vy *= cfg.cone_friction;
            cone.angle += cone.angular_velocity;
            cone.angular_velocity *= cfg.cone_angular_damping;
            if cone.x.abs() > hw - r {
                cone.x = cone.x.clamp(-hw + r, hw - r);
                cone.vx *= -cfg.cone_restitution;
            }
            if cone.y.abs() > hh - r {
                cone.y = cone.y.clamp(-hh + r, hh - r);
                cone.vy *= -cfg.cone_restitution;
            }

            collide_with_cone(cfg, rng, cone, ball, cfg.ball_radius, cfg.cone_bounce_ball);
            for p in players.iter_mut() {
                collide_with_cone(cfg, rng, cone, p, cfg.player_radius, cfg.cone_bounce_player);
            }
        }
    }

    fn check_terminal(&self) -> Option<Winner> {
        let hw = self.config.half_width();
        let in_mouth = self.ball.y.abs() < self.config.goal_half_width;
        if self.ball.x < -hw && in_mouth {
            Some(Winner::Player2)
        } else if self.ball.x > hw && in_mouth {
            Some(Winner::Player1)
        } else if self.step_count >= self.config.max_steps {
            Some(Winner::Draw)
        } else {
            None
        }
    }

    /// Current observation; see [`SoccerConfig::obs_dim`] for its width.
    pub fn observation(&self) -> Vec<f32> {
        let hw = self.config.half_width();
        let hh = self.config.half_height();
        let mut obs = Vec::with_capacity(self.config.obs_dim());

        for p in self.players.iter() {
            obs.extend([p.x / hw, p.y / hh, p.vx, p.vy, p.facing.sin()]);
        }
        let b = &self.ball;
        obs.extend([b.x / hw, b.y / hh, b.vx, b.vy]);
        for c in self.cones.iter() {
            obs.extend([c.x / hw, c.y / hh, c.vx, c.vy]);
        }
        let mut possession = [0.0; 3];
        possession[self.possession] = 1.0;
        obs.extend(possession);
        obs.push(1.0 - self.step_count as f64 / self.config.max_steps as f64);

        obs.into_iter().map(|v| v as f32).collect()
    }
}

fn collide_with_cone(
    cfg: &SoccerConfig,
    rng: &fastrand::Rng,
    cone: &mut Cone,
    other: &mut impl Body,
    other_radius: f64,
    bounce: f64,
) {
    let min_dist = cfg.cone_radius + other_radius;
    if let Some((nx, ny, overlap)) = contact(cone.position(), other.position(), min_dist) {
        let push = overlap * cfg.cone_push;
        other.nudge(nx * overlap, ny * overlap, nx * push, ny * push);
        cone.vx -= nx * overlap * bounce;
        cone.vy -= ny * overlap * bounce;
        cone.angular_velocity += (rng.f64() - 0.5) * cfg.cone_spin;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: usize = 0;
    const RIGHT: usize = 4;
    const KICK: usize = 9;

    fn env() -> SoccerEnv {
        SoccerEnv::new(SoccerConfig::default())
    }

    #[test]
    fn test_observation_width() {
        let mut env = env();
        let obs = env.reset(7);
        assert_eq!(obs.len(), env.config().obs_dim());
        assert_eq!(obs.len(), 34);
        // possession one-hot: nobody
        assert_eq!(&obs[30..33], &[1.0, 0.0, 0.0]);
        assert_eq!(obs[33], 1.0);
    }

    #[test]
    fn test_draw_at_step_cap() {
        let mut env = SoccerEnv::new(SoccerConfig::default().max_steps(50));
        env.reset(3);
        let mut last = None;
        for t in 1..=50 {
            let r = env.step(IDLE, IDLE);
            assert_eq!(r.step_count, t);
            if t < 50 {
                assert!(!r.done);
                assert!(r.winner.is_none());
            }
            last = Some(r);
        }
        let last = last.unwrap();
        assert!(last.done);
        assert_eq!(last.winner, Some(Winner::Draw));

        // Frozen after the end.
        let again = env.step(RIGHT, RIGHT);
        assert_eq!(again.step_count, 50);
        assert_eq!(again.winner, Some(Winner::Draw));
    }

    #[test_log::test]
    fn test_goal_takes_priority_over_step_cap() {
        let mut env = SoccerEnv::new(SoccerConfig::default().max_steps(1));
        env.reset(0);
        let hw = env.config().half_width();
        {
            let b = env.ball_mut();
            b.x = hw - 0.05;
            b.y = 0.0;
            b.vx = 30.0;
        }
        let r = env.step(IDLE, IDLE);
        assert!(r.done);
        assert_eq!(r.winner, Some(Winner::Player1));
        assert_eq!(r.winner.unwrap().code(), 1);
    }

    #[test_log::test]
    fn test_left_goal() {
        let mut env = env();
        env.reset(0);
        let hw = env.config().half_width();
        {
            let b = env.ball_mut();
            b.x = -hw + 0.05;
            b.y = 2.0;
            b.vx = -30.0;
        }
        let r = env.step(IDLE, IDLE);
        assert_eq!(r.winner, Some(Winner::Player2));
        assert_eq!(r.winner.unwrap().seat(), Some(1));
    }

    #[test]
    fn test_ball_bounces_outside_goal_mouth() {
        let mut env = env();
        env.reset(0);
        let hw = env.config().half_width();
        {
            let b = env.ball_mut();
            b.x = hw - 1.3;
            b.y = 10.0;
            b.vx = 30.0;
        }
        let r = env.step(IDLE, IDLE);
        assert!(!r.done);
        assert!(env.ball().vx < 0.0);
        assert!(env.ball().x <= hw - env.config().ball_radius);
    }

    #[test]
    fn test_far_kick_changes_nothing() {
        let mut env = env();
        env.reset(0);
        let reach = env.config().kick_reach();
        env.players_mut()[0].x = -reach - 0.5;
        env.players_mut()[0].y = 0.0;
        {
            let b = env.ball_mut();
            b.x = 0.0;
            b.y = 0.0;
            b.vx = 0.0;
            b.vy = 0.0;
        }

        assert!(!env.try_kick(0));
        assert_eq!(env.possession(), 0);

        env.step(KICK, IDLE);
        assert_eq!(env.ball().vx, 0.0);
        assert_eq!(env.ball().vy, 0.0);
        assert_eq!(env.possession(), 0);
    }

    #[test]
    fn test_near_kick_claims_possession() {
        let mut env = env();
        env.reset(0);
        let reach = env.config().kick_reach();
        let impulse = env.config().kick_impulse;
        env.players_mut()[0].x = -(reach - 0.1);
        env.players_mut()[1].x = reach - 0.1;
        env.players_mut()[1].y = 0.0;

        assert!(env.try_kick(0));
        assert_eq!(env.possession(), 1);
        assert!(env.ball().vx > 0.0);

        // Prior possession does not matter.
        assert!(env.try_kick(1));
        assert_eq!(env.possession(), 2);
        assert!((env.ball().vx + impulse).abs() < 1e-9);
        assert_eq!(env.ball().vy, 0.0);
    }

    #[test]
    fn test_directional_action_sets_facing() {
        let mut env = env();
        env.reset(0);
        env.step(RIGHT, 1);
        assert_eq!(env.players()[0].facing, 0.0);
        assert!(env.players()[0].vx > 0.0);
        assert!((env.players()[1].facing + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_action_is_idle() {
        let mut a = env();
        let mut b = env();
        a.reset(1);
        b.reset(1);
        let ra = a.step(42, 1000);
        let rb = b.step(IDLE, IDLE);
        assert_eq!(ra.observation, rb.observation);
    }

    #[test]
    fn test_deterministic_episodes() {
        let run = |seed: u64| {
            let mut env = env();
            env.reset(seed);
            // Drive both players into the corner cones so the spin is exercised.
            let mut out = vec![];
            for t in 0..600 {
                let a1 = if t % 3 == 0 { 5 } else { 3 };
                let a2 = if t % 2 == 0 { 8 } else { 4 };
                let r = env.step(a1, a2);
                out.push(r.observation);
                if r.done {
                    break;
                }
            }
            let spins: Vec<f64> = env.cones().iter().map(|c| c.angle).collect();
            (out, spins)
        };

        assert_eq!(run(11), run(11));
    }

    #[test]
    fn test_random_episode_ends_with_one_result() {
        let max_steps = 300;
        let mut env = SoccerEnv::new(SoccerConfig::default().max_steps(max_steps));
        let n_actions = env.config().n_actions();
        let mut rng = fastrand::Rng::with_seed(5);
        env.reset(5);

        let mut last = None;
        for _ in 0..max_steps {
            let r = env.step(rng.usize(..n_actions), rng.usize(..n_actions));
            assert_eq!(r.done, r.winner.is_some());
            if r.done {
                last = Some(r);
                break;
            }
        }

        let last = last.expect("episode did not end within max_steps");
        assert!(last.step_count <= max_steps);
        let winner = last.winner.unwrap();
        assert_eq!(env.winner(), Some(winner));

        // Terminal state is frozen.
        let again = env.step(KICK, RIGHT);
        assert_eq!(again.winner, Some(winner));
        assert_eq!(again.step_count, last.step_count);
        assert_eq!(again.observation, last.observation);
    }
}
