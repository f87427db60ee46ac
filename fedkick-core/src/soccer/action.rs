/// Discrete actions of a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Do nothing.
    Idle,
    /// Accelerate towards negative y.
    Up,
    /// Accelerate towards positive y.
    Down,
    /// Accelerate towards negative x.
    Left,
    /// Accelerate towards positive x.
    Right,
    /// Diagonal.
    UpLeft,
    /// Diagonal.
    UpRight,
    /// Diagonal.
    DownLeft,
    /// Diagonal.
    DownRight,
    /// Try to kick the ball.
    Kick,
}

impl Action {
    /// Number of actions.
    pub const COUNT: usize = 10;

    /// Maps an action index to an action; out-of-range indices are [`Action::Idle`].
    pub fn from_index(ix: usize) -> Self {
        match ix {
            1 => Self::Up,
            2 => Self::Down,
            3 => Self::Left,
            4 => Self::Right,
            5 => Self::UpLeft,
            6 => Self::UpRight,
            7 => Self::DownLeft,
            8 => Self::DownRight,
            9 => Self::Kick,
            _ => Self::Idle,
        }
    }

    /// Unnormalized thrust direction, `(0, 0)` for idle and kick.
    pub fn direction(&self) -> (f64, f64) {
        match self {
            Self::Up => (0.0, -1.0),
            Self::Down => (0.0, 1.0),
            Self::Left => (-1.0, 0.0),
            Self::Right => (1.0, 0.0),
            Self::UpLeft => (-1.0, -1.0),
            Self::UpRight => (1.0, -1.0),
            Self::DownLeft => (-1.0, 1.0),
            Self::DownRight => (1.0, 1.0),
            Self::Idle | Self::Kick => (0.0, 0.0),
        }
    }
}
