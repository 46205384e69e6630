//! Per-player action state machine with invincibility windows

/// Actions a player can initiate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Jump,
    Duck,
    Fire,
}

/// Visible state of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Idle,
    Jumping,
    Ducking,
    Damaged,
    /// Terminal
    Killed,
}

/// Timing of one animation state
#[derive(Debug, Clone, Copy)]
pub struct AnimationClip {
    /// Clip length in seconds at speed 1
    pub duration: f64,
    /// Speed of the animator state playing the clip
    pub state_speed: f64,
    /// Calibration added after scaling (usually negative)
    pub margin: f64,
}

impl AnimationClip {
    /// Seconds the state lasts under the given global animator speed
    pub fn window(&self, global_speed: f64) -> f64 {
        (self.duration / self.state_speed / global_speed + self.margin).max(0.0)
    }
}

pub const JUMP_CLIP: AnimationClip = AnimationClip {
    duration: 1.4,
    state_speed: 1.0,
    margin: -0.2,
};

pub const DUCK_CLIP: AnimationClip = AnimationClip {
    duration: 1.833,
    state_speed: 1.0,
    margin: -0.2,
};

pub const DAMAGED_CLIP: AnimationClip = AnimationClip {
    duration: 3.567,
    state_speed: 1.0,
    margin: -0.4,
};

/// Global animator speed multiplier
pub const ANIMATOR_SPEED: f64 = 1.5;

/// Invincibility windows, in seconds, for each timed state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionTimings {
    pub jump: f64,
    pub duck: f64,
    pub damaged: f64,
}

impl ActionTimings {
    pub fn new(animator_speed: f64) -> Self {
        Self {
            jump: JUMP_CLIP.window(animator_speed),
            duck: DUCK_CLIP.window(animator_speed),
            damaged: DAMAGED_CLIP.window(animator_speed),
        }
    }
}

impl Default for ActionTimings {
    fn default() -> Self {
        Self::new(ANIMATOR_SPEED)
    }
}

/// Why an action was refused
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ActionRejected {
    #[error("Player is invincible until t={until:.3}")]
    Invincible { until: f64 },

    #[error("Player has been killed")]
    Killed,
}

/// Action and invincibility state of one player
#[derive(Debug, Clone)]
pub struct ActionStateMachine {
    state: ActionState,
    invincible_until: Option<f64>,
    has_killed: bool,
}

impl ActionStateMachine {
    pub fn new() -> Self {
        Self {
            state: ActionState::Idle,
            invincible_until: None,
            has_killed: false,
        }
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn invincible_until(&self) -> Option<f64> {
        self.invincible_until
    }

    pub fn has_killed(&self) -> bool {
        self.has_killed
    }

    pub fn is_invincible(&self, now: f64) -> bool {
        self.invincible_until.is_some_and(|until| now < until)
    }

    /// Whether a new action may start now
    pub fn check(&self, now: f64) -> Result<(), ActionRejected> {
        if self.has_killed {
            return Err(ActionRejected::Killed);
        }
        match self.invincible_until {
            Some(until) if now < until => Err(ActionRejected::Invincible { until }),
            _ => Ok(()),
        }
    }

    /// Start an action initiated by the local owner
    pub fn try_begin(
        &mut self,
        action: Action,
        now: f64,
        timings: &ActionTimings,
    ) -> Result<(), ActionRejected> {
        self.check(now)?;
        self.enter(action, now, timings);
        Ok(())
    }

    /// Mirror an action the owner already decided on
    pub fn enter(&mut self, action: Action, now: f64, timings: &ActionTimings) {
        if self.has_killed {
            return;
        }
        match action {
            Action::Jump => self.start_timed(ActionState::Jumping, now, timings.jump),
            Action::Duck => self.start_timed(ActionState::Ducking, now, timings.duck),
            Action::Fire => {}
        }
    }

    /// Enter Damaged; returns false and changes nothing while invincible or killed
    pub fn take_damage(&mut self, now: f64, timings: &ActionTimings) -> bool {
        if self.check(now).is_err() {
            return false;
        }
        self.start_timed(ActionState::Damaged, now, timings.damaged);
        true
    }

    /// Enter the terminal state
    pub fn kill(&mut self) {
        self.state = ActionState::Killed;
        self.invincible_until = None;
        self.has_killed = true;
    }

    /// Return to Idle once a timed state has run out
    pub fn tick(&mut self, now: f64) {
        if let Some(until) = self.invincible_until {
            if now >= until && !self.has_killed {
                self.state = ActionState::Idle;
                self.invincible_until = None;
            }
        }
    }

    fn start_timed(&mut self, state: ActionState, now: f64, window: f64) {
        self.state = state;
        self.invincible_until = Some(now + window);
    }
}

impl Default for ActionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
