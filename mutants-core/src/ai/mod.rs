//! Creature AI: wake checks, target tracking, the decision cascade and the
//! executor that turns decisions into world changes.
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod actions;
pub mod attack;
pub mod cascade;
pub mod dispatch;
pub mod emote;
pub mod pursuit;
pub mod tracking;
pub mod wake;

pub use actions::{ActionError, ActionOutcome, execute_random_action};
pub use attack::{AttackPlan, AttackWeights, select_attack};
pub use cascade::{Decision, DecisionSnapshot, GateDetail, GateTrace, evaluate_cascade};
pub use dispatch::{DispatchSummary, on_player_command, roll_credits, roll_entry_target};
pub use pursuit::{PursuitAttempt, attempt_pursuit};
pub use tracking::update_target_positions;
pub use wake::{WakeCheck, WakeEvent, should_wake, wake_events};

/// Cascade gates in evaluation order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gate {
    Flee,
    Pursue,
    Heal,
    Convert,
    Cast,
    Attack,
    Pickup,
    Emote,
    Idle,
}

impl Gate {
    pub const ORDER: [Self; 9] = [
        Self::Flee,
        Self::Pursue,
        Self::Heal,
        Self::Convert,
        Self::Cast,
        Self::Attack,
        Self::Pickup,
        Self::Emote,
        Self::Idle,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flee => "FLEE",
            Self::Pursue => "PURSUE",
            Self::Heal => "HEAL",
            Self::Convert => "CONVERT",
            Self::Cast => "CAST",
            Self::Attack => "ATTACK",
            Self::Pickup => "PICKUP",
            Self::Emote => "EMOTE",
            Self::Idle => "IDLE",
        }
    }

    /// Action a triggered gate selects.
    #[must_use]
    pub const fn action(self) -> Action {
        match self {
            Self::Flee => Action::Flee,
            Self::Pursue => Action::Pursue,
            Self::Heal => Action::Heal,
            Self::Convert => Action::Convert,
            Self::Cast => Action::Cast,
            Self::Attack => Action::Attack,
            Self::Pickup => Action::Pickup,
            Self::Emote => Action::Emote,
            Self::Idle => Action::Idle,
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Flee,
    Pursue,
    Heal,
    Convert,
    Cast,
    Attack,
    Pickup,
    Emote,
    Idle,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Flee => "flee",
            Self::Pursue => "pursue",
            Self::Heal => "heal",
            Self::Convert => "convert",
            Self::Cast => "cast",
            Self::Attack => "attack",
            Self::Pickup => "pickup",
            Self::Emote => "emote",
            Self::Idle => "idle",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
