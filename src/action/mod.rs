//! Symbolic character actions
//!
//! An [`Action`] names a gesture or a bit of locomotion. Each action maps to
//! exactly one [`Routine`] of input [`Step`]s via [`Action::routine`], which
//! the [`ActionExecutor`] runs against the focused window.

mod executor;
mod primitives;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::seq::SliceRandom;

pub use executor::{ActionExecutor, ExecutorTimings};
pub use primitives::{hold_key, move_pointer_gradually};

use crate::Error;
use crate::input::PointerDirection;

/// Closed vocabulary of gestures and locomotion commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveForward,
    MoveBack,
    MoveLeft,
    MoveRight,
    ShakeHead,
    NodHead,
    NodHeadTwice,
    TurnAround,
    TurnLeft,
    TurnRight,
    TurnLeftUntilStopped,
    TurnRightUntilStopped,
    MoveForwardUntilStopped,
    MoveBackUntilStopped,
}

/// Actions the character may perform on its own while wandering
const WANDER_ACTIONS: [Action; 7] = [
    Action::TurnLeft,
    Action::TurnRight,
    Action::TurnAround,
    Action::NodHead,
    Action::ShakeHead,
    Action::MoveForward,
    Action::MoveBack,
];

impl Action {
    /// Every action, in declaration order
    pub const ALL: [Self; 14] = [
        Self::MoveForward,
        Self::MoveBack,
        Self::MoveLeft,
        Self::MoveRight,
        Self::ShakeHead,
        Self::NodHead,
        Self::NodHeadTwice,
        Self::TurnAround,
        Self::TurnLeft,
        Self::TurnRight,
        Self::TurnLeftUntilStopped,
        Self::TurnRightUntilStopped,
        Self::MoveForwardUntilStopped,
        Self::MoveBackUntilStopped,
    ];

    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MoveForward => "move_forward",
            Self::MoveBack => "move_back",
            Self::MoveLeft => "move_left",
            Self::MoveRight => "move_right",
            Self::ShakeHead => "shake_head",
            Self::NodHead => "nod_head",
            Self::NodHeadTwice => "nod_head_twice",
            Self::TurnAround => "turn_around",
            Self::TurnLeft => "turn_left",
            Self::TurnRight => "turn_right",
            Self::TurnLeftUntilStopped => "turn_left_until_stopped",
            Self::TurnRightUntilStopped => "turn_right_until_stopped",
            Self::MoveForwardUntilStopped => "move_forward_until_stopped",
            Self::MoveBackUntilStopped => "move_back_until_stopped",
        }
    }

    /// Whether the action repeats until stopped or focus is lost
    #[must_use]
    pub const fn is_continuous(self) -> bool {
        matches!(
            self,
            Self::TurnLeftUntilStopped
                | Self::TurnRightUntilStopped
                | Self::MoveForwardUntilStopped
                | Self::MoveBackUntilStopped
        )
    }

    /// Pick a random idle gesture
    #[must_use]
    pub fn random_wander() -> Self {
        WANDER_ACTIONS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(Self::NodHead)
    }

    /// The input routine this action performs
    #[must_use]
    pub fn routine(self, motion: &MotionProfile) -> Routine {
        let key = |key: char| Step::Key {
            key,
            hold: motion.key_hold,
        };
        let turn = |direction, distance| Step::Pointer {
            direction,
            distance,
            duration: motion.turn_duration,
        };

        match self {
            Self::MoveForward => Routine::Once(vec![key(motion.forward_key)]),
            Self::MoveBack => Routine::Once(vec![key(motion.back_key)]),
            Self::MoveLeft => Routine::Once(vec![key(motion.left_key)]),
            Self::MoveRight => Routine::Once(vec![key(motion.right_key)]),
            Self::ShakeHead => Routine::Once(motion.head_gesture(
                PointerDirection::Left,
                PointerDirection::Right,
            )),
            Self::NodHead => Routine::Once(motion.head_gesture(
                PointerDirection::Up,
                PointerDirection::Down,
            )),
            Self::NodHeadTwice => {
                let mut steps = motion.head_gesture(PointerDirection::Up, PointerDirection::Down);
                steps.extend(motion.head_gesture(PointerDirection::Up, PointerDirection::Down));
                Routine::Once(steps)
            }
            Self::TurnAround => Routine::Once(vec![turn(
                PointerDirection::Right,
                motion.turn_around_distance,
            )]),
            Self::TurnLeft => Routine::Once(vec![turn(PointerDirection::Left, motion.turn_distance)]),
            Self::TurnRight => {
                Routine::Once(vec![turn(PointerDirection::Right, motion.turn_distance)])
            }
            Self::TurnLeftUntilStopped => {
                Routine::UntilStopped(vec![turn(PointerDirection::Left, motion.turn_distance)])
            }
            Self::TurnRightUntilStopped => {
                Routine::UntilStopped(vec![turn(PointerDirection::Right, motion.turn_distance)])
            }
            Self::MoveForwardUntilStopped => Routine::UntilStopped(vec![key(motion.forward_key)]),
            Self::MoveBackUntilStopped => Routine::UntilStopped(vec![key(motion.back_key)]),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == normalized)
            .ok_or_else(|| Error::UnknownAction(s.to_string()))
    }
}

/// One primitive input operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Press a key, hold it, release it
    Key { key: char, hold: Duration },
    /// Move the pointer `distance` pixels over `duration`
    Pointer {
        direction: PointerDirection,
        distance: u32,
        duration: Duration,
    },
}

/// How an action's steps are run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routine {
    /// Run the steps once
    Once(Vec<Step>),
    /// Repeat the steps until stop is signaled or focus is lost
    UntilStopped(Vec<Step>),
}

/// Key bindings and motion timings for the target application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionProfile {
    pub forward_key: char,
    pub back_key: char,
    pub left_key: char,
    pub right_key: char,
    /// How long a movement key stays down
    pub key_hold: Duration,
    /// Pointer pixels for a single turn
    pub turn_distance: u32,
    /// Pointer pixels for turning around
    pub turn_around_distance: u32,
    pub turn_duration: Duration,
    /// Pointer pixels for one head gesture segment
    pub head_distance: u32,
    pub head_duration: Duration,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self {
            forward_key: 'w',
            back_key: 's',
            left_key: 'a',
            right_key: 'd',
            key_hold: Duration::from_millis(500),
            turn_distance: 500,
            turn_around_distance: 1000,
            turn_duration: Duration::from_millis(1000),
            head_distance: 100,
            head_duration: Duration::from_millis(250),
        }
    }
}

impl MotionProfile {
    /// Three chained segments `first`, `second` (double length), `first`,
    /// ending where the gesture started
    fn head_gesture(&self, first: PointerDirection, second: PointerDirection) -> Vec<Step> {
        let segment = |direction, factor: u32| Step::Pointer {
            direction,
            distance: self.head_distance * factor,
            duration: self.head_duration * factor,
        };
        vec![segment(first, 1), segment(second, 2), segment(first, 1)]
    }
}
