//! Rover control engine.
//!
//! This is the layer applications use. [`Rover`] builds commands, sends them,
//! correlates replies by command id and keeps the rover's position current
//! from locator notifications. A [`HaltHandle`] can stop the motors from
//! another thread while the engine is blocked waiting for a reply.

pub mod commands;
pub mod config;
pub mod error;
pub mod halt;
pub mod open;
pub mod position;
pub mod rover;
pub mod stream;

pub use commands::{led_mask, locator_flags, Command, DriveDirection, LedGroup, MotorMode, Rgb};
pub use config::{RoverConfig, DEADLINE_POLL, DEFAULT_NAME, ONE_SHOT_PERIOD_MS};
pub use error::{Result, RoverError};
pub use halt::{CollisionPolicy, HaltHandle};
pub use open::{attach_channel, open, open_with_debug, ChannelRover, DebugOutput, LinkHalf};
pub use position::{FrameTransform, LocatorRange, LocatorSample, Pose, PositionState, SharedPosition};
pub use rover::{Event, Rover};
pub use stream::{StreamSession, StreamState};
