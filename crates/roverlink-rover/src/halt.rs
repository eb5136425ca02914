//! Force-stop path usable while the foreground is blocked on a reply.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use roverlink_frame::FrameWriter;
use tracing::warn;

use crate::commands::{Command, DriveDirection};
use crate::error::Result;

/// Writer half shared between the engine and its halt handles.
pub(crate) type SharedWriter<W> = Arc<Mutex<FrameWriter<W>>>;

pub(crate) fn lock_writer<W>(writer: &SharedWriter<W>) -> MutexGuard<'_, FrameWriter<W>> {
    writer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// What a force-stop sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Raw motors off.
    #[default]
    Halt,
    /// Back away: drive at `speed`, heading 0, reverse.
    Reverse { speed: u8 },
}

impl CollisionPolicy {
    /// Back-off speed used by the stock bump-switch handler.
    pub const BACKOFF_SPEED: u8 = 64;

    pub fn command(self) -> Command {
        match self {
            Self::Halt => Command::HALT,
            Self::Reverse { speed } => Command::Drive {
                speed,
                heading: 0,
                direction: DriveDirection::Reverse,
            },
        }
    }
}

/// Cloneable handle that stops the rover from any thread.
///
/// [`HaltHandle::force_stop`] raises the shared collision flag and writes
/// the stop frame straight to the channel. It only waits for a frame write
/// in progress to finish; a thread blocked reading a reply is unaffected.
pub struct HaltHandle<W> {
    writer: SharedWriter<W>,
    collision: Arc<AtomicBool>,
    policy: CollisionPolicy,
}

impl<W> Clone for HaltHandle<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            collision: Arc::clone(&self.collision),
            policy: self.policy,
        }
    }
}

impl<W: Write> HaltHandle<W> {
    pub(crate) fn new(
        writer: SharedWriter<W>,
        collision: Arc<AtomicBool>,
        policy: CollisionPolicy,
    ) -> Self {
        Self {
            writer,
            collision,
            policy,
        }
    }

    /// Flag a collision and send the policy's stop command.
    pub fn force_stop(&self) -> Result<()> {
        self.collision.store(true, Ordering::SeqCst);
        let command = self.policy.command();
        warn!(command = command.name(), "force stop");
        lock_writer(&self.writer).send(&command.packet())?;
        Ok(())
    }

    /// True until the engine's owner clears the flag.
    pub fn collision_pending(&self) -> bool {
        self.collision.load(Ordering::SeqCst)
    }

    pub fn policy(&self) -> CollisionPolicy {
        self.policy
    }
}

impl<W> std::fmt::Debug for HaltHandle<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaltHandle")
            .field("policy", &self.policy)
            .field("collision", &self.collision.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use roverlink_frame::FrameReader;

    use super::*;

    fn handle(policy: CollisionPolicy) -> (HaltHandle<Cursor<Vec<u8>>>, SharedWriter<Cursor<Vec<u8>>>) {
        let writer = Arc::new(Mutex::new(FrameWriter::new(Cursor::new(Vec::new()))));
        let handle = HaltHandle::new(Arc::clone(&writer), Arc::default(), policy);
        (handle, writer)
    }

    fn sent(writer: &SharedWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        lock_writer(writer).get_ref().get_ref().clone()
    }

    #[test]
    fn halt_policy_sends_zero_motors() {
        let (handle, writer) = handle(CollisionPolicy::default());
        assert!(!handle.collision_pending());

        handle.force_stop().unwrap();
        assert!(handle.clone().collision_pending());

        let mut reader = FrameReader::new(Cursor::new(sent(&writer)));
        assert_eq!(reader.read_packet().unwrap(), Command::HALT.packet());
    }

    #[test]
    fn reverse_policy_backs_away() {
        let (handle, writer) = handle(CollisionPolicy::Reverse {
            speed: CollisionPolicy::BACKOFF_SPEED,
        });
        handle.force_stop().unwrap();

        let mut reader = FrameReader::new(Cursor::new(sent(&writer)));
        let packet = reader.read_packet().unwrap();
        assert_eq!(packet.command_id(), 0x07);
        assert_eq!(packet.payload.as_ref(), &[64, 0x00, 0x00, 0x01]);
    }
}
