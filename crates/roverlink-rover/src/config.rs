use std::time::Duration;

use roverlink_frame::FrameConfig;

use crate::halt::CollisionPolicy;
use crate::position::LocatorRange;

/// Poll interval used to check a reply deadline when the channel itself has no read timeout.
pub const DEADLINE_POLL: Duration = Duration::from_millis(50);

/// Streaming period for a one-shot position read, in milliseconds.
pub const ONE_SHOT_PERIOD_MS: u16 = 5;

/// Delay the controller waits before cutting power, in seconds.
pub const POWER_OFF_DELAY_SECS: u8 = 5;

/// Device name assumed until the controller has been queried.
pub const DEFAULT_NAME: &str = "RVR01";

/// Configuration for the rover engine.
#[derive(Debug, Clone)]
pub struct RoverConfig {
    /// Bound on waiting for a reply. `None` waits indefinitely.
    pub reply_timeout: Option<Duration>,
    /// Range of the locator's position fields.
    pub locator_range: LocatorRange,
    /// Streaming period used by one-shot position reads. Default: 5 ms.
    pub one_shot_period_ms: u16,
    /// Delay before the controller powers off. Default: 5 s.
    pub power_off_delay_secs: u8,
    /// What a force-stop sends.
    pub collision_policy: CollisionPolicy,
    /// Frame reader/writer settings.
    pub frame: FrameConfig,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            reply_timeout: None,
            locator_range: LocatorRange::default(),
            one_shot_period_ms: ONE_SHOT_PERIOD_MS,
            power_off_delay_secs: POWER_OFF_DELAY_SECS,
            collision_policy: CollisionPolicy::default(),
            frame: FrameConfig::default(),
        }
    }
}

impl RoverConfig {
    /// Read timeout to apply to the channel.
    ///
    /// An explicit frame read timeout wins. Otherwise a bounded reply wait
    /// needs the channel to wake up periodically to check its deadline.
    pub fn channel_read_timeout(&self) -> Option<Duration> {
        self.frame
            .read_timeout
            .or_else(|| self.reply_timeout.map(|t| t.min(DEADLINE_POLL)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_controller() {
        let cfg = RoverConfig::default();
        assert!(cfg.reply_timeout.is_none());
        assert_eq!(cfg.one_shot_period_ms, 5);
        assert_eq!(cfg.power_off_delay_secs, 5);
        assert_eq!(cfg.collision_policy, CollisionPolicy::Halt);
        assert!(cfg.channel_read_timeout().is_none());
    }

    #[test]
    fn bounded_wait_implies_poll_interval() {
        let cfg = RoverConfig {
            reply_timeout: Some(Duration::from_secs(2)),
            ..RoverConfig::default()
        };
        assert_eq!(cfg.channel_read_timeout(), Some(DEADLINE_POLL));

        let short = RoverConfig {
            reply_timeout: Some(Duration::from_millis(10)),
            ..RoverConfig::default()
        };
        assert_eq!(short.channel_read_timeout(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn explicit_frame_timeout_wins() {
        let mut cfg = RoverConfig {
            reply_timeout: Some(Duration::from_secs(2)),
            ..RoverConfig::default()
        };
        cfg.frame.read_timeout = Some(Duration::from_millis(300));
        assert_eq!(cfg.channel_read_timeout(), Some(Duration::from_millis(300)));
    }
}
