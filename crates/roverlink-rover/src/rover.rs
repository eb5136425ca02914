use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use roverlink_frame::command::{power, sensor, system_info};
use roverlink_frame::{command_name, FrameError, FrameReader, FrameWriter, Packet};
use tracing::{debug, trace};

use crate::commands::{Command, DriveDirection, LedGroup, MotorMode, Rgb};
use crate::config::{RoverConfig, DEFAULT_NAME};
use crate::error::{Result, RoverError};
use crate::halt::{lock_writer, HaltHandle, SharedWriter};
use crate::position::{LocatorSample, Pose, PositionState, SharedPosition};
use crate::stream::{StreamSession, StreamState};

/// Something the controller sent that nobody was waiting for.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A locator notification, already applied to the position state.
    Position(Pose),
    /// Any other frame.
    Frame(Packet),
}

struct Link<R, W> {
    reader: FrameReader<R>,
    writer: SharedWriter<W>,
}

/// Rover control engine.
///
/// Owns the reader half of the link, the shared writer half, the position
/// state and the streaming session. Every blocking call consumes whatever
/// the controller sends in the meantime, so position notifications keep
/// the position state current.
pub struct Rover<R, W> {
    link: Option<Link<R, W>>,
    config: RoverConfig,
    position: SharedPosition,
    stream: StreamSession,
    collision: Arc<AtomicBool>,
    name: String,
}

impl<R: Read, W: Write> Rover<R, W> {
    /// Engine with no link. Every command fails with [`RoverError::NotReady`]
    /// until [`Rover::attach`] is called.
    pub fn detached(config: RoverConfig) -> Self {
        Self {
            link: None,
            position: SharedPosition::new(PositionState::new(config.locator_range)),
            config,
            stream: StreamSession::default(),
            collision: Arc::default(),
            name: DEFAULT_NAME.to_string(),
        }
    }

    /// Engine attached to `reader`/`writer` with default configuration.
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, RoverConfig::default())
    }

    /// Engine attached to `reader`/`writer` with explicit configuration.
    pub fn with_config(reader: R, writer: W, config: RoverConfig) -> Self {
        let mut rover = Self::detached(config);
        rover.attach(reader, writer);
        rover
    }

    /// Attach a link, resetting position, streaming session and cached name.
    pub fn attach(&mut self, reader: R, writer: W) {
        let frame = self.config.frame.clone();
        self.link = Some(Link {
            reader: FrameReader::with_config(reader, frame.clone()),
            writer: Arc::new(Mutex::new(FrameWriter::with_config(writer, frame))),
        });
        self.position.with(PositionState::reset);
        self.stream = StreamSession::default();
        self.collision.store(false, Ordering::SeqCst);
        self.name = DEFAULT_NAME.to_string();
        debug!("rover link attached");
    }

    /// Drop the link. Halt handles keep their writer until they are dropped.
    pub fn detach(&mut self) -> bool {
        self.link.take().is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.link.is_some()
    }

    pub fn config(&self) -> &RoverConfig {
        &self.config
    }

    // --- sending ---

    /// Send a command without waiting for anything.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        let link = self.link.as_ref().ok_or(RoverError::NotReady)?;
        debug!(command = command.name(), "sending command");
        lock_writer(&link.writer).send(&command.packet())?;
        Ok(())
    }

    /// Send a command and wait for the frame whose command id is `reply_command_id`.
    pub fn request(&mut self, command: &Command, reply_command_id: u8) -> Result<Packet> {
        self.send(command)?;
        self.await_reply(reply_command_id)
    }

    /// Consume frames until one with `command_id` arrives.
    ///
    /// Other frames are dropped after locator notifications among them have
    /// been applied. Corrupt frames are skipped. Without a reply timeout this
    /// waits for as long as the channel stays open.
    pub fn await_reply(&mut self, command_id: u8) -> Result<Packet> {
        let deadline = self
            .config
            .reply_timeout
            .map(|timeout| (Instant::now() + timeout, timeout));

        loop {
            if let Some((deadline, timeout)) = deadline {
                if Instant::now() >= deadline {
                    return Err(RoverError::Timeout(timeout));
                }
            }

            let Some(packet) = self.next_packet()? else {
                continue;
            };
            if packet.command_id() == command_id {
                return Ok(packet);
            }
            self.observe(&packet);
        }
    }

    // --- power ---

    pub fn wake(&mut self) -> Result<()> {
        self.send(&Command::Wake)
    }

    pub fn sleep(&mut self) -> Result<()> {
        self.send(&Command::Sleep)
    }

    /// Power off after the configured delay.
    pub fn power_off(&mut self) -> Result<()> {
        self.power_off_after(self.config.power_off_delay_secs)
    }

    pub fn power_off_after(&mut self, delay_secs: u8) -> Result<()> {
        self.send(&Command::PowerOff { delay_secs })
    }

    /// Battery charge in percent.
    pub fn battery_percentage(&mut self) -> Result<u8> {
        let reply = self.request(&Command::BatteryPercentage, power::BATTERY_PERCENTAGE)?;
        reply.payload.first().copied().ok_or_else(|| {
            FrameError::Truncated {
                needed: 1,
                actual: 0,
            }
            .into()
        })
    }

    /// Query the Bluetooth advertising name and cache it.
    ///
    /// The name starts after the first payload byte and ends at the first
    /// NUL or the end of the payload.
    pub fn bluetooth_name(&mut self) -> Result<String> {
        let reply = self.request(&Command::BluetoothName, system_info::BLUETOOTH_NAME)?;
        let raw = reply.payload.get(1..).unwrap_or_default();
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        self.name = String::from_utf8_lossy(&raw[..end]).into_owned();
        Ok(self.name.clone())
    }

    /// Last known device name (`RVR01` until queried).
    pub fn name(&self) -> &str {
        &self.name
    }

    // --- lights ---

    /// Set every light in `group`, one frame per light group.
    pub fn set_leds(&mut self, group: LedGroup, color: Rgb) -> Result<()> {
        for &mask in group.masks() {
            self.send(&Command::SetLeds { mask, color })?;
        }
        Ok(())
    }

    pub fn all_leds(&mut self, color: Rgb) -> Result<()> {
        self.set_leds(LedGroup::All, color)
    }

    pub fn all_leds_off(&mut self) -> Result<()> {
        self.all_leds(Rgb::OFF)
    }

    /// Left headlight, then left brake light.
    pub fn left_leds(&mut self, color: Rgb) -> Result<()> {
        self.set_leds(LedGroup::Left, color)
    }

    /// Right headlight, then right brake light.
    pub fn right_leds(&mut self, color: Rgb) -> Result<()> {
        self.set_leds(LedGroup::Right, color)
    }

    // --- motion ---

    /// Raw motor modes and speeds. The controller stops the motors after two
    /// seconds unless the command is renewed.
    pub fn raw_motors(
        &mut self,
        left_mode: MotorMode,
        left_speed: u8,
        right_mode: MotorMode,
        right_speed: u8,
    ) -> Result<()> {
        self.send(&Command::RawMotors {
            left_mode,
            left_speed,
            right_mode,
            right_speed,
        })
    }

    /// Drive at `speed` towards `heading` (degrees).
    pub fn drive(&mut self, speed: u8, heading: u16, direction: DriveDirection) -> Result<()> {
        self.send(&Command::Drive {
            speed,
            heading,
            direction,
        })
    }

    /// Turn in place to `heading`.
    pub fn face(&mut self, heading: u16) -> Result<()> {
        self.drive(0, heading, DriveDirection::Forward)
    }

    pub fn halt(&mut self) -> Result<()> {
        self.send(&Command::HALT)
    }

    // --- sensors ---

    pub fn reset_yaw(&mut self) -> Result<()> {
        self.send(&Command::ResetYaw)
    }

    /// Reset the locator origin to the current position.
    pub fn reset_locator(&mut self) -> Result<()> {
        self.send(&Command::ResetLocator)
    }

    pub fn set_locator_flags(&mut self, flags: u8) -> Result<()> {
        self.send(&Command::SetLocatorFlags { flags })
    }

    // --- streaming ---

    pub fn stream_state(&self) -> StreamState {
        self.stream.state()
    }

    /// Stop an active stream, clear the streaming slots and configure the
    /// locator slot.
    pub fn configure_stream(&mut self) -> Result<bool> {
        self.require_link()?;
        if self.stream.is_active() {
            self.stop_stream()?;
        }
        self.clear_stream()?;
        self.send(&Command::ConfigureStream)?;
        self.stream.configured();
        Ok(true)
    }

    /// Start locator notifications every `period_ms`. Configures first if
    /// needed. Returns `false` if a stream is already active.
    pub fn start_stream(&mut self, period_ms: u16) -> Result<bool> {
        self.require_link()?;
        if self.stream.is_active() {
            return Ok(false);
        }
        if !self.stream.is_configured() {
            self.configure_stream()?;
        }
        self.send(&Command::StartStream { period_ms })?;
        self.stream.started();
        Ok(true)
    }

    /// Returns `false` if no stream is active.
    pub fn stop_stream(&mut self) -> Result<bool> {
        self.require_link()?;
        if !self.stream.is_active() {
            return Ok(false);
        }
        self.send(&Command::StopStream)?;
        self.stream.stopped();
        Ok(true)
    }

    /// Clear streaming slots. Returns `false` while a stream is active.
    pub fn clear_stream(&mut self) -> Result<bool> {
        self.require_link()?;
        if self.stream.is_active() {
            return Ok(false);
        }
        self.send(&Command::ClearStream)?;
        Ok(true)
    }

    /// One-shot position read: stream briefly, skip the first (stale)
    /// notification, apply the second, stop.
    ///
    /// Returns `None` without sending anything if a stream is already active.
    pub fn read_position(&mut self) -> Result<Option<Pose>> {
        self.require_link()?;
        if self.stream.is_active() {
            return Ok(None);
        }

        self.start_stream(self.config.one_shot_period_ms)?;
        let outcome = self
            .await_reply(sensor::STREAMING_DATA)
            .and_then(|_| self.await_sample());
        let stopped = self.stop_stream();
        let sample = outcome?;
        stopped?;

        Ok(Some(self.position.apply(&sample)))
    }

    fn await_sample(&mut self) -> Result<LocatorSample> {
        loop {
            let packet = self.await_reply(sensor::STREAMING_DATA)?;
            match LocatorSample::parse(&packet.payload) {
                Some(sample) => return Ok(sample),
                None => debug!(len = packet.payload.len(), "short locator notification"),
            }
        }
    }

    // --- inbound ---

    /// Handle at most one inbound frame.
    ///
    /// Returns `None` when the channel's read timeout expired or a corrupt
    /// frame was dropped. On a channel without a read timeout this blocks
    /// until a frame arrives.
    pub fn poll(&mut self) -> Result<Option<Event>> {
        let Some(packet) = self.next_packet()? else {
            return Ok(None);
        };
        Ok(Some(match self.observe(&packet) {
            Some(pose) => Event::Position(pose),
            None => Event::Frame(packet),
        }))
    }

    /// Block until the next inbound frame.
    pub fn next_event(&mut self) -> Result<Event> {
        loop {
            if let Some(event) = self.poll()? {
                return Ok(event);
            }
        }
    }

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        let link = self.link.as_mut().ok_or(RoverError::NotReady)?;
        match link.reader.read_packet() {
            Ok(packet) => {
                trace!(
                    command = command_name(packet.device_id(), packet.command_id()),
                    len = packet.payload.len(),
                    "frame received"
                );
                Ok(Some(packet))
            }
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(None)
            }
            Err(FrameError::ConnectionClosed) => Err(RoverError::Disconnected(
                "channel closed while waiting for the controller".to_string(),
            )),
            Err(err) if err.is_corrupt_frame() => {
                debug!(error = %err, "discarding corrupt frame");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Apply a locator notification; other frames are ignored.
    fn observe(&mut self, packet: &Packet) -> Option<Pose> {
        if packet.command_id() != sensor::STREAMING_DATA {
            return None;
        }
        match LocatorSample::parse(&packet.payload) {
            Some(sample) => Some(self.position.apply(&sample)),
            None => {
                debug!(len = packet.payload.len(), "short locator notification");
                None
            }
        }
    }

    fn require_link(&self) -> Result<()> {
        if self.link.is_some() {
            Ok(())
        } else {
            Err(RoverError::NotReady)
        }
    }

    // --- force stop ---

    /// Handle for stopping the rover from another thread.
    pub fn halt_handle(&self) -> Result<HaltHandle<W>> {
        let link = self.link.as_ref().ok_or(RoverError::NotReady)?;
        Ok(HaltHandle::new(
            Arc::clone(&link.writer),
            Arc::clone(&self.collision),
            self.config.collision_policy,
        ))
    }

    /// True after a force-stop until [`Rover::take_collision`] clears it.
    pub fn collision_pending(&self) -> bool {
        self.collision.load(Ordering::SeqCst)
    }

    /// Clear the collision flag, returning whether it was set.
    pub fn take_collision(&self) -> bool {
        self.collision.swap(false, Ordering::SeqCst)
    }

    // --- position ---

    pub fn position(&self) -> Pose {
        self.position.pose()
    }

    /// Handle for reading the position from other threads.
    pub fn shared_position(&self) -> SharedPosition {
        self.position.clone()
    }

    /// Rotation from the locator frame to the map frame, in radians.
    pub fn set_rotation(&mut self, theta: f64) {
        self.position.with(|state| state.transform_mut().set_angle(theta));
    }

    pub fn set_offset(&mut self, x: f64, y: f64) {
        self.position.with(|state| {
            let transform = state.transform_mut();
            transform.x_offset = x;
            transform.y_offset = y;
        });
    }

    /// Heading from an external heading sensor, in degrees.
    pub fn set_heading(&mut self, degrees: f64) {
        self.position.with(|state| state.set_heading(degrees));
    }

    pub fn set_north(&mut self, degrees: f64) {
        self.position.with(|state| state.set_north(degrees));
    }
}

impl<R, W> std::fmt::Debug for Rover<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rover")
            .field("attached", &self.link.is_some())
            .field("name", &self.name)
            .field("stream", &self.stream.state())
            .field("collision", &self.collision.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::time::Duration;

    use bytes::BytesMut;
    use roverlink_frame::{checksum, encode_frame, Header};
    use roverlink_transport::MockChannel;

    use super::*;

    fn mock_rover() -> (Rover<MockChannel, MockChannel>, MockChannel) {
        let mock = MockChannel::new();
        (Rover::new(mock.clone(), mock.clone()), mock)
    }

    fn frame(packet: &Packet) -> Vec<u8> {
        let mut wire = BytesMut::new();
        packet.encode(&mut wire);
        wire.to_vec()
    }

    fn reply(device_id: u8, command_id: u8, payload: &[u8]) -> Vec<u8> {
        frame(&Packet::new(
            Header::new(0x00, device_id, command_id)
                .with_target(0x01)
                .with_error_code(0x00),
            payload.to_vec(),
        ))
    }

    fn notification(x: u32, y: u32) -> Vec<u8> {
        let mut payload = vec![0x01];
        payload.extend_from_slice(&x.to_be_bytes());
        payload.extend_from_slice(&y.to_be_bytes());
        frame(&Packet::new(Header::new(0x00, 0x18, 0x3D), payload))
    }

    /// Command ids of every frame written so far.
    fn sent_commands(mock: &MockChannel) -> Vec<u8> {
        let mut reader = FrameReader::new(Cursor::new(mock.written()));
        let mut ids = Vec::new();
        while let Ok(packet) = reader.read_packet() {
            ids.push(packet.command_id());
        }
        ids
    }

    #[test]
    fn detached_engine_is_not_ready() {
        let mut rover = Rover::<MockChannel, MockChannel>::detached(RoverConfig::default());
        assert!(!rover.is_ready());
        assert!(matches!(rover.wake(), Err(RoverError::NotReady)));
        assert!(matches!(rover.start_stream(10), Err(RoverError::NotReady)));
        assert!(matches!(rover.halt_handle(), Err(RoverError::NotReady)));
    }

    #[test]
    fn attach_resets_state() {
        let mock = MockChannel::new();
        let mut rover = Rover::detached(RoverConfig::default());
        rover.set_heading(45.0);
        rover.attach(mock.clone(), mock.clone());

        assert!(rover.is_ready());
        assert_eq!(rover.name(), "RVR01");
        assert_eq!(rover.position(), Pose::default());
        assert_eq!(rover.stream_state(), StreamState::Unconfigured);

        assert!(rover.detach());
        assert!(!rover.detach());
    }

    #[test]
    fn wake_writes_controller_frame() {
        let (mut rover, mock) = mock_rover();
        rover.wake().unwrap();
        assert_eq!(
            mock.written(),
            vec![0x8D, 0x3E, 0x11, 0x01, 0x13, 0x0D, 0x00, 0x8F, 0xD8]
        );
    }

    #[test]
    fn power_off_uses_configured_delay() {
        let (mut rover, mock) = mock_rover();
        rover.power_off().unwrap();
        assert_eq!(
            mock.written(),
            vec![0x8D, 0x1A, 0x01, 0x13, 0x00, 0x88, 0x05, 0x44, 0xD8]
        );
    }

    #[test]
    fn battery_skips_notifications_and_corrupt_frames() {
        let (mut rover, mock) = mock_rover();
        mock.inject_read(&notification(0xC000_0000, 0x8000_0000));
        let mut corrupt = BytesMut::new();
        encode_frame(&[0x08, 0x13, 0x10, 0x00, 0x63, 0x00], &mut corrupt);
        mock.inject_read(&corrupt);
        mock.inject_read(&[0x00, 0x42]);
        mock.inject_read(&reply(0x13, 0x10, &[0x5A]));

        assert_eq!(rover.battery_percentage().unwrap(), 0x5A);
        assert_eq!(rover.position().x, 8_000.0);
        assert_eq!(sent_commands(&mock), vec![0x10]);
    }

    #[test]
    fn battery_reply_scenario_frame() {
        let (mut rover, mock) = mock_rover();
        let content = [0x08, 0x13, 0x10, 0x00, 0x5A];
        let mut body = content.to_vec();
        body.push(checksum(&content));
        let mut wire = BytesMut::new();
        encode_frame(&body, &mut wire);
        mock.inject_read(&wire);

        assert_eq!(rover.battery_percentage().unwrap(), 0x5A);
    }

    #[test]
    fn empty_battery_reply_is_truncated() {
        let (mut rover, mock) = mock_rover();
        mock.inject_read(&reply(0x13, 0x10, &[]));
        assert!(matches!(
            rover.battery_percentage(),
            Err(RoverError::Frame(FrameError::Truncated { .. }))
        ));
    }

    #[test]
    fn bluetooth_name_stops_at_nul() {
        let (mut rover, mock) = mock_rover();
        mock.inject_read(&reply(0x19, 0x05, b"\x00RVR-5A1\x00junk"));

        assert_eq!(rover.bluetooth_name().unwrap(), "RVR-5A1");
        assert_eq!(rover.name(), "RVR-5A1");
    }

    #[test]
    fn bluetooth_name_without_nul_runs_to_end() {
        let (mut rover, mock) = mock_rover();
        mock.inject_read(&reply(0x19, 0x05, b"\x01Rover"));
        assert_eq!(rover.bluetooth_name().unwrap(), "Rover");
    }

    #[test]
    fn disconnect_while_waiting() {
        let (mut rover, _mock) = mock_rover();
        assert!(matches!(
            rover.battery_percentage(),
            Err(RoverError::Disconnected(_))
        ));
    }

    #[test]
    fn bounded_wait_times_out() {
        let mock = MockChannel::new();
        let config = RoverConfig {
            reply_timeout: Some(Duration::from_millis(30)),
            ..RoverConfig::default()
        };
        let mut rover = Rover::with_config(Silent, mock, config);

        let started = Instant::now();
        let err = rover.battery_percentage().unwrap_err();
        assert!(matches!(err, RoverError::Timeout(t) if t == Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    /// A channel that never has data.
    struct Silent;

    impl Read for Silent {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(2));
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }

    #[test]
    fn light_pairs_send_two_frames() {
        let (mut rover, mock) = mock_rover();
        rover.left_leds(Rgb::new(255, 0, 0)).unwrap();
        rover.right_leds(Rgb::new(0, 0, 255)).unwrap();

        let mut reader = FrameReader::new(Cursor::new(mock.written()));
        let masks: Vec<Vec<u8>> = (0..4)
            .map(|_| reader.read_packet().unwrap().payload[..4].to_vec())
            .collect();
        assert_eq!(
            masks,
            vec![
                vec![0x00, 0x00, 0x00, 0x38],
                vec![0x07, 0x00, 0x00, 0x00],
                vec![0x00, 0x00, 0x00, 0x07],
                vec![0x38, 0x00, 0x00, 0x00],
            ]
        );
    }

    #[test]
    fn start_configures_first() {
        let (mut rover, mock) = mock_rover();
        assert!(rover.start_stream(100).unwrap());
        assert_eq!(rover.stream_state(), StreamState::Active);
        assert_eq!(sent_commands(&mock), vec![0x3C, 0x39, 0x3A]);

        mock.clear_written();
        assert!(!rover.start_stream(100).unwrap());
        assert!(mock.written().is_empty());
    }

    #[test]
    fn stop_twice_reports_failure() {
        let (mut rover, mock) = mock_rover();
        rover.start_stream(50).unwrap();
        mock.clear_written();

        assert!(rover.stop_stream().unwrap());
        assert!(!rover.stop_stream().unwrap());
        assert_eq!(rover.stream_state(), StreamState::Configured);
        assert_eq!(sent_commands(&mock), vec![0x3B]);
    }

    #[test]
    fn configure_while_active_stops_and_clears() {
        let (mut rover, mock) = mock_rover();
        rover.start_stream(50).unwrap();
        mock.clear_written();

        assert!(!rover.clear_stream().unwrap());
        assert!(rover.configure_stream().unwrap());
        assert_eq!(rover.stream_state(), StreamState::Configured);
        assert_eq!(sent_commands(&mock), vec![0x3B, 0x3C, 0x39]);
    }

    #[test]
    fn one_shot_read_uses_second_notification() {
        let (mut rover, mock) = mock_rover();
        rover.set_offset(5.0, -2.0);
        mock.inject_read(&notification(0x0000_0000, 0x0000_0000));
        mock.inject_read(&notification(0x8000_0000, 0x8000_0000));

        let pose = rover.read_position().unwrap().unwrap();
        assert_eq!((pose.x, pose.y), (5.0, -2.0));
        assert_eq!(rover.position(), pose);
        assert_eq!(rover.stream_state(), StreamState::Configured);

        let mut reader = FrameReader::new(Cursor::new(mock.written()));
        let ids: Vec<(u8, Vec<u8>)> = (0..4)
            .map(|_| {
                let packet = reader.read_packet().unwrap();
                (packet.command_id(), packet.payload.to_vec())
            })
            .collect();
        assert_eq!(ids[0].0, 0x3C);
        assert_eq!(ids[1].0, 0x39);
        assert_eq!(ids[2], (0x3A, vec![0x00, 0x05]));
        assert_eq!(ids[3].0, 0x3B);
    }

    #[test]
    fn one_shot_read_refused_while_streaming() {
        let (mut rover, mock) = mock_rover();
        rover.start_stream(50).unwrap();
        mock.clear_written();

        assert_eq!(rover.read_position().unwrap(), None);
        assert!(mock.written().is_empty());
    }

    #[test]
    fn one_shot_read_stops_stream_on_disconnect() {
        let (mut rover, mock) = mock_rover();
        mock.inject_read(&notification(1, 1));

        assert!(matches!(
            rover.read_position(),
            Err(RoverError::Disconnected(_))
        ));
        assert_eq!(rover.stream_state(), StreamState::Configured);
        assert_eq!(sent_commands(&mock).last(), Some(&0x3B));
    }

    #[test]
    fn poll_reports_events() {
        let (mut rover, mock) = mock_rover();
        mock.inject_read(&notification(0xC000_0000, 0x4000_0000));
        mock.inject_read(&reply(0x16, 0x07, &[]));

        match rover.poll().unwrap() {
            Some(Event::Position(pose)) => assert_eq!((pose.x, pose.y), (8_000.0, -8_000.0)),
            other => panic!("unexpected event: {other:?}"),
        }
        match rover.next_event().unwrap() {
            Event::Frame(packet) => assert_eq!(packet.command_id(), 0x07),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn rotation_applies_to_notifications() {
        let (mut rover, mock) = mock_rover();
        rover.set_rotation(std::f64::consts::FRAC_PI_2);
        mock.inject_read(&notification(0xC000_0000, 0x8000_0000));

        let Event::Position(pose) = rover.next_event().unwrap() else {
            panic!("expected a position event");
        };
        assert!(pose.x.abs() < 1e-9);
        assert!((pose.y + 8_000.0).abs() < 1e-9);
    }

    #[test]
    fn shared_position_tracks_engine() {
        let (mut rover, mock) = mock_rover();
        let shared = rover.shared_position();
        mock.inject_read(&notification(0xC000_0000, 0x8000_0000));
        rover.next_event().unwrap();
        assert_eq!(shared.pose().x, 8_000.0);
    }

    #[test]
    fn collision_flag_roundtrip() {
        let (rover, mock) = mock_rover();
        let handle = rover.halt_handle().unwrap();
        assert!(!rover.collision_pending());

        handle.force_stop().unwrap();
        assert!(rover.collision_pending());
        assert!(rover.take_collision());
        assert!(!rover.collision_pending());
        assert_eq!(sent_commands(&mock), vec![0x01]);
    }

    #[test]
    fn force_stop_while_blocked_in_dispatch() {
        let (host, controller) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut rover = Rover::new(host.try_clone().unwrap(), host);
        let handle = rover.halt_handle().unwrap();

        let dispatch = std::thread::spawn(move || {
            let percent = rover.battery_percentage();
            (percent.map_err(|e| e.to_string()), rover.take_collision())
        });

        let mut controller_reader = FrameReader::new(controller.try_clone().unwrap());
        let first = controller_reader.read_packet().unwrap();
        assert_eq!(first.command_id(), 0x10);

        handle.force_stop().unwrap();
        let second = controller_reader.read_packet().unwrap();
        assert_eq!(second, Command::HALT.packet());

        let mut controller_writer = FrameWriter::new(controller);
        controller_writer
            .send(&Packet::new(Header::new(0x08, 0x13, 0x10), vec![77]))
            .unwrap();

        let (percent, collided) = dispatch.join().unwrap();
        assert_eq!(percent.unwrap(), 77);
        assert!(collided);
    }
}
