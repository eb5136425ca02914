//! Command templates.
//!
//! Each command is a fixed header (flags, target, optional source, device,
//! command id, sequence) plus caller parameters. The checksum is computed
//! when the packet is written.

use bytes::{BufMut, BytesMut};
use roverlink_frame::command::{device, drive, io, node, power, sensor, system_info};
use roverlink_frame::{Flags, Header, Packet};

/// Fire-and-forget activity (target bit added by the header builder).
const ACTIVITY: u8 = Flags::IS_ACTIVITY;

/// Activity that asks for a reply.
const ACTIVITY_WITH_REPLY: u8 = Flags::IS_ACTIVITY | Flags::RESPONSE_REQUESTED;

/// Activity that asks for a reply and for error reports.
const ACTIVITY_WITH_ERRORS: u8 =
    Flags::IS_ACTIVITY | Flags::RESPONSE_REQUESTED | Flags::RESPONSE_REQUESTED_IF_ERROR;

/// Sequence number the controller expects on power-off.
const POWER_OFF_SEQUENCE: u8 = 0x88;

/// Streaming slot configuration: token 0x01, locator service 0x0006, 32-bit fields.
const LOCATOR_STREAM_CONFIG: [u8; 4] = [0x01, 0x00, 0x06, 0x02];

/// Locator flag bits for [`Command::SetLocatorFlags`].
pub mod locator_flags {
    pub const NONE: u8 = 0x00;
    pub const AUTO_CALIBRATE: u8 = 0x01;
}

/// LED bitmasks. Each light is three consecutive bits (red, green, blue).
pub mod led_mask {
    pub const RIGHT_HEADLIGHT: u32 = 0x0000_0007;
    pub const LEFT_HEADLIGHT: u32 = 0x0000_0038;
    pub const LEFT_BRAKELIGHT: u32 = 0x0700_0000;
    pub const RIGHT_BRAKELIGHT: u32 = 0x3800_0000;
    pub const ALL: u32 = 0x3FFF_FFFF;
}

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const OFF: Self = Self::new(0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    fn channel(self, index: u32) -> u8 {
        match index % 3 {
            0 => self.red,
            1 => self.green,
            _ => self.blue,
        }
    }
}

/// A named set of lights, sent as one frame per light group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedGroup {
    All,
    Left,
    Right,
    LeftHeadlight,
    RightHeadlight,
    LeftBrakelight,
    RightBrakelight,
}

impl LedGroup {
    /// Masks sent for this group, in order.
    pub fn masks(self) -> &'static [u32] {
        match self {
            Self::All => &[led_mask::ALL],
            Self::Left => &[led_mask::LEFT_HEADLIGHT, led_mask::LEFT_BRAKELIGHT],
            Self::Right => &[led_mask::RIGHT_HEADLIGHT, led_mask::RIGHT_BRAKELIGHT],
            Self::LeftHeadlight => &[led_mask::LEFT_HEADLIGHT],
            Self::RightHeadlight => &[led_mask::RIGHT_HEADLIGHT],
            Self::LeftBrakelight => &[led_mask::LEFT_BRAKELIGHT],
            Self::RightBrakelight => &[led_mask::RIGHT_BRAKELIGHT],
        }
    }
}

/// Raw motor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotorMode {
    #[default]
    Off = 0,
    Forward = 1,
    Reverse = 2,
}

impl From<u8> for MotorMode {
    /// Unknown modes are coerced to `Off`.
    fn from(mode: u8) -> Self {
        match mode {
            1 => Self::Forward,
            2 => Self::Reverse,
            _ => Self::Off,
        }
    }
}

/// Direction flags for drive-with-heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriveDirection {
    #[default]
    Forward = 0x00,
    Reverse = 0x01,
}

/// A command the controller understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    PowerOff { delay_secs: u8 },
    Wake,
    Sleep,
    BatteryPercentage,
    BluetoothName,
    SetLeds { mask: u32, color: Rgb },
    RawMotors {
        left_mode: MotorMode,
        left_speed: u8,
        right_mode: MotorMode,
        right_speed: u8,
    },
    Drive {
        speed: u8,
        heading: u16,
        direction: DriveDirection,
    },
    ResetYaw,
    ResetLocator,
    SetLocatorFlags { flags: u8 },
    ConfigureStream,
    StartStream { period_ms: u16 },
    StopStream,
    ClearStream,
}

impl Command {
    /// Raw motors all off.
    pub const HALT: Self = Self::RawMotors {
        left_mode: MotorMode::Off,
        left_speed: 0,
        right_mode: MotorMode::Off,
        right_speed: 0,
    };

    /// Build the packet for this command.
    pub fn packet(&self) -> Packet {
        match *self {
            Self::PowerOff { delay_secs } => Packet::new(
                Header::new(ACTIVITY_WITH_REPLY, device::POWER, power::POWER_OFF)
                    .with_target(node::NORDIC)
                    .with_sequence(POWER_OFF_SEQUENCE),
                vec![delay_secs],
            ),
            Self::Wake => Packet::empty(nordic_alt(device::POWER, power::WAKE)),
            Self::Sleep => Packet::empty(nordic_alt(device::POWER, power::SLEEP)),
            Self::BatteryPercentage => Packet::empty(
                Header::new(ACTIVITY_WITH_REPLY, device::POWER, power::BATTERY_PERCENTAGE)
                    .with_target(node::NORDIC),
            ),
            Self::BluetoothName => Packet::empty(
                Header::new(
                    ACTIVITY_WITH_REPLY,
                    device::SYSTEM_INFO,
                    system_info::BLUETOOTH_NAME,
                )
                .with_target(node::ST),
            ),
            Self::SetLeds { mask, color } => {
                let count = mask.count_ones();
                let mut payload = BytesMut::with_capacity(4 + count as usize);
                payload.put_u32(mask);
                for i in 0..count {
                    payload.put_u8(color.channel(i));
                }
                Packet::new(nordic_alt(device::IO, io::SET_LEDS), payload.freeze())
            }
            Self::RawMotors {
                left_mode,
                left_speed,
                right_mode,
                right_speed,
            } => Packet::new(
                st_alt(device::DRIVE, drive::RAW_MOTORS),
                vec![left_mode as u8, left_speed, right_mode as u8, right_speed],
            ),
            Self::Drive {
                speed,
                heading,
                direction,
            } => {
                let [msb, lsb] = heading.to_be_bytes();
                Packet::new(
                    st_alt(device::DRIVE, drive::DRIVE_WITH_HEADING),
                    vec![speed, msb, lsb, direction as u8],
                )
            }
            Self::ResetYaw => Packet::empty(st(device::DRIVE, drive::RESET_YAW)),
            Self::ResetLocator => Packet::empty(st(device::SENSOR, sensor::RESET_LOCATOR)),
            Self::SetLocatorFlags { flags } => Packet::new(
                st(device::SENSOR, sensor::SET_LOCATOR_FLAGS),
                vec![flags],
            ),
            Self::ConfigureStream => Packet::new(
                st(device::SENSOR, sensor::CONFIGURE_STREAMING),
                LOCATOR_STREAM_CONFIG.to_vec(),
            ),
            Self::StartStream { period_ms } => Packet::new(
                st(device::SENSOR, sensor::START_STREAMING),
                period_ms.to_be_bytes().to_vec(),
            ),
            Self::StopStream => Packet::empty(st(device::SENSOR, sensor::STOP_STREAMING)),
            Self::ClearStream => Packet::empty(st(device::SENSOR, sensor::CLEAR_STREAMING)),
        }
    }

    /// Command id of the reply the caller waits for, if any.
    pub fn reply_command_id(&self) -> Option<u8> {
        match self {
            Self::BatteryPercentage => Some(power::BATTERY_PERCENTAGE),
            Self::BluetoothName => Some(system_info::BLUETOOTH_NAME),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PowerOff { .. } => "power_off",
            Self::Wake => "wake",
            Self::Sleep => "sleep",
            Self::BatteryPercentage => "battery_percentage",
            Self::BluetoothName => "bluetooth_name",
            Self::SetLeds { .. } => "set_leds",
            Self::RawMotors { .. } => "raw_motors",
            Self::Drive { .. } => "drive",
            Self::ResetYaw => "reset_yaw",
            Self::ResetLocator => "reset_locator",
            Self::SetLocatorFlags { .. } => "set_locator_flags",
            Self::ConfigureStream => "configure_stream",
            Self::StartStream { .. } => "start_stream",
            Self::StopStream => "stop_stream",
            Self::ClearStream => "clear_stream",
        }
    }
}

/// ST processor, no source.
fn st(device_id: u8, command_id: u8) -> Header {
    Header::new(ACTIVITY, device_id, command_id).with_target(node::ST)
}

/// ST processor on the secondary port, from the host.
fn st_alt(device_id: u8, command_id: u8) -> Header {
    Header::new(ACTIVITY_WITH_ERRORS, device_id, command_id)
        .with_target(node::ST_ALT)
        .with_source(node::HOST)
}

/// Nordic processor on the secondary port, from the host.
fn nordic_alt(device_id: u8, command_id: u8) -> Header {
    Header::new(ACTIVITY_WITH_ERRORS, device_id, command_id)
        .with_target(node::NORDIC_ALT)
        .with_source(node::HOST)
}
