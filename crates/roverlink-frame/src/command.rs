//! Device, node and command identifiers understood by the rover controller.
//!
//! Commands are addressed by a (device id, command id) pair. Replies echo
//! the command id of the request they answer.

/// Device ids.
pub mod device {
    pub const POWER: u8 = 0x13;
    pub const DRIVE: u8 = 0x16;
    pub const SENSOR: u8 = 0x18;
    pub const SYSTEM_INFO: u8 = 0x19;
    pub const IO: u8 = 0x1A;
}

/// Processor node ids used as target/source.
pub mod node {
    /// The host on the other end of the serial line.
    pub const HOST: u8 = 0x01;
    /// Nordic processor, routed through the primary UART.
    pub const NORDIC: u8 = 0x01;
    /// ST processor (drive, sensors).
    pub const ST: u8 = 0x02;
    /// Nordic processor, addressed on the secondary port.
    pub const NORDIC_ALT: u8 = 0x11;
    /// ST processor, addressed on the secondary port.
    pub const ST_ALT: u8 = 0x12;
}

/// Power device (0x13).
pub mod power {
    pub const POWER_OFF: u8 = 0x00;
    pub const SLEEP: u8 = 0x01;
    pub const WAKE: u8 = 0x0D;
    pub const BATTERY_PERCENTAGE: u8 = 0x10;
}

/// Drive device (0x16).
pub mod drive {
    pub const RAW_MOTORS: u8 = 0x01;
    pub const RESET_YAW: u8 = 0x06;
    pub const DRIVE_WITH_HEADING: u8 = 0x07;
}

/// Sensor device (0x18).
pub mod sensor {
    pub const RESET_LOCATOR: u8 = 0x13;
    pub const SET_LOCATOR_FLAGS: u8 = 0x17;
    pub const CONFIGURE_STREAMING: u8 = 0x39;
    pub const START_STREAMING: u8 = 0x3A;
    pub const STOP_STREAMING: u8 = 0x3B;
    pub const CLEAR_STREAMING: u8 = 0x3C;
    /// Unsolicited streaming notification.
    pub const STREAMING_DATA: u8 = 0x3D;
}

/// System info device (0x19).
pub mod system_info {
    pub const BLUETOOTH_NAME: u8 = 0x05;
}

/// IO device (0x1A).
pub mod io {
    pub const SET_LEDS: u8 = 0x1A;
}

/// Returns a human-readable name for a device id.
pub fn device_name(id: u8) -> &'static str {
    match id {
        device::POWER => "power",
        device::DRIVE => "drive",
        device::SENSOR => "sensor",
        device::SYSTEM_INFO => "system_info",
        device::IO => "io",
        _ => "unknown",
    }
}

/// Returns a human-readable name for a (device id, command id) pair.
pub fn command_name(device_id: u8, command_id: u8) -> &'static str {
    match (device_id, command_id) {
        (device::POWER, power::POWER_OFF) => "power_off",
        (device::POWER, power::SLEEP) => "sleep",
        (device::POWER, power::WAKE) => "wake",
        (device::POWER, power::BATTERY_PERCENTAGE) => "battery_percentage",
        (device::DRIVE, drive::RAW_MOTORS) => "raw_motors",
        (device::DRIVE, drive::RESET_YAW) => "reset_yaw",
        (device::DRIVE, drive::DRIVE_WITH_HEADING) => "drive_with_heading",
        (device::SENSOR, sensor::RESET_LOCATOR) => "reset_locator",
        (device::SENSOR, sensor::SET_LOCATOR_FLAGS) => "set_locator_flags",
        (device::SENSOR, sensor::CONFIGURE_STREAMING) => "configure_streaming",
        (device::SENSOR, sensor::START_STREAMING) => "start_streaming",
        (device::SENSOR, sensor::STOP_STREAMING) => "stop_streaming",
        (device::SENSOR, sensor::CLEAR_STREAMING) => "clear_streaming",
        (device::SENSOR, sensor::STREAMING_DATA) => "streaming_data",
        (device::SYSTEM_INFO, system_info::BLUETOOTH_NAME) => "bluetooth_name",
        (device::IO, io::SET_LEDS) => "set_leds",
        _ => "unknown",
    }
}
