//! Locator notifications and the map-frame position they produce.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// Midpoint of the locator's unsigned 32-bit encoding.
const RAW_MIDPOINT: f64 = 2_147_483_648.0;

/// Length of a notification payload that carries both X and Y.
const XY_PAYLOAD_LEN: usize = 9;

/// Map a raw locator field to `[-1, 1)`.
pub fn normalize(raw: u32) -> f64 {
    (f64::from(raw) - RAW_MIDPOINT) / RAW_MIDPOINT
}

/// Physical range of the locator's position fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocatorRange {
    pub min: f64,
    pub max: f64,
}

impl Default for LocatorRange {
    fn default() -> Self {
        Self {
            min: -16_000.0,
            max: 16_000.0,
        }
    }
}

impl LocatorRange {
    /// Normalise `raw` and rescale it linearly onto `[min, max]`.
    pub fn rescale(&self, raw: u32) -> f64 {
        self.min + (normalize(raw) + 1.0) / 2.0 * (self.max - self.min)
    }
}

/// Rotation and translation from the rover's locator frame to the map frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameTransform {
    pub sin_theta: f64,
    pub cos_theta: f64,
    pub x_offset: f64,
    pub y_offset: f64,
}

impl Default for FrameTransform {
    fn default() -> Self {
        Self {
            sin_theta: 0.0,
            cos_theta: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
        }
    }
}

impl FrameTransform {
    /// Set the rotation from an angle in radians.
    pub fn set_angle(&mut self, theta: f64) {
        let (sin, cos) = theta.sin_cos();
        self.sin_theta = sin;
        self.cos_theta = cos;
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.cos_theta * x + self.sin_theta * y + self.x_offset,
            self.cos_theta * y - self.sin_theta * x + self.y_offset,
        )
    }
}

/// Raw fields of one locator notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatorSample {
    /// Streaming slot token.
    pub token: u8,
    pub x: u32,
    /// Present only when the payload is exactly 9 bytes.
    pub y: Option<u32>,
}

impl LocatorSample {
    /// Parse a notification payload: token, big-endian X, then big-endian Y if
    /// the payload is exactly 9 bytes. `None` if X is incomplete.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let token = *payload.first()?;
        let x = be_u32(payload.get(1..5)?)?;
        let y = if payload.len() == XY_PAYLOAD_LEN {
            be_u32(&payload[5..9])
        } else {
            None
        };
        Some(Self { token, x, y })
    }
}

fn be_u32(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.try_into().ok()?))
}

/// Snapshot of the rover's position and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Heading in degrees, supplied by an external heading sensor.
    pub heading: f64,
    /// Angle of north from the map's x axis, in degrees.
    pub north: f64,
}

/// Mutable position state owned by the engine.
#[derive(Debug, Clone, Default)]
pub struct PositionState {
    pose: Pose,
    transform: FrameTransform,
    range: LocatorRange,
}

impl PositionState {
    pub fn new(range: LocatorRange) -> Self {
        Self {
            range,
            ..Self::default()
        }
    }

    /// Rescale, rotate and translate a sample into the map frame. A missing Y reads as 0.
    pub fn apply(&mut self, sample: &LocatorSample) -> Pose {
        let x = self.range.rescale(sample.x);
        let y = sample.y.map_or(0.0, |raw| self.range.rescale(raw));
        let (x, y) = self.transform.apply(x, y);
        self.pose.x = x;
        self.pose.y = y;
        self.pose
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn transform(&self) -> &FrameTransform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut FrameTransform {
        &mut self.transform
    }

    pub fn range(&self) -> LocatorRange {
        self.range
    }

    pub fn set_heading(&mut self, degrees: f64) {
        self.pose.heading = degrees;
    }

    pub fn set_north(&mut self, degrees: f64) {
        self.pose.north = degrees;
    }

    /// Back to origin with an identity transform; the range is kept.
    pub fn reset(&mut self) {
        *self = Self::new(self.range);
    }
}

/// Thread-safe handle to the engine's position state.
#[derive(Debug, Clone, Default)]
pub struct SharedPosition(Arc<Mutex<PositionState>>);

impl SharedPosition {
    pub fn new(state: PositionState) -> Self {
        Self(Arc::new(Mutex::new(state)))
    }

    /// Latest pose.
    pub fn pose(&self) -> Pose {
        self.lock().pose()
    }

    /// Run `f` with exclusive access to the state.
    pub fn with<T>(&self, f: impl FnOnce(&mut PositionState) -> T) -> T {
        f(&mut self.lock())
    }

    pub(crate) fn apply(&self, sample: &LocatorSample) -> Pose {
        self.lock().apply(sample)
    }

    fn lock(&self) -> MutexGuard<'_, PositionState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(x: u32, y: Option<u32>) -> Vec<u8> {
        let mut bytes = vec![0x01];
        bytes.extend_from_slice(&x.to_be_bytes());
        if let Some(y) = y {
            bytes.extend_from_slice(&y.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn normalize_bounds() {
        assert_eq!(normalize(0x8000_0000), 0.0);
        assert_eq!(normalize(0), -1.0);
        assert!(normalize(u32::MAX) < 1.0);
    }

    #[test]
    fn midpoint_rescales_to_zero() {
        let range = LocatorRange::default();
        assert_eq!(range.rescale(0x8000_0000), 0.0);
        assert_eq!(range.rescale(0), -16_000.0);
        assert_eq!(range.rescale(0xC000_0000), 8_000.0);
    }

    #[test]
    fn identity_transform_keeps_rescaled_value() {
        let mut state = PositionState::default();
        let sample = LocatorSample::parse(&payload(0xC000_0000, Some(0x4000_0000))).unwrap();
        let pose = state.apply(&sample);
        assert_eq!(pose.x, 8_000.0);
        assert_eq!(pose.y, -8_000.0);
    }

    #[test]
    fn midpoint_with_offsets() {
        let mut state = PositionState::default();
        state.transform_mut().x_offset = 5.0;
        state.transform_mut().y_offset = -2.0;

        let sample = LocatorSample::parse(&payload(0x8000_0000, Some(0x8000_0000))).unwrap();
        let pose = state.apply(&sample);
        assert_eq!((pose.x, pose.y), (5.0, -2.0));
    }

    #[test]
    fn quarter_turn_rotation() {
        let mut transform = FrameTransform::default();
        transform.sin_theta = 1.0;
        transform.cos_theta = 0.0;
        assert_eq!(transform.apply(3.0, 4.0), (4.0, -3.0));

        transform.set_angle(0.0);
        assert_eq!(transform.apply(3.0, 4.0), (3.0, 4.0));
    }

    #[test]
    fn missing_y_reads_as_zero() {
        let sample = LocatorSample::parse(&payload(0xC000_0000, None)).unwrap();
        assert_eq!(sample.y, None);

        let mut state = PositionState::default();
        let pose = state.apply(&sample);
        assert_eq!((pose.x, pose.y), (8_000.0, 0.0));
    }

    #[test]
    fn y_requires_exact_length() {
        let mut bytes = payload(1, Some(2));
        bytes.push(0xFF);
        let sample = LocatorSample::parse(&bytes).unwrap();
        assert_eq!(sample.x, 1);
        assert_eq!(sample.y, None);
    }

    #[test]
    fn short_payload_rejected() {
        assert!(LocatorSample::parse(&[]).is_none());
        assert!(LocatorSample::parse(&[0x01, 0x00, 0x00]).is_none());
    }

    #[test]
    fn reset_keeps_range() {
        let range = LocatorRange {
            min: -1.0,
            max: 1.0,
        };
        let mut state = PositionState::new(range);
        state.set_heading(90.0);
        state.transform_mut().x_offset = 3.0;
        state.reset();

        assert_eq!(state.pose(), Pose::default());
        assert_eq!(*state.transform(), FrameTransform::default());
        assert_eq!(state.range(), range);
    }

    #[test]
    fn shared_position_is_visible_across_clones() {
        let shared = SharedPosition::default();
        let reader = shared.clone();
        shared.with(|state| state.set_north(12.5));
        assert_eq!(reader.pose().north, 12.5);
    }

    #[test]
    fn pose_serializes() {
        let pose = Pose {
            x: 1.5,
            y: -2.0,
            heading: 0.0,
            north: 90.0,
        };
        let json = serde_json::to_value(pose).unwrap();
        assert_eq!(json["x"], 1.5);
        assert_eq!(json["north"], 90.0);
    }
}
