//! Command vocabulary for the arm's command-and-parameter protocol.
//!
//! Every parameter set and jog command goes over the wire as a [`Frame`]:
//! a command id, a control byte (write/queued bits) and a little-endian
//! parameter payload. This crate only describes the protocol; the feeder
//! owns the transport.

use thiserror::Error;

mod frame;

pub use frame::{Frame, FrameError, SYNC};

/// Command identifiers understood by the controller.
///
/// The numbering matches the controller's own protocol tables; the jog
/// family lives at 70..=74 and the point-to-point family at 80..=85.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    DeviceName = 1,
    DeviceVersion = 2,
    JogJointParams = 70,
    JogCoordinateParams = 71,
    JogCommonParams = 72,
    JogCmd = 73,
    JogLParams = 74,
    PtpJointParams = 80,
    PtpCoordinateParams = 81,
    PtpJumpParams = 82,
    PtpCommonParams = 83,
    PtpLParams = 85,
}

/// The ten one-step jog codes, plus the idle code that stops a held jog.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum JogCode {
    Idle = 0,
    APositive = 1,
    ANegative = 2,
    BPositive = 3,
    BNegative = 4,
    CPositive = 5,
    CNegative = 6,
    DPositive = 7,
    DNegative = 8,
    EPositive = 9,
    ENegative = 10,
}

/// A jog request payload: which motion space the axes refer to, and which
/// of the ten directional codes to execute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JogCmd {
    pub is_joint: bool,
    pub code: JogCode,
}

impl JogCmd {
    pub fn to_params(self) -> Vec<u8> {
        vec![u8::from(self.is_joint), self.code as u8]
    }
}

/// Correlation handle the controller returns for each accepted command.
/// Never resolved further here; kept for logging and future backpressure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct CommandIndex(pub u64);

/// Firmware identification returned by a successful connect handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub firmware_type: String,
    pub version: String,
}

/// Connection-phase failures, mirroring the controller's own
/// connection-state enumeration.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("controller not found")]
    NotFound,
    #[error("controller occupied by another session")]
    Occupied,
}

/// Steady-state command failures. The feeder treats all of these as
/// non-fatal: commands are fire-and-forget and never retried.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum CommunicateError {
    #[error("command buffer full")]
    BufferFull,
    #[error("timed out waiting for the controller")]
    Timeout,
    #[error("controller rejected the command parameters")]
    InvalidParams,
}

/// An unframed command: id plus serialized parameters. [`Frame`] adds the
/// sync bytes, control byte and checksum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: CommandId,
    pub write: bool,
    pub params: Vec<u8>,
}

impl Message {
    pub fn write(id: CommandId, params: Vec<u8>) -> Message {
        Message {
            id,
            write: true,
            params,
        }
    }

    pub fn read(id: CommandId) -> Message {
        Message {
            id,
            write: false,
            params: Vec::new(),
        }
    }
}

fn push_f32s(buf: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

/// Per-joint jog velocity and acceleration, one entry per joint.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JogJointParams {
    pub velocity: [f32; 4],
    pub acceleration: [f32; 4],
}

impl JogJointParams {
    pub fn to_params(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        push_f32s(&mut buf, &self.velocity);
        push_f32s(&mut buf, &self.acceleration);
        buf
    }
}

/// Ratio-based common jog parameters, applied on top of the per-axis sets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JogCommonParams {
    pub velocity_ratio: f32,
    pub acceleration_ratio: f32,
}

impl JogCommonParams {
    pub fn to_params(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        push_f32s(&mut buf, &[self.velocity_ratio, self.acceleration_ratio]);
        buf
    }
}

/// Linear-rail jog velocity and acceleration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JogLParams {
    pub velocity: f32,
    pub acceleration: f32,
}

impl JogLParams {
    pub fn to_params(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        push_f32s(&mut buf, &[self.velocity, self.acceleration]);
        buf
    }
}

/// Per-joint point-to-point velocity and acceleration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PtpJointParams {
    pub velocity: [f32; 4],
    pub acceleration: [f32; 4],
}

impl PtpJointParams {
    pub fn to_params(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        push_f32s(&mut buf, &self.velocity);
        push_f32s(&mut buf, &self.acceleration);
        buf
    }
}

/// Cartesian point-to-point velocity and acceleration. Field order is the
/// controller's: both velocities before both accelerations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PtpCoordinateParams {
    pub xyz_velocity: f32,
    pub r_velocity: f32,
    pub xyz_acceleration: f32,
    pub r_acceleration: f32,
}

impl PtpCoordinateParams {
    pub fn to_params(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        push_f32s(
            &mut buf,
            &[
                self.xyz_velocity,
                self.r_velocity,
                self.xyz_acceleration,
                self.r_acceleration,
            ],
        );
        buf
    }
}

/// Jump-move lift height and the z ceiling it may not cross.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PtpJumpParams {
    pub jump_height: f32,
    pub z_limit: f32,
}

impl PtpJumpParams {
    pub fn to_params(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        push_f32s(&mut buf, &[self.jump_height, self.z_limit]);
        buf
    }
}

/// Ratio-based common point-to-point parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PtpCommonParams {
    pub velocity_ratio: f32,
    pub acceleration_ratio: f32,
}

impl PtpCommonParams {
    pub fn to_params(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        push_f32s(&mut buf, &[self.velocity_ratio, self.acceleration_ratio]);
        buf
    }
}

/// Linear-rail point-to-point velocity and acceleration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PtpLParams {
    pub velocity: f32,
    pub acceleration: f32,
}

impl PtpLParams {
    pub fn to_params(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        push_f32s(&mut buf, &[self.velocity, self.acceleration]);
        buf
    }
}

/// The full motion-parameter record pushed once at startup. Immutable after
/// initialization; the defaults are the values the demo arm ships with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionParameterSet {
    pub joint_jog: JogJointParams,
    pub common_jog: JogCommonParams,
    pub joint_ptp: PtpJointParams,
    pub coordinate_ptp: PtpCoordinateParams,
    pub jump: PtpJumpParams,
    pub common_ptp: PtpCommonParams,
    pub linear_ptp: PtpLParams,
    pub linear_jog: JogLParams,
}

impl Default for MotionParameterSet {
    fn default() -> Self {
        MotionParameterSet {
            joint_jog: JogJointParams {
                velocity: [200.0; 4],
                acceleration: [200.0; 4],
            },
            common_jog: JogCommonParams {
                velocity_ratio: 100.0,
                acceleration_ratio: 100.0,
            },
            joint_ptp: PtpJointParams {
                velocity: [200.0; 4],
                acceleration: [200.0; 4],
            },
            coordinate_ptp: PtpCoordinateParams {
                xyz_velocity: 100.0,
                r_velocity: 100.0,
                xyz_acceleration: 100.0,
                r_acceleration: 100.0,
            },
            jump: PtpJumpParams {
                jump_height: 20.0,
                z_limit: 100.0,
            },
            common_ptp: PtpCommonParams {
                velocity_ratio: 30.0,
                acceleration_ratio: 30.0,
            },
            linear_ptp: PtpLParams {
                velocity: 50.0,
                acceleration: 50.0,
            },
            linear_jog: JogLParams {
                velocity: 50.0,
                acceleration: 50.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jog_cmd_params() {
        let cmd = JogCmd {
            is_joint: false,
            code: JogCode::APositive,
        };
        assert_eq!(cmd.to_params(), vec![0, 1]);

        let cmd = JogCmd {
            is_joint: true,
            code: JogCode::ENegative,
        };
        assert_eq!(cmd.to_params(), vec![1, 10]);
    }

    // The controller reads these blind, so the byte layout is load-bearing:
    // consecutive little-endian f32s in declaration order.
    #[test]
    fn param_layouts() {
        let set = MotionParameterSet::default();
        assert_eq!(set.joint_jog.to_params().len(), 32);
        assert_eq!(set.common_jog.to_params().len(), 8);
        assert_eq!(set.joint_ptp.to_params().len(), 32);
        assert_eq!(set.coordinate_ptp.to_params().len(), 16);
        assert_eq!(set.jump.to_params().len(), 8);
        assert_eq!(set.common_ptp.to_params().len(), 8);
        assert_eq!(set.linear_ptp.to_params().len(), 8);
        assert_eq!(set.linear_jog.to_params().len(), 8);

        let jump = set.jump.to_params();
        assert_eq!(&jump[..4], &20.0f32.to_le_bytes());
        assert_eq!(&jump[4..], &100.0f32.to_le_bytes());
    }

    #[test]
    fn jog_code_values_are_stable() {
        assert_eq!(JogCode::Idle as u8, 0);
        assert_eq!(JogCode::APositive as u8, 1);
        assert_eq!(JogCode::ANegative as u8, 2);
        assert_eq!(JogCode::CPositive as u8, 5);
        assert_eq!(JogCode::DNegative as u8, 8);
        assert_eq!(JogCode::ENegative as u8, 10);
    }
}
