//! The motion-controller side of the bridge: a TCP link speaking the framed
//! command protocol, the one-shot parameter configurator, and the jog
//! dispatcher that both the pointer and the jog keys feed into.

use std::collections::VecDeque;
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jogwand_protocol::{
    CommandId, CommandIndex, CommunicateError, ConnectError, DeviceInfo, Frame, JogCmd, JogCode,
    Message, MotionParameterSet, SYNC,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::decoder::{Axis, JogEvent, MotionSpace, Polarity};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The command chokepoint. Everything the bridge tells the arm goes through
/// `send_command`; the mock implementation records instead of transmitting.
pub trait Controller {
    async fn send_command(
        &mut self,
        msg: &Message,
        queued: bool,
    ) -> Result<CommandIndex, CommunicateError>;

    fn set_command_timeout(&mut self, timeout: Duration);

    async fn set_device_name(&mut self, name: &str) -> Result<(), CommunicateError>;

    async fn get_device_name(&mut self) -> Result<String, CommunicateError>;
}

/// A live session with the controller over TCP.
pub struct ControllerLink {
    stream: TcpStream,
    timeout: Duration,
    // Recorded for the session; the TCP transport ignores it.
    #[allow(dead_code)]
    baud_rate: u32,
}

impl ControllerLink {
    /// Establishes the session and performs the version handshake.
    ///
    /// An unreachable or silent controller maps to `NotFound`; a controller
    /// that accepts the connection but drops it during the handshake is
    /// assumed to be held by another session and maps to `Occupied`.
    pub async fn connect(address: &str, baud_rate: u32) -> Result<(Self, DeviceInfo), ConnectError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
            .await
            .map_err(|_| ConnectError::NotFound)?
            .map_err(|_| ConnectError::NotFound)?;

        let mut link = ControllerLink {
            stream,
            timeout: CONNECT_TIMEOUT,
            baud_rate,
        };
        let info = link.handshake().await?;
        Ok((link, info))
    }

    async fn handshake(&mut self) -> Result<DeviceInfo, ConnectError> {
        let frame = self
            .request(&Message::read(CommandId::DeviceVersion), false)
            .await
            .map_err(|e| match e {
                CommunicateError::Timeout => ConnectError::NotFound,
                _ => ConnectError::Occupied,
            })?;

        let version = match *frame.params.as_slice() {
            [major, minor, patch, ..] => format!("{major}.{minor}.{patch}"),
            _ => return Err(ConnectError::Occupied),
        };
        Ok(DeviceInfo {
            firmware_type: "Magician".to_owned(),
            version,
        })
    }

    /// One request/response exchange, bounded by the command timeout.
    async fn request(
        &mut self,
        msg: &Message,
        queued: bool,
    ) -> Result<Frame, CommunicateError> {
        let buf = Frame::from_message(msg, queued).encode();
        let id = msg.id as u8;
        tokio::time::timeout(self.timeout, self.exchange(&buf, id))
            .await
            .map_err(|_| CommunicateError::Timeout)?
    }

    async fn exchange(&mut self, buf: &[u8], id: u8) -> Result<Frame, CommunicateError> {
        self.stream.write_all(buf).await.map_err(map_io)?;
        let frame = self.read_frame().await?;
        // The controller echoes the request id; anything else means it
        // did not understand us.
        if frame.id != id {
            return Err(CommunicateError::InvalidParams);
        }
        Ok(frame)
    }

    async fn read_frame(&mut self) -> Result<Frame, CommunicateError> {
        let mut header = [0u8; 3];
        self.stream.read_exact(&mut header).await.map_err(map_io)?;
        if header[..2] != SYNC || header[2] < 2 {
            return Err(CommunicateError::InvalidParams);
        }

        let mut buf = header.to_vec();
        buf.resize(3 + header[2] as usize + 1, 0);
        self.stream
            .read_exact(&mut buf[3..])
            .await
            .map_err(map_io)?;
        Frame::decode(&buf).map_err(|_| CommunicateError::InvalidParams)
    }
}

fn map_io(e: io::Error) -> CommunicateError {
    match e.kind() {
        io::ErrorKind::WouldBlock => CommunicateError::BufferFull,
        _ => CommunicateError::Timeout,
    }
}

/// A queued command's index rides in the response params; non-queued
/// responses may carry nothing, which reads as index 0.
fn command_index(params: &[u8]) -> CommandIndex {
    match params.get(..8) {
        Some(bytes) => CommandIndex(u64::from_le_bytes(bytes.try_into().unwrap())),
        None => CommandIndex(0),
    }
}

impl Controller for ControllerLink {
    async fn send_command(
        &mut self,
        msg: &Message,
        queued: bool,
    ) -> Result<CommandIndex, CommunicateError> {
        let frame = self.request(msg, queued).await?;
        Ok(command_index(&frame.params))
    }

    fn set_command_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    async fn set_device_name(&mut self, name: &str) -> Result<(), CommunicateError> {
        self.request(
            &Message::write(CommandId::DeviceName, name.as_bytes().to_vec()),
            false,
        )
        .await?;
        Ok(())
    }

    async fn get_device_name(&mut self) -> Result<String, CommunicateError> {
        let frame = self.request(&Message::read(CommandId::DeviceName), false).await?;
        Ok(String::from_utf8_lossy(&frame.params).into_owned())
    }
}

/// Connects, then runs the fixed startup sequence: command timeout, device
/// naming, and the one-shot parameter push. No jog command is dispatched
/// anywhere before this returns.
pub async fn bring_up<C, F, Fut>(
    connect: F,
    command_timeout: Duration,
    device_name: &str,
    params: &MotionParameterSet,
) -> Result<(C, DeviceInfo), ConnectError>
where
    C: Controller,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(C, DeviceInfo), ConnectError>>,
{
    let (mut ctrl, info) = connect().await?;
    ctrl.set_command_timeout(command_timeout);

    if let Err(e) = ctrl.set_device_name(device_name).await {
        log::debug!("failed to set device name: {e}");
    }
    match ctrl.get_device_name().await {
        Ok(name) => log::info!("controller reports name {name:?}"),
        Err(e) => log::debug!("failed to read device name: {e}"),
    }

    configure(&mut ctrl, params).await;
    Ok((ctrl, info))
}

/// Pushes all eight parameter sets, best effort. The order is fixed because
/// the controller interprets later sets against earlier mode selection;
/// every push is attempted even when an earlier one fails.
pub async fn configure(ctrl: &mut impl Controller, params: &MotionParameterSet) {
    let pushes = [
        (CommandId::JogJointParams, params.joint_jog.to_params()),
        (CommandId::JogCommonParams, params.common_jog.to_params()),
        (CommandId::PtpJointParams, params.joint_ptp.to_params()),
        (
            CommandId::PtpCoordinateParams,
            params.coordinate_ptp.to_params(),
        ),
        (CommandId::PtpJumpParams, params.jump.to_params()),
        (CommandId::PtpCommonParams, params.common_ptp.to_params()),
        (CommandId::PtpLParams, params.linear_ptp.to_params()),
        (CommandId::JogLParams, params.linear_jog.to_params()),
    ];

    for (id, p) in pushes {
        if let Err(e) = ctrl.send_command(&Message::write(id, p), false).await {
            log::debug!("parameter push {id:?} failed: {e}");
        }
    }
}

fn jog_code(axis: Axis, polarity: Polarity) -> JogCode {
    match (axis, polarity) {
        (Axis::A, Polarity::Positive) => JogCode::APositive,
        (Axis::A, Polarity::Negative) => JogCode::ANegative,
        (Axis::B, Polarity::Positive) => JogCode::BPositive,
        (Axis::B, Polarity::Negative) => JogCode::BNegative,
        (Axis::C, Polarity::Positive) => JogCode::CPositive,
        (Axis::C, Polarity::Negative) => JogCode::CNegative,
        (Axis::D, Polarity::Positive) => JogCode::DPositive,
        (Axis::D, Polarity::Negative) => JogCode::DNegative,
        (Axis::E, Polarity::Positive) => JogCode::EPositive,
        (Axis::E, Polarity::Negative) => JogCode::ENegative,
    }
}

/// Sends one jog command, fire and forget. Pointer-driven and key-driven
/// events take this exact same path; failures are logged and dropped, never
/// retried.
pub async fn dispatch(ctrl: &mut impl Controller, event: &JogEvent) {
    let cmd = JogCmd {
        is_joint: event.space == MotionSpace::Joint,
        code: jog_code(event.axis, event.polarity),
    };
    match ctrl
        .send_command(&Message::write(CommandId::JogCmd, cmd.to_params()), false)
        .await
    {
        Ok(index) => log::trace!("jog {:?} accepted as {:?}", cmd.code, index),
        Err(e) => log::debug!("jog {:?} dropped: {e}", cmd.code),
    }
}

/// Records commands instead of sending them. Used by `--dry-run` and by the
/// tests that need to observe the dispatch stream.
#[derive(Clone, Default)]
pub struct MockController {
    calls: Arc<Mutex<Vec<(CommandId, bool)>>>,
    failures: Arc<Mutex<VecDeque<CommunicateError>>>,
    device_name: Arc<Mutex<String>>,
    next_index: u64,
}

impl MockController {
    pub fn new() -> MockController {
        MockController::default()
    }

    /// A handle that stays valid after the mock is moved into `bring_up`.
    #[cfg(test)]
    pub fn calls_handle(&self) -> Arc<Mutex<Vec<(CommandId, bool)>>> {
        Arc::clone(&self.calls)
    }

    #[cfg(test)]
    pub fn fail_next(&self, error: CommunicateError) {
        self.failures.lock().unwrap().push_back(error);
    }

    #[cfg(test)]
    pub fn calls(&self) -> Vec<(CommandId, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Controller for MockController {
    async fn send_command(
        &mut self,
        msg: &Message,
        queued: bool,
    ) -> Result<CommandIndex, CommunicateError> {
        self.calls.lock().unwrap().push((msg.id, queued));
        if let Some(e) = self.failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        self.next_index += 1;
        log::info!("dry-run: {:?} ({} param bytes)", msg.id, msg.params.len());
        Ok(CommandIndex(self.next_index))
    }

    fn set_command_timeout(&mut self, _timeout: Duration) {}

    async fn set_device_name(&mut self, name: &str) -> Result<(), CommunicateError> {
        *self.device_name.lock().unwrap() = name.to_owned();
        Ok(())
    }

    async fn get_device_name(&mut self) -> Result<String, CommunicateError> {
        Ok(self.device_name.lock().unwrap().clone())
    }
}
