//! Renderer synchronization over OSC
//!
//! Each message is `<address> ,if <window id> <progress>` where progress is
//! the elapsed share of the grain's frames in `[0, 1]`. Sends are
//! fire-and-forget: failures are logged at trace level and dropped.

use crate::config::SyncConfig;
use rosc::{OscMessage, OscPacket, OscType};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to open sync socket: {0}")]
    Socket(#[source] std::io::Error),

    #[error("cannot resolve sync destination {0}")]
    Destination(String),

    #[error("window id {0} does not fit an OSC int32")]
    WindowId(usize),

    #[error("failed to encode sync message: {0}")]
    Encode(String),
}

pub trait SyncEmitter: Send + Sync {
    fn emit(&self, window: usize, progress: f32);
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSync;

impl SyncEmitter for NullSync {
    fn emit(&self, _window: usize, _progress: f32) {}
}

pub struct OscSync {
    socket: UdpSocket,
    target: SocketAddr,
    address: String,
}

impl OscSync {
    pub fn connect(config: &SyncConfig) -> Result<Self, SyncError> {
        let destination = config.destination();
        let target = destination
            .to_socket_addrs()
            .map_err(|_| SyncError::Destination(destination.clone()))?
            .next()
            .ok_or_else(|| SyncError::Destination(destination.clone()))?;

        let socket = UdpSocket::bind("0.0.0.0:0").map_err(SyncError::Socket)?;
        socket.set_nonblocking(true).map_err(SyncError::Socket)?;

        log::info!("Sending sync messages to {}{}", target, config.address);
        Ok(Self {
            socket,
            target,
            address: config.address.clone(),
        })
    }

    pub fn encode(&self, window: usize, progress: f32) -> Result<Vec<u8>, SyncError> {
        let id = i32::try_from(window).map_err(|_| SyncError::WindowId(window))?;
        let packet = OscPacket::Message(OscMessage {
            addr: self.address.clone(),
            args: vec![OscType::Int(id), OscType::Float(progress)],
        });
        rosc::encoder::encode(&packet).map_err(|e| SyncError::Encode(format!("{:?}", e)))
    }
}

impl SyncEmitter for OscSync {
    fn emit(&self, window: usize, progress: f32) {
        let bytes = match self.encode(window, progress) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::trace!("{}", e);
                return;
            }
        };
        match self.socket.send_to(&bytes, self.target) {
            Ok(_) => log::trace!("sync {} {:.3}", window, progress),
            Err(e) => log::trace!("sync send to {} failed: {}", self.target, e),
        }
    }
}
