#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Async, `no_std` host protocol core for Intel Precise Touch & Stylus
//! (IPTS) sensors operated by a management-engine firmware behind a
//! message-passing bus.
//!
//! The crate owns the hard, correctness-critical part of driving such a
//! sensor: the command/response state machine and the handoff of sixteen
//! shared data buffers between firmware and host. It offers:
//!
//! - Session bring-up under a strict one-command-in-flight discipline:
//!   device-info negotiation, multitouch mode selection, memory-window
//!   registration
//! - A doorbell-driven buffer ring with explicit per-slot ownership states,
//!   so a broken handoff surfaces as an error instead of a memory race
//! - A feedback channel returning consumed buffers to the firmware
//! - Firmware status classification into transient and fatal severities
//! - Transport and DMA allocation behind small traits, so the core runs
//!   against a kernel bus binding as well as a scripted mock
//!
//! Heatmap payload interpretation, HID report construction and the
//! user-space surface stay outside this crate; consumers read a filled slot
//! and acknowledge it with the transaction id found in its payload.
//!
//! ```no_run
//! use ipts::{DmaAlloc, Ipts, MeLink};
//!
//! async fn example<L: MeLink, A: DmaAlloc>(link: L, alloc: A) -> Result<(), ipts::Error<L::Error>> {
//!   let mut touch = Ipts::new(link, alloc);
//!   touch.start().await?;
//!
//!   // transport interrupt glue saw the doorbell advance to 0
//!   let index = touch.observe_doorbell(0)?;
//!   let transaction = touch.touch_data(index)?[4];
//!   touch.feedback(index, transaction as u32).await?;
//!   Ok(())
//! }
//! ```

#[macro_use]
mod fmt;

mod bus;
mod control;
mod dispatch;
mod event;
mod init;
mod protocol;
mod ring;

#[cfg(test)]
mod testutil;

pub use bus::{AllocError, DmaAlloc, DmaBuffer, LinkError, MeLink};
pub use protocol::{
  Command, CommandPayload, DeviceInfo, EventCode, FeedbackCmd, ParseError, Response, ResponsePayload, SensorMode,
  SetMemWindowCmd, SetModeCmd, Severity, Status, BUFFERS, COMMAND_SIZE, DEVICE_INFO_SIZE, DOORBELL_SIZE,
  FEEDBACK_SIZE, RESPONSE_PAYLOAD_SIZE, RESPONSE_SIZE, RSP_OFFSET, SET_MEM_WINDOW_SIZE, SET_MODE_SIZE,
  WORKQUEUE_ITEM_SIZE, WORKQUEUE_SIZE,
};
pub use ring::SlotState;

use ring::{MemWindow, RingError};

/// Errors that can occur while driving the sensor session.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
  /// Bus transfer failed with the underlying transport error.
  Link(E),
  /// No response arrived within the transport's deadline. More severe than
  /// any firmware-reported status.
  CommandTimeout,
  /// A response frame could not be decoded.
  Parse(ParseError),
  /// The response code does not belong to the outstanding command.
  UnexpectedResponse { expected: u32, received: u32 },
  /// The firmware rejected a command for good.
  Firmware { code: EventCode, status: Status },
  /// DMA allocation for the memory window failed.
  Alloc,
  /// Only multitouch mode is supported.
  UnsupportedMode(SensorMode),
  /// Device info has not been negotiated yet.
  NotNegotiated,
  /// The operating mode has not been armed yet.
  ModeNotSet,
  /// No memory window is registered.
  NoMemWindow,
  /// The doorbell advanced by something other than one.
  DoorbellJump { last: u32, observed: u32 },
  /// A slot was not in the state the operation requires.
  Slot { index: u8, state: SlotState },
  /// Buffer index outside the fixed ring.
  InvalidBuffer(u8),
}

impl<E> From<LinkError<E>> for Error<E> {
  fn from(err: LinkError<E>) -> Self {
    match err {
      LinkError::Timeout => Self::CommandTimeout,
      LinkError::Bus(err) => Self::Link(err),
    }
  }
}

impl<E> From<RingError> for Error<E> {
  fn from(err: RingError) -> Self {
    match err {
      RingError::DoorbellJump { last, observed } => Self::DoorbellJump { last, observed },
      RingError::Slot { index, state } => Self::Slot { index, state },
      RingError::BadIndex(index) => Self::InvalidBuffer(index),
    }
  }
}

/// One sensor session: the protocol state machine plus the buffer set shared
/// with the firmware.
///
/// Created on device bind with [`Ipts::new`], populated by [`Ipts::start`],
/// torn down by [`Ipts::stop`] or by dropping the value. Every command path
/// takes `&mut self`, which is what enforces the single-outstanding-command
/// discipline.
pub struct Ipts<L, A: DmaAlloc> {
  link: L,
  alloc: A,
  info: Option<DeviceInfo>,
  mode: Option<SensorMode>,
  window: Option<MemWindow<A::Buffer>>,
  ready: bool,
}

impl<L, A: DmaAlloc> Ipts<L, A> {
  /// Create an idle session over the given bus link and DMA allocator.
  ///
  /// Nothing touches the wire until [`Ipts::start`] or one of the individual
  /// bring-up operations is called.
  pub fn new(link: L, alloc: A) -> Self {
    Self { link, alloc, info: None, mode: None, window: None, ready: false }
  }

  /// Negotiated device identity and buffer sizing, once known.
  pub fn device_info(&self) -> Option<&DeviceInfo> {
    self.info.as_ref()
  }

  /// Operating mode the sensor has been armed with, once set.
  pub fn mode(&self) -> Option<SensorMode> {
    self.mode
  }

  /// Whether the memory window is registered and the firmware may be
  /// filling buffers.
  pub fn is_ready(&self) -> bool {
    self.ready
  }

  /// Consume the session and hand back the link and allocator.
  ///
  /// Any registered buffers are dropped without telling the firmware; call
  /// [`Ipts::stop`] first if the session is still live.
  pub fn release(self) -> (L, A) {
    (self.link, self.alloc)
  }
}
