//! Consumption side of the buffer ring: doorbell observations and access to
//! filled slots.
//!
//! The firmware fills buffers asynchronously and bumps the doorbell word in
//! shared memory; the transport's notification glue watches that word and
//! feeds each new value here exactly once. How the advance is detected
//! (interrupt or polling) is the transport's business, not this crate's.

use crate::bus::{DmaAlloc, MeLink};
use crate::ring::SlotState;
use crate::{Error, Ipts};

impl<L, E, A> Ipts<L, A>
where
  L: MeLink<Error = E>,
  A: DmaAlloc,
{
  /// Current value of the firmware-written doorbell word, once a memory
  /// window exists.
  pub fn doorbell(&self) -> Option<u32> {
    self.window.as_ref().map(|window| window.doorbell_value())
  }

  /// Apply one doorbell observation and name the slot it filled.
  ///
  /// Observations must arrive in firmware order: after the first one the
  /// counter has to advance by exactly one per call, wrapping at u32. A
  /// skipped or repeated value is a protocol anomaly and fails with
  /// [`Error::DoorbellJump`] without touching any slot.
  pub fn observe_doorbell(&mut self, value: u32) -> Result<u8, Error<E>> {
    let window = self.window.as_mut().ok_or(Error::NoMemWindow)?;
    match window.observe(value) {
      Ok(index) => {
        trace!("doorbell {} filled slot {}", value, index);
        Ok(index)
      }
      Err(err) => {
        warn!("doorbell anomaly at value {}", value);
        Err(err.into())
      }
    }
  }

  /// Payload of a filled slot.
  ///
  /// Readable only between the doorbell observation and the feedback send;
  /// once feedback is accepted the firmware may overwrite the buffer at any
  /// moment.
  pub fn touch_data(&self, index: u8) -> Result<&[u8], Error<E>> {
    let window = self.window.as_ref().ok_or(Error::NoMemWindow)?;
    Ok(window.data(index)?)
  }

  /// Ownership state of a data slot.
  pub fn slot_state(&self, index: u8) -> Result<SlotState, Error<E>> {
    let window = self.window.as_ref().ok_or(Error::NoMemWindow)?;
    Ok(window.state(index)?)
  }
}
