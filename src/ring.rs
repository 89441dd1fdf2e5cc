//! Memory window arena: the buffer set registered with the firmware and the
//! doorbell-driven ownership handoff over its data slots.
//!
//! Ownership of a data buffer moves purely at the protocol level. A doorbell
//! advance hands a buffer from firmware to host, a feedback command hands it
//! back. Each slot carries an explicit state tag so a violation of that
//! handoff shows up as an error instead of a silent memory race.

use crate::bus::{AllocError, DmaAlloc, DmaBuffer};
use crate::protocol::{split_addr, DeviceInfo, SetMemWindowCmd, BUFFERS, DOORBELL_SIZE, WORKQUEUE_ITEM_SIZE, WORKQUEUE_SIZE};

/// Where a data slot currently sits in the firmware/host handoff.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotState {
  /// Owned by nobody; the firmware may claim it at any moment.
  Free,
  /// Registered with the firmware, which may be writing into it.
  AwaitingFirmware,
  /// Completed by the firmware and ready for the consumer.
  Filled,
  /// Consumed; a feedback command for it is in flight.
  PendingFeedback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RingError {
  DoorbellJump { last: u32, observed: u32 },
  Slot { index: u8, state: SlotState },
  BadIndex(u8),
}

struct DataSlot<B> {
  buf: B,
  state: SlotState,
}

/// The full buffer set owned by one session.
///
/// Sixteen data slots and sixteen feedback buffers sized from the negotiated
/// [`DeviceInfo`], plus the doorbell word, the workqueue and the host2me
/// scratch regions. The scratch regions are registered with the firmware but
/// never interpreted by the host.
pub(crate) struct MemWindow<B> {
  data: [DataSlot<B>; BUFFERS],
  feedback: [B; BUFFERS],
  doorbell: B,
  workqueue: B,
  host2me: B,
  data_size: u32,
  last_doorbell: Option<u32>,
}

impl<B: DmaBuffer> MemWindow<B> {
  /// Allocate every buffer the firmware requires, sized from `info`.
  pub(crate) fn alloc<A: DmaAlloc<Buffer = B>>(alloc: &mut A, info: &DeviceInfo) -> Result<Self, AllocError> {
    let data = alloc_array(alloc, info.data_size as usize)?;
    Ok(Self {
      data: data.map(|buf| DataSlot { buf, state: SlotState::Free }),
      feedback: alloc_array(alloc, info.feedback_size as usize)?,
      doorbell: alloc.alloc(DOORBELL_SIZE)?,
      workqueue: alloc.alloc(WORKQUEUE_SIZE as usize)?,
      host2me: alloc.alloc(info.feedback_size as usize)?,
      data_size: info.data_size,
      last_doorbell: None,
    })
  }

  /// Registration command carrying every bus address split into halves.
  pub(crate) fn command(&self) -> SetMemWindowCmd {
    let mut cmd = SetMemWindowCmd::default();
    for (i, slot) in self.data.iter().enumerate() {
      (cmd.data_addr_lower[i], cmd.data_addr_upper[i]) = split_addr(slot.buf.bus_addr());
    }
    for (i, buf) in self.feedback.iter().enumerate() {
      (cmd.feedback_addr_lower[i], cmd.feedback_addr_upper[i]) = split_addr(buf.bus_addr());
    }
    (cmd.workqueue_addr_lower, cmd.workqueue_addr_upper) = split_addr(self.workqueue.bus_addr());
    (cmd.doorbell_addr_lower, cmd.doorbell_addr_upper) = split_addr(self.doorbell.bus_addr());
    (cmd.host2me_addr_lower, cmd.host2me_addr_upper) = split_addr(self.host2me.bus_addr());
    cmd.workqueue_item_size = WORKQUEUE_ITEM_SIZE;
    cmd.workqueue_size = WORKQUEUE_SIZE;
    // host2me_size is not advertised, firmware accepts zero here
    cmd
  }

  /// Hand every data slot to the firmware after a successful registration.
  pub(crate) fn arm(&mut self) {
    for slot in self.data.iter_mut() {
      slot.state = SlotState::AwaitingFirmware;
    }
    self.last_doorbell = None;
  }

  /// Current value of the firmware-written doorbell word.
  pub(crate) fn doorbell_value(&self) -> u32 {
    let raw = self.doorbell.as_slice();
    u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])
  }

  /// Apply one doorbell observation.
  ///
  /// The first observation after arming is taken as-is; afterwards the
  /// counter must advance by exactly one per observation, wrapping at u32.
  /// The named slot moves to [`SlotState::Filled`]. A slot still filled or
  /// awaiting feedback cannot be named again, the firmware stalls rather
  /// than overruns.
  pub(crate) fn observe(&mut self, value: u32) -> Result<u8, RingError> {
    if let Some(last) = self.last_doorbell {
      if value != last.wrapping_add(1) {
        return Err(RingError::DoorbellJump { last, observed: value });
      }
    }
    let index = (value % BUFFERS as u32) as u8;
    let slot = &mut self.data[index as usize];
    match slot.state {
      SlotState::Free | SlotState::AwaitingFirmware => {
        slot.state = SlotState::Filled;
        self.last_doorbell = Some(value);
        Ok(index)
      }
      state => Err(RingError::Slot { index, state }),
    }
  }

  /// Payload of a filled slot. Only readable between the doorbell
  /// observation and the feedback send.
  pub(crate) fn data(&self, index: u8) -> Result<&[u8], RingError> {
    let slot = self.slot(index)?;
    match slot.state {
      SlotState::Filled => Ok(&slot.buf.as_slice()[..self.data_size as usize]),
      state => Err(RingError::Slot { index, state }),
    }
  }

  pub(crate) fn state(&self, index: u8) -> Result<SlotState, RingError> {
    Ok(self.slot(index)?.state)
  }

  /// Take a filled slot out of circulation while its feedback is in flight.
  pub(crate) fn begin_feedback(&mut self, index: u8) -> Result<(), RingError> {
    let slot = self.slot_mut(index)?;
    match slot.state {
      SlotState::Filled => {
        slot.state = SlotState::PendingFeedback;
        Ok(())
      }
      state => Err(RingError::Slot { index, state }),
    }
  }

  /// The firmware accepted the feedback, the slot is reusable.
  pub(crate) fn finish_feedback(&mut self, index: u8) {
    debug_assert_eq!(self.data[index as usize].state, SlotState::PendingFeedback);
    self.data[index as usize].state = SlotState::Free;
  }

  /// The feedback command failed, the slot stays consumable for a retry.
  pub(crate) fn abort_feedback(&mut self, index: u8) {
    debug_assert_eq!(self.data[index as usize].state, SlotState::PendingFeedback);
    self.data[index as usize].state = SlotState::Filled;
  }

  fn slot(&self, index: u8) -> Result<&DataSlot<B>, RingError> {
    self.data.get(index as usize).ok_or(RingError::BadIndex(index))
  }

  fn slot_mut(&mut self, index: u8) -> Result<&mut DataSlot<B>, RingError> {
    self.data.get_mut(index as usize).ok_or(RingError::BadIndex(index))
  }
}

fn alloc_array<A: DmaAlloc>(alloc: &mut A, len: usize) -> Result<[A::Buffer; BUFFERS], AllocError> {
  let mut out: [Option<A::Buffer>; BUFFERS] = core::array::from_fn(|_| None);
  for slot in out.iter_mut() {
    *slot = Some(alloc.alloc(len)?);
  }
  Ok(out.map(|buf| match buf {
    Some(buf) => buf,
    None => unreachable!(),
  }))
}
