//! Session bring-up: the command sequence that takes a bound device to a
//! running multitouch session.

use crate::bus::{DmaAlloc, MeLink};
use crate::protocol::{Command, DeviceInfo, EventCode, ResponsePayload, SensorMode};
use crate::ring::MemWindow;
use crate::{Error, Ipts};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum StartState {
  NotifyDevReady,
  DeviceInfo,
  SetMode,
  MemWindow,
}

impl<L, E, A> Ipts<L, A>
where
  L: MeLink<Error = E>,
  A: DmaAlloc,
{
  /// Bring the session up.
  ///
  /// Waits for the firmware to report the sensor present, negotiates device
  /// info, arms multitouch mode and registers the memory window. Any failure
  /// aborts the whole bring-up; no partially usable session is left behind.
  pub async fn start(&mut self) -> Result<(), Error<E>> {
    let mut state = StartState::NotifyDevReady;

    loop {
      match state {
        StartState::NotifyDevReady => {
          self.execute(&Command::new(EventCode::NotifyDevReady)).await?;
          state = StartState::DeviceInfo;
        }

        StartState::DeviceInfo => {
          self.negotiate().await?;
          state = StartState::SetMode;
        }

        StartState::SetMode => {
          self.arm(SensorMode::Multitouch).await?;
          state = StartState::MemWindow;
        }

        StartState::MemWindow => {
          self.configure().await?;
          return Ok(());
        }
      }
    }
  }

  /// Query sensor identity and the buffer sizes everything later is
  /// allocated from.
  ///
  /// Idempotent, but meant to run once per session; the result is cached on
  /// the session and returned.
  pub async fn negotiate(&mut self) -> Result<DeviceInfo, Error<E>> {
    let rsp = self.execute(&Command::new(EventCode::GetDeviceInfo)).await?;
    let info = match rsp.payload {
      ResponsePayload::DeviceInfo(info) => info,
      ResponsePayload::Opaque(_) => {
        return Err(Error::UnexpectedResponse { expected: EventCode::GetDeviceInfo.response(), received: rsp.code })
      }
    };

    debug!(
      "sensor {:04x}:{:04x} hw {} fw {} data {} feedback {}",
      info.vendor_id,
      info.device_id,
      info.hw_rev,
      info.fw_rev,
      info.data_size,
      info.feedback_size,
    );
    self.info = Some(info);
    Ok(info)
  }

  /// Arm the sensor operating mode.
  ///
  /// Only multitouch is supported; singletouch never reaches the wire. A
  /// parameter rejection from the firmware is a hard session-start failure
  /// on every hardware generation.
  pub async fn arm(&mut self, mode: SensorMode) -> Result<(), Error<E>> {
    if mode != SensorMode::Multitouch {
      return Err(Error::UnsupportedMode(mode));
    }
    if self.info.is_none() {
      return Err(Error::NotNegotiated);
    }

    self.execute(&Command::set_mode(mode)).await?;
    self.mode = Some(mode);
    Ok(())
  }

  /// Allocate the full buffer set and register it with the firmware.
  ///
  /// Requires negotiated device info and an armed mode. On success the
  /// firmware owns all sixteen data slots and may start advancing the
  /// doorbell; on any failure every allocated buffer is released again.
  pub async fn configure(&mut self) -> Result<(), Error<E>> {
    let info = self.info.ok_or(Error::NotNegotiated)?;
    if self.mode.is_none() {
      return Err(Error::ModeNotSet);
    }

    let mut window = MemWindow::alloc(&mut self.alloc, &info).map_err(|_| Error::Alloc)?;
    self.execute(&Command::set_mem_window(window.command())).await?;

    window.arm();
    self.window = Some(window);
    self.ready = true;
    info!("sensor {:04x}:{:04x} ready", info.vendor_id, info.device_id);
    Ok(())
  }
}
