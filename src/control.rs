//! Runtime control: feedback, readiness signaling and session teardown.

use crate::bus::{DmaAlloc, MeLink};
use crate::protocol::{Command, EventCode, Status};
use crate::{Error, Ipts};

impl<L, E, A> Ipts<L, A>
where
  L: MeLink<Error = E>,
  A: DmaAlloc,
{
  /// Return a consumed buffer to the firmware.
  ///
  /// The slot must be filled and fully read; once the firmware accepts the
  /// command it may overwrite the buffer immediately. `transaction` is the
  /// id the firmware wrote into this slot's payload, never a host-generated
  /// value. On a firmware error the slot stays consumable so the caller can
  /// retry a transient status or escalate a fatal one; either way the
  /// session itself stays up.
  pub async fn feedback(&mut self, index: u8, transaction: u32) -> Result<(), Error<E>> {
    self.window.as_mut().ok_or(Error::NoMemWindow)?.begin_feedback(index)?;

    let cmd = Command::feedback(index as u32, transaction);
    let rsp = match self.transact(&cmd).await {
      Ok(rsp) => rsp,
      Err(err) => {
        if let Some(window) = self.window.as_mut() {
          window.abort_feedback(index);
        }
        return Err(err);
      }
    };

    let window = self.window.as_mut().ok_or(Error::NoMemWindow)?;
    match rsp.status {
      Status::Success => {
        window.finish_feedback(index);
        Ok(())
      }
      // stale transaction ids come back as invalid params; the buffer is
      // still consumed and reusable
      Status::InvalidParams => {
        warn!("feedback for slot {} rejected as invalid, recycling anyway", index);
        window.finish_feedback(index);
        Ok(())
      }
      status => {
        window.abort_feedback(index);
        error!("feedback for slot {} failed with {:?}", index, status);
        Err(Error::Firmware { code: EventCode::Feedback, status })
      }
    }
  }

  /// Tell the firmware the host is ready for the next data frame.
  ///
  /// Multitouch operation is doorbell driven and does not need this, but
  /// some firmware revisions expect the signal before producing anything.
  pub async fn ready_for_data(&mut self) -> Result<(), Error<E>> {
    self.execute(&Command::new(EventCode::ReadyForData)).await?;
    Ok(())
  }

  /// Ask the firmware to stop touching host memory.
  ///
  /// An already running quiesce is reported as quiesce-in-progress and
  /// counts as success.
  pub async fn quiesce(&mut self) -> Result<(), Error<E>> {
    let rsp = self.transact(&Command::new(EventCode::QuiesceIo)).await?;
    match rsp.status {
      Status::Success | Status::QuiesceIoInProgress => Ok(()),
      status => Err(Error::Firmware { code: EventCode::QuiesceIo, status }),
    }
  }

  /// Tear the session down.
  ///
  /// Quiesces the firmware and clears the memory window before any buffer is
  /// freed; the firmware may still be writing until both commands complete
  /// or time out. The session returns to its unbound state either way.
  pub async fn stop(&mut self) -> Result<(), Error<E>> {
    self.ready = false;
    let quiesced = self.quiesce().await;
    let cleared = self.execute(&Command::new(EventCode::ClearMemWindow)).await;

    self.window = None;
    self.mode = None;
    self.info = None;

    quiesced?;
    cleared?;
    Ok(())
  }

  /// Tear the session down and bring it back up.
  ///
  /// The recovery path after an unexpected sensor reset or a protocol
  /// anomaly.
  pub async fn restart(&mut self) -> Result<(), Error<E>> {
    info!("restarting touch session");
    self.stop().await?;
    self.start().await
  }
}
