//! Command/response dispatch under the single-outstanding-request rule.

use crate::bus::{DmaAlloc, MeLink};
use crate::protocol::{Command, Response, Severity, RESPONSE_SIZE};
use crate::{Error, Ipts};

/// Attempts a command answered with a transient status gets before that
/// status is surfaced to the caller.
const TRANSIENT_RETRIES: usize = 3;

impl<L, E, A> Ipts<L, A>
where
  L: MeLink<Error = E>,
  A: DmaAlloc,
{
  /// Send one command and suspend until its response arrives.
  ///
  /// `&mut self` keeps at most one command in flight. The response code must
  /// be the command code with the response offset applied; anything else is
  /// rejected without looking at the payload. A transport deadline expiry
  /// surfaces as [`Error::CommandTimeout`].
  pub(crate) async fn transact(&mut self, cmd: &Command) -> Result<Response, Error<E>> {
    self.link.send(&cmd.encode()).await?;

    let mut frame = [0u8; RESPONSE_SIZE];
    let len = self.link.recv(&mut frame).await?;
    let rsp = Response::parse(&frame[..len]).map_err(Error::Parse)?;

    let expected = cmd.code.response();
    if rsp.code != expected {
      return Err(Error::UnexpectedResponse { expected, received: rsp.code });
    }
    Ok(rsp)
  }

  /// Run a command to completion, riding out transient firmware statuses.
  ///
  /// Any status still not successful after the retry budget is mapped to
  /// [`Error::Firmware`].
  pub(crate) async fn execute(&mut self, cmd: &Command) -> Result<Response, Error<E>> {
    let mut attempts = 0;
    loop {
      let rsp = self.transact(cmd).await?;
      match rsp.status.severity() {
        Severity::None => return Ok(rsp),
        Severity::Transient if attempts < TRANSIENT_RETRIES => {
          attempts += 1;
          debug!("command {:?} busy with {:?}, retrying", cmd.code, rsp.status);
        }
        _ => {
          error!("command {:?} failed with {:?}", cmd.code, rsp.status);
          return Err(Error::Firmware { code: cmd.code, status: rsp.status });
        }
      }
    }
  }
}
