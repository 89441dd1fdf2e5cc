//! Scripted doubles for the bus link and the DMA allocator.

use std::collections::VecDeque;

use crate::bus::{AllocError, DmaAlloc, DmaBuffer, LinkError, MeLink};
use crate::protocol::{Command, EventCode, Response, ResponsePayload, Status, RESPONSE_PAYLOAD_SIZE};

/// Bus link that records sent frames and plays back queued responses.
pub(crate) struct MockLink {
  pub sent: Vec<Vec<u8>>,
  pub replies: VecDeque<Result<Vec<u8>, LinkError<()>>>,
}

impl MockLink {
  pub fn new() -> Self {
    Self { sent: Vec::new(), replies: VecDeque::new() }
  }

  /// Queue a payload-free response for `code`.
  pub fn reply(&mut self, code: EventCode, status: Status) {
    self.reply_payload(code, status, ResponsePayload::Opaque([0; RESPONSE_PAYLOAD_SIZE]));
  }

  pub fn reply_payload(&mut self, code: EventCode, status: Status, payload: ResponsePayload) {
    let rsp = Response { code: code.response(), status, payload };
    self.replies.push_back(Ok(rsp.encode().to_vec()));
  }

  /// Queue an arbitrary frame, malformed ones included.
  pub fn reply_raw(&mut self, frame: Vec<u8>) {
    self.replies.push_back(Ok(frame));
  }

  /// Queue an expired receive deadline.
  pub fn reply_timeout(&mut self) {
    self.replies.push_back(Err(LinkError::Timeout));
  }

  /// Decode the nth frame the driver sent.
  pub fn sent_command(&self, n: usize) -> Command {
    Command::parse(&self.sent[n]).expect("sent frame decodes")
  }
}

impl MeLink for MockLink {
  type Error = ();

  async fn send(&mut self, frame: &[u8]) -> Result<(), LinkError<()>> {
    self.sent.push(frame.to_vec());
    Ok(())
  }

  async fn recv(&mut self, frame: &mut [u8]) -> Result<usize, LinkError<()>> {
    let next = self.replies.pop_front().expect("driver received more frames than were scripted")?;
    frame[..next.len()].copy_from_slice(&next);
    Ok(next.len())
  }
}

/// Heap-backed stand-in for a pinned DMA region.
pub(crate) struct MockBuffer {
  data: Box<[u8]>,
  addr: u64,
}

impl DmaBuffer for MockBuffer {
  fn as_slice(&self) -> &[u8] {
    &self.data
  }

  fn as_mut_slice(&mut self) -> &mut [u8] {
    &mut self.data
  }

  fn bus_addr(&self) -> u64 {
    self.addr
  }
}

/// Allocator handing out page-aligned fake bus addresses above 4 GiB so the
/// upper address halves are exercised.
pub(crate) struct MockAlloc {
  next_addr: u64,
  sizes: Vec<usize>,
  addrs: Vec<u64>,
  remaining: Option<usize>,
}

impl MockAlloc {
  pub fn new() -> Self {
    Self { next_addr: 0x0000_0008_4000_0000, sizes: Vec::new(), addrs: Vec::new(), remaining: None }
  }

  /// Allocator that serves `n` requests and then reports exhaustion.
  pub fn failing_after(n: usize) -> Self {
    Self { remaining: Some(n), ..Self::new() }
  }

  /// Sizes requested so far, in allocation order.
  pub fn sizes(&self) -> &[usize] {
    &self.sizes
  }

  /// Bus addresses handed out so far, in allocation order.
  pub fn addrs(&self) -> &[u64] {
    &self.addrs
  }
}

impl DmaAlloc for MockAlloc {
  type Buffer = MockBuffer;

  fn alloc(&mut self, len: usize) -> Result<MockBuffer, AllocError> {
    if let Some(remaining) = self.remaining.as_mut() {
      if *remaining == 0 {
        return Err(AllocError);
      }
      *remaining -= 1;
    }
    let addr = self.next_addr;
    self.next_addr += (len.max(1) as u64).next_multiple_of(4096);
    self.sizes.push(len);
    self.addrs.push(addr);
    Ok(MockBuffer { data: vec![0; len].into_boxed_slice(), addr })
  }
}
