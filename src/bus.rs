//! Seams toward the platform: the ME message bus and DMA-capable memory.
//!
//! The driver core never talks to hardware directly. It is generic over a
//! [`MeLink`] that moves whole frames across the management-engine bus and a
//! [`DmaAlloc`] that hands out pinned, bus-addressable buffers. Interrupt
//! delivery and receive deadlines live behind the link as well, so the core
//! stays free of platform timers.

/// Failure of a single bus transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError<E> {
  /// The transfer did not complete within the transport's deadline.
  Timeout,
  /// The underlying bus reported an error.
  Bus(E),
}

/// Message-passing bus connecting the host to the ME firmware.
///
/// Implementations deliver frames whole and in order. `recv` resolves when
/// the next frame arrives or the transport's receive deadline expires; the
/// driver maps an expired deadline to [`crate::Error::CommandTimeout`], which
/// outranks any firmware-reported status.
#[allow(async_fn_in_trait)]
pub trait MeLink {
  type Error;

  /// Transmit one complete frame.
  async fn send(&mut self, frame: &[u8]) -> Result<(), LinkError<Self::Error>>;

  /// Receive the next frame into `frame`, returning its length.
  async fn recv(&mut self, frame: &mut [u8]) -> Result<usize, LinkError<Self::Error>>;
}

/// DMA allocation failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AllocError;

/// A pinned, bus-addressable memory region.
///
/// The firmware writes into these buffers with no host-side synchronization,
/// so implementations must keep the region allocated and unmoved for as long
/// as the value lives, and must give the host a coherent view of device
/// writes.
pub trait DmaBuffer {
  /// Host-visible view of the region.
  fn as_slice(&self) -> &[u8];

  /// Mutable host-visible view of the region.
  fn as_mut_slice(&mut self) -> &mut [u8];

  /// Address the device uses to reach the region.
  fn bus_addr(&self) -> u64;
}

/// Allocator for [`DmaBuffer`] regions.
pub trait DmaAlloc {
  type Buffer: DmaBuffer;

  /// Allocate a zeroed region of `len` bytes.
  fn alloc(&mut self, len: usize) -> Result<Self::Buffer, AllocError>;
}
