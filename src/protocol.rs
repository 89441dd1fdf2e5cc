//! Wire protocol shared between the host and the ME touch firmware.
//!
//! Every layout here is part of the firmware contract: commands are 324-byte
//! frames, responses are 88-byte frames, and all fields are little-endian at
//! fixed offsets. Payloads are modeled as tagged variants keyed by the code
//! field so a frame is only ever interpreted as the variant its code names.

/// Number of parallel data and feedback buffers the firmware operates on.
pub const BUFFERS: usize = 16;

/// Size of the workqueue scratch buffer in bytes. Fixed by the protocol,
/// never negotiated.
pub const WORKQUEUE_SIZE: u16 = 8192;

/// Size of one workqueue item in bytes. Fixed by the protocol.
pub const WORKQUEUE_ITEM_SIZE: u8 = 16;

/// Size of the doorbell buffer: a single little-endian u32 counter.
pub const DOORBELL_SIZE: usize = 4;

/// Total size of a command frame on the wire.
pub const COMMAND_SIZE: usize = 324;

/// Total size of a response frame on the wire.
pub const RESPONSE_SIZE: usize = 88;

/// Size of the payload area inside a response frame.
pub const RESPONSE_PAYLOAD_SIZE: usize = 80;

/// Size of the SET_MODE payload on the wire.
pub const SET_MODE_SIZE: usize = 16;

/// Size of the SET_MEM_WINDOW payload on the wire.
pub const SET_MEM_WINDOW_SIZE: usize = 320;

/// Size of the FEEDBACK payload on the wire.
pub const FEEDBACK_SIZE: usize = 16;

/// Size of the device info block inside a response payload.
pub const DEVICE_INFO_SIZE: usize = 44;

/// The response to a command always carries the command code with the high
/// bit set.
pub const RSP_OFFSET: u32 = 0x8000_0000;

/// Commands the host can send to the firmware.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventCode {
  GetDeviceInfo = 1,
  SetMode = 2,
  SetMemWindow = 3,
  QuiesceIo = 4,
  ReadyForData = 5,
  Feedback = 6,
  ClearMemWindow = 7,
  NotifyDevReady = 8,
}

impl EventCode {
  pub const fn from_raw(raw: u32) -> Option<Self> {
    match raw {
      1 => Some(Self::GetDeviceInfo),
      2 => Some(Self::SetMode),
      3 => Some(Self::SetMemWindow),
      4 => Some(Self::QuiesceIo),
      5 => Some(Self::ReadyForData),
      6 => Some(Self::Feedback),
      7 => Some(Self::ClearMemWindow),
      8 => Some(Self::NotifyDevReady),
      _ => None,
    }
  }

  /// Code the firmware will answer this command with.
  pub const fn response(self) -> u32 {
    self as u32 + RSP_OFFSET
  }
}

impl From<EventCode> for u32 {
  fn from(code: EventCode) -> Self {
    code as u32
  }
}

/// Status word the firmware attaches to every response.
///
/// The severities differ a lot. Some of these indicate an expected transient
/// state the host simply retries through, the rest end the session.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
  Success = 0,
  InvalidParams = 1,
  AccessDenied = 2,
  CmdSizeError = 3,
  NotReady = 4,
  RequestOutstanding = 5,
  NoSensorFound = 6,
  OutOfMemory = 7,
  InternalError = 8,
  SensorDisabled = 9,
  CompatCheckFail = 10,
  SensorExpectedReset = 11,
  SensorUnexpectedReset = 12,
  ResetFailed = 13,
  Timeout = 14,
  TestModeFail = 15,
  SensorFailFatal = 16,
  SensorFailNonfatal = 17,
  InvalidDeviceCaps = 18,
  QuiesceIoInProgress = 19,
}

/// How severe a firmware status is for the running session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Severity {
  /// The command succeeded.
  None,
  /// Expected transient state, retry the command.
  Transient,
  /// Unrecoverable, the session cannot continue.
  Fatal,
}

impl Status {
  pub const fn from_raw(raw: u32) -> Option<Self> {
    match raw {
      0 => Some(Self::Success),
      1 => Some(Self::InvalidParams),
      2 => Some(Self::AccessDenied),
      3 => Some(Self::CmdSizeError),
      4 => Some(Self::NotReady),
      5 => Some(Self::RequestOutstanding),
      6 => Some(Self::NoSensorFound),
      7 => Some(Self::OutOfMemory),
      8 => Some(Self::InternalError),
      9 => Some(Self::SensorDisabled),
      10 => Some(Self::CompatCheckFail),
      11 => Some(Self::SensorExpectedReset),
      12 => Some(Self::SensorUnexpectedReset),
      13 => Some(Self::ResetFailed),
      14 => Some(Self::Timeout),
      15 => Some(Self::TestModeFail),
      16 => Some(Self::SensorFailFatal),
      17 => Some(Self::SensorFailNonfatal),
      18 => Some(Self::InvalidDeviceCaps),
      19 => Some(Self::QuiesceIoInProgress),
      _ => None,
    }
  }

  pub const fn severity(self) -> Severity {
    match self {
      Self::Success => Severity::None,
      Self::NotReady
      | Self::RequestOutstanding
      | Self::SensorExpectedReset
      | Self::SensorFailNonfatal
      | Self::QuiesceIoInProgress => Severity::Transient,
      _ => Severity::Fatal,
    }
  }

  pub const fn is_success(self) -> bool {
    matches!(self, Self::Success)
  }
}

/// Operating mode requested through SET_MODE.
///
/// Multitouch returns stylus and heatmap data. Singletouch exists on the wire
/// but is not supported by this driver, and newer sensor generations reject
/// it outright.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorMode {
  Singletouch = 0,
  Multitouch = 1,
}

impl SensorMode {
  pub const fn from_raw(raw: u32) -> Option<Self> {
    match raw {
      0 => Some(Self::Singletouch),
      1 => Some(Self::Multitouch),
      _ => None,
    }
  }
}

/// Parameters for SET_MODE. 16 bytes on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetModeCmd {
  pub mode: SensorMode,
}

impl SetModeCmd {
  fn encode(&self, buf: &mut [u8]) {
    put_u32(buf, 0, self.mode as u32);
  }

  fn parse(buf: &[u8]) -> Result<Self, ParseError> {
    let raw = get_u32(buf, 0);
    let mode = SensorMode::from_raw(raw).ok_or(ParseError::UnknownMode(raw))?;
    Ok(Self { mode })
  }
}

/// Parameters for SET_MEM_WINDOW. 320 bytes on the wire.
///
/// Registers the bus addresses of every buffer with the firmware in one
/// command. Each 64-bit address travels as separate lower and upper halves,
/// with the lower halves of all sixteen buffers grouped before the upper
/// halves. The feedback, workqueue and host2me regions have to be registered
/// even though the host never interprets them, otherwise the firmware refuses
/// to operate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetMemWindowCmd {
  pub data_addr_lower: [u32; BUFFERS],
  pub data_addr_upper: [u32; BUFFERS],
  pub workqueue_addr_lower: u32,
  pub workqueue_addr_upper: u32,
  pub doorbell_addr_lower: u32,
  pub doorbell_addr_upper: u32,
  pub feedback_addr_lower: [u32; BUFFERS],
  pub feedback_addr_upper: [u32; BUFFERS],
  pub host2me_addr_lower: u32,
  pub host2me_addr_upper: u32,
  pub host2me_size: u32,
  pub workqueue_item_size: u8,
  pub workqueue_size: u16,
}

impl SetMemWindowCmd {
  fn encode(&self, buf: &mut [u8]) {
    for i in 0..BUFFERS {
      put_u32(buf, i * 4, self.data_addr_lower[i]);
      put_u32(buf, 64 + i * 4, self.data_addr_upper[i]);
      put_u32(buf, 144 + i * 4, self.feedback_addr_lower[i]);
      put_u32(buf, 208 + i * 4, self.feedback_addr_upper[i]);
    }
    put_u32(buf, 128, self.workqueue_addr_lower);
    put_u32(buf, 132, self.workqueue_addr_upper);
    put_u32(buf, 136, self.doorbell_addr_lower);
    put_u32(buf, 140, self.doorbell_addr_upper);
    put_u32(buf, 272, self.host2me_addr_lower);
    put_u32(buf, 276, self.host2me_addr_upper);
    put_u32(buf, 280, self.host2me_size);
    // one reserved byte at 284
    buf[285] = self.workqueue_item_size;
    put_u16(buf, 286, self.workqueue_size);
    // 32 reserved bytes at 288
  }

  fn parse(buf: &[u8]) -> Result<Self, ParseError> {
    let mut cmd = Self::default();
    for i in 0..BUFFERS {
      cmd.data_addr_lower[i] = get_u32(buf, i * 4);
      cmd.data_addr_upper[i] = get_u32(buf, 64 + i * 4);
      cmd.feedback_addr_lower[i] = get_u32(buf, 144 + i * 4);
      cmd.feedback_addr_upper[i] = get_u32(buf, 208 + i * 4);
    }
    cmd.workqueue_addr_lower = get_u32(buf, 128);
    cmd.workqueue_addr_upper = get_u32(buf, 132);
    cmd.doorbell_addr_lower = get_u32(buf, 136);
    cmd.doorbell_addr_upper = get_u32(buf, 140);
    cmd.host2me_addr_lower = get_u32(buf, 272);
    cmd.host2me_addr_upper = get_u32(buf, 276);
    cmd.host2me_size = get_u32(buf, 280);
    cmd.workqueue_item_size = buf[285];
    cmd.workqueue_size = get_u16(buf, 286);
    Ok(cmd)
  }

  /// Data buffer address `i` recombined from its halves.
  pub fn data_addr(&self, i: usize) -> u64 {
    join_addr(self.data_addr_lower[i], self.data_addr_upper[i])
  }

  /// Feedback buffer address `i` recombined from its halves.
  pub fn feedback_addr(&self, i: usize) -> u64 {
    join_addr(self.feedback_addr_lower[i], self.feedback_addr_upper[i])
  }

  /// Doorbell buffer address recombined from its halves.
  pub fn doorbell_addr(&self) -> u64 {
    join_addr(self.doorbell_addr_lower, self.doorbell_addr_upper)
  }
}

/// Parameters for FEEDBACK. 16 bytes on the wire.
///
/// The transaction id must come out of the data buffer being acknowledged,
/// never from a host-side counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeedbackCmd {
  pub buffer: u32,
  pub transaction: u32,
}

impl FeedbackCmd {
  fn encode(&self, buf: &mut [u8]) {
    put_u32(buf, 0, self.buffer);
    put_u32(buf, 4, self.transaction);
    // 8 reserved bytes stay zero
  }

  fn parse(buf: &[u8]) -> Result<Self, ParseError> {
    Ok(Self { buffer: get_u32(buf, 0), transaction: get_u32(buf, 4) })
  }
}

/// Payload carried by a command, keyed by its event code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandPayload {
  None,
  SetMode(SetModeCmd),
  SetMemWindow(SetMemWindowCmd),
  Feedback(FeedbackCmd),
}

/// A host to firmware command frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
  pub code: EventCode,
  pub payload: CommandPayload,
}

impl Command {
  /// Command with no parameters. Unused payload bytes travel as zeros.
  pub const fn new(code: EventCode) -> Self {
    Self { code, payload: CommandPayload::None }
  }

  pub const fn set_mode(mode: SensorMode) -> Self {
    Self { code: EventCode::SetMode, payload: CommandPayload::SetMode(SetModeCmd { mode }) }
  }

  pub const fn set_mem_window(window: SetMemWindowCmd) -> Self {
    Self { code: EventCode::SetMemWindow, payload: CommandPayload::SetMemWindow(window) }
  }

  pub const fn feedback(buffer: u32, transaction: u32) -> Self {
    Self { code: EventCode::Feedback, payload: CommandPayload::Feedback(FeedbackCmd { buffer, transaction }) }
  }

  /// Serialize into the fixed 324-byte wire frame.
  pub fn encode(&self) -> [u8; COMMAND_SIZE] {
    let mut buf = [0u8; COMMAND_SIZE];
    put_u32(&mut buf, 0, self.code as u32);
    match &self.payload {
      CommandPayload::None => {}
      CommandPayload::SetMode(cmd) => cmd.encode(&mut buf[4..]),
      CommandPayload::SetMemWindow(cmd) => cmd.encode(&mut buf[4..]),
      CommandPayload::Feedback(cmd) => cmd.encode(&mut buf[4..]),
    }
    buf
  }

  /// Decode a command frame, selecting the payload variant by code.
  pub fn parse(frame: &[u8]) -> Result<Self, ParseError> {
    if frame.len() < COMMAND_SIZE {
      return Err(ParseError::Truncated { len: frame.len() });
    }
    let raw = get_u32(frame, 0);
    let code = EventCode::from_raw(raw).ok_or(ParseError::UnknownCode(raw))?;
    let payload = match code {
      EventCode::SetMode => CommandPayload::SetMode(SetModeCmd::parse(&frame[4..])?),
      EventCode::SetMemWindow => CommandPayload::SetMemWindow(SetMemWindowCmd::parse(&frame[4..])?),
      EventCode::Feedback => CommandPayload::Feedback(FeedbackCmd::parse(&frame[4..])?),
      _ => CommandPayload::None,
    };
    Ok(Self { code, payload })
  }
}

/// Identity and buffer sizing reported by GET_DEVICE_INFO. 44 bytes on the
/// wire inside the response payload.
///
/// `data_size` and `feedback_size` size every buffer allocated later and must
/// be known before any buffer exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceInfo {
  pub vendor_id: u16,
  pub device_id: u16,
  pub hw_rev: u32,
  pub fw_rev: u32,
  pub data_size: u32,
  pub feedback_size: u32,
}

impl DeviceInfo {
  pub fn parse(buf: &[u8]) -> Result<Self, ParseError> {
    if buf.len() < DEVICE_INFO_SIZE {
      return Err(ParseError::Truncated { len: buf.len() });
    }
    Ok(Self {
      vendor_id: get_u16(buf, 0),
      device_id: get_u16(buf, 2),
      hw_rev: get_u32(buf, 4),
      fw_rev: get_u32(buf, 8),
      data_size: get_u32(buf, 12),
      feedback_size: get_u32(buf, 16),
    })
  }

  pub fn encode(&self) -> [u8; DEVICE_INFO_SIZE] {
    let mut buf = [0u8; DEVICE_INFO_SIZE];
    put_u16(&mut buf, 0, self.vendor_id);
    put_u16(&mut buf, 2, self.device_id);
    put_u32(&mut buf, 4, self.hw_rev);
    put_u32(&mut buf, 8, self.fw_rev);
    put_u32(&mut buf, 12, self.data_size);
    put_u32(&mut buf, 16, self.feedback_size);
    buf
  }
}

/// Payload carried by a response, keyed by its code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponsePayload {
  DeviceInfo(DeviceInfo),
  Opaque([u8; RESPONSE_PAYLOAD_SIZE]),
}

/// A firmware to host response frame.
///
/// The code is kept raw so a mismatched or unknown code can be reported
/// against the outstanding command instead of failing the decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Response {
  pub code: u32,
  pub status: Status,
  pub payload: ResponsePayload,
}

impl Response {
  /// Decode the fixed 88-byte response frame.
  pub fn parse(frame: &[u8]) -> Result<Self, ParseError> {
    if frame.len() < RESPONSE_SIZE {
      return Err(ParseError::Truncated { len: frame.len() });
    }
    let code = get_u32(frame, 0);
    let raw_status = get_u32(frame, 4);
    let status = Status::from_raw(raw_status).ok_or(ParseError::UnknownStatus(raw_status))?;
    let payload = if code == EventCode::GetDeviceInfo.response() {
      ResponsePayload::DeviceInfo(DeviceInfo::parse(&frame[8..])?)
    } else {
      let mut raw = [0u8; RESPONSE_PAYLOAD_SIZE];
      raw.copy_from_slice(&frame[8..RESPONSE_SIZE]);
      ResponsePayload::Opaque(raw)
    };
    Ok(Self { code, status, payload })
  }

  /// Serialize into the fixed 88-byte wire frame.
  pub fn encode(&self) -> [u8; RESPONSE_SIZE] {
    let mut buf = [0u8; RESPONSE_SIZE];
    put_u32(&mut buf, 0, self.code);
    put_u32(&mut buf, 4, self.status as u32);
    match &self.payload {
      ResponsePayload::DeviceInfo(info) => buf[8..8 + DEVICE_INFO_SIZE].copy_from_slice(&info.encode()),
      ResponsePayload::Opaque(raw) => buf[8..].copy_from_slice(raw),
    }
    buf
  }
}

/// Errors produced while decoding a wire frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
  /// Frame shorter than the fixed wire size.
  Truncated { len: usize },
  /// Command code outside the defined range.
  UnknownCode(u32),
  /// Status word outside the defined range.
  UnknownStatus(u32),
  /// Sensor mode outside the defined range.
  UnknownMode(u32),
}

pub(crate) const fn split_addr(addr: u64) -> (u32, u32) {
  (addr as u32, (addr >> 32) as u32)
}

pub(crate) const fn join_addr(lower: u32, upper: u32) -> u64 {
  (upper as u64) << 32 | lower as u64
}

fn put_u16(buf: &mut [u8], at: usize, v: u16) {
  buf[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, v: u32) {
  buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

fn get_u16(buf: &[u8], at: usize) -> u16 {
  u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn get_u32(buf: &[u8], at: usize) -> u32 {
  u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn frame_sizes_are_wire_exact() {
    assert_eq!(Command::new(EventCode::GetDeviceInfo).encode().len(), 324);
    assert_eq!(
      Response { code: EventCode::QuiesceIo.response(), status: Status::Success, payload: ResponsePayload::Opaque([0; 80]) }
        .encode()
        .len(),
      88
    );
    assert_eq!(SET_MODE_SIZE, 16);
    assert_eq!(SET_MEM_WINDOW_SIZE, 320);
    assert_eq!(FEEDBACK_SIZE, 16);
    assert_eq!(DEVICE_INFO_SIZE, 44);
    assert_eq!(COMMAND_SIZE, 4 + SET_MEM_WINDOW_SIZE);
    assert_eq!(RESPONSE_SIZE, 8 + RESPONSE_PAYLOAD_SIZE);
  }

  #[test]
  fn response_code_is_command_code_plus_offset() {
    let codes = [
      EventCode::GetDeviceInfo,
      EventCode::SetMode,
      EventCode::SetMemWindow,
      EventCode::QuiesceIo,
      EventCode::ReadyForData,
      EventCode::Feedback,
      EventCode::ClearMemWindow,
      EventCode::NotifyDevReady,
    ];
    for (i, code) in codes.into_iter().enumerate() {
      assert_eq!(code as u32, i as u32 + 1);
      assert_eq!(code.response(), code as u32 + 0x8000_0000);
    }
    assert_eq!(EventCode::from_raw(0), None);
    assert_eq!(EventCode::from_raw(9), None);
  }

  #[test]
  fn set_mode_layout() {
    let frame = Command::set_mode(SensorMode::Multitouch).encode();
    assert_eq!(&frame[..4], &2u32.to_le_bytes());
    assert_eq!(&frame[4..8], &1u32.to_le_bytes());
    // reserved bytes and the unused payload tail stay zero
    assert!(frame[8..].iter().all(|b| *b == 0));
  }

  #[test]
  fn feedback_layout() {
    let frame = Command::feedback(9, 0xdead_beef).encode();
    assert_eq!(&frame[..4], &6u32.to_le_bytes());
    assert_eq!(&frame[4..8], &9u32.to_le_bytes());
    assert_eq!(&frame[8..12], &0xdead_beefu32.to_le_bytes());
    assert!(frame[12..].iter().all(|b| *b == 0));
  }

  #[test]
  fn set_mem_window_layout() {
    let mut window = SetMemWindowCmd::default();
    for i in 0..BUFFERS {
      (window.data_addr_lower[i], window.data_addr_upper[i]) = split_addr(0x1_0000_0000 + i as u64 * 0x1000);
      (window.feedback_addr_lower[i], window.feedback_addr_upper[i]) = split_addr(0x2_0000_0000 + i as u64 * 0x100);
    }
    (window.doorbell_addr_lower, window.doorbell_addr_upper) = split_addr(0x3_0000_0004);
    (window.workqueue_addr_lower, window.workqueue_addr_upper) = split_addr(0x4_0000_0008);
    (window.host2me_addr_lower, window.host2me_addr_upper) = split_addr(0x5_0000_000c);
    window.workqueue_item_size = WORKQUEUE_ITEM_SIZE;
    window.workqueue_size = WORKQUEUE_SIZE;

    let frame = Command::set_mem_window(window).encode();
    assert_eq!(&frame[..4], &3u32.to_le_bytes());
    let body = &frame[4..];
    // spot checks straight against the documented offsets
    assert_eq!(&body[0..4], &window.data_addr_lower[0].to_le_bytes());
    assert_eq!(&body[60..64], &window.data_addr_lower[15].to_le_bytes());
    assert_eq!(&body[64..68], &window.data_addr_upper[0].to_le_bytes());
    assert_eq!(&body[128..132], &window.workqueue_addr_lower.to_le_bytes());
    assert_eq!(&body[136..140], &window.doorbell_addr_lower.to_le_bytes());
    assert_eq!(&body[144..148], &window.feedback_addr_lower[0].to_le_bytes());
    assert_eq!(&body[208..212], &window.feedback_addr_upper[0].to_le_bytes());
    assert_eq!(&body[272..276], &window.host2me_addr_lower.to_le_bytes());
    assert_eq!(body[284], 0);
    assert_eq!(body[285], 16);
    assert_eq!(&body[286..288], &8192u16.to_le_bytes());
    assert!(body[288..].iter().all(|b| *b == 0));

    // halves recombine to the original addresses
    let parsed = match Command::parse(&frame).unwrap().payload {
      CommandPayload::SetMemWindow(cmd) => cmd,
      other => panic!("wrong payload variant: {other:?}"),
    };
    for i in 0..BUFFERS {
      assert_eq!(parsed.data_addr(i), 0x1_0000_0000 + i as u64 * 0x1000);
      assert_eq!(parsed.feedback_addr(i), 0x2_0000_0000 + i as u64 * 0x100);
    }
    assert_eq!(parsed.doorbell_addr(), 0x3_0000_0004);
  }

  #[test]
  fn device_info_response_decodes_as_tagged_payload() {
    let info = DeviceInfo {
      vendor_id: 0x8087,
      device_id: 0x1234,
      hw_rev: 3,
      fw_rev: 0x0101,
      data_size: 1024,
      feedback_size: 256,
    };
    let rsp = Response {
      code: EventCode::GetDeviceInfo.response(),
      status: Status::Success,
      payload: ResponsePayload::DeviceInfo(info),
    };
    let frame = rsp.encode();
    assert_eq!(&frame[..4], &0x8000_0001u32.to_le_bytes());
    assert_eq!(&frame[8..10], &0x8087u16.to_le_bytes());
    assert_eq!(&frame[20..24], &1024u32.to_le_bytes());

    let parsed = Response::parse(&frame).unwrap();
    assert_eq!(parsed.status, Status::Success);
    assert_eq!(parsed.payload, ResponsePayload::DeviceInfo(info));
  }

  #[test]
  fn non_info_responses_stay_opaque() {
    let rsp = Response {
      code: EventCode::Feedback.response(),
      status: Status::InvalidParams,
      payload: ResponsePayload::Opaque([0xa5; RESPONSE_PAYLOAD_SIZE]),
    };
    let parsed = Response::parse(&rsp.encode()).unwrap();
    assert!(matches!(parsed.payload, ResponsePayload::Opaque(raw) if raw == [0xa5; RESPONSE_PAYLOAD_SIZE]));
  }

  #[test]
  fn malformed_frames_are_rejected() {
    assert_eq!(Response::parse(&[0u8; 87]), Err(ParseError::Truncated { len: 87 }));

    let mut frame = [0u8; RESPONSE_SIZE];
    frame[4..8].copy_from_slice(&20u32.to_le_bytes());
    assert_eq!(Response::parse(&frame), Err(ParseError::UnknownStatus(20)));

    let mut frame = [0u8; COMMAND_SIZE];
    frame[..4].copy_from_slice(&99u32.to_le_bytes());
    assert_eq!(Command::parse(&frame), Err(ParseError::UnknownCode(99)));
  }

  #[test]
  fn severity_classification() {
    assert_eq!(Status::Success.severity(), Severity::None);
    for transient in [
      Status::NotReady,
      Status::RequestOutstanding,
      Status::SensorExpectedReset,
      Status::SensorFailNonfatal,
      Status::QuiesceIoInProgress,
    ] {
      assert_eq!(transient.severity(), Severity::Transient);
    }
    for fatal in [
      Status::InvalidParams,
      Status::OutOfMemory,
      Status::InternalError,
      Status::CompatCheckFail,
      Status::SensorUnexpectedReset,
      Status::ResetFailed,
      Status::SensorFailFatal,
      Status::InvalidDeviceCaps,
    ] {
      assert_eq!(fatal.severity(), Severity::Fatal);
    }
  }

  #[test]
  fn address_halves_recombine_losslessly() {
    for addr in [0u64, 0xffff_ffff, 0x1_0000_0000, 0xdead_beef_cafe_f00d, u64::MAX] {
      let (lower, upper) = split_addr(addr);
      assert_eq!(join_addr(lower, upper), addr);
    }
  }
}
