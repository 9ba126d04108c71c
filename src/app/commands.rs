//! Inbound remote commands.
//!
//! A [`RemoteCommand`] is one message drained from the pump-command
//! subscription.  Its [`PumpIntent`] is parsed from the full payload bytes
//! when the message arrives; the stored payload text is a bounded copy for
//! logging only.  Nothing is persisted.
//!
//! Payload parsing follows C `atoi` over raw bytes: leading whitespace is
//! skipped, an optional sign is accepted, and the longest run of digits that
//! follows is the value.  Bytes after the digits, valid UTF-8 or not, are
//! ignored.  Anything unparseable is 0.  Only a value of exactly 1 means
//! "water now"; every other value, including malformed text, means "stop".

pub const TOPIC_CAP: usize = 64;
pub const PAYLOAD_CAP: usize = 32;

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub topic: heapless::String<TOPIC_CAP>,
    /// Payload text, lossily decoded and cut to `PAYLOAD_CAP`.
    pub payload: heapless::String<PAYLOAD_CAP>,
    intent: PumpIntent,
}

impl RemoteCommand {
    pub fn new(topic: &str, payload: &str) -> Self {
        Self::from_bytes(topic, payload.as_bytes())
    }

    /// Build a command from a raw transport payload.  The intent is parsed
    /// before anything is truncated.
    pub fn from_bytes(topic: &str, payload: &[u8]) -> Self {
        Self {
            topic: truncated(topic),
            payload: truncated(&String::from_utf8_lossy(payload)),
            intent: PumpIntent::from_bytes(payload),
        }
    }

    pub fn intent(&self) -> PumpIntent {
        self.intent
    }
}

fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// What a remote command asks the pump to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpIntent {
    WaterNow,
    Stop,
}

impl PumpIntent {
    pub fn from_payload(payload: &str) -> Self {
        Self::from_bytes(payload.as_bytes())
    }

    pub fn from_bytes(payload: &[u8]) -> Self {
        if atoi_bytes(payload) == 1 {
            Self::WaterNow
        } else {
            Self::Stop
        }
    }
}

/// C-style `atoi`: never fails, saturates instead of overflowing.
pub fn atoi(text: &str) -> i32 {
    atoi_bytes(text.as_bytes())
}

/// [`atoi`] over raw bytes.  Whitespace is the C `isspace` set.
pub fn atoi_bytes(bytes: &[u8]) -> i32 {
    let start = bytes
        .iter()
        .position(|&b| !matches!(b, b' ' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r'))
        .unwrap_or(bytes.len());
    let s = &bytes[start..];
    let (negative, digits) = match s.first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let magnitude = digits
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0i32, |acc, b| acc.saturating_mul(10).saturating_add(i32::from(b - b'0')));
    if negative { -magnitude } else { magnitude }
}
