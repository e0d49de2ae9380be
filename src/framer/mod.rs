//! Byte-oriented frame receiver/writer, per spec §4.6.
//!
//! Grounded on `diminuto_framer.c`'s `diminuto_framer_machine` (the
//! two-switch state/action FSM), `_emit`/`_writer`/`_abort` (the five-step
//! wire writer), and `_reader`/`_read` (the pump-while-available helpers).
//! Wire format: `FLAG <esc>length[4] <esc>fletcher[2] <esc>payload[0..] kermit[3] FLAG`.

pub mod fletcher;
pub mod kermit;

use crate::error::{Error, Result};

/// Reserved framing octets, per spec §4.6.
pub const FLAG: u8 = 0x7e;
pub const ESCAPE: u8 = 0x7d;
pub const XON: u8 = 0x11;
pub const XOFF: u8 = 0x13;
const MASK: u8 = 0x20;

/// `2^16 - 8`: the largest payload a frame can carry.
pub const MAX_PAYLOAD: usize = 65_528;

/// How close to a 16-bit sequence number's wraparound point counts as
/// "near" or "far" end, per the (AMBIENT) sequence-metadata supplement in
/// spec §4.6/§9. These hints are informational only and never gate a state
/// transition.
const NEAR_THRESHOLD: u16 = 0x0100;

/// The receive state machine's states, per spec §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum State {
    Reset,
    Flag,
    Length,
    LengthEscaped,
    Fletcher,
    FletcherEscaped,
    Payload,
    PayloadEscaped,
    Kermit,
    Complete,
    Final,
    Abort,
    Failed,
    Overflow,
    Invalid,
    Idle,
}

/// The side effect `machine` applies once a transition is decided, ported
/// from `diminuto_framer.c`'s `action_t`.
enum Action {
    Fletcher,
    Kermit,
    Length,
    Payload,
    Reset,
    Skip,
    Store,
}

/// Which accumulator [`Action::Store`] writes into, tracked explicitly
/// because Rust has no analog to the C source's single reused `here`
/// pointer walking between four different backing arrays.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Target {
    Length,
    Fletcher,
    Payload,
    Kermit,
}

/// A bounded receive buffer plus the running accumulators and state needed
/// to turn an untrusted byte stream into length-delimited frames.
pub struct Framer {
    state: State,
    target: Target,
    limit: usize,
    length_buf: [u8; 4],
    length: u32,
    a: u8,
    b: u8,
    sum: [u8; 2],
    buffer: Vec<u8>,
    capacity: usize,
    crc: u16,
    check: [u8; 3],
    total: usize,
    incoming_sequence: Option<u16>,
    outgoing_sequence: u16,
    rollover_flag: bool,
    nearend_flag: bool,
    farend_flag: bool,
    missing: u32,
    duplicated: u32,
}

impl Framer {
    /// Builds a receiver with a payload buffer of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Framer {
            state: State::Reset,
            target: Target::Length,
            limit: 0,
            length_buf: [0; 4],
            length: 0,
            a: 0,
            b: 0,
            sum: [0; 2],
            buffer: Vec::with_capacity(capacity),
            capacity,
            crc: 0,
            check: [0; 3],
            total: 0,
            incoming_sequence: None,
            outgoing_sequence: 0,
            rollover_flag: false,
            nearend_flag: false,
            farend_flag: false,
            missing: 0,
            duplicated: 0,
        }
    }

    /// Returns to `RESET`, ready to receive the next frame. Called
    /// automatically after every terminal state by [`Self::reader`].
    pub fn reset(&mut self) {
        self.state = State::Reset;
        self.target = Target::Length;
        self.limit = 0;
        self.length = 0;
        self.a = 0;
        self.b = 0;
        self.crc = 0;
        self.total = 0;
        self.buffer.clear();
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The completed frame's payload. Only meaningful once `state()` is
    /// `Complete`.
    pub fn payload(&self) -> &[u8] {
        &self.buffer
    }

    fn store(&mut self, ch: u8) {
        match self.target {
            Target::Length => {
                let idx = 4 - self.limit;
                self.length_buf[idx] = ch;
            }
            Target::Fletcher => {
                let idx = 2 - self.limit;
                self.sum[idx] = ch;
            }
            Target::Payload => self.buffer.push(ch),
            Target::Kermit => {
                let idx = 3 - self.limit;
                self.check[idx] = ch;
            }
        }
        self.limit -= 1;
    }

    /// Advances the state machine by one octet (`None` signals EOF).
    /// Ports `diminuto_framer_machine`'s state-then-action two-switch
    /// structure verbatim.
    pub fn machine(&mut self, token: Option<u8>) -> State {
        let Some(ch) = token else {
            self.state = State::Final;
            return self.state;
        };

        let mut action = Action::Skip;
        let mut ch = ch;

        match self.state {
            State::Reset => {
                if ch == FLAG {
                    action = Action::Reset;
                    self.state = State::Flag;
                }
            }
            State::Flag => match ch {
                FLAG => {}
                ESCAPE => self.state = State::LengthEscaped,
                XON | XOFF => self.state = State::Invalid,
                _ => {
                    action = Action::Store;
                    self.state = State::Length;
                }
            },
            State::Length => match ch {
                FLAG => {
                    action = Action::Reset;
                    self.state = State::Flag;
                }
                ESCAPE => self.state = State::LengthEscaped,
                XON | XOFF => self.state = State::Invalid,
                _ => {
                    if self.limit > 1 {
                        action = Action::Store;
                    } else {
                        action = Action::Length;
                        self.state = State::Fletcher;
                    }
                }
            },
            State::LengthEscaped => match ch {
                FLAG => self.state = State::Abort,
                ESCAPE | XON | XOFF => self.state = State::Invalid,
                _ => {
                    ch ^= MASK;
                    if self.limit > 1 {
                        action = Action::Store;
                        self.state = State::Length;
                    } else {
                        action = Action::Length;
                        self.state = State::Fletcher;
                    }
                }
            },
            State::Fletcher => match ch {
                FLAG => {
                    action = Action::Reset;
                    self.state = State::Flag;
                }
                ESCAPE => self.state = State::FletcherEscaped,
                XON | XOFF => self.state = State::Invalid,
                _ => {
                    if self.limit > 1 {
                        action = Action::Store;
                    } else {
                        action = Action::Fletcher;
                        self.state = State::Payload;
                    }
                }
            },
            State::FletcherEscaped => match ch {
                FLAG => self.state = State::Abort,
                ESCAPE | XON | XOFF => self.state = State::Invalid,
                _ => {
                    ch ^= MASK;
                    if self.limit > 1 {
                        action = Action::Store;
                        self.state = State::Fletcher;
                    } else {
                        action = Action::Fletcher;
                        self.state = State::Payload;
                    }
                }
            },
            State::Payload => match ch {
                FLAG => {
                    action = Action::Reset;
                    self.state = State::Flag;
                }
                ESCAPE => self.state = State::PayloadEscaped,
                XON | XOFF => self.state = State::Invalid,
                _ => {
                    if self.limit > 1 {
                        action = Action::Store;
                    } else {
                        action = Action::Payload;
                        self.state = State::Kermit;
                    }
                }
            },
            State::PayloadEscaped => match ch {
                FLAG => self.state = State::Abort,
                ESCAPE | XON | XOFF => self.state = State::Invalid,
                _ => {
                    ch ^= MASK;
                    if self.limit > 1 {
                        action = Action::Store;
                        self.state = State::Payload;
                    } else {
                        action = Action::Payload;
                        self.state = State::Kermit;
                    }
                }
            },
            State::Kermit => match ch {
                FLAG => {
                    action = Action::Reset;
                    self.state = State::Flag;
                }
                ESCAPE | XON | XOFF => self.state = State::Invalid,
                _ => {
                    let valid = match self.limit {
                        3 => kermit::first_is_valid(ch),
                        2 => kermit::second_is_valid(ch),
                        1 => kermit::third_is_valid(ch),
                        _ => false,
                    };
                    if !valid {
                        self.state = State::Invalid;
                    } else if self.limit == 1 {
                        action = Action::Kermit;
                        self.state = State::Complete;
                    } else {
                        action = Action::Store;
                    }
                }
            },
            State::Complete
            | State::Final
            | State::Abort
            | State::Failed
            | State::Overflow
            | State::Invalid
            | State::Idle => {}
        }

        match action {
            Action::Reset => {
                self.target = Target::Length;
                self.limit = 4;
                self.total = 0;
                self.length = 0;
                self.crc = 0;
                self.a = 0;
                self.b = 0;
            }
            Action::Store => self.store(ch),
            Action::Length => {
                self.store(ch);
                fletcher::fletcher16(&self.length_buf, &mut self.a, &mut self.b);
                self.length = u32::from_be_bytes(self.length_buf);
                self.target = Target::Fletcher;
                self.limit = 2;
            }
            Action::Fletcher => {
                self.store(ch);
                if self.sum != [self.a, self.b] {
                    self.state = State::Failed;
                } else if self.length == 0 {
                    self.target = Target::Kermit;
                    self.limit = 3;
                    self.state = State::Kermit;
                } else if self.length as usize > self.capacity {
                    self.state = State::Overflow;
                } else {
                    self.buffer.clear();
                    self.target = Target::Payload;
                    self.limit = self.length as usize;
                }
            }
            Action::Payload => {
                self.store(ch);
                self.crc = kermit::kermit16(&self.buffer, 0);
                self.target = Target::Kermit;
                self.limit = 3;
            }
            Action::Kermit => {
                self.store(ch);
                let crc = kermit::chars_to_crc(self.check[0], self.check[1], self.check[2]);
                if crc != self.crc {
                    self.state = State::Failed;
                }
            }
            Action::Skip => {}
        }

        self.state
    }

    /// Pumps one octet at a time from `source` while bytes are locally
    /// available. Returns `Ok(0)` if a frame is still in progress, or
    /// `Ok(total_octets)` for the octet count of a just-completed frame.
    /// Terminal conditions other than completion surface as the matching
    /// [`Error`] variant (spec §7: these are local/recoverable — the
    /// framer has already reset by the time the error is returned).
    ///
    /// Ports `diminuto_framer_reader`'s do-while-bytes-available loop,
    /// including its special case for a zero-length frame (logged and
    /// silently reset rather than reported as a completed frame).
    pub fn reader<R: FrameSource>(&mut self, source: &mut R) -> Result<usize> {
        loop {
            let token = source.read_byte().map_err(Error::Io)?;
            if token.is_some() {
                self.total += 1;
            }
            match self.machine(token) {
                State::Complete => {
                    if self.length == 0 {
                        self.reset();
                    } else {
                        return Ok(self.total);
                    }
                }
                State::Final => return Err(Error::Eof),
                State::Abort => {
                    self.reset();
                    return Err(Error::Aborted);
                }
                State::Failed => {
                    self.reset();
                    return Err(Error::Failed);
                }
                State::Overflow => {
                    self.reset();
                    return Err(Error::Overflow);
                }
                State::Invalid => {
                    self.reset();
                    return Err(Error::InvalidFrame);
                }
                _ => {}
            }
            if !source.has_buffered() {
                return Ok(0);
            }
        }
    }

    /// Loops [`Self::reader`] until a frame completes, transparently
    /// retrying past the local/recoverable terminal states, and returns the
    /// completed payload. Ports `diminuto_framer_read`.
    pub fn read<R: FrameSource>(&mut self, source: &mut R) -> Result<&[u8]> {
        loop {
            match self.reader(source) {
                Ok(0) => continue,
                Ok(_) => return Ok(&self.buffer[..self.length as usize]),
                Err(Error::Aborted)
                | Err(Error::Failed)
                | Err(Error::Overflow)
                | Err(Error::InvalidFrame) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Writes one complete frame (FLAG, escaped length, escaped
    /// Fletcher-16, escaped payload, un-escaped 3-char Kermit, FLAG) to
    /// `writer`, flushing at the end. Ports `diminuto_framer_writer`.
    pub fn write_frame<W: std::io::Write>(writer: &mut W, data: &[u8]) -> Result<usize> {
        if data.len() > MAX_PAYLOAD {
            return Err(Error::TooBig);
        }

        let mut total = 0usize;

        writer.write_all(&[FLAG])?;
        total += 1;

        let header = (data.len() as u32).to_be_bytes();
        total += emit(writer, &header)?;

        let mut a = 0u8;
        let mut b = 0u8;
        fletcher::fletcher16(&header, &mut a, &mut b);
        total += emit(writer, &[a, b])?;

        total += emit(writer, data)?;

        let crc = kermit::kermit16(data, 0);
        let (c1, c2, c3) = kermit::crc_to_chars(crc);
        writer.write_all(&[c1, c2, c3])?;
        total += 3;

        writer.write_all(&[FLAG])?;
        total += 1;

        writer.flush()?;
        Ok(total)
    }

    /// Writes the explicit `ESCAPE, FLAG` abort sequence and flushes. Ports
    /// `diminuto_framer_abort`.
    pub fn abort<W: std::io::Write>(writer: &mut W) -> Result<usize> {
        writer.write_all(&[ESCAPE, FLAG])?;
        writer.flush()?;
        Ok(2)
    }

    /// Records the sequence number of a just-completed frame's first two
    /// payload bytes, the way a caller following `framertool.c`'s sequencing
    /// convention would. Purely informational per spec §4.6/§9: none of
    /// this gates `machine`'s transitions.
    pub fn note_sequence(&mut self, seq: u16) {
        self.rollover_flag = false;
        if let Some(prev) = self.incoming_sequence {
            let expected = prev.wrapping_add(1);
            if seq == expected {
                // In order; nothing to note.
            } else if prev > u16::MAX - NEAR_THRESHOLD && seq < NEAR_THRESHOLD {
                self.rollover_flag = true;
            } else {
                let gap = seq.wrapping_sub(expected);
                if gap < 0x8000 {
                    self.missing = self.missing.saturating_add(u32::from(gap));
                } else {
                    self.duplicated = self.duplicated.saturating_add(1);
                }
            }
        }
        self.incoming_sequence = Some(seq);
        self.nearend_flag = seq < NEAR_THRESHOLD;
        self.farend_flag = seq > u16::MAX - NEAR_THRESHOLD;
    }

    /// The next outgoing sequence number, incrementing on each call, for a
    /// caller that embeds one in its payload's first two bytes.
    pub fn next_sequence(&mut self) -> u16 {
        let seq = self.outgoing_sequence;
        self.outgoing_sequence = self.outgoing_sequence.wrapping_add(1);
        seq
    }

    pub fn did_rollover(&self) -> bool {
        self.rollover_flag
    }

    pub fn did_nearend(&self) -> bool {
        self.nearend_flag
    }

    pub fn did_farend(&self) -> bool {
        self.farend_flag
    }

    pub fn get_missing(&self) -> u32 {
        self.missing
    }

    pub fn get_duplicated(&self) -> u32 {
        self.duplicated
    }
}

/// Emits `data`, escaping `FLAG`/`ESCAPE`/`XON`/`XOFF` as `ESCAPE, byte ^
/// MASK`. Ports `diminuto_framer_emit`.
fn emit<W: std::io::Write>(writer: &mut W, data: &[u8]) -> std::io::Result<usize> {
    let mut n = 0;
    for &byte in data {
        match byte {
            FLAG | ESCAPE | XON | XOFF => {
                writer.write_all(&[ESCAPE, byte ^ MASK])?;
                n += 2;
            }
            _ => {
                writer.write_all(&[byte])?;
                n += 1;
            }
        }
    }
    Ok(n)
}

/// The byte-stream abstraction spec §6 requires: one octet at a time, plus
/// a predicate for "more bytes already available without blocking" (the
/// teacher's ffi layer wraps raw descriptors; this trait is the buffered
/// stream spec §6 calls for, parallel to `diminuto_file_ready`/
/// `diminuto_serial_available`).
pub trait FrameSource {
    fn read_byte(&mut self) -> std::io::Result<Option<u8>>;
    fn has_buffered(&mut self) -> bool {
        false
    }
}

impl<R: std::io::BufRead> FrameSource for R {
    fn read_byte(&mut self) -> std::io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            return match self.read(&mut byte) {
                Ok(0) => Ok(None),
                Ok(_) => Ok(Some(byte[0])),
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => Err(e),
            };
        }
    }

    fn has_buffered(&mut self) -> bool {
        matches!(self.fill_buf(), Ok(buf) if !buf.is_empty())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn feed(framer: &mut Framer, bytes: &[u8]) -> State {
        let mut state = framer.state();
        for &byte in bytes {
            state = framer.machine(Some(byte));
        }
        state
    }

    #[test]
    fn empty_payload_frame_round_trips() {
        // spec §8 scenario 1.
        let mut out = Vec::new();
        let written = Framer::write_frame(&mut out, &[]).unwrap();
        assert_eq!(written, out.len());
        assert_eq!(out[0], FLAG);
        assert_eq!(&out[1..5], &[0, 0, 0, 0]);
        assert_eq!(&out[5..7], &[0, 0]);
        assert_eq!(&out[7..10], b"   ");
        assert_eq!(out[10], FLAG);

        let mut framer = Framer::new(1024);
        let state = feed(&mut framer, &out);
        assert_eq!(state, State::Complete);
        assert_eq!(framer.payload(), &[] as &[u8]);
    }

    #[test]
    fn byte_stuffing_round_trips_control_octets() {
        // spec §8 scenario 2.
        let payload = [FLAG, ESCAPE, XON, XOFF];
        let mut out = Vec::new();
        Framer::write_frame(&mut out, &payload).unwrap();

        // Bytes 1..5 are the escaped length (0,0,0,4 has no bytes needing
        // escaping); bytes 5..7 are the escaped Fletcher; the escaped
        // payload region follows immediately after.
        let payload_region_start = 1 + 4 + 2;
        let expected_region = [
            ESCAPE, 0x7e ^ MASK, ESCAPE, 0x7d ^ MASK, ESCAPE, 0x11 ^ MASK, ESCAPE, 0x13 ^ MASK,
        ];
        assert_eq!(
            &out[payload_region_start..payload_region_start + expected_region.len()],
            &expected_region
        );

        let mut framer = Framer::new(1024);
        let state = feed(&mut framer, &out);
        assert_eq!(state, State::Complete);
        assert_eq!(framer.payload(), &payload);
    }

    #[test]
    fn large_payload_round_trips() {
        let payload: Vec<u8> = (0..2000u32).map(|i| (i % 256) as u8).collect();
        let mut out = Vec::new();
        Framer::write_frame(&mut out, &payload).unwrap();

        let mut framer = Framer::new(4096);
        let state = feed(&mut framer, &out);
        assert_eq!(state, State::Complete);
        assert_eq!(framer.payload(), payload.as_slice());
    }

    #[test]
    fn write_frame_rejects_oversized_payload() {
        let mut out = Vec::new();
        let oversized = vec![0u8; MAX_PAYLOAD + 1];
        assert!(matches!(
            Framer::write_frame(&mut out, &oversized),
            Err(Error::TooBig)
        ));
    }

    #[test]
    fn abort_sequence_reaches_abort_within_two_bytes() {
        // spec §8 scenario 3.
        let mut framer = Framer::new(1024);
        feed(&mut framer, &[FLAG, 0, 0, 0, 4]);
        let mut a = 0u8;
        let mut b = 0u8;
        fletcher::fletcher16(&[0, 0, 0, 4], &mut a, &mut b);
        feed(&mut framer, &[a, b]);
        assert_eq!(framer.state(), State::Payload);

        let state = feed(&mut framer, &[ESCAPE, FLAG]);
        assert_eq!(state, State::Abort);

        framer.reset();
        let mut out = Vec::new();
        Framer::write_frame(&mut out, b"hi").unwrap();
        let state = feed(&mut framer, &out);
        assert_eq!(state, State::Complete);
        assert_eq!(framer.payload(), b"hi");
    }

    #[test]
    fn abort_helper_writes_the_explicit_sequence() {
        let mut out = Vec::new();
        Framer::abort(&mut out).unwrap();
        assert_eq!(out, vec![ESCAPE, FLAG]);
    }

    #[test]
    fn mismatched_fletcher_fails() {
        let mut framer = Framer::new(1024);
        feed(&mut framer, &[FLAG, 0, 0, 0, 1]);
        let state = feed(&mut framer, &[0xff, 0xff]);
        assert_eq!(state, State::Failed);
    }

    #[test]
    fn overflow_when_length_exceeds_capacity() {
        let mut framer = Framer::new(2);
        let mut out = Vec::new();
        Framer::write_frame(&mut out, &[1, 2, 3, 4]).unwrap();
        let state = feed(&mut framer, &out);
        assert_eq!(state, State::Overflow);
    }

    #[test]
    fn unescaped_xon_during_length_is_invalid() {
        let mut framer = Framer::new(1024);
        let state = feed(&mut framer, &[FLAG, XON]);
        assert_eq!(state, State::Invalid);
    }

    #[test]
    fn reader_reports_a_completed_frame() {
        let mut out = Vec::new();
        Framer::write_frame(&mut out, b"ping").unwrap();
        let mut source = Cursor::new(out);
        let mut framer = Framer::new(1024);
        let total = framer.reader(&mut source).unwrap();
        assert!(total > 0);
        assert_eq!(framer.payload(), b"ping");
    }

    #[test]
    fn reader_reports_eof_on_empty_stream() {
        let mut source = Cursor::new(Vec::new());
        let mut framer = Framer::new(1024);
        assert!(matches!(framer.reader(&mut source), Err(Error::Eof)));
    }

    #[test]
    fn read_helper_skips_past_a_failed_frame() {
        let mut bad = Vec::new();
        Framer::write_frame(&mut bad, b"oops").unwrap();
        // Corrupt the Fletcher bytes so the first frame fails.
        bad[5] ^= 0xff;
        let mut good = Vec::new();
        Framer::write_frame(&mut good, b"ok").unwrap();
        let mut stream = bad;
        stream.extend_from_slice(&good);

        let mut source = Cursor::new(stream);
        let mut framer = Framer::new(1024);
        let payload = framer.read(&mut source).unwrap().to_vec();
        assert_eq!(payload, b"ok");
    }

    #[test]
    fn sequence_gap_counts_missing() {
        let mut framer = Framer::new(1024);
        framer.note_sequence(0);
        framer.note_sequence(3);
        assert_eq!(framer.get_missing(), 2);
        assert_eq!(framer.get_duplicated(), 0);
    }

    #[test]
    fn duplicate_sequence_is_counted() {
        let mut framer = Framer::new(1024);
        framer.note_sequence(5);
        framer.note_sequence(5);
        assert_eq!(framer.get_duplicated(), 1);
    }

    #[test]
    fn near_wraparound_sequence_flags_rollover() {
        let mut framer = Framer::new(1024);
        framer.note_sequence(u16::MAX);
        assert!(framer.did_farend());
        framer.note_sequence(0);
        assert!(framer.did_rollover());
        assert!(framer.did_nearend());
    }
}
