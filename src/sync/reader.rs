use tracing::{debug, info, trace, warn};

use crate::core::{Layer, ReaderConfig, Result};
use crate::network::{DatagramSocket, Transport};
use crate::time::{Clock, TimeCode, TimeCodeType, TIMECODE_TEXT_LENGTH};
use super::{Engine, MidiTimeCode, TimeCodeHandler, TimeCodeSink};

/// Longest command accepted on the reader port
const COMMAND_SIZE: usize = 64;

/// Reply before any timecode was received
const NO_TIMECODE: &[u8] = b"--:--:--:--";

/// Reply length: `HH:MM:SS:FF.NN`
const REPLY_LENGTH: usize = TIMECODE_TEXT_LENGTH + 3;

const LAYER_COMMAND: &[u8] = b"tcnet!layer#";
const TYPE_COMMAND: &[u8] = b"tcnet!type#";

/// Bridge from TCNet timecode to MIDI timecode outputs
///
/// Registered as the engine's handler. Forwards to its sinks only when the
/// timecode changes, and answers queries on its own UDP port.
pub struct TcNetReader<S: DatagramSocket> {
    port: u16,
    socket: Option<S>,
    sinks: Vec<Box<dyn TimeCodeSink>>,
    previous: Option<u32>,
    timecode: Option<TimeCode>,
    forwarded: u64,
}

impl<S: DatagramSocket> TcNetReader<S> {
    pub fn new(config: &ReaderConfig) -> Self {
        TcNetReader {
            port: config.port,
            socket: None,
            sinks: Vec::new(),
            previous: None,
            timecode: None,
            forwarded: 0,
        }
    }

    /// Adds a downstream output
    pub fn add_sink(&mut self, sink: impl TimeCodeSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    /// Binds the query/command port
    pub fn start<T: Transport<Socket = S>>(&mut self, transport: &T) -> Result<()> {
        if self.socket.is_none() {
            self.socket = Some(transport.bind(self.port)?);
            info!(port = self.port, "TCNet reader started");
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.socket.take().is_some() {
            info!(port = self.port, "TCNet reader stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.socket.is_some()
    }

    /// Last timecode received from the engine
    pub fn timecode(&self) -> Option<TimeCode> {
        self.timecode
    }

    /// Number of timecodes forwarded to the sinks
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    /// Handles pending queries and commands without blocking
    pub fn run<T: Transport, C: Clock>(&mut self, engine: &mut Engine<T, C>) {
        let Some(socket) = self.socket.as_ref() else {
            return;
        };

        let mut buf = [0u8; COMMAND_SIZE];
        loop {
            let (len, from) = match socket.try_recv_from(&mut buf) {
                Ok(Some(received)) => received,
                Ok(None) => break,
                Err(e) => {
                    warn!(port = self.port, error = %e, "Receive failed");
                    break;
                }
            };
            let command = trim(&buf[..len]);
            trace!(%from, len, "Reader command");

            if command == b"?tc" || command == b"tcnet?" {
                let mut reply = [0u8; REPLY_LENGTH];
                let reply = format_reply(self.timecode.as_ref(), &mut reply);
                if let Err(e) = socket.send_to(reply, from) {
                    warn!(%from, error = %e, "Reply failed");
                }
            } else if let Some(value) = command.strip_prefix(LAYER_COMMAND) {
                match value {
                    [c] => engine.set_layer(Layer::from_char(*c as char)),
                    _ => debug!(%from, "Invalid layer command"),
                }
            } else if let Some(value) = command.strip_prefix(TYPE_COMMAND) {
                match parse_type(value) {
                    Some(tc_type) => engine.set_timecode_type(tc_type),
                    None => debug!(%from, "Invalid type command"),
                }
            } else {
                debug!(%from, len, "Unknown reader command");
            }
        }
    }
}

impl<S: DatagramSocket> TimeCodeHandler for TcNetReader<S> {
    fn handle_timecode(&mut self, timecode: &TimeCode) {
        let packed = timecode.pack();
        self.timecode = Some(*timecode);
        if self.previous == Some(packed) {
            return;
        }
        self.previous = Some(packed);

        let mtc = MidiTimeCode::from(timecode);
        for sink in &mut self.sinks {
            sink.send_timecode(&mtc);
        }
        self.forwarded += 1;
    }
}

fn trim(command: &[u8]) -> &[u8] {
    let end = command
        .iter()
        .rposition(|&b| b != 0 && !b.is_ascii_whitespace())
        .map_or(0, |last| last + 1);
    &command[..end]
}

fn parse_type(value: &[u8]) -> Option<TimeCodeType> {
    let code = std::str::from_utf8(value).ok()?.parse::<u8>().ok()?;
    TimeCodeType::from_tcnet_code(code)
}

fn format_reply<'a>(timecode: Option<&TimeCode>, out: &'a mut [u8; REPLY_LENGTH]) -> &'a [u8] {
    let Some(timecode) = timecode else {
        return NO_TIMECODE;
    };

    out[..TIMECODE_TEXT_LENGTH].copy_from_slice(&timecode.to_text());
    let code = timecode.tc_type().tcnet_code();
    out[TIMECODE_TEXT_LENGTH] = b'.';
    out[TIMECODE_TEXT_LENGTH + 1] = b'0' + code / 10;
    out[TIMECODE_TEXT_LENGTH + 2] = b'0' + code % 10;
    &out[..]
}
