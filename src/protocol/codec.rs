use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::{Error, Layer, NodeId, NodeName, NodeType, Result, NODE_NAME_LENGTH, PROTOCOL_VERSION_MAJOR};
use super::message::{ManagementHeader, Message, OptIn, OptOut, Request, TimePacket};
use super::{MessageType, HEADER_SIZE, LABEL_LENGTH, MAGIC, OPT_IN_SIZE, OPT_OUT_SIZE, REQUEST_SIZE, TIME_SIZE};

/// Number of bytes `encode` writes for `message`
pub fn encoded_len(message: &Message) -> usize {
    match message {
        Message::OptIn(_) => OPT_IN_SIZE,
        Message::OptOut(_) => OPT_OUT_SIZE,
        Message::Time(_) => TIME_SIZE,
        Message::Request(_) => REQUEST_SIZE,
        Message::Other(_) => HEADER_SIZE,
    }
}

/// Writes `message` into `out` and returns the packet length
///
/// The header's message type is taken from the variant, except for `Other`.
pub fn encode(message: &Message, out: &mut [u8]) -> Result<usize> {
    let len = encoded_len(message);
    if out.len() < len {
        return Err(Error::Truncated { expected: len, actual: out.len() });
    }

    let mut buf = &mut out[..len];
    match message {
        Message::OptIn(packet) => {
            put_header(&mut buf, &packet.header, MessageType::OptIn);
            buf.put_u16_le(packet.node_count);
            buf.put_u16_le(packet.listener_port);
            buf.put_u16_le(packet.uptime);
            buf.put_u8(packet.layer.to_byte());
            buf.put_u8(0);
            buf.put_slice(&packet.vendor);
            buf.put_slice(&packet.device);
            buf.put_slice(&packet.device_version);
            buf.put_u8(0);
        }
        Message::OptOut(packet) => {
            put_header(&mut buf, &packet.header, MessageType::OptOut);
            buf.put_u16_le(packet.node_count);
            buf.put_u16_le(packet.listener_port);
        }
        Message::Time(packet) => {
            put_header(&mut buf, &packet.header, MessageType::Time);
            buf.put_u8(packet.layer.to_byte());
            buf.put_u8(packet.layer_state);
            buf.put_u8(packet.smpte_mode);
            buf.put_u8(packet.hours);
            buf.put_u8(packet.minutes);
            buf.put_u8(packet.seconds);
            buf.put_u8(packet.frames);
            buf.put_u8(0);
            buf.put_u32_le(packet.layer_time_ms);
            buf.put_u32_le(packet.total_time_ms);
        }
        Message::Request(packet) => {
            put_header(&mut buf, &packet.header, MessageType::Request);
            buf.put_u8(packet.data_type);
            buf.put_u8(packet.layer.to_byte());
        }
        Message::Other(header) => put_header(&mut buf, header, header.message_type),
    }

    Ok(len)
}

fn put_header<B: BufMut>(buf: &mut B, header: &ManagementHeader, message_type: MessageType) {
    buf.put_u16_le(header.node_id.0);
    buf.put_u8(header.version_major);
    buf.put_u8(header.version_minor);
    buf.put_slice(MAGIC);
    buf.put_u8(message_type.code());
    buf.put_slice(header.node_name.as_bytes());
    buf.put_u8(header.seq);
    buf.put_u8(header.node_type.code());
    buf.put_u16_le(header.node_options);
    buf.put_u32_le(header.timestamp);
}

/// Parses one datagram
///
/// Trailing bytes past the fixed layout are ignored. Errors carry only
/// static data.
pub fn decode(datagram: &[u8]) -> Result<Message> {
    let mut buf = datagram;
    let header = get_header(&mut buf)?;

    let message = match header.message_type {
        MessageType::OptIn => {
            require(datagram, OPT_IN_SIZE)?;
            let node_count = buf.get_u16_le();
            let listener_port = buf.get_u16_le();
            let uptime = buf.get_u16_le();
            let layer = Layer::from_byte(buf.get_u8());
            buf.advance(1);
            let mut vendor = [0u8; LABEL_LENGTH];
            buf.copy_to_slice(&mut vendor);
            let mut device = [0u8; LABEL_LENGTH];
            buf.copy_to_slice(&mut device);
            let mut device_version = [0u8; 3];
            buf.copy_to_slice(&mut device_version);
            Message::OptIn(OptIn {
                header,
                node_count,
                listener_port,
                uptime,
                layer,
                vendor,
                device,
                device_version,
            })
        }
        MessageType::OptOut => {
            require(datagram, OPT_OUT_SIZE)?;
            Message::OptOut(OptOut {
                header,
                node_count: buf.get_u16_le(),
                listener_port: buf.get_u16_le(),
            })
        }
        MessageType::Time => {
            require(datagram, TIME_SIZE)?;
            let layer = Layer::from_byte(buf.get_u8());
            let layer_state = buf.get_u8();
            let smpte_mode = buf.get_u8();
            let hours = buf.get_u8();
            let minutes = buf.get_u8();
            let seconds = buf.get_u8();
            let frames = buf.get_u8();
            buf.advance(1);
            Message::Time(TimePacket {
                header,
                layer,
                layer_state,
                smpte_mode,
                hours,
                minutes,
                seconds,
                frames,
                layer_time_ms: buf.get_u32_le(),
                total_time_ms: buf.get_u32_le(),
            })
        }
        MessageType::Request => {
            require(datagram, REQUEST_SIZE)?;
            Message::Request(Request {
                header,
                data_type: buf.get_u8(),
                layer: Layer::from_byte(buf.get_u8()),
            })
        }
        _ => Message::Other(header),
    };

    Ok(message)
}

fn require(datagram: &[u8], expected: usize) -> Result<()> {
    if datagram.len() < expected {
        return Err(Error::Truncated { expected, actual: datagram.len() });
    }
    Ok(())
}

fn get_header(buf: &mut &[u8]) -> Result<ManagementHeader> {
    require(*buf, HEADER_SIZE)?;

    let node_id = NodeId(buf.get_u16_le());
    let version_major = buf.get_u8();
    let version_minor = buf.get_u8();
    let mut magic = [0u8; 3];
    buf.copy_to_slice(&mut magic);
    if &magic != MAGIC {
        return Err(Error::Malformed("header magic"));
    }
    if version_major != PROTOCOL_VERSION_MAJOR {
        return Err(Error::Malformed("protocol version"));
    }

    let message_type = MessageType::from_code(buf.get_u8());
    let mut name = [0u8; NODE_NAME_LENGTH];
    buf.copy_to_slice(&mut name);

    Ok(ManagementHeader {
        node_id,
        version_major,
        version_minor,
        message_type,
        node_name: NodeName::from_bytes(name),
        seq: buf.get_u8(),
        node_type: NodeType::from_code(buf.get_u8()),
        node_options: buf.get_u16_le(),
        timestamp: buf.get_u32_le(),
    })
}

/// Datagram codec for TCNet packets
///
/// Each call to `decode` consumes the whole buffer, which holds exactly one
/// datagram when driven by `UdpFramed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcNetCodec;

impl TcNetCodec {
    pub fn new() -> Self {
        TcNetCodec
    }
}

impl Decoder for TcNetCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.is_empty() {
            return Ok(None);
        }

        let message = decode(&src[..]);
        src.clear();
        message.map(Some)
    }
}

impl Encoder<Message> for TcNetCodec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<()> {
        let mut packet = [0u8; OPT_IN_SIZE];
        let len = encode(&item, &mut packet)?;
        dst.extend_from_slice(&packet[..len]);
        Ok(())
    }
}
