//! Length-prefixed framing for each obfuscation mode.
//!
//! Outbound, a payload is prefixed with a header whose layout depends on the
//! mode (see [`encode_frame`]). Inbound, [`FrameDecoder`] accumulates
//! plaintext bytes across reads and yields every complete item, keeping any
//! partial tail for the next read.

use rand::RngCore;
use tracing::trace;

use crate::core::{
    ABRIDGED_LONG_MARKER, ABRIDGED_QUICK_ACK_BIT, INTERMEDIATE_QUICK_ACK_BIT, MAX_FRAME_LENGTH,
    MAX_FRAME_PADDING, TRANSPORT_ERROR_FRAME_SIZE,
};
use crate::crypto::ObfuscationMode;

use super::error::{TransportError, TransportResult};

/// Largest length expressible in the abridged long form (in 4-byte units).
const ABRIDGED_MAX_UNITS: usize = 0x00ff_ffff;

/// Something the peer sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundItem {
    /// A complete message payload.
    Frame(Vec<u8>),
    /// Early acknowledgment of a message the client sent.
    QuickAck(u32),
    /// Transport-level error code sent instead of a message.
    TransportFailure(i32),
}

impl InboundItem {
    /// Whether this item carries application data.
    pub fn is_useful(&self) -> bool {
        matches!(self, InboundItem::Frame(_))
    }
}

/// Frame `payload` for `mode`, returning header, payload and any padding.
///
/// `report_ack` asks the server for a quick acknowledgment.
pub fn encode_frame<R: RngCore + ?Sized>(
    mode: ObfuscationMode,
    payload: &[u8],
    report_ack: bool,
    rng: &mut R,
) -> TransportResult<Vec<u8>> {
    let len = payload.len();
    let mut out = Vec::with_capacity(len + 4 + MAX_FRAME_PADDING);

    match mode {
        ObfuscationMode::Abridged => {
            if len % 4 != 0 || len / 4 > ABRIDGED_MAX_UNITS {
                return Err(TransportError::InvalidPayloadLength(len));
            }
            let units = len / 4;
            let ack = if report_ack { ABRIDGED_QUICK_ACK_BIT } else { 0 };
            if units < ABRIDGED_LONG_MARKER as usize {
                out.push(units as u8 | ack);
            } else {
                let header = ((units as u32) << 8) | ABRIDGED_LONG_MARKER as u32 | ack as u32;
                out.extend_from_slice(&header.to_le_bytes());
            }
            out.extend_from_slice(payload);
        }
        ObfuscationMode::Intermediate | ObfuscationMode::Tls => {
            out.extend_from_slice(&intermediate_header(len, report_ack)?);
            out.extend_from_slice(payload);
        }
        ObfuscationMode::PaddedIntermediate => {
            let padding = (rng.next_u32() as usize) % (MAX_FRAME_PADDING + 1);
            out.extend_from_slice(&intermediate_header(len + padding, report_ack)?);
            out.extend_from_slice(payload);
            let start = out.len();
            out.resize(start + padding, 0);
            rng.fill_bytes(&mut out[start..]);
        }
    }

    Ok(out)
}

fn intermediate_header(len: usize, report_ack: bool) -> TransportResult<[u8; 4]> {
    let len = u32::try_from(len)
        .ok()
        .filter(|l| l & INTERMEDIATE_QUICK_ACK_BIT == 0)
        .ok_or(TransportError::InvalidPayloadLength(len))?;
    let ack = if report_ack { INTERMEDIATE_QUICK_ACK_BIT } else { 0 };
    Ok((len | ack).to_le_bytes())
}

/// Reassembles inbound plaintext into frames.
#[derive(Debug)]
pub struct FrameDecoder {
    mode: ObfuscationMode,
    /// Bytes received but not yet forming a complete item.
    rest_of_the_data: Vec<u8>,
    max_frame_length: u32,
}

impl FrameDecoder {
    /// Create a decoder for `mode` with the default frame size limit.
    pub fn new(mode: ObfuscationMode) -> Self {
        Self::with_limit(mode, MAX_FRAME_LENGTH)
    }

    /// Create a decoder with an explicit frame size limit.
    pub fn with_limit(mode: ObfuscationMode, max_frame_length: u32) -> Self {
        Self {
            mode,
            rest_of_the_data: Vec::new(),
            max_frame_length,
        }
    }

    /// Switch to a new attempt: new mode, empty buffer.
    pub fn reset(&mut self, mode: ObfuscationMode) {
        self.mode = mode;
        self.rest_of_the_data.clear();
    }

    /// Number of buffered bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.rest_of_the_data.len()
    }

    /// Append plaintext and extract every complete item.
    ///
    /// On error the stream is desynchronized and the decoder must be reset.
    pub fn push(&mut self, data: &[u8]) -> TransportResult<Vec<InboundItem>> {
        self.rest_of_the_data.extend_from_slice(data);

        let mut items = Vec::new();
        let mut consumed = 0;
        loop {
            let buf = &self.rest_of_the_data[consumed..];
            match self.next_item(buf)? {
                Some((item, used)) => {
                    consumed += used;
                    items.push(item);
                }
                None => break,
            }
        }
        self.rest_of_the_data.drain(..consumed);

        if !self.rest_of_the_data.is_empty() {
            trace!(buffered = self.rest_of_the_data.len(), "partial frame kept");
        }
        Ok(items)
    }

    /// Parse one item from the front of `buf`, or `None` if incomplete.
    fn next_item(&self, buf: &[u8]) -> TransportResult<Option<(InboundItem, usize)>> {
        let (header_len, frame_len) = match self.mode {
            ObfuscationMode::Abridged => {
                let Some(&first) = buf.first() else {
                    return Ok(None);
                };
                if first & ABRIDGED_QUICK_ACK_BIT != 0 {
                    if buf.len() < 4 {
                        return Ok(None);
                    }
                    let ack = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
                    return Ok(Some((InboundItem::QuickAck(ack & !INTERMEDIATE_QUICK_ACK_BIT), 4)));
                }
                if first == ABRIDGED_LONG_MARKER {
                    if buf.len() < 4 {
                        return Ok(None);
                    }
                    let units = u32::from_le_bytes([buf[1], buf[2], buf[3], 0]);
                    (4, units * 4)
                } else {
                    (1, first as u32 * 4)
                }
            }
            ObfuscationMode::Intermediate
            | ObfuscationMode::PaddedIntermediate
            | ObfuscationMode::Tls => {
                if buf.len() < 4 {
                    return Ok(None);
                }
                let word = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
                if word & INTERMEDIATE_QUICK_ACK_BIT != 0 {
                    return Ok(Some((InboundItem::QuickAck(word & !INTERMEDIATE_QUICK_ACK_BIT), 4)));
                }
                if self.mode == ObfuscationMode::Intermediate && word % 4 != 0 {
                    return Err(TransportError::InvalidFrameLength(word));
                }
                (4, word)
            }
        };

        if frame_len == 0 || frame_len > self.max_frame_length {
            return Err(TransportError::InvalidFrameLength(frame_len));
        }

        let total = header_len + frame_len as usize;
        if buf.len() < total {
            return Ok(None);
        }

        let payload = &buf[header_len..total];
        let item = if payload.len() == TRANSPORT_ERROR_FRAME_SIZE {
            InboundItem::TransportFailure(i32::from_le_bytes([
                payload[0], payload[1], payload[2], payload[3],
            ]))
        } else {
            InboundItem::Frame(payload.to_vec())
        };
        Ok(Some((item, total)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| i as u8).collect()
    }

    #[test]
    fn test_abridged_short_header() {
        let frame =
            encode_frame(ObfuscationMode::Abridged, &payload(8), false, &mut rng()).unwrap();
        assert_eq!(frame[0], 2);
        assert_eq!(frame.len(), 9);

        let acked = encode_frame(ObfuscationMode::Abridged, &payload(8), true, &mut rng()).unwrap();
        assert_eq!(acked[0], 0x82);
    }

    #[test]
    fn test_abridged_long_header() {
        let body = payload(0x7f * 4);
        let frame = encode_frame(ObfuscationMode::Abridged, &body, false, &mut rng()).unwrap();
        assert_eq!(&frame[..4], &[0x7f, 0x7f, 0x00, 0x00]);

        let mut decoder = FrameDecoder::new(ObfuscationMode::Abridged);
        assert_eq!(decoder.push(&frame).unwrap(), vec![InboundItem::Frame(body)]);
    }

    #[test]
    fn test_abridged_rejects_unaligned_payload() {
        let err =
            encode_frame(ObfuscationMode::Abridged, &payload(6), false, &mut rng()).unwrap_err();
        assert!(matches!(err, TransportError::InvalidPayloadLength(6)));
    }

    #[test]
    fn test_intermediate_header() {
        let frame =
            encode_frame(ObfuscationMode::Intermediate, &payload(12), true, &mut rng()).unwrap();
        assert_eq!(&frame[..4], &[12, 0, 0, 0x80]);
        assert_eq!(&frame[4..], payload(12).as_slice());
    }

    #[test]
    fn test_padded_frame_carries_padding() {
        let mut rng = rng();
        for _ in 0..32 {
            let frame =
                encode_frame(ObfuscationMode::PaddedIntermediate, &payload(16), false, &mut rng)
                    .unwrap();
            let declared = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
            assert!((16..=16 + MAX_FRAME_PADDING).contains(&declared));
            assert_eq!(frame.len(), 4 + declared);
            assert_eq!(&frame[4..20], payload(16).as_slice());
        }
    }

    #[test]
    fn test_split_at_every_boundary() {
        let mut stream = Vec::new();
        for len in [20, 8] {
            let frame =
                encode_frame(ObfuscationMode::Intermediate, &payload(len), false, &mut rng());
            stream.extend(frame.unwrap());
        }

        let mut whole = FrameDecoder::new(ObfuscationMode::Intermediate);
        let expected = whole.push(&stream).unwrap();
        assert_eq!(expected.len(), 2);

        for split in 0..=stream.len() {
            let mut decoder = FrameDecoder::new(ObfuscationMode::Intermediate);
            let mut items = decoder.push(&stream[..split]).unwrap();
            items.extend(decoder.push(&stream[split..]).unwrap());
            assert_eq!(items, expected, "split at {split}");
            assert_eq!(decoder.buffered(), 0);
        }
    }

    #[test]
    fn test_partial_tail_is_kept() {
        let frame =
            encode_frame(ObfuscationMode::Abridged, &payload(40), false, &mut rng()).unwrap();
        let mut decoder = FrameDecoder::new(ObfuscationMode::Abridged);

        assert!(decoder.push(&frame[..10]).unwrap().is_empty());
        assert_eq!(decoder.buffered(), 10);
        assert!(decoder.push(&frame[10..30]).unwrap().is_empty());
        assert_eq!(decoder.buffered(), 30);
        assert_eq!(
            decoder.push(&frame[30..]).unwrap(),
            vec![InboundItem::Frame(payload(40))]
        );
    }

    #[test]
    fn test_quick_acks() {
        let mut abridged = FrameDecoder::new(ObfuscationMode::Abridged);
        assert_eq!(
            abridged.push(&[0x81, 0x02, 0x03, 0x04]).unwrap(),
            vec![InboundItem::QuickAck(0x0102_0304)]
        );

        let mut intermediate = FrameDecoder::new(ObfuscationMode::Intermediate);
        assert_eq!(
            intermediate.push(&[0x04, 0x03, 0x02, 0x81]).unwrap(),
            vec![InboundItem::QuickAck(0x0102_0304)]
        );
    }

    #[test]
    fn test_transport_error_frame() {
        let mut decoder = FrameDecoder::new(ObfuscationMode::Intermediate);
        let mut bytes = vec![4, 0, 0, 0];
        bytes.extend_from_slice(&(-404i32).to_le_bytes());

        let items = decoder.push(&bytes).unwrap();
        assert_eq!(items, vec![InboundItem::TransportFailure(-404)]);
        assert!(!items[0].is_useful());
    }

    #[test]
    fn test_invalid_lengths_desync() {
        let mut unaligned = FrameDecoder::new(ObfuscationMode::Intermediate);
        assert!(unaligned.push(&[5, 0, 0, 0]).unwrap_err().is_desync());

        let mut oversized = FrameDecoder::with_limit(ObfuscationMode::Intermediate, 64);
        assert!(oversized.push(&[68, 0, 0, 0]).unwrap_err().is_desync());

        let mut empty = FrameDecoder::new(ObfuscationMode::Abridged);
        assert!(empty.push(&[0]).unwrap_err().is_desync());

        // Padded framing tolerates unaligned lengths
        let mut padded = FrameDecoder::new(ObfuscationMode::PaddedIntermediate);
        assert!(padded.push(&[5, 0, 0, 0]).unwrap().is_empty());
    }
}
