use crate::hci::PacketBoundary;

/// Basic L2CAP header: length(2) + channel id(2).
const L2CAP_HEADER_LEN: usize = 4;

/// Rebuilds L2CAP PDUs from ACL fragments received on one handle.
///
/// A first fragment starts a PDU whose length is read from its basic L2CAP
/// header; continuing fragments extend it until that length is reached.
#[derive(Debug, Default)]
pub(crate) struct Reassembler {
    partial: Vec<u8>,
}

impl Reassembler {
    /// Feed one fragment, returning a PDU once one is complete.
    pub(crate) fn push(&mut self, boundary: PacketBoundary, fragment: &[u8]) -> Option<Vec<u8>> {
        if boundary == PacketBoundary::CompleteL2cap {
            self.discard_partial();
            return Some(fragment.to_vec());
        }

        if boundary.is_first() {
            self.discard_partial();
        } else if self.partial.is_empty() {
            tracing::warn!(len = fragment.len(), "continuing fragment without a start, dropped");
            return None;
        }
        self.partial.extend_from_slice(fragment);

        let expected = self.expected_len()?;
        if self.partial.len() < expected {
            return None;
        }
        if self.partial.len() > expected {
            tracing::warn!(expected, got = self.partial.len(), "PDU longer than its header");
        }
        Some(std::mem::take(&mut self.partial))
    }

    fn expected_len(&self) -> Option<usize> {
        let header = self.partial.get(..2)?;
        Some(u16::from_le_bytes([header[0], header[1]]) as usize + L2CAP_HEADER_LEN)
    }

    fn discard_partial(&mut self) {
        if !self.partial.is_empty() {
            tracing::warn!(len = self.partial.len(), "incomplete PDU dropped");
            self.partial.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIRST: PacketBoundary = PacketBoundary::FirstAutomaticallyFlushable;
    const CONTINUING: PacketBoundary = PacketBoundary::ContinuingFragment;

    #[test]
    fn joins_first_and_continuing() {
        let mut r = Reassembler::default();
        assert_eq!(r.push(FIRST, b"\x06\x00\x07\x00Hello"), None);
        assert_eq!(
            r.push(CONTINUING, b"!"),
            Some(b"\x06\x00\x07\x00Hello!".to_vec())
        );
    }

    #[test]
    fn single_fragment_pdu() {
        let mut r = Reassembler::default();
        let mut pdu = b"\xe8\x03\x07\x00".to_vec();
        pdu.extend(b"Hello".repeat(200));
        assert_eq!(r.push(FIRST, &pdu), Some(pdu.clone()));
    }

    #[test]
    fn new_start_drops_incomplete_pdu() {
        let mut r = Reassembler::default();
        assert_eq!(r.push(FIRST, b"\x06\x00\x07\x00Hel"), None);
        assert_eq!(r.push(FIRST, b"\x02\x00\x07\x00ok"), Some(b"\x02\x00\x07\x00ok".to_vec()));
    }

    #[test]
    fn orphan_continuation_is_dropped() {
        let mut r = Reassembler::default();
        assert_eq!(r.push(CONTINUING, b"stray"), None);
        assert_eq!(r.push(PacketBoundary::CompleteL2cap, b"whole"), Some(b"whole".to_vec()));
    }

    #[test]
    fn header_split_across_fragments() {
        let mut r = Reassembler::default();
        assert_eq!(r.push(FIRST, b"\x01"), None);
        assert_eq!(r.push(CONTINUING, b"\x00\x07\x00"), None);
        assert_eq!(r.push(CONTINUING, b"x"), Some(b"\x01\x00\x07\x00x".to_vec()));
    }
}
