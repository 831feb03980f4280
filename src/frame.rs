//! AT response framing.
//!
//! The modem speaks a line-oriented protocol with no framing of its own: a
//! command's reply is "everything up to a terminating keyword", and
//! unsolicited result codes can arrive between or inside replies. This module
//! holds the two buffers the transport reader uses to split the byte stream:
//! [`ResponseBuffer`] while a command is in flight and [`LineBuffer`] while
//! idle.

use bytes::{Bytes, BytesMut};
use std::ops::Range;

/// Line terminator appended to every AT command
pub const CRLF: &[u8] = b"\r\n";

/// Terminates the PDU that follows the `>` prompt of AT+CMGS
pub const CTRL_Z: u8 = 0x1A;

/// Aborts a pending `>` prompt
pub const ESC: u8 = 0x1B;

/// Maximum buffered bytes before a buffer is reset
pub const MAX_BUF: usize = 8192;

/// Prefix of the unsolicited new-message notification; the PDU follows on the next line
pub const NEW_MESSAGE_PREFIX: &str = "+CMT:";

/// A keyword found in the response buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordMatch {
    /// Index into the keyword list
    pub index: usize,
    /// Offset just past the line that carries the keyword
    pub end: usize,
}

/// Accumulates the reply to one command.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    buf: BytesMut,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        ResponseBuffer {
            buf: BytesMut::with_capacity(512),
        }
    }

    /// Append data. Returns `false` (and discards everything) when the reply
    /// grew past [`MAX_BUF`].
    pub fn extend(&mut self, data: &[u8]) -> bool {
        self.buf.extend_from_slice(data);
        if self.buf.len() > MAX_BUF {
            self.buf.clear();
            return false;
        }
        true
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Remove complete `+CMT:` notifications (header line plus PDU line) that
    /// arrived in the middle of a reply and return them.
    ///
    /// A header whose PDU line has not arrived yet stays in the buffer until
    /// the next read completes it.
    pub fn divert_unsolicited(&mut self) -> Vec<String> {
        let mut diverted = Vec::new();
        while let Some(range) = find_notification(&self.buf) {
            let mut tail = self.buf.split_off(range.start);
            let notification = tail.split_to(range.len());
            self.buf.unsplit(tail);
            diverted.push(String::from_utf8_lossy(&notification).into_owned());
        }
        diverted
    }

    /// Split off a trailing `+CMT:` header whose PDU line has not arrived,
    /// together with any partial line after it.
    pub fn take_unpaired_notification(&mut self) -> Option<Bytes> {
        let mut header_start = None;
        for line in complete_lines(&self.buf) {
            let text = self.buf[line.clone()].trim_ascii();
            if !text.is_empty() {
                header_start = text
                    .starts_with(NEW_MESSAGE_PREFIX.as_bytes())
                    .then_some(line.start);
            }
        }
        header_start.map(|start| self.buf.split_off(start).freeze())
    }

    /// Find the earliest occurrence of any keyword. Ties at the same offset
    /// go to the keyword listed first.
    pub fn find_keyword<S: AsRef<str>>(&self, keywords: &[S]) -> Option<KeywordMatch> {
        let mut best: Option<(usize, usize, usize)> = None;
        for (index, keyword) in keywords.iter().enumerate() {
            let needle = keyword.as_ref().as_bytes();
            let Some(position) = find_subslice(&self.buf, needle) else {
                continue;
            };
            let earlier = match best {
                Some((_, best_position, _)) => position < best_position,
                None => true,
            };
            if earlier {
                best = Some((index, position, position + needle.len()));
            }
        }

        best.map(|(index, _, match_end)| {
            let end = self.buf[match_end..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(self.buf.len(), |offset| match_end + offset + 1);
            KeywordMatch { index, end }
        })
    }

    /// Split off the reply up to `end`, returning it as text together with
    /// whatever followed it in the buffer.
    pub fn take_response(mut self, end: usize) -> (String, Bytes) {
        let response = self.buf.split_to(end);
        (
            String::from_utf8_lossy(&response).into_owned(),
            self.buf.freeze(),
        )
    }

    /// Everything received so far, or `None` if nothing arrived
    pub fn into_partial(self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.buf).into_owned())
        }
    }
}

/// Collects unsolicited bytes between commands and hands them out as chunks
/// of complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    pub fn new() -> Self {
        LineBuffer {
            buf: BytesMut::with_capacity(1024),
        }
    }

    /// Append data. Returns `false` (and discards everything) when the buffer
    /// grew past [`MAX_BUF`] without a usable line.
    pub fn extend(&mut self, data: &[u8]) -> bool {
        self.buf.extend_from_slice(data);
        if self.buf.len() > MAX_BUF {
            self.buf.clear();
            return false;
        }
        true
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Hand over everything still buffered: a held-back `+CMT:` header or an
    /// unterminated line
    pub fn take_remaining(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    /// Take all complete lines as one chunk.
    ///
    /// A trailing `+CMT:` header is held back until its PDU line is complete,
    /// so a notification is never split across chunks. Chunks consisting only
    /// of blank lines are dropped.
    pub fn take_chunk(&mut self) -> Option<String> {
        let mut end = 0;
        let mut pending = None;
        for line in complete_lines(&self.buf) {
            let text = self.buf[line.clone()].trim_ascii();
            if !text.is_empty() {
                pending = text.starts_with(NEW_MESSAGE_PREFIX.as_bytes()).then_some(line.start);
            }
            end = line.end;
        }

        let cut = pending.unwrap_or(end);
        if cut == 0 {
            return None;
        }
        let chunk = self.buf.split_to(cut);
        let text = String::from_utf8_lossy(&chunk);
        if text.trim().is_empty() {
            return None;
        }
        Some(text.into_owned())
    }
}

/// Ranges of complete lines, each including its trailing `\n`
fn complete_lines(buf: &[u8]) -> impl Iterator<Item = Range<usize>> + '_ {
    let mut start = 0;
    buf.iter().enumerate().filter_map(move |(i, &b)| {
        if b == b'\n' {
            let line = start..i + 1;
            start = i + 1;
            Some(line)
        } else {
            None
        }
    })
}

/// Range covering a `+CMT:` header and the next non-empty complete line
fn find_notification(buf: &[u8]) -> Option<Range<usize>> {
    let mut header_start = None;
    for line in complete_lines(buf) {
        let text = buf[line.clone()].trim_ascii();
        match header_start {
            None if text.starts_with(NEW_MESSAGE_PREFIX.as_bytes()) => {
                header_start = Some(line.start);
            }
            Some(start) if !text.is_empty() => return Some(start..line.end),
            _ => {}
        }
    }
    None
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(data: &[u8]) -> ResponseBuffer {
        let mut buf = ResponseBuffer::new();
        buf.extend(data);
        buf
    }

    #[test]
    fn keyword_cut_at_end_of_line() {
        let buf = response(b"AT\r\r\nOK\r\n+CMTI: \"SM\",3\r\n");
        let found = buf.find_keyword(&["OK", "ERROR"]).unwrap();
        assert_eq!(found.index, 0);
        let (text, rest) = buf.take_response(found.end);
        assert_eq!(text, "AT\r\r\nOK\r\n");
        assert_eq!(&rest[..], b"+CMTI: \"SM\",3\r\n");
    }

    #[test]
    fn earliest_keyword_wins() {
        let buf = response(b"\r\nERROR\r\nOK\r\n");
        assert_eq!(buf.find_keyword(&["OK", "ERROR"]).unwrap().index, 1);
    }

    #[test]
    fn prompt_without_newline_ends_at_buffer_end() {
        let buf = response(b"\r\n> ");
        let found = buf.find_keyword(&[">"]).unwrap();
        assert_eq!(found.end, 4);
    }

    #[test]
    fn no_keyword_yields_partial() {
        let buf = response(b"\r\n+CPIN: SIM PIN\r\n");
        assert!(buf.find_keyword(&["READY"]).is_none());
        assert_eq!(
            buf.into_partial().as_deref(),
            Some("\r\n+CPIN: SIM PIN\r\n")
        );
        assert_eq!(ResponseBuffer::new().into_partial(), None);
    }

    #[test]
    fn notification_inside_reply_is_diverted() {
        let mut buf = response(b"\r\n+CMT: ,24\r\n0891AB\r\n\r\n+CGATT: 1\r\nOK\r\n");
        let diverted = buf.divert_unsolicited();
        assert_eq!(diverted, vec!["+CMT: ,24\r\n0891AB\r\n".to_string()]);
        let found = buf.find_keyword(&["OK"]).unwrap();
        let (text, _) = buf.take_response(found.end);
        assert_eq!(text, "\r\n\r\n+CGATT: 1\r\nOK\r\n");
    }

    #[test]
    fn incomplete_notification_waits_for_pdu_line() {
        let mut buf = response(b"+CMT: ,24\r\n0891");
        assert!(buf.divert_unsolicited().is_empty());
        buf.extend(b"AB\r\n");
        assert_eq!(buf.divert_unsolicited().len(), 1);
        assert!(buf.is_empty());
    }

    #[test]
    fn unpaired_header_is_split_from_timed_out_reply() {
        let mut buf = response(b"\r\nRING\r\n\r\n+CMT: ,24\r\n0891");
        assert!(buf.divert_unsolicited().is_empty());
        let held = buf.take_unpaired_notification().unwrap();
        assert_eq!(&held[..], b"+CMT: ,24\r\n0891");
        assert_eq!(buf.into_partial().as_deref(), Some("\r\nRING\r\n\r\n"));

        let mut paired = response(b"+CMT: ,24\r\n0891AB\r\nOK\r\n");
        assert_eq!(paired.take_unpaired_notification(), None);
        assert_eq!(paired.len(), 23);
    }

    #[test]
    fn response_overflow_resets() {
        let mut buf = ResponseBuffer::new();
        assert!(buf.extend(b"\r\n"));
        assert!(!buf.extend(&[b'A'; MAX_BUF]));
        assert!(buf.is_empty());
    }

    #[test]
    fn line_buffer_hands_over_held_header() {
        let mut lines = LineBuffer::new();
        lines.extend(b"\r\n+CMT: ,24\r\n");
        assert_eq!(lines.take_chunk(), None);
        assert_eq!(&lines.take_remaining()[..], b"+CMT: ,24\r\n");
        assert!(lines.is_empty());
    }

    #[test]
    fn line_buffer_returns_complete_lines_only() {
        let mut lines = LineBuffer::new();
        assert!(lines.extend(b"\r\nRING\r\n+CL"));
        assert_eq!(lines.take_chunk().as_deref(), Some("\r\nRING\r\n"));
        assert_eq!(lines.take_chunk(), None);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn line_buffer_holds_back_notification_header() {
        let mut lines = LineBuffer::new();
        lines.extend(b"\r\n+CMT: ,24\r\n");
        assert_eq!(lines.take_chunk(), None);
        lines.extend(b"0891AB\r\n");
        assert_eq!(
            lines.take_chunk().as_deref(),
            Some("+CMT: ,24\r\n0891AB\r\n")
        );
        assert!(lines.is_empty());
    }

    #[test]
    fn line_buffer_drops_blank_chunks() {
        let mut lines = LineBuffer::new();
        lines.extend(b"\r\n\r\n");
        assert_eq!(lines.take_chunk(), None);
        assert!(lines.is_empty());
    }

    #[test]
    fn line_buffer_overflow_resets() {
        let mut lines = LineBuffer::new();
        assert!(!lines.extend(&[b'A'; MAX_BUF + 1]));
        assert!(lines.is_empty());
    }
}
