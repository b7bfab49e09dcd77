// Newline framing over a stream of non-blocking reads

/// Longest incomplete record kept by default before it is discarded.
pub const MAX_PENDING_RECORD: usize = 64 * 1024;

/// Per-channel accumulator turning arbitrary read chunks into complete
/// newline-terminated records. Bytes after the last newline stay buffered.
///
/// A record growing past the limit is dropped up to and including its
/// newline; [`LineFramer::take_discarded`] reports how many bytes went.
#[derive(Debug)]
pub struct LineFramer {
    pending: Vec<u8>,
    limit: usize,
    skipping: bool,
    discarded: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING_RECORD)
    }
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        LineFramer {
            pending: Vec::new(),
            limit,
            skipping: false,
            discarded: 0,
        }
    }

    /// Append freshly read bytes and iterate over every record now complete.
    ///
    /// Records keep their trailing `\n`. Records left unconsumed when the
    /// iterator is dropped are yielded again by the next call.
    pub fn push(&mut self, mut bytes: &[u8]) -> Records<'_> {
        if self.skipping {
            match bytes.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.discarded += pos + 1;
                    self.skipping = false;
                    bytes = &bytes[pos + 1..];
                }
                None => {
                    self.discarded += bytes.len();
                    bytes = &[];
                }
            }
        }
        self.pending.extend_from_slice(bytes);

        let complete = self
            .pending
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        let tail = self.pending.len() - complete;
        if tail > self.limit {
            self.pending.truncate(complete);
            self.discarded += tail;
            self.skipping = true;
        }

        Records {
            framer: self,
            consumed: 0,
        }
    }

    /// Bytes of the incomplete trailing record.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Bytes dropped from oversized records since the last call.
    pub fn take_discarded(&mut self) -> usize {
        std::mem::take(&mut self.discarded)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.skipping = false;
    }
}

/// Lazy sequence of complete records, see [`LineFramer::push`].
pub struct Records<'a> {
    framer: &'a mut LineFramer,
    consumed: usize,
}

impl Iterator for Records<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        let rest = &self.framer.pending[self.consumed..];
        let pos = rest.iter().position(|&b| b == b'\n')?;
        let record = rest[..=pos].to_vec();
        self.consumed += pos + 1;
        Some(record)
    }
}

impl Drop for Records<'_> {
    fn drop(&mut self) {
        if self.consumed > 0 {
            self.framer.pending.drain(..self.consumed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_in_chunks(input: &[u8], split_at: &[usize]) -> Vec<Vec<u8>> {
        let mut framer = LineFramer::new();
        let mut out = Vec::new();
        let mut start = 0;
        for &end in split_at.iter().chain(std::iter::once(&input.len())) {
            out.extend(framer.push(&input[start..end]));
            start = end;
        }
        out
    }

    #[test]
    fn yields_only_complete_records() {
        let mut framer = LineFramer::new();
        let records: Vec<_> = framer.push(b"CONNECT alice\nSEND al").collect();
        assert_eq!(records, vec![b"CONNECT alice\n".to_vec()]);
        assert_eq!(framer.pending(), b"SEND al");

        let records: Vec<_> = framer.push(b"ice bob hi\n").collect();
        assert_eq!(records, vec![b"SEND alice bob hi\n".to_vec()]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn split_position_does_not_change_records() {
        let input = b"CONNECT alice\nCONNECT bob\n\nSEND alice bob hi there\npartial";
        let whole = frame_in_chunks(input, &[]);
        assert_eq!(whole.len(), 4);

        for a in 0..input.len() {
            for b in a..input.len() {
                assert_eq!(frame_in_chunks(input, &[a, b]), whole, "split at {a},{b}");
            }
        }
    }

    #[test]
    fn unconsumed_records_are_kept_for_next_call() {
        let mut framer = LineFramer::new();
        let first = framer.push(b"one\ntwo\nthree\n").next();
        assert_eq!(first, Some(b"one\n".to_vec()));

        let rest: Vec<_> = framer.push(b"").collect();
        assert_eq!(rest, vec![b"two\n".to_vec(), b"three\n".to_vec()]);
    }

    #[test]
    fn oversized_record_is_dropped_through_its_newline() {
        let mut framer = LineFramer::with_limit(8);
        let records: Vec<_> = framer.push(b"ok\n0123456789").collect();
        assert_eq!(records, vec![b"ok\n".to_vec()]);
        assert!(framer.pending().is_empty());
        assert_eq!(framer.take_discarded(), 10);

        // The rest of the oversized record goes too, the next one survives
        let records: Vec<_> = framer.push(b"abc").collect();
        assert!(records.is_empty());
        let records: Vec<_> = framer.push(b"def\nnext\n").collect();
        assert_eq!(records, vec![b"next\n".to_vec()]);
        assert_eq!(framer.take_discarded(), 7);
        assert_eq!(framer.take_discarded(), 0);
    }
}
