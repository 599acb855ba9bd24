//! `Range` header parsing for GET (§6).

/// An inclusive byte range, already validated against a known total length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range_header(&self, total_len: u64) -> String {
        format!("bytes {}-{}/{total_len}", self.start, self.end)
    }
}

/// Parses `bytes=a-b | a- | -b` against `total_len`. `Ok(None)` means no
/// `Range` header was present (caller serves the whole body). `Err(())`
/// means a `Range` header was present but malformed or unsatisfiable —
/// callers map this to `RangeNotSatisfiable`.
pub fn parse_range(header: Option<&str>, total_len: u64) -> Result<Option<ByteRange>, ()> {
    let Some(header) = header else {
        return Ok(None);
    };
    let spec = header.strip_prefix("bytes=").ok_or(())?;
    let (start_str, end_str) = spec.split_once('-').ok_or(())?;

    let range = if start_str.is_empty() {
        let suffix_len: u64 = end_str.parse().map_err(|_| ())?;
        if suffix_len == 0 || suffix_len > total_len {
            return Err(());
        }
        ByteRange {
            start: total_len - suffix_len,
            end: total_len - 1,
        }
    } else {
        let start: u64 = start_str.parse().map_err(|_| ())?;
        let end = if end_str.is_empty() {
            total_len.saturating_sub(1)
        } else {
            end_str.parse().map_err(|_| ())?
        };
        ByteRange { start, end }
    };

    if total_len == 0 || range.start > range.end || range.end >= total_len {
        return Err(());
    }
    Ok(Some(range))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_header_means_whole_body() {
        assert_eq!(parse_range(None, 1024).unwrap(), None);
    }

    #[test]
    fn prefix_range_is_inclusive() {
        let range = parse_range(Some("bytes=100-199"), 1024).unwrap().unwrap();
        assert_eq!(range, ByteRange { start: 100, end: 199 });
        assert_eq!(range.len(), 100);
        assert_eq!(range.content_range_header(1024), "bytes 100-199/1024");
    }

    #[test]
    fn open_ended_range_runs_to_the_end() {
        let range = parse_range(Some("bytes=1000-"), 1024).unwrap().unwrap();
        assert_eq!(range, ByteRange { start: 1000, end: 1023 });
    }

    #[test]
    fn suffix_range_counts_from_the_end() {
        let range = parse_range(Some("bytes=-100"), 1024).unwrap().unwrap();
        assert_eq!(range, ByteRange { start: 924, end: 1023 });
    }

    #[test]
    fn range_past_total_length_is_unsatisfiable() {
        assert!(parse_range(Some("bytes=2000-3000"), 1024).is_err());
    }

    #[test]
    fn malformed_header_is_unsatisfiable() {
        assert!(parse_range(Some("turtles=0-10"), 1024).is_err());
        assert!(parse_range(Some("bytes=abc-10"), 1024).is_err());
    }
}
