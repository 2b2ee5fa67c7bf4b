use arrayvec::ArrayString;
use core::fmt::{self, Write};

/// `fmt::Write` adapter over an `ArrayString` that drops whatever does not
/// fit instead of failing. Cuts happen on a char boundary.
pub struct Truncating<'a, const CAP: usize> {
    buf: &'a mut ArrayString<CAP>,
    limit: usize,
    truncated: bool,
}

impl<'a, const CAP: usize> Truncating<'a, CAP> {
    pub fn new(buf: &'a mut ArrayString<CAP>) -> Self {
        Self::with_limit(buf, CAP)
    }

    pub fn with_limit(buf: &'a mut ArrayString<CAP>, limit: usize) -> Self {
        Self {
            buf,
            limit: limit.min(CAP),
            truncated: false,
        }
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

impl<const CAP: usize> Write for Truncating<'_, CAP> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.limit.saturating_sub(self.buf.len());
        if s.len() <= room {
            self.buf.push_str(s);
        } else {
            self.buf.push_str(&s[..floor_char_boundary(s, room)]);
            self.truncated = true;
        }
        Ok(())
    }
}

pub fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut index = max;
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Appends formatted text, truncating at `limit` bytes. Returns `true` if
/// anything was cut.
pub fn write_bounded<const CAP: usize>(
    buf: &mut ArrayString<CAP>,
    limit: usize,
    args: fmt::Arguments<'_>,
) -> bool {
    let mut writer = Truncating::with_limit(buf, limit);
    // Truncating never reports an error; only a failing Display impl could.
    let _ = writer.write_fmt(args);
    writer.truncated()
}

pub fn copy_bounded<const CAP: usize>(s: &str) -> ArrayString<CAP> {
    let mut out = ArrayString::new();
    out.push_str(&s[..floor_char_boundary(s, CAP)]);
    out
}
