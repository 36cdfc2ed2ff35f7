//! Async-signal-safe output.
//!
//! Signal handlers cannot use the `std` IO stack or the logger: both may
//! allocate and take locks the interrupted code might hold. The messages a
//! handler needs to emit are composed here into a fixed stack buffer and
//! written with a single `write(2)` call.

use std::os::fd::RawFd;

/// Large enough for a job notification: two numbers plus fixed text.
const BUF_SIZE: usize = 128;

pub(crate) struct SioBuf {
    buf: [u8; BUF_SIZE],
    len: usize,
}

impl SioBuf {
    pub(crate) const fn new() -> Self {
        Self {
            buf: [0; BUF_SIZE],
            len: 0,
        }
    }

    /// Append a string, truncating silently if the buffer is full.
    pub(crate) fn push_str(&mut self, s: &str) -> &mut Self {
        for &byte in s.as_bytes() {
            if self.len == BUF_SIZE {
                break;
            }
            self.buf[self.len] = byte;
            self.len += 1;
        }
        self
    }

    /// Append the decimal representation of a number.
    pub(crate) fn push_num(&mut self, v: i64) -> &mut Self {
        let mut digits = [0u8; 20];
        let mut n = 0;

        let negative = v < 0;
        let mut v = v.unsigned_abs();
        loop {
            digits[n] = b'0' + (v % 10) as u8;
            n += 1;
            v /= 10;
            if v == 0 {
                break;
            }
        }
        if negative {
            self.push_byte(b'-');
        }
        while n > 0 {
            n -= 1;
            self.push_byte(digits[n]);
        }
        self
    }

    fn push_byte(&mut self, byte: u8) {
        if self.len < BUF_SIZE {
            self.buf[self.len] = byte;
            self.len += 1;
        }
    }

    /// Write the buffered bytes to the given descriptor in one call.
    pub(crate) fn write_to(&self, fd: RawFd) {
        // SAFETY: the pointer/length pair refers to the initialized prefix of `buf`;
        // `write` is async-signal-safe.
        unsafe { libc::write(fd, self.buf.as_ptr().cast(), self.len) };
    }
}

#[cfg(test)]
mod tests {
    use super::SioBuf;

    fn contents(buf: &SioBuf) -> &str {
        std::str::from_utf8(&buf.buf[..buf.len]).unwrap()
    }

    #[test]
    fn formats_job_notification() {
        let mut buf = SioBuf::new();
        buf.push_str("Job [")
            .push_num(2)
            .push_str("] (")
            .push_num(31337)
            .push_str(") terminated by signal ")
            .push_num(9)
            .push_str("\n");
        assert_eq!(contents(&buf), "Job [2] (31337) terminated by signal 9\n");
    }

    #[test]
    fn numbers() {
        let mut buf = SioBuf::new();
        buf.push_num(0).push_str(" ").push_num(-17);
        assert_eq!(contents(&buf), "0 -17");
    }

    #[test]
    fn truncates_instead_of_overflowing() {
        let mut buf = SioBuf::new();
        for _ in 0..100 {
            buf.push_str("xyzzy");
        }
        assert_eq!(buf.len, super::BUF_SIZE);
    }
}
