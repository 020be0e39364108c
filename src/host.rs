//! The `Host` capability trait (§6): the only surface through which
//! the core touches the outside world. Turtle graphics, sound,
//! filesystem, and networking all live on the far side of this trait
//! and are out of scope for this crate (§1) — a host implementation
//! supplies them.

/// Outcome of a `read_line` call.
pub enum ReadLine {
    Bytes(usize),
    Interrupted,
    Eof,
}

/// Outcome of launching the multi-line text editor (`editor.edit`).
pub enum EditorResult {
    Accept,
    Cancel,
    Error,
}

/// Platform capabilities the core evaluator may call into. Every
/// method has a trivial, always-safe default so a minimal embedding
/// only needs to implement I/O.
pub trait Host {
    fn sleep(&mut self, ms: u32);
    fn random(&mut self) -> u32;

    fn check_user_interrupt(&mut self) -> bool {
        false
    }
    fn clear_user_interrupt(&mut self) {}
    fn check_pause_request(&mut self) -> bool {
        false
    }
    fn clear_pause_request(&mut self) {}
    fn check_freeze_request(&mut self) -> bool {
        false
    }

    fn key_available(&mut self) -> bool {
        false
    }
    fn read_char(&mut self) -> Option<u8> {
        None
    }

    fn write(&mut self, bytes: &[u8]);
    fn write_line(&mut self, bytes: &[u8]) {
        self.write(bytes);
        self.write(b"\n");
    }
    fn flush(&mut self) {}

    fn read_line(&mut self, buffer: &mut Vec<u8>) -> ReadLine;

    // Optional capabilities (§6); a host that doesn't support a
    // platform feature reports it as unavailable rather than panicking.
    fn power_off(&mut self) {}
    fn battery(&mut self) -> Option<(u8, bool)> {
        None
    }
    fn network_ping(&mut self, _ip: &str) -> bool {
        false
    }
    fn wifi_is_connected(&mut self) -> bool {
        false
    }
    fn wifi_connect(&mut self, _ssid: &str, _password: &str) -> bool {
        false
    }
    fn wifi_disconnect(&mut self) {}
    fn wifi_get_ip(&mut self) -> Option<String> {
        None
    }
    fn wifi_get_ssid(&mut self) -> Option<String> {
        None
    }
    fn wifi_scan(&mut self) -> Vec<String> {
        Vec::new()
    }
    fn editor_edit(&mut self, _buffer: &mut Vec<u8>) -> EditorResult {
        EditorResult::Cancel
    }
    fn toot(&mut self, _freq_hz: u32, _ms: u32) {}
}

/// A no-op host for tests and embeddings with no I/O surface at all.
#[derive(Default)]
pub struct NullHost {
    pub output: Vec<u8>,
}

impl Host for NullHost {
    fn sleep(&mut self, _ms: u32) {}

    fn random(&mut self) -> u32 {
        0
    }

    fn write(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn read_line(&mut self, _buffer: &mut Vec<u8>) -> ReadLine {
        ReadLine::Eof
    }
}

/// A host that replays a queued sequence of input lines and then goes
/// to EOF, for driving REPL scenarios (e.g. a `pause` sub-REPL) that
/// need more than `NullHost`'s immediate EOF.
#[derive(Default)]
pub struct ScriptedHost {
    pub output: Vec<u8>,
    lines: std::collections::VecDeque<String>,
}

impl ScriptedHost {
    pub fn new(lines: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ScriptedHost { output: Vec::new(), lines: lines.into_iter().map(Into::into).collect() }
    }
}

impl Host for ScriptedHost {
    fn sleep(&mut self, _ms: u32) {}

    fn random(&mut self) -> u32 {
        0
    }

    fn write(&mut self, bytes: &[u8]) {
        self.output.extend_from_slice(bytes);
    }

    fn read_line(&mut self, buffer: &mut Vec<u8>) -> ReadLine {
        match self.lines.pop_front() {
            Some(mut line) => {
                line.push('\n');
                buffer.extend_from_slice(line.as_bytes());
                ReadLine::Bytes(line.len())
            }
            None => ReadLine::Eof,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_host_captures_writes() {
        let mut host = NullHost::default();
        host.write_line(b"hello");
        assert_eq!(host.output, b"hello\n");
    }

    #[test]
    fn null_host_read_line_is_always_eof() {
        let mut host = NullHost::default();
        let mut buf = Vec::new();
        assert!(matches!(host.read_line(&mut buf), ReadLine::Eof));
    }
}
