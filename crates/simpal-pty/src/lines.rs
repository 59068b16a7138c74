use std::io::{BufRead, BufReader, Read};

/// Iterator over the lines of a PTY output stream.
///
/// A line ends at `\n`; the delimiter and one preceding `\r` are removed,
/// since the terminal line discipline turns `\n` into `\r\n`. Invalid UTF-8
/// is replaced rather than rejected. A trailing line without a newline is
/// still yielded. Any read error ends the stream: on Linux the master
/// returns `EIO` once the child has exited and the slave is closed.
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            buf: Vec::with_capacity(256),
            done: false,
        }
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }

        self.buf.clear();
        match self.inner.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                log::debug!("PTY stream ended: {e}");
                self.done = true;
                // Bytes read before the error still form a final line.
                if self.buf.is_empty() {
                    return None;
                }
            }
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Some(String::from_utf8_lossy(&self.buf).into_owned())
    }
}
