//! Decoder process adapter
//!
//! The decoder is an external program (tshark) that reads a capture file
//! and prints one `;`-separated line per decoded record on stdout and
//! diagnostics on stderr. Both pipes are drained concurrently: stderr on a
//! dedicated thread, stdout by the job itself. Leaving stderr undrained
//! would let the process block on a full pipe and stall stdout.
//!
//! ```text
//!   tshark -r <file> <parameters...> [-Y <filter>] -e <key1> -e <key2> ...
//!      │ stdout ──► DecodeStream::next_line() ──► flattener
//!      │ stderr ──► "decoder-stderr" thread ──► tracing
//!      ▼
//!   exit status (checked after stdout is exhausted)
//! ```

use crate::error::{DecoderError, DecoderResult};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Decoder executable settings from the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DecoderSettings {
    /// Path to the decoder executable
    pub path: String,

    /// Fixed arguments placed after `-r <file>`
    #[serde(default)]
    pub parameters: Vec<String>,
}

/// Something that can turn a capture file into a stream of decoded lines
pub trait Decoder: Send + Sync {
    /// Start decoding `source`, requesting `fields` in order.
    fn decode(&self, source: &Path, fields: &[&str], filter: Option<&str>) -> DecoderResult<DecodeStream>;
}

/// Runs tshark (or a compatible program) as a child process
#[derive(Debug, Clone)]
pub struct TsharkDecoder {
    settings: DecoderSettings,
}

impl TsharkDecoder {
    pub fn new(settings: DecoderSettings) -> Self {
        Self { settings }
    }

    /// Full argument list for one invocation
    pub fn arguments(&self, source: &Path, fields: &[&str], filter: Option<&str>) -> Vec<String> {
        let mut args = Vec::with_capacity(4 + self.settings.parameters.len() + fields.len() * 2);
        args.push("-r".to_string());
        args.push(source.to_string_lossy().into_owned());
        args.extend(self.settings.parameters.iter().cloned());

        if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
            args.push("-Y".to_string());
            args.push(filter.to_string());
        }

        for field in fields {
            args.push("-e".to_string());
            args.push((*field).to_string());
        }
        args
    }
}

impl Decoder for TsharkDecoder {
    fn decode(&self, source: &Path, fields: &[&str], filter: Option<&str>) -> DecoderResult<DecodeStream> {
        let args = self.arguments(source, fields, filter);
        debug!(program = %self.settings.path, args = ?args, "Starting decoder");

        let child = Command::new(&self.settings.path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DecoderError::Start {
                program: self.settings.path.clone(),
                source: e,
            })?;

        DecodeStream::from_child(child, source_label(source))
    }
}

/// How the decoder finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeExit {
    /// Diagnostic lines seen on stderr
    pub diagnostics: u64,
}

/// Line stream from one decoder run
pub struct DecodeStream {
    lines: Box<dyn BufRead + Send>,
    child: Option<Child>,
    stderr_thread: Option<JoinHandle<u64>>,
    buf: Vec<u8>,
}

impl DecodeStream {
    /// Wrap a spawned child whose stdout and stderr are piped
    pub fn from_child(mut child: Child, label: String) -> DecoderResult<Self> {
        let stdout = match child.stdout.take() {
            Some(out) => out,
            None => {
                kill_and_reap(&mut child);
                return Err(DecoderError::MissingPipe("stdout"));
            }
        };
        let stderr = match child.stderr.take() {
            Some(err) => err,
            None => {
                kill_and_reap(&mut child);
                return Err(DecoderError::MissingPipe("stderr"));
            }
        };

        let stderr_thread = match spawn_stderr_drain(stderr, label) {
            Ok(handle) => handle,
            Err(e) => {
                kill_and_reap(&mut child);
                return Err(DecoderError::Stream(e));
            }
        };

        Ok(Self {
            lines: Box::new(BufReader::with_capacity(256 * 1024, stdout)),
            child: Some(child),
            stderr_thread: Some(stderr_thread),
            buf: Vec::with_capacity(1024),
        })
    }

    /// Stream already-decoded text (no process behind it)
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            lines: Box::new(BufReader::new(reader)),
            child: None,
            stderr_thread: None,
            buf: Vec::with_capacity(1024),
        }
    }

    /// Next line without its terminator, or `None` at end of stream.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn next_line(&mut self) -> DecoderResult<Option<String>> {
        self.buf.clear();
        let n = self
            .lines
            .read_until(b'\n', &mut self.buf)
            .map_err(DecoderError::Stream)?;
        if n == 0 {
            return Ok(None);
        }

        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    /// Wait for the process after stdout is exhausted.
    ///
    /// A non-zero exit is `DecoderError::Exited`; lines already read stay valid.
    pub fn finish(mut self) -> DecoderResult<DecodeExit> {
        let status = match self.child.take() {
            Some(mut child) => Some(child.wait().map_err(DecoderError::Wait)?),
            None => None,
        };

        let diagnostics = self.join_stderr();

        match status {
            Some(status) if !status.success() => Err(DecoderError::Exited {
                status: describe_status(status),
            }),
            _ => Ok(DecodeExit { diagnostics }),
        }
    }

    fn join_stderr(&mut self) -> u64 {
        match self.stderr_thread.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                warn!("Decoder stderr thread panicked");
                0
            }),
            None => 0,
        }
    }
}

impl Drop for DecodeStream {
    fn drop(&mut self) {
        // Abandoned before finish(): stop the process so the stderr thread ends
        if let Some(mut child) = self.child.take() {
            kill_and_reap(&mut child);
            self.join_stderr();
        }
    }
}

fn spawn_stderr_drain(stderr: ChildStderr, label: String) -> std::io::Result<JoinHandle<u64>> {
    thread::Builder::new()
        .name("decoder-stderr".into())
        .spawn(move || {
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            let mut count = 0u64;
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end();
                        if !line.is_empty() {
                            count += 1;
                            info!(source = %label, "[decoder] {}", line);
                        }
                    }
                    Err(e) => {
                        debug!(source = %label, error = %e, "Decoder stderr closed");
                        break;
                    }
                }
            }
            count
        })
}

fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "Decoder already exited");
    }
    let _ = child.wait();
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => status.to_string(),
    }
}

/// File name for log fields
pub fn source_label(source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn settings() -> DecoderSettings {
        DecoderSettings {
            path: "tshark".into(),
            parameters: vec!["-T".into(), "fields".into(), "-E".into(), "separator=;".into()],
        }
    }

    #[test]
    fn test_arguments_order() {
        let decoder = TsharkDecoder::new(settings());
        let args = decoder.arguments(
            &PathBuf::from("/data/a.pcap"),
            &["frame.time_epoch", "asterix.010_SAC"],
            Some("asterix.category==48"),
        );
        assert_eq!(
            args,
            vec![
                "-r", "/data/a.pcap", "-T", "fields", "-E", "separator=;", "-Y",
                "asterix.category==48", "-e", "frame.time_epoch", "-e", "asterix.010_SAC",
            ]
        );
    }

    #[test]
    fn test_blank_filter_omitted() {
        let decoder = TsharkDecoder::new(settings());
        let args = decoder.arguments(&PathBuf::from("a.pcap"), &["x"], Some("  "));
        assert!(!args.contains(&"-Y".to_string()));
    }

    #[test]
    fn test_missing_executable_is_start_error() {
        let decoder = TsharkDecoder::new(DecoderSettings {
            path: "/nonexistent/decoder-binary".into(),
            parameters: vec![],
        });
        let err = decoder
            .decode(&PathBuf::from("a.pcap"), &["x"], None)
            .err()
            .unwrap();
        assert!(matches!(err, DecoderError::Start { .. }));
    }

    #[test]
    fn test_reader_stream_lines() {
        let mut stream = DecodeStream::from_reader(Cursor::new(b"a;1\r\nb;2\n\nc;3".to_vec()));
        assert_eq!(stream.next_line().unwrap().as_deref(), Some("a;1"));
        assert_eq!(stream.next_line().unwrap().as_deref(), Some("b;2"));
        assert_eq!(stream.next_line().unwrap().as_deref(), Some(""));
        assert_eq!(stream.next_line().unwrap().as_deref(), Some("c;3"));
        assert_eq!(stream.next_line().unwrap(), None);
        assert_eq!(stream.finish().unwrap(), DecodeExit { diagnostics: 0 });
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let mut stream = DecodeStream::from_reader(Cursor::new(vec![b'a', 0xff, b';', b'1']));
        let line = stream.next_line().unwrap().unwrap();
        assert!(line.starts_with('a'));
        assert!(line.ends_with(";1"));
    }

    #[cfg(unix)]
    fn shell(script: &str) -> DecodeStream {
        let child = Command::new("sh")
            .arg("-c")
            .arg(script)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        DecodeStream::from_child(child, "test".into()).unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_child_streams_drained() {
        // Enough stderr to fill a pipe buffer if it were not drained
        let mut stream = shell(
            "i=0; while [ $i -lt 2000 ]; do echo \"diagnostic line $i\" >&2; i=$((i+1)); done; echo 't;1'; echo 't;2'",
        );
        let mut lines = Vec::new();
        while let Some(line) = stream.next_line().unwrap() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["t;1", "t;2"]);
        let exit = stream.finish().unwrap();
        assert_eq!(exit.diagnostics, 2000);
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_after_output() {
        let mut stream = shell("echo 't;1'; exit 3");
        assert_eq!(stream.next_line().unwrap().as_deref(), Some("t;1"));
        assert_eq!(stream.next_line().unwrap(), None);
        let err = stream.finish().unwrap_err();
        match err {
            DecoderError::Exited { status } => assert_eq!(status, "exit code 3"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_drop_kills_running_decoder() {
        let mut stream = shell("echo 't;1'; sleep 30");
        assert_eq!(stream.next_line().unwrap().as_deref(), Some("t;1"));
        let started = std::time::Instant::now();
        drop(stream);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
