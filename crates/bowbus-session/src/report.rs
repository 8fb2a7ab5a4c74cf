//! Progress lines for the person running a procedure.

use std::io::Write;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

/// Sends human-readable progress lines to a consumer thread.
///
/// Every line is also emitted as a `tracing` event, so a silent reporter
/// still leaves a trail in the logs.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    tx: Option<SyncSender<String>>,
}

impl Reporter {
    /// Reporter that only logs.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Reporter feeding a bounded queue of `capacity` lines.
    pub fn channel(capacity: usize) -> (Self, Receiver<String>) {
        let (tx, rx) = mpsc::sync_channel(capacity);
        (Self { tx: Some(tx) }, rx)
    }

    pub fn line(&self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(target: "bowbus::report", "{line}");
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(line) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            // Full queue: block rather than drop a line.
            Err(TrySendError::Full(line)) => {
                let _ = tx.send(line);
            }
        }
    }

    /// Drain `rx` into `out` on a new thread until every sender is gone.
    pub fn spawn_printer<W>(rx: Receiver<String>, mut out: W) -> JoinHandle<()>
    where
        W: Write + Send + 'static,
    {
        thread::spawn(move || {
            for line in rx {
                if writeln!(out, "{line}").is_err() {
                    break;
                }
            }
            let _ = out.flush();
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn lines_reach_the_receiver_in_order() {
        let (reporter, rx) = Reporter::channel(4);
        reporter.line("one");
        reporter.clone().line(String::from("two"));
        drop(reporter);
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec!["one", "two"]);
    }

    #[test]
    fn silent_reporter_and_dropped_receiver_do_not_block() {
        Reporter::silent().line("nobody listens");
        let (reporter, rx) = Reporter::channel(1);
        drop(rx);
        reporter.line("gone");
        reporter.line("still gone");
    }

    #[test]
    fn printer_writes_until_senders_drop() {
        let (reporter, rx) = Reporter::channel(2);
        let buf = SharedBuf::default();
        let printer = Reporter::spawn_printer(rx, buf.clone());
        for n in 0..5 {
            reporter.line(format!("line {n}"));
        }
        drop(reporter);
        printer.join().unwrap();
        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "line 0\nline 1\nline 2\nline 3\nline 4\n");
    }
}
