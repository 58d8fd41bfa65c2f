//! Terminal input
//!
//! Line sources for the chat loop and the Ctrl-C interrupt channel.
//!
//! Terminal lines are read on a plain OS thread and handed over through a
//! channel. A read blocked in that thread never holds up runtime shutdown,
//! so the process can exit while the user has not pressed Enter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::BufRead;
use std::thread;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

/// Lines buffered between the reader thread and the chat loop
const LINE_BUFFER: usize = 16;

/// Source of input lines for the chat loop
#[async_trait]
pub trait LineInput: Send {
    /// Next line without its line ending; None at end of input
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// Lines from an async reader
pub struct ReaderInput<R> {
    reader: R,
}

impl<R> ReaderInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> LineInput for ReaderInput<R> {
    async fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .context("Failed to read input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }
}

/// Lines read by a dedicated thread
pub struct ThreadedInput {
    lines: mpsc::Receiver<std::io::Result<String>>,
}

impl ThreadedInput {
    /// Read the process's standard input
    pub fn stdin() -> Self {
        Self::spawn(std::io::BufReader::new(std::io::stdin()))
    }

    /// Read `reader` line by line on a new thread
    pub fn spawn<B>(reader: B) -> Self
    where
        B: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        thread::spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        });
        Self { lines: rx }
    }
}

#[async_trait]
impl LineInput for ThreadedInput {
    async fn next_line(&mut self) -> Result<Option<String>> {
        match self.lines.recv().await {
            Some(line) => Ok(Some(line.context("Failed to read input")?)),
            None => Ok(None),
        }
    }
}

/// Ctrl-C notifications, one per key press
pub struct Interrupt {
    signals: mpsc::UnboundedReceiver<()>,
}

impl Interrupt {
    /// Listen for Ctrl-C for the rest of the process
    pub fn ctrl_c() -> Self {
        let (tx, interrupt) = Self::channel();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("[Input] Cannot listen for Ctrl-C: {}", e);
                    break;
                }
                tracing::info!("[Input] Ctrl-C received");
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
        interrupt
    }

    /// Interrupt fired by sending on the returned handle
    pub fn channel() -> (mpsc::UnboundedSender<()>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { signals: rx })
    }

    /// Interrupt that never fires
    pub fn never() -> Self {
        Self::channel().1
    }

    /// Resolve on the next interrupt; pends forever once the source is gone
    pub async fn wait(&mut self) {
        if self.signals.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }

    /// Forget interrupts that arrived while one was being handled
    pub fn clear(&mut self) {
        while self.signals.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use std::sync::mpsc as std_mpsc;
    use std::time::{Duration, Instant};

    /// Blocks in `read` until its sender goes away, like a terminal nobody types into
    struct StalledReader(std_mpsc::Receiver<()>);

    impl Read for StalledReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_reader_input_strips_line_endings() {
        let mut input = ReaderInput::new("one\r\ntwo\nthree".as_bytes());
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("one"));
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("two"));
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("three"));
        assert_eq!(input.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_threaded_input_reads_lines() {
        let mut input = ThreadedInput::spawn(Cursor::new("fix it\r\n/exit\n"));
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("fix it"));
        assert_eq!(input.next_line().await.unwrap().as_deref(), Some("/exit"));
        assert_eq!(input.next_line().await.unwrap(), None);
    }

    #[test]
    fn test_pending_read_does_not_hold_runtime() {
        let (release, stalled) = std_mpsc::channel::<()>();
        let runtime = tokio::runtime::Runtime::new().unwrap();

        runtime.block_on(async {
            let mut input = ThreadedInput::spawn(std::io::BufReader::new(StalledReader(stalled)));
            let pending = tokio::time::timeout(Duration::from_millis(50), input.next_line()).await;
            assert!(pending.is_err());
        });

        let started = Instant::now();
        drop(runtime);
        assert!(started.elapsed() < Duration::from_secs(2));

        drop(release);
    }

    #[tokio::test]
    async fn test_interrupt_channel() {
        let (tx, mut interrupt) = Interrupt::channel();
        tx.send(()).unwrap();
        tx.send(()).unwrap();

        interrupt.wait().await;
        interrupt.clear();

        let pending = tokio::time::timeout(Duration::from_millis(20), interrupt.wait()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_never_interrupt_pends() {
        let mut interrupt = Interrupt::never();
        let pending = tokio::time::timeout(Duration::from_millis(20), interrupt.wait()).await;
        assert!(pending.is_err());
    }
}
