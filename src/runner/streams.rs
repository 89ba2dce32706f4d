// src/runner/streams.rs

//! Line pumps from child output pipes into the [`LogConsumer`].

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::exec::LogConsumer;
use crate::types::StreamKind;

/// Spawn a task that forwards every line of `reader` to `consumer` as soon as
/// it is read. The task ends at EOF or on the first read error.
///
/// Bytes are decoded lossily, so non-UTF-8 output never ends the stream.
pub fn spawn_line_reader<R>(
    reader: R,
    stream: StreamKind,
    consumer: Arc<LogConsumer>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(256);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(trim_newline(&buf));
                    consumer.accept(stream, &line);
                }
                Err(e) => {
                    warn!(%stream, error = %e, "failed to read process output; closing stream");
                    break;
                }
            }
        }

        debug!(%stream, "stream reader finished");
    })
}

fn trim_newline(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// Wait for the readers to drain. Readers still running after `grace` are
/// aborted (some grandchild may hold the pipe open).
pub async fn join_readers(readers: Vec<JoinHandle<()>>, grace: Option<Duration>) {
    for mut handle in readers {
        let joined = match grace {
            Some(grace) => tokio::time::timeout(grace, &mut handle).await.ok(),
            None => Some((&mut handle).await),
        };
        match joined {
            Some(Ok(())) => {}
            Some(Err(e)) => warn!(error = %e, "stream reader task failed"),
            None => {
                warn!("stream reader did not finish within grace period; aborting");
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_all_lines_including_unterminated_tail() {
        let consumer = Arc::new(LogConsumer::new());
        let input: &[u8] = b"one\r\ntwo\n\xff\xfe bad bytes\nlast without newline";
        let handle = spawn_line_reader(input, StreamKind::Stdout, Arc::clone(&consumer));
        join_readers(vec![handle], None).await;

        assert_eq!(consumer.std_out_count(), 4);
        assert_eq!(consumer.std_err_count(), 0);
    }

    #[test]
    fn trim_newline_strips_crlf() {
        assert_eq!(trim_newline(b"abc\r\n"), b"abc");
        assert_eq!(trim_newline(b"abc"), b"abc");
    }
}
