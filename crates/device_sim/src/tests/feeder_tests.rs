use super::*;

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use tokio::io::{duplex, AsyncReadExt};

#[tokio::test]
async fn script_is_followed_by_the_end_marker() {
    let (mut events, mut driver_side) = duplex(64);

    let fed = feed_events(&mut events, b"#@a", Duration::ZERO)
        .await
        .expect("feed");
    drop(events);

    let mut received = Vec::new();
    driver_side
        .read_to_end(&mut received)
        .await
        .expect("read");
    assert_eq!(fed, 3);
    assert_eq!(received, b"#@a$");
}

#[tokio::test]
async fn closed_reader_surfaces_an_error() {
    let (mut events, driver_side) = duplex(64);
    drop(driver_side);

    let error = feed_events(&mut events, b"abc", Duration::ZERO)
        .await
        .expect_err("closed reader");
    assert_eq!(error.written, 0);
}

/// Accepts `budget` bytes, then fails like a pipe whose reader went away.
struct ClosingWriter {
    budget: usize,
    accepted: Vec<u8>,
}

impl AsyncWrite for ClosingWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.budget == 0 {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        let n = buf.len().min(self.budget);
        self.budget -= n;
        self.accepted.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn partial_feed_reports_bytes_already_written() {
    let mut events = ClosingWriter {
        budget: 2,
        accepted: Vec::new(),
    };

    let error = feed_events(&mut events, b"abcd", Duration::ZERO)
        .await
        .expect_err("stream closed midway");

    assert_eq!(error.written, 2);
    assert_eq!(error.source.kind(), io::ErrorKind::BrokenPipe);
    assert_eq!(events.accepted, b"ab");
}

#[tokio::test]
async fn failure_on_the_end_marker_counts_the_whole_script() {
    let mut events = ClosingWriter {
        budget: 3,
        accepted: Vec::new(),
    };

    let error = feed_events(&mut events, b"abc", Duration::ZERO)
        .await
        .expect_err("end marker rejected");

    assert_eq!(error.written, 3);
}

#[tokio::test(start_paused = true)]
async fn bytes_are_paced_by_the_feed_delay() {
    let (mut events, _driver_side) = duplex(64);
    let started = tokio::time::Instant::now();

    feed_events(&mut events, b"abcd", Duration::from_millis(20))
        .await
        .expect("feed");
    assert!(started.elapsed() >= Duration::from_millis(80));
}
