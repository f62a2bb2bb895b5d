//! Bounded scanning of child output streams.
//!
//! The scanner is the only component that interprets log text; callers pass
//! a predicate, so the matching rule (substring today, anything tomorrow)
//! can change without touching the launch state machine.

use std::time::Duration;

use super::handle::{LineStream, PolledLine};

/// Scan `stream` for the first line satisfying `predicate`.
///
/// Performs at most `max_attempts` reads; when no line is buffered, one
/// sleep of `poll_interval` consumes an attempt, bounding the wall time to
/// `max_attempts * poll_interval`. Returns `None` when the stream ends
/// (process exited) or the attempt budget runs out — a normal negative
/// result the caller must handle, not an error.
///
/// Every consumed line, matched or not, is handed to `sink` first; no line
/// is silently dropped.
pub async fn scan_for<P, S>(
    stream: &mut LineStream,
    mut predicate: P,
    max_attempts: u32,
    poll_interval: Duration,
    mut sink: S,
) -> Option<String>
where
    P: FnMut(&str) -> bool,
    S: FnMut(&str),
{
    for _ in 0..max_attempts {
        match stream.poll_line() {
            PolledLine::Line(line) => {
                sink(&line);
                if predicate(&line) {
                    return Some(line);
                }
            }
            PolledLine::Pending => tokio::time::sleep(poll_interval).await,
            PolledLine::Closed => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::sync::mpsc;

    fn stream_of(lines: &[&str]) -> LineStream {
        let (tx, rx) = mpsc::unbounded_channel();
        for line in lines {
            tx.send((*line).to_string()).unwrap();
        }
        drop(tx);
        LineStream::from_receiver(rx)
    }

    #[tokio::test]
    async fn test_match_returns_exact_line_and_stops() {
        let mut stream = stream_of(&["warming up", "Starting server on 8188", "later line"]);
        let matched = scan_for(
            &mut stream,
            |l| l.contains("Starting server"),
            10,
            Duration::from_millis(1),
            |_| {},
        )
        .await;
        assert_eq!(matched.as_deref(), Some("Starting server on 8188"));

        // Scanning stopped at the match; the rest of the stream is intact.
        assert_eq!(stream.poll_line(), PolledLine::Line("later line".into()));
    }

    #[tokio::test]
    async fn test_stream_end_is_not_found() {
        let mut stream = stream_of(&["a", "b"]);
        let matched = scan_for(
            &mut stream,
            |l| l.contains("never"),
            100,
            Duration::from_millis(1),
            |_| {},
        )
        .await;
        assert_eq!(matched, None);
    }

    #[tokio::test]
    async fn test_attempt_budget_bounds_reads() {
        let mut stream = stream_of(&["x1", "x2", "x3", "x4", "x5"]);
        let mut consumed = 0;
        let matched = scan_for(
            &mut stream,
            |_| false,
            3,
            Duration::from_millis(1),
            |_| consumed += 1,
        )
        .await;
        assert_eq!(matched, None);
        assert_eq!(consumed, 3);
        // Unread lines stay in the stream.
        assert_eq!(stream.poll_line(), PolledLine::Line("x4".into()));
    }

    #[tokio::test]
    async fn test_wall_time_bound_on_open_empty_stream() {
        // Keep a sender alive so the stream stays open but empty.
        let (_tx, rx) = mpsc::unbounded_channel::<String>();
        let mut stream = LineStream::from_receiver(rx);

        let start = Instant::now();
        let matched = scan_for(
            &mut stream,
            |_| true,
            5,
            Duration::from_millis(10),
            |_| {},
        )
        .await;
        assert_eq!(matched, None);
        // 5 attempts x 10ms, generous margin for scheduling.
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_sink_sees_every_consumed_line() {
        let mut stream = stream_of(&["one", "two", "three"]);
        let mut seen = Vec::new();
        let matched = scan_for(
            &mut stream,
            |l| l == "three",
            10,
            Duration::from_millis(1),
            |l| seen.push(l.to_string()),
        )
        .await;
        assert_eq!(matched.as_deref(), Some("three"));
        assert_eq!(seen, vec!["one", "two", "three"]);
    }
}
