use futures_util::{Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use crate::{DeltaCallback, GatewayError};

/// Escapes `$` so model text never triggers math rendering downstream.
///
/// A `$` preceded by an odd run of backslashes is already escaped and left
/// alone, which makes the pass idempotent. `\\$` is an escaped backslash
/// followed by a bare `$`, so that `$` is escaped. The run parity is carried
/// between fragments so the result does not depend on where the stream was
/// split.
#[derive(Debug, Default, Clone)]
pub struct Sanitizer {
    odd_backslashes: bool,
}

impl Sanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &str) -> String {
        let mut out = String::with_capacity(fragment.len());
        for ch in fragment.chars() {
            if ch == '$' && !self.odd_backslashes {
                out.push('\\');
            }
            out.push(ch);
            self.odd_backslashes = ch == '\\' && !self.odd_backslashes;
        }
        out
    }
}

/// Sanitize a standalone piece of text
pub fn sanitize_fragment(text: &str) -> String {
    Sanitizer::new().push(text)
}

/// Sanitize and concatenate already-received fragments in order
pub fn accumulate_chunks<I, T>(chunks: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut sanitizer = Sanitizer::new();
    chunks
        .into_iter()
        .map(|chunk| sanitizer.push(chunk.as_ref()))
        .collect()
}

/// Result of draining a delta stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accumulated {
    /// Sanitized text in arrival order
    pub text: String,
    /// Number of fragments received
    pub deltas: usize,
    /// Stopped early because the interrupt flag was raised
    pub interrupted: bool,
}

/// Drain a delta stream into one sanitized string.
///
/// Each sanitized fragment is handed to `on_delta` as soon as it arrives.
/// A stream error discards everything received so far. Raising `interrupt`
/// stops consumption after the current fragment and returns the prefix.
pub async fn accumulate_stream<S>(
    mut stream: S,
    on_delta: Option<&DeltaCallback>,
    interrupt: Option<&AtomicBool>,
) -> Result<Accumulated, GatewayError>
where
    S: Stream<Item = Result<String, GatewayError>> + Unpin,
{
    let is_interrupted = || interrupt.is_some_and(|flag| flag.load(Ordering::SeqCst));

    let mut sanitizer = Sanitizer::new();
    let mut text = String::new();
    let mut deltas = 0;

    while !is_interrupted() {
        let Some(item) = stream.next().await else {
            debug!(deltas, len = text.len(), "Stream exhausted");
            return Ok(Accumulated {
                text,
                deltas,
                interrupted: false,
            });
        };

        let fragment = item?;
        let clean = sanitizer.push(&fragment);
        if let Some(callback) = on_delta {
            callback(&clean);
        }
        text.push_str(&clean);
        deltas += 1;
    }

    debug!(deltas, len = text.len(), "Stream interrupted");
    Ok(Accumulated {
        text,
        deltas,
        interrupted: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::sync::{Arc, Mutex};

    fn ok_stream(chunks: &[&str]) -> impl Stream<Item = Result<String, GatewayError>> + Unpin {
        stream::iter(
            chunks
                .iter()
                .map(|c| Ok(c.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_currency_is_escaped() {
        assert_eq!(sanitize_fragment("The price is $5"), r"The price is \$5");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        for input in ["$5", r"\$5", "a $b $$c", "no symbols", r"\\$", r"\\\$", r"\\\\$x", "$"] {
            let once = sanitize_fragment(input);
            assert_eq!(sanitize_fragment(&once), once, "input: {}", input);
        }
    }

    #[test]
    fn test_escaped_backslash_before_dollar_still_escapes() {
        assert_eq!(sanitize_fragment(r"\\$"), r"\\\$");
        assert_eq!(sanitize_fragment(r"\\\$"), r"\\\$");
        assert_eq!(sanitize_fragment(r"a\\$b"), r"a\\\$b");
        assert_eq!(accumulate_chunks([r"a\", r"\", "$b"]), r"a\\\$b");
    }

    #[test]
    fn test_chunk_splitting_does_not_matter() {
        assert_eq!(accumulate_chunks(["ab", "c"]), "abc");
        assert_eq!(accumulate_chunks(["a", "bc"]), "abc");
        assert_eq!(accumulate_chunks(["abc"]), "abc");

        let whole = accumulate_chunks([r"cost \$3 or $4"]);
        assert_eq!(accumulate_chunks([r"cost \", r"$3 or ", "$", "4"]), whole);
        assert_eq!(accumulate_chunks([r"cost \$3 or $4"]), whole);
    }

    #[tokio::test]
    async fn test_accumulate_stream_concatenates_in_order() {
        let result = accumulate_stream(ok_stream(&["The ", "price ", "is $5"]), None, None)
            .await
            .unwrap();
        assert_eq!(result.text, r"The price is \$5");
        assert_eq!(result.deltas, 3);
        assert!(!result.interrupted);
    }

    #[tokio::test]
    async fn test_accumulate_stream_reports_each_delta() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: DeltaCallback = Arc::new(move |d: &str| sink.lock().unwrap().push(d.to_string()));

        let result = accumulate_stream(ok_stream(&["a", "$", "b"]), Some(&callback), None)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec!["a", r"\$", "b"]);
        assert_eq!(seen.concat(), result.text);
    }

    #[tokio::test]
    async fn test_accumulate_stream_error_discards_partial() {
        let items: Vec<Result<String, GatewayError>> = vec![
            Ok("partial".to_string()),
            Err(GatewayError::StreamFailed("connection reset".to_string())),
        ];
        let result = accumulate_stream(stream::iter(items), None, None).await;
        assert!(matches!(result, Err(GatewayError::StreamFailed(_))));
    }

    #[tokio::test]
    async fn test_accumulate_stream_interrupt_keeps_prefix() {
        let flag = Arc::new(AtomicBool::new(false));
        let trigger = flag.clone();
        let callback: DeltaCallback = Arc::new(move |_: &str| trigger.store(true, Ordering::SeqCst));

        let result = accumulate_stream(
            ok_stream(&["first", "second", "third"]),
            Some(&callback),
            Some(&flag),
        )
        .await
        .unwrap();

        assert_eq!(result.text, "first");
        assert_eq!(result.deltas, 1);
        assert!(result.interrupted);
    }

    #[tokio::test]
    async fn test_empty_stream_yields_empty_text() {
        let result = accumulate_stream(ok_stream(&[]), None, None).await.unwrap();
        assert_eq!(result.text, "");
        assert_eq!(result.deltas, 0);
    }
}
