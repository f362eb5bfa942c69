use std::{
    borrow::Cow,
    fmt,
    future::{Future, IntoFuture},
    pin::Pin,
    time::{Duration, Instant},
};

use super::predicate::BoxPredicate;
use crate::{Error, EventStream, Result};

/// A negative assertion over an [`EventStream`].
///
/// Created by [`StreamSubject::emits_none`](super::StreamSubject::emits_none)
/// or [`emits_none_matching`](super::StreamSubject::emits_none_matching).
/// Awaiting it observes the stream for the whole window and fails on the
/// first event that matches. Non-matching events are consumed.
///
/// A source that ends during the window has, by definition, emitted nothing
/// more, so it counts as success.
pub struct EmitsNone<'a, E> {
    stream: &'a mut EventStream<E>,
    predicate: Option<BoxPredicate<'a, E>>,
    timeout: Duration,
}

impl<'a, E> EmitsNone<'a, E> {
    pub(crate) fn new(
        stream: &'a mut EventStream<E>,
        predicate: Option<BoxPredicate<'a, E>>,
        timeout: Duration,
    ) -> Self {
        Self {
            stream,
            predicate,
            timeout,
        }
    }

    /// Override the default observation window.
    pub fn within(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn describe(&self) -> Cow<'static, str> {
        match &self.predicate {
            Some(predicate) => predicate.describe(),
            None => Cow::Borrowed("any event"),
        }
    }
}

impl<E: fmt::Debug> EmitsNone<'_, E> {
    async fn run(mut self) -> Result {
        if let Some(predicate) = &mut self.predicate {
            predicate.reset();
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = match self.stream.poll_one(remaining).await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(Error::SourceEnded(_)) => {
                    tracing::trace!(stream = %self.stream.name(), "source ended during quiet window");
                    break;
                }
                Err(e) => return Err(e),
            };

            let hit = match &mut self.predicate {
                Some(predicate) => predicate.test(&event),
                None => true,
            };
            if hit {
                return Err(Error::UnexpectedEvent {
                    stream: self.stream.name().to_string(),
                    predicate: self.describe().into_owned(),
                    event: format!("{event:?}"),
                });
            }
            tracing::trace!(stream = %self.stream.name(), ?event, "ignored");
        }

        tracing::debug!(stream = %self.stream.name(), window = ?self.timeout, "emits none satisfied");
        Ok(())
    }
}

impl<'a, E> IntoFuture for EmitsNone<'a, E>
where
    E: fmt::Debug + Send + 'a,
{
    type Output = Result;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

impl<E> fmt::Debug for EmitsNone<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmitsNone")
            .field("stream", &self.stream.name())
            .field("predicate", &self.describe())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    use super::*;
    use crate::testing::{Matcher, assert_that};

    fn live() -> (mpsc::UnboundedSender<u32>, EventStream<u32>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = EventStream::open("live", UnboundedReceiverStream::new(rx).boxed());
        (tx, stream)
    }

    #[tokio::test]
    async fn silence_for_the_whole_window_succeeds() {
        let (_tx, mut stream) = live();
        let start = Instant::now();
        assert_that(&mut stream)
            .emits_none()
            .within(Duration::from_millis(500))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn event_inside_the_window_fails() {
        let (tx, mut stream) = live();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(42).unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
        });

        let start = Instant::now();
        let err = assert_that(&mut stream)
            .emits_none()
            .within(Duration::from_millis(500))
            .await
            .unwrap_err();

        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(
            err,
            Error::UnexpectedEvent {
                stream: "live".into(),
                predicate: "any event".into(),
                event: "42".into(),
            }
        );
    }

    #[tokio::test]
    async fn matching_event_after_noise_fails_inside_the_window() {
        let (tx, mut stream) = live();
        tokio::spawn(async move {
            tx.send(7).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(8).unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
        });

        let start = Instant::now();
        let err = assert_that(&mut stream)
            .emits_none_matching(Matcher::named("even", |n: &u32| n % 2 == 0))
            .within(Duration::from_millis(500))
            .await
            .unwrap_err();

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(500), "{elapsed:?}");
        assert_eq!(
            err,
            Error::UnexpectedEvent {
                stream: "live".into(),
                predicate: "even".into(),
                event: "8".into(),
            }
        );
    }

    #[tokio::test]
    async fn non_matching_events_are_ignored() {
        let (tx, mut stream) = live();
        tx.send(1).unwrap();
        tx.send(3).unwrap();
        assert_that(&mut stream)
            .emits_none_matching(Matcher::named("even", |n: &u32| n % 2 == 0))
            .within(Duration::from_millis(50))
            .await
            .unwrap();

        tx.send(4).unwrap();
        let err = assert_that(&mut stream)
            .emits_none_matching(Matcher::named("even", |n: &u32| n % 2 == 0))
            .within(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("matching even: 4"), "{err}");
    }

    #[tokio::test]
    async fn ended_source_counts_as_silence() {
        let mut stream = EventStream::<u32>::recorded("replay", []);
        assert_that(&mut stream)
            .emits_none()
            .within(Duration::from_millis(20))
            .await
            .unwrap();
    }
}
