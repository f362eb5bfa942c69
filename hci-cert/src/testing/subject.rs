use std::{fmt, time::Duration};

use super::{Emits, EmitsNone, Predicate};
use crate::{Config, EventStream, Observable};

/// Start an assertion on anything that exposes an [`EventStream`].
///
/// Default deadlines come from [`Observable::config`] when the subject has
/// one, and from the built-in values otherwise.
///
/// # Example
///
/// ```ignore
/// use hci_cert::testing::{assert_that, Matcher};
///
/// assert_that(&mut connection)
///     .emits(Matcher::payload_contains(b"SomeAclData"))
///     .await?;
/// assert_that(&mut incoming).emits_none().await?;
/// ```
pub fn assert_that<O>(observable: &mut O) -> StreamSubject<'_, O::Event>
where
    O: Observable + ?Sized,
{
    let (emits_timeout, emits_none_timeout) = match observable.config() {
        Some(config) => (config.emits_timeout(), config.emits_none_timeout()),
        None => (
            Config::DEFAULT_EMITS_TIMEOUT,
            Config::DEFAULT_EMITS_NONE_TIMEOUT,
        ),
    };
    StreamSubject {
        stream: observable.event_stream(),
        emits_timeout,
        emits_none_timeout,
    }
}

/// The subject of an assertion: one stream plus default deadlines.
pub struct StreamSubject<'a, E> {
    stream: &'a mut EventStream<E>,
    emits_timeout: Duration,
    emits_none_timeout: Duration,
}

impl<'a, E> StreamSubject<'a, E> {
    /// Take default deadlines from `config` instead of the built-in ones.
    pub fn using(mut self, config: &Config) -> Self {
        self.emits_timeout = config.emits_timeout();
        self.emits_none_timeout = config.emits_none_timeout();
        self
    }

    /// Assert that an event satisfying `predicate` arrives.
    ///
    /// Chain [`then`](Emits::then) for more predicates.
    pub fn emits(self, predicate: impl Predicate<E> + Send + 'a) -> Emits<'a, E> {
        Emits::new(self.stream, Box::new(predicate), self.emits_timeout)
    }

    /// Assert that no event at all arrives during the window.
    pub fn emits_none(self) -> EmitsNone<'a, E> {
        EmitsNone::new(self.stream, None, self.emits_none_timeout)
    }

    /// Assert that no event satisfying `predicate` arrives during the window.
    pub fn emits_none_matching(self, predicate: impl Predicate<E> + Send + 'a) -> EmitsNone<'a, E> {
        EmitsNone::new(
            self.stream,
            Some(Box::new(predicate)),
            self.emits_none_timeout,
        )
    }
}

impl<E> fmt::Debug for StreamSubject<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSubject")
            .field("stream", &self.stream.name())
            .field("emits_timeout", &self.emits_timeout)
            .field("emits_none_timeout", &self.emits_none_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, testing::Matcher};

    #[tokio::test]
    async fn using_applies_config_deadlines() {
        let config = Config::default().with_emits_timeout(Duration::from_millis(20));
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel::<u8>();
        let mut stream = EventStream::open(
            "quiet",
            futures_util::StreamExt::boxed(tokio_stream::wrappers::UnboundedReceiverStream::new(rx)),
        );

        let err = assert_that(&mut stream)
            .using(&config)
            .emits(Matcher::any())
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::EmitsTimeout { timeout, .. } if timeout == Duration::from_millis(20))
        );
    }
}
