use std::{borrow::Cow, fmt, time::Duration};

use futures_util::{StreamExt, stream::BoxStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, error::TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::{Config, Error, Result};

/// A live source of events handed out by the transport.
///
/// Dropping the source releases the underlying transport handle.
pub type EventSource<E> = BoxStream<'static, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Ended,
    Closed,
}

/// A buffered, single-consumer view over one transport event source.
///
/// Opening a stream spawns a pump task that moves events from the source into
/// an unbounded FIFO as they arrive, so the transport is never back-pressured
/// by a test that is busy elsewhere. Consumers drain the FIFO with
/// [`poll_one`](Self::poll_one) or through the assertion engine in
/// [`testing`](crate::testing).
///
/// Events are delivered in arrival order and each one exactly once. Taking
/// `&mut self` for every consuming call is what makes "one stream, one
/// consumer" hold.
///
/// Closing stops the pump and drops the source. [`close`](Self::close) is
/// idempotent and also runs on drop, so a stream owned by a failed scenario is
/// released on the unwinding path.
pub struct EventStream<E> {
    name: Cow<'static, str>,
    receiver: UnboundedReceiver<E>,
    cancel: CancellationToken,
    state: State,
}

impl<E: Send + 'static> EventStream<E> {
    /// Begin buffering from `source`. Never blocks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(name: impl Into<Cow<'static, str>>, source: EventSource<E>) -> Self {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let token = cancel.clone();
        let pump_name = name.clone();
        tokio::spawn(async move {
            let mut source = source;
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    item = source.next() => match item {
                        Some(event) => {
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        None => {
                            tracing::trace!(stream = %pump_name, "source ended");
                            break;
                        }
                    }
                }
            }
        });

        tracing::debug!(stream = %name, "event stream opened");
        Self {
            name,
            receiver: rx,
            cancel,
            state: State::Open,
        }
    }
}

impl<E> EventStream<E> {
    /// A stream over a fixed sequence of events, ending after the last one.
    ///
    /// Useful for replaying captured traffic and for exercising assertions
    /// without a transport. Does not require a runtime to construct.
    pub fn recorded(name: impl Into<Cow<'static, str>>, events: impl IntoIterator<Item = E>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for event in events {
            // The receiver is alive until this function returns.
            let _ = tx.send(event);
        }
        Self {
            name: name.into(),
            receiver: rx,
            cancel: CancellationToken::new(),
            state: State::Open,
        }
    }

    /// Returns the name the stream was opened with, used in diagnostics.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether [`close`](Self::close) has been called.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    /// Return the next event if one is already buffered.
    ///
    /// `Ok(None)` means nothing is buffered yet.
    ///
    /// # Errors
    ///
    /// [`Error::StreamClosed`] after `close`, [`Error::SourceEnded`] once the
    /// source finished and every buffered event was consumed.
    pub fn try_poll(&mut self) -> Result<Option<E>> {
        self.ensure_open()?;
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(self.ended()),
        }
    }

    /// Return the next event, waiting up to `timeout` for one to arrive.
    ///
    /// A timeout is not an error: it yields `Ok(None)` and the caller decides
    /// whether silence is a failure.
    ///
    /// # Errors
    ///
    /// [`Error::StreamClosed`] after `close`, [`Error::SourceEnded`] once the
    /// source finished and every buffered event was consumed.
    pub async fn poll_one(&mut self, timeout: Duration) -> Result<Option<E>> {
        if let Some(event) = self.try_poll()? {
            return Ok(Some(event));
        }
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(event)) => Ok(Some(event)),
            Ok(None) => Err(self.ended()),
            Err(_) => Ok(None),
        }
    }

    /// Stop buffering and release the source. Idempotent.
    pub fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        self.state = State::Closed;
        self.cancel.cancel();
        self.receiver.close();
        tracing::debug!(stream = %self.name, "event stream closed");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::StreamClosed(self.name.to_string()));
        }
        Ok(())
    }

    fn ended(&mut self) -> Error {
        if self.state == State::Open {
            self.state = State::Ended;
        }
        Error::SourceEnded(self.name.to_string())
    }
}

impl<E> Drop for EventStream<E> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<E> fmt::Debug for EventStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("buffered", &self.receiver.len())
            .finish()
    }
}

/// Anything that exposes an [`EventStream`] for assertions.
///
/// Implemented by `EventStream` itself and by
/// [`AclConnection`](crate::AclConnection), whose observable events are its
/// data packets.
pub trait Observable {
    type Event;

    fn event_stream(&mut self) -> &mut EventStream<Self::Event>;

    /// Deadlines [`assert_that`](crate::testing::assert_that) starts from.
    /// `None` means the built-in defaults.
    fn config(&self) -> Option<&Config> {
        None
    }
}

impl<E> Observable for EventStream<E> {
    type Event = E;

    fn event_stream(&mut self) -> &mut EventStream<E> {
        self
    }
}
