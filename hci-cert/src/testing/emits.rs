use std::{
    fmt,
    future::{Future, IntoFuture},
    pin::Pin,
    time::{Duration, Instant},
};

use super::{Predicate, predicate::BoxPredicate};
use crate::{Error, EventStream, Mismatch, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    InOrder,
    AnyOrder,
}

/// A positive assertion over an [`EventStream`].
///
/// Created by [`StreamSubject::emits`](super::StreamSubject::emits). Awaiting
/// it drains the stream until every predicate is satisfied or the deadline
/// passes. Events that satisfy no eligible predicate are consumed and
/// discarded; they are listed in the failure message if the assertion fails.
///
/// By default predicates must be satisfied in the order they were given.
/// With [`in_any_order`](Self::in_any_order), each event is offered to the
/// first unsatisfied predicate that accepts it.
///
/// # Example
///
/// ```ignore
/// assert_that(&mut connection)
///     .emits(Matcher::payload_contains(b"first"))
///     .then(Matcher::payload_contains(b"second"))
///     .within(Duration::from_secs(1))
///     .await?;
/// ```
pub struct Emits<'a, E> {
    stream: &'a mut EventStream<E>,
    predicates: Vec<BoxPredicate<'a, E>>,
    order: Order,
    times: usize,
    timeout: Duration,
}

impl<'a, E> Emits<'a, E> {
    pub(crate) fn new(
        stream: &'a mut EventStream<E>,
        predicate: BoxPredicate<'a, E>,
        timeout: Duration,
    ) -> Self {
        Self {
            stream,
            predicates: vec![predicate],
            order: Order::InOrder,
            times: 1,
            timeout,
        }
    }

    /// Add another predicate to be satisfied after the previous ones.
    pub fn then(mut self, predicate: impl Predicate<E> + Send + 'a) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Require predicates to be satisfied in the given order. This is the default.
    pub fn in_order(mut self) -> Self {
        self.order = Order::InOrder;
        self
    }

    /// Accept the predicates in any order.
    pub fn in_any_order(mut self) -> Self {
        self.order = Order::AnyOrder;
        self
    }

    /// Require every predicate to be satisfied by `n` distinct events.
    ///
    /// In order, each predicate must match `n` times before the next one is
    /// considered.
    pub fn at_least_times(mut self, n: usize) -> Self {
        self.times = n.max(1);
        self
    }

    /// Override the default deadline.
    pub fn within(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn satisfied(&self, counts: &[usize]) -> bool {
        counts.iter().all(|&count| count >= self.times)
    }

    /// Offer one event to the eligible predicates. Returns false if none took it.
    fn offer(&mut self, event: &E, counts: &mut [usize]) -> bool {
        let times = self.times;
        match self.order {
            Order::InOrder => {
                let Some(next) = counts.iter().position(|&count| count < times) else {
                    return false;
                };
                if self.predicates[next].test(event) {
                    counts[next] += 1;
                    return true;
                }
                false
            }
            Order::AnyOrder => {
                for (predicate, count) in self.predicates.iter_mut().zip(counts.iter_mut()) {
                    if *count < times && predicate.test(event) {
                        *count += 1;
                        return true;
                    }
                }
                false
            }
        }
    }

    fn mismatch(&self, counts: &[usize], discarded: Vec<String>) -> Mismatch {
        let unmatched = self
            .predicates
            .iter()
            .zip(counts)
            .filter(|&(_, &count)| count < self.times)
            .map(|(predicate, &count)| {
                if self.times > 1 {
                    format!("{} ({count}/{})", predicate.describe(), self.times)
                } else {
                    predicate.describe().into_owned()
                }
            })
            .collect();
        Mismatch {
            unmatched,
            discarded,
        }
    }
}

impl<E: fmt::Debug> Emits<'_, E> {
    async fn run(mut self) -> Result {
        for predicate in &mut self.predicates {
            predicate.reset();
        }

        let deadline = Instant::now() + self.timeout;
        let mut counts = vec![0; self.predicates.len()];
        let mut discarded = Vec::new();

        while !self.satisfied(&counts) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = match self.stream.poll_one(remaining).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    return Err(Error::EmitsTimeout {
                        stream: self.stream.name().to_string(),
                        timeout: self.timeout,
                        mismatch: self.mismatch(&counts, discarded),
                    });
                }
                Err(Error::SourceEnded(stream)) => {
                    return Err(Error::EndedBeforeMatch {
                        stream,
                        mismatch: self.mismatch(&counts, discarded),
                    });
                }
                Err(e) => return Err(e),
            };

            if !self.offer(&event, &mut counts) {
                tracing::trace!(stream = %self.stream.name(), ?event, "discarded");
                discarded.push(format!("{event:?}"));
            }
        }

        tracing::debug!(
            stream = %self.stream.name(),
            predicates = self.predicates.len(),
            discarded = discarded.len(),
            "emits satisfied"
        );
        Ok(())
    }
}

impl<'a, E> IntoFuture for Emits<'a, E>
where
    E: fmt::Debug + Send + 'a,
{
    type Output = Result;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.run())
    }
}

impl<E> fmt::Debug for Emits<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let predicates: Vec<_> = self.predicates.iter().map(|p| p.describe()).collect();
        f.debug_struct("Emits")
            .field("stream", &self.stream.name())
            .field("predicates", &predicates)
            .field("order", &self.order)
            .field("times", &self.times)
            .field("timeout", &self.timeout)
            .finish()
    }
}
