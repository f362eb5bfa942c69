use std::borrow::Cow;

/// A test over one event, as consumed by the assertion engine.
///
/// Implemented by closures `FnMut(&E) -> bool`, by [`Matcher`](super::Matcher)
/// and by [`Capture`](super::Capture). The engine calls
/// [`reset`](Self::reset) on every predicate before an assertion starts, then
/// [`test`](Self::test) on drained events, and uses
/// [`describe`](Self::describe) when reporting what never matched.
pub trait Predicate<E> {
    /// Returns true if `event` satisfies this predicate.
    fn test(&mut self, event: &E) -> bool;

    /// Short description used in assertion failures.
    fn describe(&self) -> Cow<'static, str> {
        Cow::Borrowed("predicate")
    }

    /// Forget any state left over from a previous assertion.
    fn reset(&mut self) {}
}

impl<E, F> Predicate<E> for F
where
    F: FnMut(&E) -> bool,
{
    fn test(&mut self, event: &E) -> bool {
        self(event)
    }

    fn describe(&self) -> Cow<'static, str> {
        Cow::Borrowed("closure")
    }
}

pub(crate) type BoxPredicate<'a, E> = Box<dyn Predicate<E> + Send + 'a>;
