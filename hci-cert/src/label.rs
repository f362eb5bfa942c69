use std::borrow::Cow;

/// Human-readable label for an event shape.
///
/// Used by the assertion engine to describe predicates in failure messages
/// and by [`Matcher::by_label`](crate::testing::Matcher::by_label) to match
/// events by shape name.
///
/// # Example
///
/// ```rust
/// use hci_cert::{Label, hci::HciEvent};
///
/// let event = HciEvent::DisconnectionComplete(Default::default());
/// assert_eq!(event.label(), "DisconnectionComplete");
/// ```
pub trait Label {
    /// Returns a human-readable label for this item.
    fn label(&self) -> Cow<'static, str>;
}
