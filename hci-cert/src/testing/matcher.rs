//! Named event matching.

use std::borrow::Cow;
use std::fmt;

use super::Predicate;
use crate::{
    Label,
    hci::{AclData, EventCode, EventPacket},
};

type MatchFn<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// A predicate with a human-readable description.
///
/// Closures work as predicates directly, but report only "closure" when an
/// assertion fails. `Matcher` carries a description into the failure message.
///
/// `Matcher` can match events by:
/// - Label (using the `Label` trait)
/// - Custom predicate
/// - Payload content, for data streams
/// - Event code, for lifecycle streams
///
/// # Example
///
/// ```ignore
/// use hci_cert::testing::Matcher;
///
/// // Match by label (requires Event: Label)
/// let matcher = Matcher::by_label("DisconnectionComplete");
///
/// // Match by predicate, with a description
/// let matcher = Matcher::named("handle 0x001", |d: &AclData| d.handle == 1);
///
/// // Match data payloads
/// let matcher = Matcher::payload_contains(b"SomeAclData");
/// ```
pub struct Matcher<E> {
    description: Cow<'static, str>,
    matcher: MatchFn<E>,
}

impl<E> fmt::Debug for Matcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Matcher")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<E> Matcher<E> {
    /// Match events using a custom predicate.
    pub fn by_event<F>(predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self::named("event predicate", predicate)
    }

    /// Match events using a custom predicate, reported as `description`.
    pub fn named<F>(description: impl Into<Cow<'static, str>>, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            matcher: Box::new(predicate),
        }
    }

    /// Match every event.
    pub fn any() -> Self {
        Self::named("any event", |_| true)
    }

    /// Returns true if the given event matches this matcher.
    pub fn matches(&self, event: &E) -> bool {
        (self.matcher)(event)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl<E: Label> Matcher<E> {
    /// Match events by their label.
    ///
    /// Requires the event type to implement `Label`.
    pub fn by_label(name: impl Into<Cow<'static, str>>) -> Self {
        let name: Cow<'static, str> = name.into();
        Self {
            description: name.clone(),
            matcher: Box::new(move |event| event.label() == name),
        }
    }
}

impl Matcher<AclData> {
    /// Match data packets whose payload contains `needle`.
    pub fn payload_contains(needle: impl Into<Vec<u8>>) -> Self {
        let needle = needle.into();
        Self {
            description: Cow::Owned(format!("payload contains b\"{}\"", needle.escape_ascii())),
            matcher: Box::new(move |data| data.payload_contains(&needle)),
        }
    }
}

impl Matcher<EventPacket> {
    /// Match lifecycle events by event code.
    pub fn event_code(code: EventCode) -> Self {
        Self {
            description: Cow::Owned(code.to_string()),
            matcher: Box::new(move |packet| packet.code() == code),
        }
    }
}

impl<E> Predicate<E> for Matcher<E> {
    fn test(&mut self, event: &E) -> bool {
        self.matches(event)
    }

    fn describe(&self) -> Cow<'static, str> {
        self.description.clone()
    }
}

// Allow &str to be used directly as a label matcher
impl<E: Label> From<&'static str> for Matcher<E> {
    fn from(label: &'static str) -> Self {
        Matcher::by_label(label)
    }
}

// Allow String to be used as a label matcher
impl<E: Label> From<String> for Matcher<E> {
    fn from(label: String) -> Self {
        Matcher::by_label(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hci::{DisconnectionComplete, HciEvent};

    fn disconnection() -> EventPacket {
        HciEvent::DisconnectionComplete(DisconnectionComplete {
            status: 0,
            handle: 1,
            reason: 0x13,
        })
        .to_packet()
        .unwrap()
    }

    #[test]
    fn label_matcher_matches_by_name() {
        let packet = disconnection();
        let matcher: Matcher<EventPacket> = Matcher::by_label("DisconnectionComplete");
        assert!(matcher.matches(&packet));

        let matcher: Matcher<EventPacket> = Matcher::by_label("ConnectionComplete");
        assert!(!matcher.matches(&packet));
    }

    #[test]
    fn event_code_matcher() {
        let packet = disconnection();
        assert!(Matcher::event_code(EventCode::DisconnectionComplete).matches(&packet));
        assert!(!Matcher::event_code(EventCode::ConnectionRequest).matches(&packet));
    }

    #[test]
    fn payload_matcher_describes_needle() {
        let matcher = Matcher::payload_contains(b"Hello!".to_vec());
        assert_eq!(matcher.description(), "payload contains b\"Hello!\"");
        assert!(matcher.matches(&AclData::new(1, b"\x06\x00\x07\x00Hello!".to_vec())));
        assert!(!matcher.matches(&AclData::new(1, b"Hello".to_vec())));
    }

    #[test]
    fn from_str_creates_label_matcher() {
        let packet = disconnection();
        let matcher: Matcher<EventPacket> = "DisconnectionComplete".into();
        assert!(matcher.matches(&packet));
        assert_eq!(Predicate::describe(&matcher), "DisconnectionComplete");
    }
}
