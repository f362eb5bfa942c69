use std::{borrow::Cow, fmt};

use super::Predicate;
use crate::{Error, Result};

/// A typed predicate plus extractor bound to one event shape.
///
/// The extractor doubles as the predicate: an event matches when extraction
/// succeeds. The first extracted value is kept (later matches do not
/// overwrite it) and is available through [`get`](Self::get) once the
/// assertion that used the capture has succeeded.
///
/// A capture is reset at the start of every assertion it takes part in, so
/// the same capture can be reused across independent assertions.
///
/// # Example
///
/// ```ignore
/// let mut complete = HciCaptures::connection_complete();
/// assert_that(&mut stream).emits(&mut complete).await?;
/// let handle = complete.get()?.handle;
/// ```
pub struct Capture<E, T> {
    name: Cow<'static, str>,
    extract: fn(&E) -> Option<T>,
    value: Option<T>,
}

impl<E, T> Capture<E, T> {
    pub fn new(name: impl Into<Cow<'static, str>>, extract: fn(&E) -> Option<T>) -> Self {
        Self {
            name: name.into(),
            extract,
            value: None,
        }
    }

    /// Returns the shape name this capture matches.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Test `event` against the expected shape, storing its fields on the
    /// first successful match.
    pub fn try_match(&mut self, event: &E) -> bool {
        match (self.extract)(event) {
            Some(value) => {
                if self.value.is_none() {
                    self.value = Some(value);
                }
                true
            }
            None => false,
        }
    }

    /// Returns true once an event has matched.
    #[inline]
    pub fn is_captured(&self) -> bool {
        self.value.is_some()
    }

    /// The extracted value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCaptured`] if no event has matched yet.
    pub fn get(&self) -> Result<&T> {
        self.value
            .as_ref()
            .ok_or_else(|| Error::NotCaptured(self.name.clone()))
    }

    /// Move the extracted value out, leaving the capture empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCaptured`] if no event has matched yet.
    pub fn take(&mut self) -> Result<T> {
        self.value
            .take()
            .ok_or_else(|| Error::NotCaptured(self.name.clone()))
    }

    /// Forget the stored value.
    pub fn reset(&mut self) {
        self.value = None;
    }
}

impl<E, T> Predicate<E> for Capture<E, T> {
    fn test(&mut self, event: &E) -> bool {
        self.try_match(event)
    }

    fn describe(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    fn reset(&mut self) {
        Capture::reset(self);
    }
}

impl<E, T> Predicate<E> for &mut Capture<E, T> {
    fn test(&mut self, event: &E) -> bool {
        self.try_match(event)
    }

    fn describe(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    fn reset(&mut self) {
        Capture::reset(self);
    }
}

impl<E, T: fmt::Debug> fmt::Debug for Capture<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capture")
            .field("name", &self.name)
            .field("value", &self.value)
            .finish()
    }
}
