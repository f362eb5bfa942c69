//! Assertions over event streams.
//!
//! Every assertion starts from [`assert_that`], which borrows an
//! [`EventStream`](crate::EventStream) (or anything [`Observable`](crate::Observable))
//! exclusively for as long as the assertion runs.
//!
//! # Example
//!
//! ```ignore
//! use hci_cert::testing::{HciCaptures, Matcher, assert_that};
//!
//! // Positive: wait for the connection, keep its fields
//! let mut complete = HciCaptures::connection_complete();
//! assert_that(&mut incoming).emits(&mut complete).await?;
//! let handle = complete.get()?.handle;
//!
//! // Ordered: several predicates, noise between them is skipped
//! assert_that(&mut connection)
//!     .emits(Matcher::payload_contains(b"first"))
//!     .then(Matcher::payload_contains(b"second"))
//!     .within(Duration::from_secs(1))
//!     .await?;
//!
//! // Negative: nothing arrives for the whole window
//! assert_that(&mut connection).emits_none().await?;
//! ```
//!
//! Predicates are anything implementing [`Predicate`]: closures over `&E`,
//! [`Matcher`] for described predicates, and [`Capture`] for predicates that
//! also extract fields from the matching event.
//!
//! Matched and discarded events are consumed from the stream; a later
//! assertion sees only what arrives after the last consumed event.

mod capture;
mod captures;
mod emits;
mod emits_none;
mod matcher;
mod predicate;
mod subject;

pub use capture::Capture;
pub use captures::HciCaptures;
pub use emits::Emits;
pub use emits_none::EmitsNone;
pub use matcher::Matcher;
pub use predicate::Predicate;
pub use subject::{StreamSubject, assert_that};
