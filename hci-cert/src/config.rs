use std::time::Duration;

/// Deadlines used by the connection lifecycle and assertion defaults.
///
/// Use the builder pattern to customize, or use [`Default`] for the values
/// the certification scenarios are written against.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use hci_cert::Config;
///
/// let config = Config::default()
///     .with_connection_timeout(Duration::from_secs(10))  // slow radio
///     .with_emits_none_timeout(Duration::from_millis(500));
/// assert_eq!(config.connection_timeout(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Deadline for `emits` assertions that do not call `within`.
    /// Default: 3s
    emits_timeout: Duration,

    /// Observation window for `emits_none` assertions that do not call `within`.
    /// Default: 1s
    emits_none_timeout: Duration,

    /// How long `complete_incoming` / `complete_outgoing` wait for
    /// ConnectionComplete.
    /// Default: 3s
    connection_timeout: Duration,

    /// How long `wait_for_disconnection_complete` waits.
    /// Default: 3s
    disconnection_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            emits_timeout: Self::DEFAULT_EMITS_TIMEOUT,
            emits_none_timeout: Self::DEFAULT_EMITS_NONE_TIMEOUT,
            connection_timeout: Duration::from_secs(3),
            disconnection_timeout: Duration::from_secs(3),
        }
    }
}

impl Config {
    /// Default deadline for `emits`.
    pub const DEFAULT_EMITS_TIMEOUT: Duration = Duration::from_secs(3);

    /// Default observation window for `emits_none`.
    pub const DEFAULT_EMITS_NONE_TIMEOUT: Duration = Duration::from_secs(1);

    /// Set the default deadline for `emits` assertions.
    pub fn with_emits_timeout(mut self, timeout: Duration) -> Self {
        self.emits_timeout = timeout;
        self
    }

    /// Returns the default deadline for `emits` assertions.
    pub fn emits_timeout(&self) -> Duration {
        self.emits_timeout
    }

    /// Set the default observation window for `emits_none` assertions.
    pub fn with_emits_none_timeout(mut self, timeout: Duration) -> Self {
        self.emits_none_timeout = timeout;
        self
    }

    /// Returns the default observation window for `emits_none` assertions.
    pub fn emits_none_timeout(&self) -> Duration {
        self.emits_none_timeout
    }

    /// Set how long connection completion waits for ConnectionComplete.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Returns how long connection completion waits.
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    /// Set how long `wait_for_disconnection_complete` waits.
    pub fn with_disconnection_timeout(mut self, timeout: Duration) -> Self {
        self.disconnection_timeout = timeout;
        self
    }

    /// Returns how long `wait_for_disconnection_complete` waits.
    pub fn disconnection_timeout(&self) -> Duration {
        self.disconnection_timeout
    }
}
