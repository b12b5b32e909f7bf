//! Resumable session state

/// Session state owned by one shard
///
/// Empty until READY arrives. Replaced wholesale on every identify.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    session_id: Option<String>,
    sequence: u64,
    resumable: bool,
    resume_url: Option<String>,
}

impl Session {
    /// Empty session; the next handshake must identify
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the session created by READY
    pub fn establish(&mut self, session_id: impl Into<String>, resume_url: Option<String>) {
        self.session_id = Some(session_id.into());
        self.resume_url = resume_url;
        self.resumable = true;
    }

    /// Advance the sequence; older or repeated numbers never move it back
    pub fn observe_sequence(&mut self, sequence: u64) {
        if sequence > self.sequence {
            self.sequence = sequence;
        }
    }

    /// Discard the session so the next handshake identifies
    pub fn invalidate(&mut self) {
        *self = Self::new();
    }

    /// Check if the next handshake can resume
    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.resumable && self.session_id.is_some()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Last dispatch sequence received, zero if none
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub fn is_resumable(&self) -> bool {
        self.resumable
    }

    /// URL to reconnect to when resuming
    #[must_use]
    pub fn resume_url(&self) -> Option<&str> {
        self.resume_url.as_deref()
    }
}
