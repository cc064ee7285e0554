use std::fmt;

/// Diagnostics the cache reports which are not plain log noise
///
/// Each kind can be silenced through `CacheOptions::hidden_messages`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VerifierMessage {
    /// Two different classes were registered under one descriptor (the first one stays)
    ConflictingClassDefinitions,
}

impl VerifierMessage {
    pub const ALL: [VerifierMessage; 1] = [VerifierMessage::ConflictingClassDefinitions];

    pub fn name(self) -> &'static str {
        match self {
            VerifierMessage::ConflictingClassDefinitions => "ConflictingClassDefinitions",
        }
    }

    pub fn from_name(name: &str) -> Option<VerifierMessage> {
        VerifierMessage::ALL
            .iter()
            .copied()
            .find(|message| message.name() == name)
    }
}

impl fmt::Display for VerifierMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
