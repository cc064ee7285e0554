use super::VerifierMessage;
use crate::panda_file::SourceLang;
use std::collections::HashSet;

pub struct CacheOptions {
    /// Language of classes which don't say what language they are
    pub default_source_lang: SourceLang,

    /// Diagnostics which should not be reported
    pub hidden_messages: HashSet<VerifierMessage>,

    /// `report_error` passed along when resolving class index entries
    ///
    /// Unresolvable entries are logged as warnings when this is set, and as errors otherwise.
    pub report_unresolved_in_index: bool,
}

impl CacheOptions {
    pub fn new() -> CacheOptions {
        CacheOptions {
            default_source_lang: SourceLang::PandaAssembly,
            hidden_messages: HashSet::new(),
            report_unresolved_in_index: true,
        }
    }

    /// Stop reporting a kind of diagnostic
    pub fn hide(mut self, message: VerifierMessage) -> CacheOptions {
        self.hidden_messages.insert(message);
        self
    }

    pub fn is_hidden(&self, message: VerifierMessage) -> bool {
        self.hidden_messages.contains(&message)
    }
}

impl Default for CacheOptions {
    fn default() -> CacheOptions {
        CacheOptions::new()
    }
}
