//! Cache of the classes, methods and fields a verifier needs to see
//!
//! Entities are read out of any number of bytecode files (and synthesized for things like arrays
//! and primitive types), and are addressed by [`UniqId`]. References between entities start out
//! as descriptors or file offsets and get resolved lazily, the first time something asks for them
//! to be linked.
//!
//! Storage follows the usual arena pattern: a [`CacheArenas`] owns every entity, and the
//! [`LibCache`] built on top of it hands out `&'c` references into it.
//!
//! ```ignore
//! let arenas = CacheArenas::new();
//! let cache = LibCache::new(&arenas, CacheOptions::new());
//! cache.process_files(&files);
//! let string = cache.resolve_and_link(SourceLang::PandaAssembly, &"Lpanda/String;".into(), true);
//! ```

mod entities;
mod hash;
mod ingest;
mod lang_context;
mod messages;
mod options;
mod resolve;
mod slots;
mod synthetic;

pub use entities::*;
pub use hash::{
    field_hash, file_entity_id, method_hash, signature_hash, synthetic_class_id, NO_FILE,
};
pub use lang_context::LangContext;
pub use messages::VerifierMessage;
pub use options::CacheOptions;
pub use resolve::IndexLookup;
pub use slots::*;

use crate::panda_file::{PandaFile, SourceLang};
use crate::util::RefId;
use dashmap::DashMap;
use elsa::sync::FrozenMap;
use parking_lot::ReentrantMutex;
use std::fmt;

/// Identity of a cached entity, unique across files and languages
pub type UniqId = u64;

/// Identity of a method across files (name, staticness and signature)
pub type MethodHash = u64;

/// Identity of a field across files (name and type)
pub type FieldHash = u64;

/// Storage for the entities of one language
struct LangArena<'c> {
    classes: FrozenMap<UniqId, Box<CachedClass<'c>>>,
    methods: FrozenMap<UniqId, Box<CachedMethod<'c>>>,
    fields: FrozenMap<UniqId, Box<CachedField<'c>>>,

    /// Index tables, by file and position of the index region
    indexes: FrozenMap<(RefId<'c, PandaFile>, usize), Box<Indexes<'c>>>,
}

impl<'c> LangArena<'c> {
    fn new() -> Self {
        LangArena {
            classes: FrozenMap::new(),
            methods: FrozenMap::new(),
            fields: FrozenMap::new(),
            indexes: FrozenMap::new(),
        }
    }
}

/// Owner of everything a `LibCache` builds
///
/// Nothing allocated here is ever moved or freed before the arenas themselves are dropped.
pub struct CacheArenas<'c> {
    langs: [LangArena<'c>; SourceLang::COUNT],

    /// Shared by every method which has no index tables (eg. synthetic ones)
    empty_indexes: Indexes<'c>,
}

impl<'c> CacheArenas<'c> {
    pub fn new() -> Self {
        CacheArenas {
            langs: std::array::from_fn(|_| LangArena::new()),
            empty_indexes: Indexes::default(),
        }
    }
}

impl<'c> Default for CacheArenas<'c> {
    fn default() -> Self {
        CacheArenas::new()
    }
}

/// Cross-file, cross-language cache of verification entities
///
/// Every operation takes `&self`, and the cache can be shared between threads. Construction of
/// new entities (ingesting files, synthesizing classes) is serialized by a single reentrant lock,
/// whereas lookups only ever touch the published tables and never block on construction.
pub struct LibCache<'c> {
    arenas: &'c CacheArenas<'c>,
    contexts: [LangContext<'c>; SourceLang::COUNT],
    options: CacheOptions,
    construction: ReentrantMutex<()>,

    /// Files already processed, by their identity
    processed_files: DashMap<u32, RefId<'c, PandaFile>>,

    /// Number of times each (unhidden) diagnostic was reported
    reported: DashMap<VerifierMessage, usize>,
}

impl<'c> LibCache<'c> {
    /// New cache with no files and no languages initialized
    pub fn new(arenas: &'c CacheArenas<'c>, options: CacheOptions) -> Self {
        LibCache {
            arenas,
            contexts: std::array::from_fn(|i| LangContext::new(SourceLang::ALL[i])),
            options,
            construction: ReentrantMutex::new(()),
            processed_files: DashMap::new(),
            reported: DashMap::new(),
        }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Context of a language, with its root classes synthesized
    pub fn lang_context(&self, lang: SourceLang) -> &LangContext<'c> {
        let ctx = self.context(lang);
        if !ctx.has_roots() {
            let _guard = self.construction.lock();
            ctx.roots.get_or_init(|| self.synthesize_roots(ctx));
        }
        ctx
    }

    /// Context of a language, as is
    ///
    /// Anything building root classes must go through this instead of `lang_context`, which
    /// would otherwise try to build the roots again.
    fn context(&self, lang: SourceLang) -> &LangContext<'c> {
        &self.contexts[lang.index()]
    }

    fn arena(&self, lang: SourceLang) -> &'c LangArena<'c> {
        &self.arenas.langs[lang.index()]
    }

    /// Every class published for a language, ordered by descriptor
    pub fn classes(&self, lang: SourceLang) -> Vec<&'c CachedClass<'c>> {
        self.lang_context(lang).classes()
    }

    /// Files processed so far
    pub fn processed_files(&self) -> usize {
        self.processed_files.len()
    }

    /// How many times a diagnostic has been reported (hidden ones are never counted)
    pub fn message_count(&self, message: VerifierMessage) -> usize {
        self.reported.get(&message).map_or(0, |count| *count)
    }

    fn report(&self, message: VerifierMessage, details: fmt::Arguments<'_>) {
        if self.options.is_hidden(message) {
            return;
        }
        *self.reported.entry(message).or_insert(0) += 1;
        log::warn!("{}: {}", message, details);
    }
}
