use super::{CachedClass, CachedField, CachedMethod, UniqId};
use crate::descriptors::DescriptorString;
use crate::panda_file::{EntityId, PandaFile, SourceLang, TypeId};
use crate::plugins::{language_context, LanguageContext};
use crate::util::RefId;
use dashmap::DashMap;
use once_cell::sync::OnceCell;

type FileKey<'c> = (RefId<'c, PandaFile>, EntityId);

/// Entities reachable by their offset in a specific file
///
/// Index tables refer to members by offset in the referring file, and those offsets are only
/// meaningful within that file. Once such a reference has been resolved (possibly to an entity
/// defined in another file entirely), the answer is remembered here.
#[derive(Default)]
struct FileCache<'c> {
    classes: DashMap<FileKey<'c>, &'c CachedClass<'c>>,
    methods: DashMap<FileKey<'c>, &'c CachedMethod<'c>>,
    fields: DashMap<FileKey<'c>, &'c CachedField<'c>>,
}

/// Everything the cache knows about one source language
///
/// Entities are only ever read out of the published tables here once they are complete, so
/// readers never need to take the construction lock.
pub struct LangContext<'c> {
    lang: SourceLang,
    language: &'static dyn LanguageContext,
    classes: DashMap<UniqId, &'c CachedClass<'c>>,
    methods: DashMap<UniqId, &'c CachedMethod<'c>>,
    fields: DashMap<UniqId, &'c CachedField<'c>>,
    pub(crate) descr_lookup: DashMap<DescriptorString, &'c CachedClass<'c>>,
    file_cache: FileCache<'c>,
    primitive_classes: [OnceCell<&'c CachedClass<'c>>; TypeId::COUNT],
    object_descr: DescriptorString,
    string_descr: DescriptorString,
    string_array_descr: DescriptorString,

    /// Set once the root classes of the language have been synthesized
    pub(crate) roots: OnceCell<()>,
}

impl<'c> LangContext<'c> {
    pub fn new(lang: SourceLang) -> LangContext<'c> {
        let language = language_context(lang);
        LangContext {
            lang,
            language,
            classes: DashMap::new(),
            methods: DashMap::new(),
            fields: DashMap::new(),
            descr_lookup: DashMap::new(),
            file_cache: FileCache::default(),
            primitive_classes: std::array::from_fn(|_| OnceCell::new()),
            object_descr: language.object_descriptor().into(),
            string_descr: language.string_descriptor().into(),
            string_array_descr: language.string_array_descriptor().into(),
            roots: OnceCell::new(),
        }
    }

    pub fn lang(&self) -> SourceLang {
        self.lang
    }

    pub fn language(&self) -> &'static dyn LanguageContext {
        self.language
    }

    pub fn object_descriptor(&self) -> &DescriptorString {
        &self.object_descr
    }

    pub fn string_descriptor(&self) -> &DescriptorString {
        &self.string_descr
    }

    pub fn string_array_descriptor(&self) -> &DescriptorString {
        &self.string_array_descr
    }

    pub fn has_roots(&self) -> bool {
        self.roots.get().is_some()
    }

    pub fn class(&self, id: UniqId) -> Option<&'c CachedClass<'c>> {
        self.classes.get(&id).map(|class| *class)
    }

    pub fn method(&self, id: UniqId) -> Option<&'c CachedMethod<'c>> {
        self.methods.get(&id).map(|method| *method)
    }

    pub fn field(&self, id: UniqId) -> Option<&'c CachedField<'c>> {
        self.fields.get(&id).map(|field| *field)
    }

    /// Class registered under a descriptor
    pub fn find_class(&self, descriptor: &[u8]) -> Option<&'c CachedClass<'c>> {
        self.descr_lookup.get(descriptor).map(|class| *class)
    }

    pub fn primitive_class(&self, type_id: TypeId) -> Option<&'c CachedClass<'c>> {
        self.primitive_classes
            .get(type_id.index())
            .and_then(|cell| cell.get().copied())
    }

    pub(crate) fn set_primitive_class(&self, type_id: TypeId, class: &'c CachedClass<'c>) {
        if let Some(cell) = self.primitive_classes.get(type_id.index()) {
            let _ = cell.set(class);
        }
    }

    /// Every published class, ordered by descriptor
    pub fn classes(&self) -> Vec<&'c CachedClass<'c>> {
        let mut classes: Vec<_> = self.classes.iter().map(|entry| *entry.value()).collect();
        classes.sort_by(|c1, c2| (&c1.descriptor, c1.id).cmp(&(&c2.descriptor, c2.id)));
        classes
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn num_methods(&self) -> usize {
        self.methods.len()
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Publish a fully built class (the first one published under an id stays)
    pub(crate) fn publish_class(&self, class: &'c CachedClass<'c>) -> &'c CachedClass<'c> {
        *self.classes.entry(class.id).or_insert(class)
    }

    pub(crate) fn publish_method(&self, method: &'c CachedMethod<'c>) -> &'c CachedMethod<'c> {
        *self.methods.entry(method.id).or_insert(method)
    }

    pub(crate) fn publish_field(&self, field: &'c CachedField<'c>) -> &'c CachedField<'c> {
        *self.fields.entry(field.id).or_insert(field)
    }

    pub fn file_class(&self, file: &'c PandaFile, id: EntityId) -> Option<&'c CachedClass<'c>> {
        self.file_cache
            .classes
            .get(&(RefId(file), id))
            .map(|class| *class)
    }

    pub fn file_method(&self, file: &'c PandaFile, id: EntityId) -> Option<&'c CachedMethod<'c>> {
        self.file_cache
            .methods
            .get(&(RefId(file), id))
            .map(|method| *method)
    }

    pub fn file_field(&self, file: &'c PandaFile, id: EntityId) -> Option<&'c CachedField<'c>> {
        self.file_cache
            .fields
            .get(&(RefId(file), id))
            .map(|field| *field)
    }

    pub(crate) fn add_file_class(
        &self,
        file: &'c PandaFile,
        id: EntityId,
        class: &'c CachedClass<'c>,
    ) {
        self.file_cache
            .classes
            .entry((RefId(file), id))
            .or_insert(class);
    }

    pub(crate) fn add_file_method(
        &self,
        file: &'c PandaFile,
        id: EntityId,
        method: &'c CachedMethod<'c>,
    ) {
        self.file_cache
            .methods
            .entry((RefId(file), id))
            .or_insert(method);
    }

    pub(crate) fn add_file_field(
        &self,
        file: &'c PandaFile,
        id: EntityId,
        field: &'c CachedField<'c>,
    ) {
        self.file_cache
            .fields
            .entry((RefId(file), id))
            .or_insert(field);
    }
}
