use super::hash::{file_field_hash, file_method_hash};
use super::{
    CachedClass, CachedField, CachedMethod, ClassRef, ClassSlot, LangContext, LibCache, UniqId,
};
use crate::descriptors::DescriptorString;
use crate::panda_file::{EntityId, FieldDataAccessor, Index, MethodDataAccessor, SourceLang};
use crate::util::RefId;
use log::{error, warn};

/// Classes being linked further up the current chain of `link_class` calls
type InProgress<'c> = Vec<RefId<'c, CachedClass<'c>>>;

/// Entities which can be looked up through the index tables of a method
pub trait IndexLookup<'c>: Sized + 'c {
    /// Look up entry `idx` of the relevant index table, resolving and linking it
    fn get_from_cache(
        cache: &LibCache<'c>,
        method: &CachedMethod<'c>,
        idx: Index,
    ) -> Option<&'c Self>;
}

impl<'c> IndexLookup<'c> for CachedClass<'c> {
    fn get_from_cache(
        cache: &LibCache<'c>,
        method: &CachedMethod<'c>,
        idx: Index,
    ) -> Option<&'c Self> {
        let slot = index_entry(&method.indexes.classes, "class", method, idx)?;
        match slot.get() {
            ClassRef::Resolved(class) => cache.link_class(class).then(|| class),
            ClassRef::Unresolved(descriptor) => {
                let report_error = cache.options.report_unresolved_in_index;
                let class =
                    cache.resolve_and_link(method.klass.source_lang, descriptor, report_error)?;
                Some(slot.resolve(class))
            }
        }
    }
}

impl<'c> IndexLookup<'c> for CachedMethod<'c> {
    fn get_from_cache(
        cache: &LibCache<'c>,
        method: &CachedMethod<'c>,
        idx: Index,
    ) -> Option<&'c Self> {
        let slot = index_entry(&method.indexes.methods, "method", method, idx)?;
        if let Some(found) = slot.get() {
            return Some(found);
        }
        let origin = method.origin?;
        let ctx = cache.lang_context(method.klass.source_lang);
        if let Some(found) = ctx.file_method(origin.file, slot.id) {
            return cache.link_method(found).then(|| slot.resolve(found));
        }
        let found = cache.resolve_method(method, slot.id)?;
        Some(slot.resolve(found))
    }
}

impl<'c> IndexLookup<'c> for CachedField<'c> {
    fn get_from_cache(
        cache: &LibCache<'c>,
        method: &CachedMethod<'c>,
        idx: Index,
    ) -> Option<&'c Self> {
        let slot = index_entry(&method.indexes.fields, "field", method, idx)?;
        if let Some(found) = slot.get() {
            return Some(found);
        }
        let origin = method.origin?;
        let ctx = cache.lang_context(method.klass.source_lang);
        if let Some(found) = ctx.file_field(origin.file, slot.id) {
            return cache.link_field(found).then(|| slot.resolve(found));
        }
        let found = cache.resolve_field(method, slot.id)?;
        Some(slot.resolve(found))
    }
}

fn index_entry<'a, T>(
    table: &'a [T],
    kind: &str,
    method: &CachedMethod<'_>,
    idx: Index,
) -> Option<&'a T> {
    let entry = table.get(idx as usize);
    if entry.is_none() {
        warn!(
            "CACHE: {} index {} is out of range ({} entries) in {}",
            kind,
            idx,
            table.len(),
            method
        );
    }
    entry
}

impl<'c> LibCache<'c> {
    /// Find a class by descriptor, synthesizing it if it is an array
    ///
    /// Misses are logged as warnings when `report_error` is set, and as errors otherwise.
    pub fn resolve_by_descriptor(
        &self,
        lang: SourceLang,
        descriptor: &DescriptorString,
        report_error: bool,
    ) -> Option<&'c CachedClass<'c>> {
        let ctx = self.lang_context(lang);
        self.resolve_in(ctx, descriptor, report_error)
    }

    fn resolve_in(
        &self,
        ctx: &LangContext<'c>,
        descriptor: &DescriptorString,
        report_error: bool,
    ) -> Option<&'c CachedClass<'c>> {
        if let Some(class) = ctx.find_class(descriptor.as_bytes()) {
            return Some(class);
        }
        if descriptor.is_array() {
            let _guard = self.construction.lock();
            return Some(self.add_array_in(ctx, descriptor));
        }
        if report_error {
            warn!("CACHE: Cannot resolve {} in {}", descriptor, ctx.lang());
        } else {
            error!("CACHE: Cannot resolve {} in {}", descriptor, ctx.lang());
        }
        None
    }

    /// Find a class by descriptor and link it
    pub fn resolve_and_link(
        &self,
        lang: SourceLang,
        descriptor: &DescriptorString,
        report_error: bool,
    ) -> Option<&'c CachedClass<'c>> {
        let class = self.resolve_by_descriptor(lang, descriptor, report_error)?;
        if self.link_class_with(class, report_error, &mut vec![]) {
            Some(class)
        } else if report_error {
            warn!("CACHE: Cannot link {} in {}", descriptor, lang);
            None
        } else {
            error!("CACHE: Cannot link {} in {}", descriptor, lang);
            None
        }
    }

    /// Resolve the ancestors and array component of a class, recursively
    ///
    /// Returns whether everything resolved. The class is only marked as linked if so.
    pub fn link_class(&self, class: &'c CachedClass<'c>) -> bool {
        self.link_class_with(class, true, &mut vec![])
    }

    fn link_class_with(
        &self,
        class: &'c CachedClass<'c>,
        report_error: bool,
        in_progress: &mut InProgress<'c>,
    ) -> bool {
        if class.is_linked() || in_progress.contains(&RefId(class)) {
            return true;
        }

        in_progress.push(RefId(class));
        let ctx = self.lang_context(class.source_lang);
        let mut linked = true;
        for slot in class.ancestors.iter().chain(&class.array_component) {
            linked = self.link_slot(ctx, slot, report_error, in_progress) && linked;
        }
        in_progress.pop();

        if linked {
            class.mark_linked();
        }
        linked
    }

    fn link_slot(
        &self,
        ctx: &LangContext<'c>,
        slot: &ClassSlot<'c>,
        report_error: bool,
        in_progress: &mut InProgress<'c>,
    ) -> bool {
        let class = match slot.get() {
            ClassRef::Resolved(class) => class,
            ClassRef::Unresolved(descriptor) => {
                match self.resolve_in(ctx, descriptor, report_error) {
                    Some(class) => slot.resolve(class),
                    None => return false,
                }
            }
        };
        self.link_class_with(class, report_error, in_progress)
    }

    /// Link the class of a method, along with every type in its signature and catch blocks
    pub fn link_method(&self, method: &'c CachedMethod<'c>) -> bool {
        self.link_method_with(method, true)
    }

    fn link_method_with(&self, method: &'c CachedMethod<'c>, report_error: bool) -> bool {
        if method.is_linked() {
            return true;
        }

        let mut in_progress = vec![];
        let mut linked = self.link_class_with(method.klass, report_error, &mut in_progress);
        let ctx = self.lang_context(method.klass.source_lang);
        let catch_types = method
            .catch_blocks
            .iter()
            .filter_map(|catch_block| catch_block.exception_type.as_ref());
        for slot in method.signature.iter().chain(catch_types) {
            linked = self.link_slot(ctx, slot, report_error, &mut in_progress) && linked;
        }

        if linked {
            method.mark_linked();
        }
        linked
    }

    /// Link the class of a field, along with its type
    pub fn link_field(&self, field: &'c CachedField<'c>) -> bool {
        self.link_field_with(field, true)
    }

    fn link_field_with(&self, field: &'c CachedField<'c>, report_error: bool) -> bool {
        if field.is_linked() {
            return true;
        }

        let mut in_progress = vec![];
        let ctx = self.lang_context(field.klass.source_lang);
        let linked = self.link_class_with(field.klass, report_error, &mut in_progress)
            & self.link_slot(ctx, &field.type_slot, report_error, &mut in_progress);

        if linked {
            field.mark_linked();
        }
        linked
    }

    /// Look up an entry of one of the index tables of a method
    pub fn get_from_cache<T: IndexLookup<'c>>(
        &self,
        method: &CachedMethod<'c>,
        idx: Index,
    ) -> Option<&'c T> {
        T::get_from_cache(self, method, idx)
    }

    /// Resolve a method referenced (by offset) from the file of `caller`
    ///
    /// The owning class is found by descriptor, and the method inside it (or its ancestors) by
    /// hash, so the definition can live in any processed file.
    pub fn resolve_method(
        &self,
        caller: &CachedMethod<'c>,
        id: EntityId,
    ) -> Option<&'c CachedMethod<'c>> {
        let file = caller.origin?.file;
        let caller_lang = caller.klass.source_lang;
        let accessor = match MethodDataAccessor::new(file, id) {
            Ok(accessor) => accessor,
            Err(err) => {
                error!("CACHE: Malformed method {} in {}: {}", id, file.filename(), err);
                return None;
            }
        };
        let lang = accessor.source_lang().unwrap_or(caller_lang);
        let resolved = file
            .string_data(accessor.class_id())
            .map(DescriptorString::from)
            .and_then(|descriptor| Ok((descriptor, file_method_hash(file, &accessor)?)));
        let (class_descriptor, hash) = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                error!("CACHE: Malformed method {} in {}: {}", id, file.filename(), err);
                return None;
            }
        };

        let class = self.resolve_and_link(lang, &class_descriptor, true)?;
        let method = class.resolve_method(hash)?;
        if !self.link_method(method) {
            warn!("CACHE: Cannot link {}", method);
            return None;
        }
        self.lang_context(caller_lang).add_file_method(file, id, method);
        Some(method)
    }

    /// Resolve a field referenced (by offset) from the file of `caller`
    pub fn resolve_field(
        &self,
        caller: &CachedMethod<'c>,
        id: EntityId,
    ) -> Option<&'c CachedField<'c>> {
        let file = caller.origin?.file;
        let lang = caller.klass.source_lang;
        let resolved = FieldDataAccessor::new(file, id).and_then(|accessor| {
            let descriptor = DescriptorString::from(file.string_data(accessor.class_id())?);
            Ok((descriptor, file_field_hash(file, &accessor)?))
        });
        let (class_descriptor, hash) = match resolved {
            Ok(resolved) => resolved,
            Err(err) => {
                error!("CACHE: Malformed field {} in {}: {}", id, file.filename(), err);
                return None;
            }
        };

        let class = self.resolve_and_link(lang, &class_descriptor, true)?;
        let field = class.resolve_field(hash)?;
        if !self.link_field(field) {
            warn!("CACHE: Cannot link {}", field);
            return None;
        }
        self.lang_context(lang).add_file_field(file, id, field);
        Some(field)
    }

    /// Published class by id, linked
    pub fn get_class(
        &self,
        lang: SourceLang,
        id: UniqId,
        report_error: bool,
    ) -> Option<&'c CachedClass<'c>> {
        match self.lang_context(lang).class(id) {
            Some(class) => self.link_class_with(class, report_error, &mut vec![]).then(|| class),
            None => {
                not_found("class", lang, id, report_error);
                None
            }
        }
    }

    /// Published method by id, linked
    pub fn get_method(
        &self,
        lang: SourceLang,
        id: UniqId,
        report_error: bool,
    ) -> Option<&'c CachedMethod<'c>> {
        match self.lang_context(lang).method(id) {
            Some(method) => self.link_method_with(method, report_error).then(|| method),
            None => {
                not_found("method", lang, id, report_error);
                None
            }
        }
    }

    /// Published field by id, linked
    pub fn get_field(
        &self,
        lang: SourceLang,
        id: UniqId,
        report_error: bool,
    ) -> Option<&'c CachedField<'c>> {
        match self.lang_context(lang).field(id) {
            Some(field) => self.link_field_with(field, report_error).then(|| field),
            None => {
                not_found("field", lang, id, report_error);
                None
            }
        }
    }

    /// String class of the language of `method`
    pub fn get_string_class(&self, method: &CachedMethod<'c>) -> Option<&'c CachedClass<'c>> {
        let lang = method.klass.source_lang;
        let descriptor = self.lang_context(lang).string_descriptor().clone();
        self.resolve_and_link(lang, &descriptor, true)
    }

    pub fn get_string_array_class(&self, lang: SourceLang) -> Option<&'c CachedClass<'c>> {
        let descriptor = self.lang_context(lang).string_array_descriptor().clone();
        self.resolve_and_link(lang, &descriptor, true)
    }

    pub fn get_object_class(&self, lang: SourceLang) -> Option<&'c CachedClass<'c>> {
        let descriptor = self.lang_context(lang).object_descriptor().clone();
        self.resolve_and_link(lang, &descriptor, true)
    }
}

fn not_found(kind: &str, lang: SourceLang, id: UniqId, report_error: bool) {
    if report_error {
        warn!("CACHE: No {} with id {:#018x} in {}", kind, id, lang);
    } else {
        error!("CACHE: No {} with id {:#018x} in {}", kind, id, lang);
    }
}
