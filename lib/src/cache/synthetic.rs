use super::hash::{perturb_method_id, signature_hash, synthetic_class_id, synthetic_method_id};
use super::{
    CachedClass, CachedMethod, ClassFlags, ClassParts, ClassSlot, LangContext, LibCache,
    MethodFlags, MethodParts, VerifierMessage,
};
use crate::descriptors::DescriptorString;
use crate::panda_file::{SourceLang, TypeId};
use dashmap::mapref::entry::Entry;
use log::{debug, info};

impl<'c> LibCache<'c> {
    /// Synthesize a class which isn't defined in any file
    ///
    /// The filler sets the ancestors and array component. Synthesizing the same descriptor twice
    /// in one language is a bug, and panics.
    pub fn make_synthetic_class(
        &self,
        lang: SourceLang,
        descriptor: DescriptorString,
        type_id: TypeId,
        flags: ClassFlags,
        filler: impl FnOnce(&mut ClassParts<'c>),
    ) -> &'c CachedClass<'c> {
        let ctx = self.lang_context(lang);
        let _guard = self.construction.lock();
        let mut parts = ClassParts::default();
        filler(&mut parts);
        let class = self.alloc_synthetic_class(ctx, descriptor, type_id, flags, parts);
        self.publish_synthetic_class(ctx, class);
        class
    }

    /// Synthesize a method on a class
    ///
    /// The filler pushes the signature (return type first) and sets the number of arguments.
    pub fn make_synthetic_method(
        &self,
        class: &'c CachedClass<'c>,
        name: &str,
        is_static: bool,
        filler: impl FnOnce(&mut MethodParts<'c>),
    ) -> &'c CachedMethod<'c> {
        let ctx = self.lang_context(class.source_lang);
        let _guard = self.construction.lock();
        self.make_synthetic_method_in(ctx, class, name, is_static, filler)
    }

    /// Synthesize an array class, along with every lower rank array of the same element
    ///
    /// Ranks which already exist are reused, so this returns the existing class if there is one.
    pub fn add_array(
        &self,
        lang: SourceLang,
        descriptor: &DescriptorString,
    ) -> &'c CachedClass<'c> {
        let ctx = self.lang_context(lang);
        let _guard = self.construction.lock();
        self.add_array_in(ctx, descriptor)
    }

    /// Synthesize the root classes of a language, if that hasn't happened yet
    pub fn initialize_root_classes(&self, lang: SourceLang) {
        self.lang_context(lang);
    }

    /// Caller must hold the construction lock
    pub(crate) fn add_array_in(
        &self,
        ctx: &LangContext<'c>,
        descriptor: &DescriptorString,
    ) -> &'c CachedClass<'c> {
        assert!(
            descriptor.is_array(),
            "{} is not an array descriptor",
            descriptor
        );

        let element = descriptor.element();
        for dimensions in 1..descriptor.dimensionality() {
            let lower = DescriptorString::array_of(&element, dimensions);
            if ctx.find_class(lower.as_bytes()).is_none() {
                self.synthesize_array(ctx, lower);
            }
        }

        match ctx.find_class(descriptor.as_bytes()) {
            Some(class) => class,
            None => self.synthesize_array(ctx, descriptor.clone()),
        }
    }

    fn synthesize_array(
        &self,
        ctx: &LangContext<'c>,
        descriptor: DescriptorString,
    ) -> &'c CachedClass<'c> {
        let component = DescriptorString::from(&descriptor.as_bytes()[1..]);
        let mut flags =
            ClassFlags::PUBLIC | ClassFlags::FINAL | ClassFlags::ABSTRACT | ClassFlags::ARRAY_CLASS;
        if component.len() > 1 {
            flags |= ClassFlags::OBJECT_ARRAY_CLASS;
        }
        let rank = descriptor.dimensionality();
        let parts = ClassParts {
            ancestors: vec![ClassSlot::unresolved(ctx.object_descriptor().clone())],
            array_component: Some(ClassSlot::unresolved(component)),
        };
        let class = self.alloc_synthetic_class(ctx, descriptor, TypeId::Reference, flags, parts);

        let ctor_name = ctx.language().ctor_name();
        for dimensions in 0..=rank {
            self.make_synthetic_method_in(ctx, class, ctor_name, true, |parts| {
                parts.signature.push(ClassSlot::resolved(class));
                for _ in 0..dimensions {
                    parts.signature.push(primitive_slot(ctx, TypeId::I32));
                }
                parts.num_args = dimensions as u32;
                parts.flags |= MethodFlags::ARRAY_CONSTRUCTOR;
            });
        }

        self.publish_synthetic_class(ctx, class);
        class
    }

    /// Build the root classes of a language
    ///
    /// Runs under the construction lock, from inside the language's roots latch.
    pub(crate) fn synthesize_roots(&self, ctx: &LangContext<'c>) {
        let _guard = self.construction.lock();
        let api = ctx.language().verification_init_api();

        for type_id in api.primitive_roots {
            if let Some(descriptor) = DescriptorString::primitive(*type_id) {
                let flags = ClassFlags::PUBLIC
                    | ClassFlags::FINAL
                    | ClassFlags::ABSTRACT
                    | ClassFlags::PRIMITIVE;
                let class = self.alloc_synthetic_class(
                    ctx,
                    descriptor,
                    *type_id,
                    flags,
                    ClassParts::default(),
                );
                self.publish_synthetic_class(ctx, class);
                ctx.set_primitive_class(*type_id, class);
            }
        }

        for element in api.array_elements {
            let descriptor = DescriptorString::array_of(&DescriptorString::from(*element), 1);
            self.add_array_in(ctx, &descriptor);
        }

        let object = ctx.object_descriptor().clone();
        let object_ancestor = || ClassParts {
            ancestors: vec![ClassSlot::unresolved(object.clone())],
            array_component: None,
        };
        let mut roots = vec![];
        if api.need_object {
            roots.push((object.clone(), ClassParts::default()));
        }
        if api.need_string {
            roots.push((ctx.string_descriptor().clone(), object_ancestor()));
        }
        if api.need_class {
            let descriptor = DescriptorString::from(ctx.language().class_descriptor());
            roots.push((descriptor, object_ancestor()));
        }
        let flags = ClassFlags::PUBLIC | ClassFlags::FINAL | ClassFlags::ABSTRACT;
        for (descriptor, parts) in roots {
            if ctx.find_class(descriptor.as_bytes()).is_none() {
                let class =
                    self.alloc_synthetic_class(ctx, descriptor, TypeId::Reference, flags, parts);
                self.publish_synthetic_class(ctx, class);
            }
        }

        info!(
            "CACHE: Initialized {} root classes for {}",
            ctx.num_classes(),
            ctx.lang()
        );
    }

    fn alloc_synthetic_class(
        &self,
        ctx: &LangContext<'c>,
        descriptor: DescriptorString,
        type_id: TypeId,
        flags: ClassFlags,
        parts: ClassParts<'c>,
    ) -> &'c CachedClass<'c> {
        let id = synthetic_class_id(&descriptor);
        let arena = self.arena(ctx.lang());
        assert!(
            arena.classes.get(&id).is_none(),
            "synthetic class {} ({:#018x}) already exists in {}",
            descriptor,
            id,
            ctx.lang()
        );
        let class = CachedClass::new(id, descriptor, ctx.lang(), type_id, flags, None, parts);
        arena.classes.insert(id, Box::new(class))
    }

    fn publish_synthetic_class(&self, ctx: &LangContext<'c>, class: &'c CachedClass<'c>) {
        ctx.publish_class(class);
        self.register_descriptor(ctx, class);
    }

    pub(crate) fn make_synthetic_method_in(
        &self,
        ctx: &LangContext<'c>,
        class: &'c CachedClass<'c>,
        name: &str,
        is_static: bool,
        filler: impl FnOnce(&mut MethodParts<'c>),
    ) -> &'c CachedMethod<'c> {
        let mut parts = MethodParts {
            signature: vec![],
            num_args: 0,
            flags: if is_static {
                MethodFlags::STATIC
            } else {
                MethodFlags::empty()
            },
        };
        filler(&mut parts);

        let hash = signature_hash(name.as_bytes(), is_static, &parts.signature);
        let provisional = synthetic_method_id(&class.descriptor, name.as_bytes());
        let id = perturb_method_id(provisional, hash, parts.num_args);

        let arena = self.arena(ctx.lang());
        assert!(
            arena.methods.get(&id).is_none(),
            "synthetic method {}::{} ({:#018x}) already exists in {}",
            class.descriptor,
            name,
            id,
            ctx.lang()
        );
        let mut method = CachedMethod::new(
            id,
            hash,
            name.as_bytes(),
            class,
            parts.signature,
            &self.arenas.empty_indexes,
            parts.flags,
            None,
        );
        method.num_args = parts.num_args;
        let method: &'c CachedMethod<'c> = arena.methods.insert(id, Box::new(method));

        ctx.publish_method(method);
        class.add_method(method);
        method
    }

    /// Make a class findable by its descriptor, unless some other class got there first
    pub(crate) fn register_descriptor(&self, ctx: &LangContext<'c>, class: &'c CachedClass<'c>) {
        let existing = match ctx.descr_lookup.entry(class.descriptor.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(class);
                None
            }
            Entry::Occupied(entry) => Some(*entry.get()),
        };
        match existing {
            None => debug!("CACHE: Added {} {}", ctx.lang(), class.descriptor),
            Some(existing) if std::ptr::eq(existing, class) => (),
            Some(existing) => self.report(
                VerifierMessage::ConflictingClassDefinitions,
                format_args!(
                    "{} is defined by both {:?} and {:?} in {}, keeping the first one",
                    class.descriptor,
                    existing.origin,
                    class.origin,
                    ctx.lang()
                ),
            ),
        }
    }
}

/// Slot for a primitive type, resolved if the language has a class for it
fn primitive_slot<'c>(ctx: &LangContext<'c>, type_id: TypeId) -> ClassSlot<'c> {
    match ctx.primitive_class(type_id) {
        Some(class) => ClassSlot::resolved(class),
        None => {
            let descriptor = DescriptorString::primitive(type_id)
                .unwrap_or_else(|| DescriptorString::from(type_id.name()));
            ClassSlot::unresolved(descriptor)
        }
    }
}
