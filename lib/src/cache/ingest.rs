use super::hash::{field_hash, file_entity_id, signature_hash};
use super::{
    CachedCatchBlock, CachedClass, CachedField, CachedMethod, ClassFlags, ClassParts, ClassSlot,
    EntitySlot, FieldFlags, Indexes, LangContext, LibCache, MethodFlags, Origin,
};
use crate::descriptors::DescriptorString;
use crate::panda_file::{
    ClassDataAccessor, CodeDataAccessor, EntityId, Error, FieldDataAccessor, IndexHeader,
    MethodDataAccessor, PandaFile, Type, TypeId,
};
use crate::util::RefId;
use log::{error, info, warn};

impl<'c> LibCache<'c> {
    pub fn process_files(&self, files: impl IntoIterator<Item = &'c PandaFile>) {
        for file in files {
            self.process_file(file);
        }
    }

    /// Read every class defined in a file into the cache
    ///
    /// A file is identified by its name and header, so processing it again is a no-op. Another
    /// file with the same identity but a different path is skipped.
    pub fn process_file(&self, file: &'c PandaFile) {
        let _guard = self.construction.lock();

        let existing = self.processed_files.get(&file.uniq_id()).map(|entry| *entry);
        if let Some(existing) = existing {
            if existing.full_filename() == file.full_filename() {
                info!("CACHE: {} is already processed", file.full_filename());
            } else {
                error!(
                    "CACHE: {} has the same identity ({:#010x}) as {}, skipping it",
                    file.full_filename(),
                    file.uniq_id(),
                    existing.full_filename()
                );
            }
            return;
        }
        self.processed_files.insert(file.uniq_id(), RefId(file));

        info!("CACHE: Processing {}", file.full_filename());
        for class_id in file.class_ids() {
            if file.is_external(class_id) {
                continue;
            }
            if let Err(err) = self.process_class(file, class_id) {
                error!(
                    "CACHE: Skipping class {} of {}: {}",
                    class_id,
                    file.filename(),
                    err
                );
            }
        }
    }

    /// Read one class (and its members) into the cache
    pub fn process_class(
        &self,
        file: &'c PandaFile,
        class_id: EntityId,
    ) -> Result<&'c CachedClass<'c>, Error> {
        let _guard = self.construction.lock();

        let accessor = ClassDataAccessor::new(file, class_id)?;
        let lang = accessor
            .source_lang()
            .unwrap_or(self.options.default_source_lang);
        let ctx = self.lang_context(lang);
        let id = file_entity_id(file, class_id);
        if let Some(class) = ctx.class(id) {
            return Ok(class);
        }

        let descriptor = DescriptorString::from(accessor.descriptor());
        let mut ancestors = vec![];
        for interface in accessor.interfaces() {
            if *interface != class_id {
                ancestors.push(class_slot(file, *interface)?);
            }
        }
        let super_class_id = accessor.super_class_id();
        if !super_class_id.is_valid() {
            if &descriptor != ctx.object_descriptor() {
                ancestors.push(ClassSlot::unresolved(ctx.object_descriptor().clone()));
            }
        } else if super_class_id != class_id {
            ancestors.push(class_slot(file, super_class_id)?);
        }
        let method_ids = accessor.method_ids()?;
        let field_ids = accessor.field_ids()?;

        let class = CachedClass::new(
            id,
            descriptor,
            lang,
            TypeId::Reference,
            ClassFlags::from_access_flags(accessor.access_flags()),
            Some(Origin {
                file,
                entity_id: class_id,
            }),
            ClassParts {
                ancestors,
                array_component: None,
            },
        );
        let class: &'c CachedClass<'c> = self.arena(lang).classes.insert(id, Box::new(class));

        for method_id in method_ids {
            if file.is_external(method_id) {
                continue;
            }
            match self.process_method(file, class, method_id) {
                Ok(method) => {
                    class.add_method(method);
                }
                Err(err) => error!(
                    "CACHE: Skipping method {} of {}: {}",
                    method_id, class.descriptor, err
                ),
            }
        }
        for field_id in field_ids {
            if file.is_external(field_id) {
                continue;
            }
            match self.process_field(file, class, field_id) {
                Ok(field) => {
                    class.add_field(field);
                }
                Err(err) => error!(
                    "CACHE: Skipping field {} of {}: {}",
                    field_id, class.descriptor, err
                ),
            }
        }

        ctx.publish_class(class);
        ctx.add_file_class(file, class_id, class);
        self.register_descriptor(ctx, class);
        Ok(class)
    }

    fn process_method(
        &self,
        file: &'c PandaFile,
        class: &'c CachedClass<'c>,
        method_id: EntityId,
    ) -> Result<&'c CachedMethod<'c>, Error> {
        let accessor = MethodDataAccessor::new(file, method_id)?;
        let lang = accessor.source_lang().unwrap_or(class.source_lang);
        let ctx = self.lang_context(lang);
        let id = file_entity_id(file, method_id);
        if let Some(method) = ctx.method(id) {
            return Ok(method);
        }

        let name = accessor.name()?;
        let indexes = self.indexes(ctx, file, method_id)?;
        let signature = accessor
            .types_in_proto(false)?
            .into_iter()
            .map(|ty| type_slot(ctx, file, ty))
            .collect::<Result<Vec<_>, Error>>()?;
        let hash = signature_hash(name, accessor.is_static(), &signature);

        let mut flags = MethodFlags::from_access_flags(accessor.access_flags());
        let language = ctx.language();
        if name == language.ctor_name().as_bytes() {
            flags |= MethodFlags::CONSTRUCTOR;
        } else if name == language.cctor_name().as_bytes() {
            flags |= MethodFlags::STATIC_CONSTRUCTOR;
        }

        let origin = Some(Origin {
            file,
            entity_id: method_id,
        });
        let mut method =
            CachedMethod::new(id, hash, name, class, signature, indexes, flags, origin);
        if let Some(code_id) = accessor.code_id() {
            let code = CodeDataAccessor::new(file, code_id)?;
            method.num_vregs = code.num_vregs();
            method.num_args = code.num_args();
            method.bytecode = Some(code.instructions());
            for try_block in code.try_blocks() {
                for catch_block in &try_block.catch_blocks {
                    let exception_type = match catch_block.type_idx {
                        None => None,
                        Some(idx) => match indexes.classes.get(idx as usize) {
                            Some(slot) => Some(slot.clone()),
                            None => {
                                warn!(
                                    "CACHE: Catch type index {} is out of range in {}::{}",
                                    idx,
                                    class.descriptor,
                                    String::from_utf8_lossy(name)
                                );
                                None
                            }
                        },
                    };
                    method.catch_blocks.push(CachedCatchBlock {
                        try_start: try_block.start_pc,
                        try_end: try_block.start_pc.saturating_add(try_block.length),
                        exception_type,
                        handler_pc: catch_block.handler_pc,
                        code_size: catch_block.code_size,
                    });
                }
            }
        }

        let method: &'c CachedMethod<'c> = self.arena(lang).methods.insert(id, Box::new(method));
        ctx.publish_method(method);
        ctx.add_file_method(file, method_id, method);
        Ok(method)
    }

    fn process_field(
        &self,
        file: &'c PandaFile,
        class: &'c CachedClass<'c>,
        field_id: EntityId,
    ) -> Result<&'c CachedField<'c>, Error> {
        let lang = class.source_lang;
        let ctx = self.lang_context(lang);
        let id = file_entity_id(file, field_id);
        if let Some(field) = ctx.field(id) {
            return Ok(field);
        }

        let accessor = FieldDataAccessor::new(file, field_id)?;
        let name = accessor.name()?;
        let type_slot = type_slot(ctx, file, accessor.field_type())?;
        let hash = field_hash(name, type_slot.descriptor().as_bytes());
        let field = CachedField::new(
            id,
            hash,
            name,
            class,
            type_slot,
            FieldFlags::from_access_flags(accessor.access_flags()),
            Some(Origin {
                file,
                entity_id: field_id,
            }),
        );

        let field: &'c CachedField<'c> = self.arena(lang).fields.insert(id, Box::new(field));
        ctx.publish_field(field);
        ctx.add_file_field(file, field_id, field);
        Ok(field)
    }

    /// Index tables of the region `entity` is in, built on first use
    fn indexes(
        &self,
        ctx: &LangContext<'c>,
        file: &'c PandaFile,
        entity: EntityId,
    ) -> Result<&'c Indexes<'c>, Error> {
        let position = file
            .index_header_position(entity)
            .ok_or(Error::MissingIndexHeader(entity))?;
        let arena = self.arena(ctx.lang());
        let key = (RefId(file), position);
        if let Some(indexes) = arena.indexes.get(&key) {
            return Ok(indexes);
        }

        let header = file
            .index_header(position)
            .ok_or(Error::MissingIndexHeader(entity))?;
        let indexes = self.initialize_index(ctx, file, header)?;
        Ok(arena.indexes.insert(key, Box::new(indexes)))
    }

    /// Turn the index tables of one region into slots
    pub fn initialize_index(
        &self,
        ctx: &LangContext<'c>,
        file: &'c PandaFile,
        header: &IndexHeader,
    ) -> Result<Indexes<'c>, Error> {
        let classes = file
            .class_index(header)?
            .into_iter()
            .map(|ty| type_slot(ctx, file, ty))
            .collect::<Result<Vec<_>, Error>>()?;
        let methods = file
            .method_index(header)?
            .into_iter()
            .map(EntitySlot::new)
            .collect();
        let fields = file
            .field_index(header)?
            .into_iter()
            .map(EntitySlot::new)
            .collect();
        Ok(Indexes {
            classes,
            methods,
            fields,
        })
    }
}

fn class_slot<'c>(file: &PandaFile, class_id: EntityId) -> Result<ClassSlot<'c>, Error> {
    Ok(ClassSlot::unresolved(DescriptorString::from(
        file.string_data(class_id)?,
    )))
}

/// Slot for a type in a file: primitives resolve right away, references stay descriptors
fn type_slot<'c>(
    ctx: &LangContext<'c>,
    file: &PandaFile,
    ty: Type,
) -> Result<ClassSlot<'c>, Error> {
    match ty {
        Type::Primitive(type_id) => match ctx.primitive_class(type_id) {
            Some(class) => Ok(ClassSlot::resolved(class)),
            None => DescriptorString::primitive(type_id)
                .map(ClassSlot::unresolved)
                .ok_or(Error::BadTypeId(type_id.code())),
        },
        Type::Reference(class_id) => class_slot(file, class_id),
    }
}
