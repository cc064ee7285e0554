//! Bytecode files shared by the integration tests

#![allow(dead_code)]

use libcache::cache::{CachedClass, CachedMethod};
use libcache::panda_file::{
    CatchBlockItem, ClassAccessFlags, CodeItem, EntityId, FieldAccessFlags, FileBuilder, Index,
    MethodAccessFlags, PandaFile, Proto, TryBlockItem, TypeId, TypeRef,
};

pub fn void() -> TypeRef {
    TypeRef::Primitive(TypeId::Void)
}

pub fn i32() -> TypeRef {
    TypeRef::Primitive(TypeId::I32)
}

/// `LA;` with a static `foo: () -> void` and an instance field `x: I`
pub fn minimal_file(name: &str) -> PandaFile {
    let mut builder = FileBuilder::new();
    let a = builder.add_class("LA;", ClassAccessFlags::PUBLIC);
    builder.add_method(
        a,
        "foo",
        Proto::new(void(), vec![]),
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
    );
    builder.add_field(a, "x", i32(), FieldAccessFlags::PUBLIC);
    builder.build(name).unwrap()
}

/// `LBase;`, with constructors, an instance method `get: () -> i32` and a field `count: I`
pub fn base_file() -> PandaFile {
    let mut builder = FileBuilder::new();
    let base = builder.add_class("LBase;", ClassAccessFlags::PUBLIC);
    builder.add_method(
        base,
        ".ctor",
        Proto::new(void(), vec![]),
        MethodAccessFlags::PUBLIC,
    );
    builder.add_method(
        base,
        ".cctor",
        Proto::new(void(), vec![]),
        MethodAccessFlags::STATIC,
    );
    builder.add_method(base, "get", Proto::new(i32(), vec![]), MethodAccessFlags::PUBLIC);
    builder.add_field(base, "count", i32(), FieldAccessFlags::PUBLIC);
    builder.build("lib/base.abc").unwrap()
}

/// Slots of the index tables of `LChild;::run` in `user_file`
pub struct UserIndexes {
    pub base: Index,
    pub get: Index,
    pub count: Index,
}

/// `LChild;` extends `LBase;` (defined in `base_file`), and `run` refers to members of `LBase;`
pub fn user_file() -> (PandaFile, UserIndexes) {
    let mut builder = FileBuilder::new();
    let base = builder.add_foreign_class("LBase;");
    let child = builder.add_class("LChild;", ClassAccessFlags::PUBLIC);
    builder.set_super_class(child, base);

    let get = builder.add_method(base, "get", Proto::new(i32(), vec![]), MethodAccessFlags::PUBLIC);
    let count = builder.add_field(base, "count", i32(), FieldAccessFlags::PUBLIC);
    let run = builder.add_method(
        child,
        "run",
        Proto::new(void(), vec![TypeRef::Class(base)]),
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
    );

    let indexes = UserIndexes {
        base: builder.class_index_entry(TypeRef::Class(base)),
        get: builder.method_index_entry(get),
        count: builder.field_index_entry(count),
    };
    builder.set_code(
        run,
        CodeItem {
            num_vregs: 2,
            num_args: 1,
            instructions: vec![0; 8],
            try_blocks: vec![TryBlockItem {
                start_pc: 0,
                length: 4,
                catch_blocks: vec![
                    CatchBlockItem {
                        type_idx: Some(indexes.base),
                        handler_pc: 4,
                        code_size: 2,
                    },
                    CatchBlockItem {
                        type_idx: Some(42),
                        handler_pc: 6,
                        code_size: 1,
                    },
                    CatchBlockItem {
                        type_idx: None,
                        handler_pc: 7,
                        code_size: 1,
                    },
                ],
            }],
        },
    );
    (builder.build("app/user.abc").unwrap(), indexes)
}

/// Classes defined (not just referenced) by a file
pub fn local_classes(file: &PandaFile) -> Vec<EntityId> {
    file.class_ids()
        .into_iter()
        .filter(|id| !file.is_external(*id))
        .collect()
}

pub fn method<'c>(class: &CachedClass<'c>, name: &str) -> &'c CachedMethod<'c> {
    class
        .methods()
        .into_iter()
        .find(|method| &*method.name == name.as_bytes())
        .unwrap()
}
