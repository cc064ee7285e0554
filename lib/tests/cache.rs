mod fixtures;

use fixtures::*;
use libcache::cache::{
    file_entity_id, CacheArenas, CacheOptions, CachedClass, CachedField, CachedMethod, LibCache,
    MethodFlags, VerifierMessage,
};
use libcache::panda_file::{
    ClassAccessFlags, FieldAccessFlags, FileBuilder, MethodAccessFlags, Proto, SourceLang,
    TypeRef,
};
use std::ptr;

const PA: SourceLang = SourceLang::PandaAssembly;

#[test]
fn minimal_class() {
    let file = minimal_file("a.abc");
    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_file(&file);

    let class = cache.resolve_and_link(PA, &"LA;".into(), true).unwrap();
    assert!(class.is_linked());
    assert_eq!(class.origin.unwrap().file.filename(), "a.abc");

    let methods = class.methods();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods[0].to_string(), "LA;::foo : (void)");
    assert!(methods[0].is_static());

    let fields = class.fields();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].to_string(), "LA;.x : I");
}

#[test]
fn identities_are_stable_across_caches() {
    let file = minimal_file("a.abc");
    let same = minimal_file("a.abc");
    let class_id = local_classes(&file)[0];

    let first_arenas = CacheArenas::new();
    let first = LibCache::new(&first_arenas, CacheOptions::new());
    first.process_file(&file);
    let second_arenas = CacheArenas::new();
    let second = LibCache::new(&second_arenas, CacheOptions::new());
    second.process_file(&same);

    let a1 = first.resolve_and_link(PA, &"LA;".into(), true).unwrap();
    let a2 = second.resolve_and_link(PA, &"LA;".into(), true).unwrap();
    assert_eq!(a1.id, a2.id);
    assert_eq!(a1.id, file_entity_id(&file, class_id));
    assert_eq!(a1.methods()[0].id, a2.methods()[0].id);
    assert_eq!(a1.fields()[0].id, a2.fields()[0].id);
    assert_eq!(a1.methods()[0].hash, a2.methods()[0].hash);

    let object1 = first.get_object_class(PA).unwrap();
    let object2 = second.get_object_class(PA).unwrap();
    assert_eq!(object1.id, object2.id);
}

#[test]
fn references_resolve_across_files() {
    let base_file = base_file();
    let (user_file, idx) = user_file();
    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_files([&user_file, &base_file]);
    assert_eq!(cache.processed_files(), 2);

    let base = cache.resolve_and_link(PA, &"LBase;".into(), true).unwrap();
    let child = cache.resolve_and_link(PA, &"LChild;".into(), true).unwrap();
    let run = method(child, "run");

    let class = cache.get_from_cache::<CachedClass>(run, idx.base).unwrap();
    assert!(ptr::eq(class, base));

    let get = cache.get_from_cache::<CachedMethod>(run, idx.get).unwrap();
    let defined = method(base, "get");
    assert!(ptr::eq(get, defined));
    assert_eq!(get.hash, defined.hash);
    assert_eq!(get.to_string(), "LBase;::get : (i32)");
    assert!(get.is_linked());

    let count = cache.get_from_cache::<CachedField>(run, idx.count).unwrap();
    assert!(ptr::eq(count.klass, base));
    assert_eq!(count.to_string(), "LBase;.count : I");

    // Second lookups come straight out of the slots
    assert!(ptr::eq(
        cache.get_from_cache::<CachedMethod>(run, idx.get).unwrap(),
        get
    ));
    assert!(ptr::eq(
        cache.get_from_cache::<CachedField>(run, idx.count).unwrap(),
        count
    ));
}

#[test]
fn out_of_range_indexes() {
    let base_file = base_file();
    let (user_file, _) = user_file();
    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_files([&base_file, &user_file]);

    let child = cache.resolve_and_link(PA, &"LChild;".into(), true).unwrap();
    let run = method(child, "run");
    assert_eq!(run.indexes.classes.len(), 1);
    assert!(cache.get_from_cache::<CachedClass>(run, 1).is_none());
    assert!(cache.get_from_cache::<CachedClass>(run, u32::MAX).is_none());
    assert!(cache.get_from_cache::<CachedMethod>(run, 7).is_none());
    assert!(cache.get_from_cache::<CachedField>(run, 7).is_none());

    // Synthetic methods have no index tables at all
    let array = cache.add_array(PA, &"[I".into());
    let ctor = array.methods()[0];
    assert!(cache.get_from_cache::<CachedClass>(ctor, 0).is_none());
}

#[test]
fn inherited_lookup_is_remembered() {
    let base_file = base_file();
    let (user_file, _) = user_file();
    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_files([&base_file, &user_file]);

    let base = cache.resolve_and_link(PA, &"LBase;".into(), true).unwrap();
    let child = cache.resolve_and_link(PA, &"LChild;".into(), true).unwrap();
    let get = method(base, "get");
    let base_methods = base.methods().len();

    assert!(child.method(get.hash).is_none());
    let first = child.resolve_method(get.hash).unwrap();
    assert!(ptr::eq(first, get));
    assert!(ptr::eq(child.method(get.hash).unwrap(), get));
    let second = child.resolve_method(get.hash).unwrap();
    assert!(ptr::eq(first, second));
    assert_eq!(base.methods().len(), base_methods);

    let count = base.fields()[0];
    assert!(child.field(count.hash).is_none());
    assert!(ptr::eq(child.resolve_field(count.hash).unwrap(), count));
    assert!(child.field(count.hash).is_some());

    assert!(child.resolve_method(0xdead_beef).is_none());
}

#[test]
fn linking_is_idempotent() {
    let base_file = base_file();
    let (user_file, _) = user_file();
    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_files([&base_file, &user_file]);

    let child = cache
        .resolve_by_descriptor(PA, &"LChild;".into(), true)
        .unwrap();
    assert!(!child.is_linked());
    assert!(!child.ancestors[0].is_resolved());

    assert!(cache.link_class(child));
    let base = child.ancestors[0].resolved_class().unwrap();
    assert_eq!(base.descriptor.as_bytes(), b"LBase;");
    assert!(base.is_linked());

    assert!(cache.link_class(child));
    assert!(ptr::eq(child.ancestors[0].resolved_class().unwrap(), base));
}

#[test]
fn unresolvable_ancestor() {
    let mut builder = FileBuilder::new();
    let missing = builder.add_foreign_class("LMissing;");
    let orphan = builder.add_class("LOrphan;", ClassAccessFlags::PUBLIC);
    builder.set_super_class(orphan, missing);
    let file = builder.build("orphan.abc").unwrap();

    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_file(&file);

    assert!(cache.resolve_and_link(PA, &"LOrphan;".into(), true).is_none());
    let orphan = cache
        .resolve_by_descriptor(PA, &"LOrphan;".into(), true)
        .unwrap();
    assert!(!cache.link_class(orphan));
    assert!(!orphan.is_linked());
    assert!(cache.resolve_by_descriptor(PA, &"LMissing;".into(), false).is_none());
}

#[test]
fn inheritance_cycle() {
    let mut builder = FileBuilder::new();
    let a = builder.add_class("LA;", ClassAccessFlags::PUBLIC);
    let b = builder.add_class("LB;", ClassAccessFlags::PUBLIC);
    builder.set_super_class(a, b);
    builder.set_super_class(b, a);
    let file = builder.build("cycle.abc").unwrap();

    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_file(&file);

    let a = cache.resolve_and_link(PA, &"LA;".into(), true).unwrap();
    let b = cache.resolve_by_descriptor(PA, &"LB;".into(), true).unwrap();
    assert!(b.is_linked());
    assert!(ptr::eq(a.ancestors[0].resolved_class().unwrap(), b));
    assert!(ptr::eq(b.ancestors[0].resolved_class().unwrap(), a));
    assert!(a.resolve_method(1).is_none());
    assert!(b.resolve_field(1).is_none());
}

#[test]
fn interfaces_come_before_the_super_class() {
    let mut builder = FileBuilder::new();
    let iface = builder.add_class(
        "LI;",
        ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT,
    );
    let a = builder.add_class("LA;", ClassAccessFlags::PUBLIC);
    builder.add_interface(a, iface);
    builder.add_method(iface, "run", Proto::new(void(), vec![]), MethodAccessFlags::ABSTRACT);
    let file = builder.build("iface.abc").unwrap();

    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_file(&file);

    let a = cache.resolve_and_link(PA, &"LA;".into(), true).unwrap();
    let ancestors: Vec<_> = a
        .ancestors
        .iter()
        .map(|slot| slot.descriptor().to_string())
        .collect();
    assert_eq!(ancestors, ["LI;", "Lpanda/Object;"]);

    let iface = a.ancestors[0].resolved_class().unwrap();
    assert!(iface.is_interface());
    let run = method(iface, "run");
    assert!(ptr::eq(a.resolve_method(run.hash).unwrap(), run));
}

#[test]
fn conflicting_definitions_keep_the_first() {
    let one = minimal_file("one.abc");
    let two = minimal_file("two.abc");
    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_files([&one, &two]);

    assert_eq!(cache.processed_files(), 2);
    assert_eq!(
        cache.message_count(VerifierMessage::ConflictingClassDefinitions),
        1
    );
    let found = cache.resolve_and_link(PA, &"LA;".into(), true).unwrap();
    assert_eq!(found.origin.unwrap().file.filename(), "one.abc");

    let one_id = file_entity_id(&one, local_classes(&one)[0]);
    let two_id = file_entity_id(&two, local_classes(&two)[0]);
    assert_ne!(one_id, two_id);
    let first = cache.get_class(PA, one_id, true).unwrap();
    let second = cache.get_class(PA, two_id, true).unwrap();
    assert!(ptr::eq(first, found));
    assert_eq!(second.origin.unwrap().file.filename(), "two.abc");
}

#[test]
fn hidden_conflicts_are_not_counted() {
    let one = minimal_file("one.abc");
    let two = minimal_file("two.abc");
    let arenas = CacheArenas::new();
    let options = CacheOptions::new().hide(VerifierMessage::ConflictingClassDefinitions);
    let cache = LibCache::new(&arenas, options);
    cache.process_files([&one, &two]);

    assert_eq!(
        cache.message_count(VerifierMessage::ConflictingClassDefinitions),
        0
    );
    let found = cache.resolve_and_link(PA, &"LA;".into(), true).unwrap();
    assert_eq!(found.origin.unwrap().file.filename(), "one.abc");
}

#[test]
fn files_are_processed_once() {
    let file = minimal_file("out/a.abc");
    let moved = minimal_file("elsewhere/a.abc");
    assert_eq!(file.uniq_id(), moved.uniq_id());

    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_file(&file);
    let classes = cache.lang_context(PA).num_classes();
    cache.process_file(&file);
    cache.process_file(&moved);

    assert_eq!(cache.processed_files(), 1);
    assert_eq!(cache.lang_context(PA).num_classes(), classes);
    assert_eq!(
        cache.message_count(VerifierMessage::ConflictingClassDefinitions),
        0
    );
    let class = cache.resolve_and_link(PA, &"LA;".into(), true).unwrap();
    assert_eq!(class.origin.unwrap().file.full_filename(), "out/a.abc");
}

#[test]
fn code_and_catch_blocks() {
    let base_file = base_file();
    let (user_file, _) = user_file();
    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_files([&base_file, &user_file]);

    let child = cache.resolve_and_link(PA, &"LChild;".into(), true).unwrap();
    let run = method(child, "run");
    assert_eq!(run.code_size(), 8);
    assert_eq!(run.num_vregs, 2);
    assert_eq!(run.num_args, 1);

    assert_eq!(run.catch_blocks.len(), 3);
    let typed = &run.catch_blocks[0];
    assert_eq!((typed.try_start, typed.try_end), (0, 4));
    assert_eq!(typed.handler_pc, 4);
    let exception = typed.exception_type.as_ref().unwrap();
    assert_eq!(exception.descriptor().as_bytes(), b"LBase;");

    // A type index past the class table leaves the block untyped
    let untyped = &run.catch_blocks[1];
    assert!(untyped.exception_type.is_none());
    assert_eq!((untyped.try_start, untyped.try_end), (0, 4));
    assert_eq!((untyped.handler_pc, untyped.code_size), (6, 1));

    assert!(run.catch_blocks[2].exception_type.is_none());
    assert_eq!(run.catch_blocks[2].handler_pc, 7);

    assert!(cache.link_method(run));
    assert!(run.is_linked());
    let base = cache.resolve_by_descriptor(PA, &"LBase;".into(), true).unwrap();
    assert!(ptr::eq(exception.resolved_class().unwrap(), base));
    assert_eq!(run.to_string(), "LChild;::run : (void, LBase;)");
}

#[test]
fn constructors_are_flagged() {
    let file = base_file();
    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_file(&file);

    let base = cache.resolve_and_link(PA, &"LBase;".into(), true).unwrap();
    assert!(method(base, ".ctor").flags.contains(MethodFlags::CONSTRUCTOR));
    assert!(method(base, ".ctor").is_constructor());
    assert!(method(base, ".cctor")
        .flags
        .contains(MethodFlags::STATIC_CONSTRUCTOR));
    assert!(!method(base, "get").is_constructor());
}

#[test]
fn classes_are_partitioned_by_language() {
    let mut builder = FileBuilder::new();
    let thing = builder.add_class("LThing;", ClassAccessFlags::PUBLIC);
    builder.set_source_lang(thing, SourceLang::Ets);
    builder.add_method(thing, "<ctor>", Proto::new(void(), vec![]), MethodAccessFlags::PUBLIC);
    let helper = builder.add_method(
        thing,
        "helper",
        Proto::new(void(), vec![TypeRef::Class(thing)]),
        MethodAccessFlags::STATIC,
    );
    builder.set_method_source_lang(helper, SourceLang::PandaAssembly);
    builder.add_field(thing, "flag", i32(), FieldAccessFlags::STATIC);
    let file = builder.build("ets.abc").unwrap();

    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_file(&file);

    assert!(cache
        .resolve_by_descriptor(PA, &"LThing;".into(), true)
        .is_none());
    let thing = cache
        .resolve_and_link(SourceLang::Ets, &"LThing;".into(), true)
        .unwrap();
    assert_eq!(thing.source_lang, SourceLang::Ets);
    assert_eq!(
        thing.ancestors[0].resolved_class().unwrap().descriptor.as_bytes(),
        b"Lstd/core/Object;"
    );
    assert!(method(thing, "<ctor>").is_constructor());

    let helper = method(thing, "helper");
    assert!(cache.lang_context(PA).method(helper.id).is_some());
    assert!(cache.lang_context(SourceLang::Ets).method(helper.id).is_none());
    let flag = thing.fields()[0];
    assert!(cache.get_field(SourceLang::Ets, flag.id, true).is_some());
}

#[test]
fn lookups_by_id() {
    let file = minimal_file("a.abc");
    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_file(&file);

    let class = cache.resolve_by_descriptor(PA, &"LA;".into(), true).unwrap();
    let foo = class.methods()[0];
    let x = class.fields()[0];
    assert!(ptr::eq(cache.get_class(PA, class.id, true).unwrap(), class));
    assert!(ptr::eq(cache.get_method(PA, foo.id, true).unwrap(), foo));
    assert!(ptr::eq(cache.get_field(PA, x.id, true).unwrap(), x));
    assert!(foo.is_linked());
    assert!(x.is_linked());

    assert!(cache.get_class(PA, 1, false).is_none());
    assert!(cache.get_method(PA, class.id, true).is_none());
    assert!(cache.get_field(SourceLang::Ets, x.id, true).is_none());
}

#[test]
fn root_classes() {
    let file = minimal_file("a.abc");
    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_file(&file);
    let foo = cache
        .resolve_by_descriptor(PA, &"LA;".into(), true)
        .unwrap()
        .methods()[0];

    let object = cache.get_object_class(PA).unwrap();
    assert_eq!(object.descriptor.as_bytes(), b"Lpanda/Object;");
    assert!(object.origin.is_none());
    let string = cache.get_string_class(foo).unwrap();
    assert_eq!(string.descriptor.as_bytes(), b"Lpanda/String;");
    assert!(ptr::eq(string.ancestors[0].resolved_class().unwrap(), object));
    let strings = cache.get_string_array_class(PA).unwrap();
    assert!(strings.is_array());
    assert!(ptr::eq(
        strings.array_component.as_ref().unwrap().resolved_class().unwrap(),
        string
    ));
}
