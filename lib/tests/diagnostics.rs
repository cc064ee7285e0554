mod fixtures;

use fixtures::*;
use libcache::cache::{CacheArenas, CacheOptions, LibCache};
use libcache::panda_file::{
    ClassAccessFlags, FileBuilder, MethodAccessFlags, Proto, SourceLang, TypeRef,
};
use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

const PA: SourceLang = SourceLang::PandaAssembly;

/// Keeps every log record, so tests can check the level a miss was reported at
struct Capture;

static RECORDS: Mutex<Vec<(Level, String)>> = parking_lot::const_mutex(Vec::new());

impl Log for Capture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        RECORDS.lock().push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture;

fn levels_of(message: &str) -> Vec<Level> {
    RECORDS
        .lock()
        .iter()
        .filter(|(_, text)| text.contains(message))
        .map(|(level, _)| *level)
        .collect()
}

#[test]
fn link_misses_follow_report_error() {
    log::set_logger(&CAPTURE).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let mut builder = FileBuilder::new();
    let missing = builder.add_foreign_class("LMissing;");
    let orphan = builder.add_class("LOrphan;", ClassAccessFlags::PUBLIC);
    builder.set_super_class(orphan, missing);
    let absent = builder.add_foreign_class("LAbsent;");
    let stray = builder.add_class("LStray;", ClassAccessFlags::PUBLIC);
    builder.set_super_class(stray, absent);
    let gone = builder.add_foreign_class("LGone;");
    let host = builder.add_class("LHost;", ClassAccessFlags::PUBLIC);
    builder.add_method(
        host,
        "take",
        Proto::new(void(), vec![TypeRef::Class(gone)]),
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
    );
    let file = builder.build("misses.abc").unwrap();

    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, CacheOptions::new());
    cache.process_file(&file);

    // Ancestor misses found while linking
    assert!(cache.resolve_and_link(PA, &"LOrphan;".into(), false).is_none());
    assert_eq!(levels_of("Cannot resolve LMissing;"), [Level::Error]);
    assert_eq!(levels_of("Cannot link LOrphan;"), [Level::Error]);

    assert!(cache.resolve_and_link(PA, &"LStray;".into(), true).is_none());
    assert_eq!(levels_of("Cannot resolve LAbsent;"), [Level::Warn]);
    assert_eq!(levels_of("Cannot link LStray;"), [Level::Warn]);

    // Signature misses
    let host = cache.resolve_and_link(PA, &"LHost;".into(), true).unwrap();
    let take = method(host, "take");
    assert!(cache.get_method(PA, take.id, false).is_none());
    assert_eq!(levels_of("Cannot resolve LGone;"), [Level::Error]);
    assert!(!cache.link_method(take));
    assert_eq!(levels_of("Cannot resolve LGone;"), [Level::Error, Level::Warn]);
    assert!(!take.is_linked());
}
