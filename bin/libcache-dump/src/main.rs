use libcache::cache::{CacheArenas, CacheOptions, CachedClass, LibCache, VerifierMessage};
use libcache::panda_file::{self, PandaFile, SourceLang};

use clap::{crate_version, Arg, ArgAction, Command};
use std::fmt;
use std::io::{self, Write};

#[derive(Debug)]
enum Error {
    File(panda_file::Error),
    Io(io::Error),
    UnknownLanguage(String),

    /// Some `--resolve` descriptors did not resolve
    Unresolved(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::File(err) => write!(f, "{}", err),
            Error::Io(err) => write!(f, "{}", err),
            Error::UnknownLanguage(name) => write!(f, "unknown language '{}'", name),
            Error::Unresolved(count) => write!(f, "{} descriptor(s) did not resolve", count),
        }
    }
}

impl From<panda_file::Error> for Error {
    fn from(err: panda_file::Error) -> Error {
        Error::File(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

fn main() -> Result<(), Error> {
    env_logger::init();

    let matches = Command::new("Verification cache dump")
        .version(crate_version!())
        .about("Load panda bytecode files into a verification cache and print what it holds")
        .arg(
            Arg::new("lang")
                .long("lang")
                .value_name("LANG")
                .default_value("panda-assembly")
                .help("Language to print classes of (`panda-assembly`, `ecmascript`, `ets`)"),
        )
        .arg(
            Arg::new("resolve")
                .long("resolve")
                .value_name("DESCRIPTOR")
                .action(ArgAction::Append)
                .help("Resolve and link a class descriptor (eg. `[Lpanda/String;`)"),
        )
        .arg(
            Arg::new("hide-conflicts")
                .long("hide-conflicts")
                .action(ArgAction::SetTrue)
                .help("Don't report classes defined more than once"),
        )
        .arg(
            Arg::new("FILES")
                .help("Bytecode files to load")
                .required(true)
                .num_args(1..),
        )
        .get_matches();

    let lang_name = matches
        .get_one::<String>("lang")
        .map_or("panda-assembly", String::as_str);
    let lang = SourceLang::from_name(lang_name)
        .ok_or_else(|| Error::UnknownLanguage(lang_name.to_owned()))?;

    let mut options = CacheOptions::new();
    if matches.get_flag("hide-conflicts") {
        options = options.hide(VerifierMessage::ConflictingClassDefinitions);
    }

    let mut files = vec![];
    for path in matches.get_many::<String>("FILES").into_iter().flatten() {
        log::info!("Reading '{}'", path);
        files.push(PandaFile::open(path)?);
    }

    let arenas = CacheArenas::new();
    let cache = LibCache::new(&arenas, options);
    cache.process_files(&files);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for class in cache.classes(lang) {
        dump_class(&mut out, &cache, class)?;
    }

    let mut unresolved = 0;
    for descriptor in matches.get_many::<String>("resolve").into_iter().flatten() {
        match cache.resolve_and_link(lang, &descriptor.as_str().into(), true) {
            Some(class) => writeln!(out, "resolved {} ({:#018x})", class, class.id)?,
            None => {
                writeln!(out, "unresolved {}", descriptor)?;
                unresolved += 1;
            }
        }
    }

    let conflicts = cache.message_count(VerifierMessage::ConflictingClassDefinitions);
    if conflicts > 0 {
        log::warn!("{} conflicting class definitions", conflicts);
    }
    if unresolved > 0 {
        return Err(Error::Unresolved(unresolved));
    }
    Ok(())
}

/// Print a class, linking it first so that ancestors show up resolved
fn dump_class<'c>(
    out: &mut impl Write,
    cache: &LibCache<'c>,
    class: &'c CachedClass<'c>,
) -> io::Result<()> {
    let linked = cache.link_class(class);
    let origin = match &class.origin {
        Some(origin) => origin.file.filename(),
        None => "synthetic",
    };
    writeln!(
        out,
        "{} [{}] {:?}{}",
        class,
        origin,
        class.flags,
        if linked { "" } else { " (unlinked)" }
    )?;

    for ancestor in &class.ancestors {
        let state = if ancestor.is_resolved() { "" } else { "?" };
        writeln!(out, "  extends {}{}", state, ancestor.descriptor())?;
    }
    if let Some(component) = &class.array_component {
        writeln!(out, "  component {}", component.descriptor())?;
    }
    for method in class.methods() {
        if std::ptr::eq(method.klass, class) {
            writeln!(out, "  method {} {:?}", method, method.flags)?;
        }
    }
    for field in class.fields() {
        if std::ptr::eq(field.klass, class) {
            writeln!(out, "  field {} {:?}", field, field.flags)?;
        }
    }
    Ok(())
}
