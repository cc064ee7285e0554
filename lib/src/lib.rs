//! Verification entity cache for panda bytecode files
//!
//! A bytecode verifier needs to know about the classes, methods and fields a method refers to,
//! without going through the full runtime class loading machinery. This crate reads the relevant
//! metadata out of any number of bytecode files (see [`panda_file`]) into a [`cache::LibCache`],
//! which resolves references between entities lazily and across files and source languages.

pub mod cache;
pub mod descriptors;
pub mod panda_file;
pub mod plugins;
pub mod util;
