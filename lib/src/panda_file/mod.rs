//! Reading (and, for tooling and tests, writing) panda bytecode files
//!
//! Only the subset of the format the cache needs is modelled: the header, the class list, the
//! index regions, and class/method/field/proto/code items. Items are addressed by their offset in
//! the file (`EntityId`).

mod access_flags;
mod accessors;
mod builder;
mod errors;
mod file;
mod leb128;
mod serialize;
mod types;

pub use access_flags::*;
pub use accessors::{
    CatchBlock, ClassDataAccessor, CodeDataAccessor, FieldDataAccessor, MethodDataAccessor,
    ProtoDataAccessor, TryBlock,
};
pub use builder::{
    CatchBlockItem, ClassHandle, CodeItem, FieldHandle, FileBuilder, MethodHandle, Proto,
    TryBlockItem, TypeRef,
};
pub use errors::Error;
pub use file::{Header, IndexHeader, PandaFile, HEADER_SIZE, INDEX_HEADER_SIZE, MAGIC, VERSION};
pub use leb128::{decode_uleb128, encode_uleb128};
pub use serialize::{Serialize, StringItem};
pub use types::*;
