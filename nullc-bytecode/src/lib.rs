//! The binary bytecode container: a fixed header plus the type, member,
//! variable, function, local, closure, typedef, namespace, and module
//! tables, the two VMs' instruction and source-map streams, and the
//! symbol/source/LLVM blobs.

pub mod closures;
pub mod codec;
pub mod error;
pub mod functions;
pub mod header;
pub mod image;
pub mod members;
pub mod modules;
pub mod sourcemap;
pub mod symbol;
pub mod typedef_ns;
pub mod types_table;
pub mod variables;

pub use closures::{ClosureCapture, ClosureList, CLOSURE_CAPTURE_SIZE, CLOSURE_LIST_SIZE};
pub use error::BytecodeError;
pub use functions::{EntryPoint, FunctionCategory, FunctionEntry, ReturnTypeTag, FUNCTION_ENTRY_SIZE, NO_ENTRY};
pub use header::{BlobSlice, ImageHeader, StreamSlice, TableSlice, MAGIC};
pub use image::{Image, InstructionStream};
pub use members::{TypeConstant, TypeMember, TYPE_CONSTANT_SIZE, TYPE_MEMBER_SIZE};
pub use modules::{ModuleEntry, MODULE_ENTRY_SIZE, NO_SOURCE};
pub use sourcemap::{SourceMap, SourceMapEntry, SOURCE_MAP_ENTRY_SIZE};
pub use symbol::SymbolBlob;
pub use typedef_ns::{Namespace, Typedef, NAMESPACE_SIZE, TYPEDEF_SIZE};
pub use types_table::{GenericOrigin, TypeEntry, TYPE_ENTRY_SIZE};
pub use variables::{LocalKind, LocalVariable, Variable, LOCAL_VARIABLE_SIZE, VARIABLE_SIZE};
