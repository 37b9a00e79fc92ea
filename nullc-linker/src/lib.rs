//! Merges per-module [`nullc_bytecode::Image`]s produced by separate
//! compilations into one linked image: types dedup by structural shape,
//! cross-module import stubs resolve against the real function they
//! name, and every table/operand that carries a module-relative or
//! table-relative index gets rewritten into the merged image's
//! coordinate space.

mod dag;
mod error;
mod functions;
mod link;
mod modules;
mod operands;
mod types;
mod unit;
mod variables;

pub use error::LinkError;
pub use link::link;
pub use unit::CompiledUnit;
