//! The function table's in-place override operation: redirecting one
//! function index's definition at another's, so every existing caller
//! (which only ever dispatches through the stable index) picks up the new
//! body without recompilation.

use std::sync::{Arc, RwLock};

use nullc_bytecode::{BytecodeError, FunctionEntry};

use crate::error::VmError;

/// How concurrent VM instances sharing one `FunctionTable` observe an
/// override. The source material treats override as synchronous and
/// single-threaded and does not say what concurrent readers should see,
/// so this is a constructor choice rather than a guess baked into one
/// behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverridePolicy {
    /// The caller is responsible for ensuring no VM instance is mid-call
    /// to the overridden index while `override_entry` runs; a `snapshot`
    /// taken before the override and used throughout a call is the
    /// documented contract a VM instance follows under this policy.
    Exclusive,
    /// Every override publishes a new table; a VM instance that re-fetches
    /// its snapshot once per call never observes a half-written entry,
    /// even if another instance is overriding concurrently.
    CopyOnWriteEpoch,
}

/// The function table, with the single mutable cell the override surface
/// patches. Everything else about a linked image is immutable once built.
pub struct FunctionTable {
    policy: OverridePolicy,
    entries: RwLock<Arc<[FunctionEntry]>>,
}

impl FunctionTable {
    pub fn new(functions: Vec<FunctionEntry>, policy: OverridePolicy) -> Self {
        FunctionTable {
            policy,
            entries: RwLock::new(Arc::from(functions)),
        }
    }

    pub fn policy(&self) -> OverridePolicy {
        self.policy
    }

    /// A snapshot of the current table. Under `CopyOnWriteEpoch`, fetch a
    /// fresh one per call; under `Exclusive`, one fetched at call entry
    /// stays valid for the call's duration by contract.
    pub fn snapshot(&self) -> Arc<[FunctionEntry]> {
        self.entries.read().expect("function table lock poisoned").clone()
    }

    /// Atomically rewrites `target`'s bytecode offsets, lengths, frame
    /// size, native-call argument width, and classification from
    /// `source`'s, leaving `target`'s name and type untouched. The
    /// classification guard this surface enforced under the x86 JIT has no
    /// counterpart here (there is no JIT to gate it on), so a native
    /// function can be overridden with a bytecode body and vice versa: the
    /// swap simply makes `target` dispatch exactly as `source` did.
    pub fn override_entry(&self, target: u32, source: u32) -> Result<(), VmError> {
        let mut guard = self.entries.write().expect("function table lock poisoned");
        let len = guard.len() as u32;
        let src = *guard
            .get(source as usize)
            .ok_or(BytecodeError::IndexOutOfBounds { table: "functions", index: source, len })?;
        let dst = *guard
            .get(target as usize)
            .ok_or(BytecodeError::IndexOutOfBounds { table: "functions", index: target, len })?;

        let mut next: Vec<FunctionEntry> = guard.to_vec();
        next[target as usize] = FunctionEntry {
            category: src.category,
            stack_vm_entry: src.stack_vm_entry,
            register_vm_entry: src.register_vm_entry,
            frame_size: src.frame_size,
            local_count: src.local_count,
            native_arg_bytes: src.native_arg_bytes,
            ..dst
        };
        *guard = Arc::from(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nullc_bytecode::{EntryPoint, FunctionCategory, ReturnTypeTag};

    fn entry(stack_offset: u32, category: FunctionCategory) -> FunctionEntry {
        FunctionEntry {
            name_offset: 0,
            name_hash: 0,
            function_type_index: 0,
            return_type: ReturnTypeTag::Int,
            category,
            stack_vm_entry: EntryPoint { offset: stack_offset, length: 4 },
            register_vm_entry: EntryPoint::NONE,
            parameter_count: 1,
            local_count: 0,
            frame_size: 16,
            locals_start: 0,
            upvalue_count: 0,
            native_arg_bytes: 4,
            defining_module: 0,
        }
    }

    #[test]
    fn override_redirects_target_to_sources_body() {
        let table = FunctionTable::new(
            vec![entry(0, FunctionCategory::Bytecode), entry(100, FunctionCategory::Bytecode)],
            OverridePolicy::Exclusive,
        );
        table.override_entry(0, 1).unwrap();
        let snapshot = table.snapshot();
        assert_eq!(snapshot[0].stack_vm_entry.offset, 100);
    }

    #[test]
    fn overriding_a_native_entry_with_a_bytecode_one_changes_its_classification() {
        let table = FunctionTable::new(
            vec![entry(0, FunctionCategory::Native), entry(100, FunctionCategory::Bytecode)],
            OverridePolicy::CopyOnWriteEpoch,
        );
        table.override_entry(0, 1).unwrap();
        let snapshot = table.snapshot();
        assert_eq!(snapshot[0].category, FunctionCategory::Bytecode);
        assert_eq!(snapshot[0].stack_vm_entry.offset, 100);
    }

    #[test]
    fn copy_on_write_policy_leaves_earlier_snapshots_untouched() {
        let table = FunctionTable::new(
            vec![entry(0, FunctionCategory::Bytecode), entry(100, FunctionCategory::Bytecode)],
            OverridePolicy::CopyOnWriteEpoch,
        );
        let before = table.snapshot();
        table.override_entry(0, 1).unwrap();
        assert_eq!(before[0].stack_vm_entry.offset, 0, "earlier Arc is immutable");
        assert_eq!(table.snapshot()[0].stack_vm_entry.offset, 100);
    }
}
