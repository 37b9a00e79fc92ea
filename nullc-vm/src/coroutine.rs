//! Cooperative coroutines: a `yield` is a `return` with the local-return
//! flag set that also records where to resume; the next `call` to the
//! same function dispatches through `unyield` instead of its entry block.
//! Modeled as an explicit resume-index slot per activation rather than a
//! stackful continuation, since the bytecode has no mechanism to suspend
//! and resume a call stack.

use std::collections::HashMap;

/// Per-function resume state. Keyed by function index rather than by a
/// handle the host holds, matching the source's model of one coroutine
/// activation living behind its function's table entry between calls.
#[derive(Debug, Default)]
pub struct CoroutineTable {
    activations: HashMap<u32, u32>,
}

impl CoroutineTable {
    /// Records that `function_index` suspended at `resume_index`, the
    /// value its next `unyield` dispatch will compare against.
    pub fn record_yield(&mut self, function_index: u32, resume_index: u32) {
        self.activations.insert(function_index, resume_index);
    }

    /// Clears the activation: the next call starts at the entry block,
    /// whether because this call ran to completion or was never started.
    pub fn record_return(&mut self, function_index: u32) {
        self.activations.remove(&function_index);
    }

    pub fn saved_resume_index(&self, function_index: u32) -> Option<u32> {
        self.activations.get(&function_index).copied()
    }
}

/// The block an `unyield` dispatch jumps to: compare the saved resume
/// index against each yield point's constant in turn, taking the first
/// match. No saved index, or no match, falls through to `entry_block` —
/// a fresh call, or one following a run that completed without yielding
/// again.
pub fn unyield_target(saved_resume_index: Option<u32>, resume_points: &[(u32, u32)], entry_block: u32) -> u32 {
    let Some(saved) = saved_resume_index else {
        return entry_block;
    };
    resume_points
        .iter()
        .find(|(index, _)| *index == saved)
        .map(|(_, block)| *block)
        .unwrap_or(entry_block)
}
