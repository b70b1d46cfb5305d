//! Module Index
//!
//! Positional facts about the module gathered in one walker pass: function ranges, call
//! counts, type and constant positions, entry points and debug names.
//!
//! Every position is invalidated by a compaction. The remapper clears and rebuilds the
//! index after each strip, except for the name map which survives rescans so that names
//! can still drive canonicalization after debug info has been stripped.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

use crate::remapper::error::{RemapError, Result};
use crate::remapper::module::Module;
use crate::remapper::opcode::{is_const_op, is_type_op, op};
use crate::remapper::walker::Instruction;

/// Derived per-scan lookup tables.
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    /// Function result id to the word range from `OpFunction` through `OpFunctionEnd`.
    pub functions: BTreeMap<u32, Range<usize>>,
    /// Callee id to the number of live `OpFunctionCall` sites.
    pub call_counts: HashMap<u32, u32>,
    /// Start positions of every type and constant declaration, in module order.
    pub type_const_pos: BTreeSet<usize>,
    /// Type or constant result id to its declaration position.
    pub type_const_by_id: HashMap<u32, usize>,
    /// Functions named by any `OpEntryPoint`.
    pub entry_points: BTreeSet<u32>,
    /// Debug name to the id it names. Not cleared by [`ModuleIndex::clear`].
    pub names: BTreeMap<String, u32>,
    /// Function currently open during a scan: (result id, start position).
    open_function: Option<(u32, usize)>,
}

impl ModuleIndex {
    /// Forget all positional data. The name map is kept.
    pub fn clear(&mut self) {
        self.functions.clear();
        self.call_counts.clear();
        self.type_const_pos.clear();
        self.type_const_by_id.clear();
        self.entry_points.clear();
        self.open_function = None;
    }

    /// Forget everything, including names.
    pub fn clear_all(&mut self) {
        self.clear();
        self.names.clear();
    }

    /// Record one instruction of a scan.
    ///
    /// # Errors
    /// Structural errors for a function opened inside another function or a function end
    /// with no open function.
    pub fn record(&mut self, inst: &Instruction<'_>) -> Result<()> {
        match inst.opcode {
            op::NAME => {
                self.names.insert(inst.string(2), inst.word(1));
            }
            op::FUNCTION_CALL => {
                *self.call_counts.entry(inst.word(3)).or_insert(0) += 1;
            }
            op::ENTRY_POINT => {
                self.entry_points.insert(inst.word(2));
            }
            op::FUNCTION => {
                if self.open_function.is_some() {
                    return Err(RemapError::malformed("nested function found", inst.start));
                }
                self.open_function = Some((inst.word(2), inst.start));
            }
            op::FUNCTION_END => {
                let (id, start) = self.open_function.take().ok_or_else(|| {
                    RemapError::malformed("function end without function start", inst.start)
                })?;
                self.functions.insert(id, start..inst.end());
            }
            opcode if is_const_op(opcode) => {
                self.type_const_pos.insert(inst.start);
                self.type_const_by_id.insert(inst.word(2), inst.start);
            }
            opcode if is_type_op(opcode) => {
                self.type_const_pos.insert(inst.start);
                self.type_const_by_id.insert(inst.word(1), inst.start);
            }
            _ => {}
        }
        Ok(())
    }

    /// Finish a scan.
    ///
    /// # Errors
    /// A structural error if a function was left open at the end of the module.
    pub fn finish(&mut self) -> Result<()> {
        match self.open_function.take() {
            Some((_, start)) => Err(RemapError::malformed("function without function end", start)),
            None => Ok(()),
        }
    }

    /// Declaration position of a type or constant id.
    ///
    /// # Errors
    /// [`RemapError::TypeNotFound`] if `id` is not a type or constant.
    #[inline]
    pub fn type_pos(&self, id: u32) -> Result<usize> {
        self.type_const_by_id
            .get(&id)
            .copied()
            .ok_or(RemapError::TypeNotFound { id })
    }

    #[inline]
    pub fn is_entry_point(&self, id: u32) -> bool {
        self.entry_points.contains(&id)
    }

    /// Live call sites of `id`.
    #[inline]
    pub fn call_count(&self, id: u32) -> u32 {
        self.call_counts.get(&id).copied().unwrap_or(0)
    }
}

/// Result id of the type or constant declared at `position`.
///
/// Constants carry a result type before their result id; types do not.
#[inline]
pub fn declared_id(module: &Module, position: usize) -> u32 {
    if is_const_op(module.opcode_at(position)) {
        module.word(position + 2)
    } else {
        module.word(position + 1)
    }
}
