//! Dead Code Elimination
//!
//! Three local, conservative passes driven by occurrence counts from walker scans. Each
//! pass schedules whole instructions for stripping and compacts at completion, so the
//! next pass always sees a freshly scanned module.
//!
//! # Function DCE
//! Iterates to a fixed point: a function that is not an entry point and has no live call
//! site is removed, and the calls it contains no longer count for their callees. A dead
//! chain A -> B -> C disappears in one invocation. Names and decorations of a removed
//! function, and of every id defined inside it, go with it.
//!
//! # Variable DCE
//! A variable whose only occurrence is its own declaration is removed together with the
//! names and decorations attached to it.
//!
//! # Type DCE
//! A type or constant whose only occurrence is its own declaration is removed. The pass
//! is not transitive: removing a struct does not revisit its member types.
//!
//! # Memory Optimizations
//! - Type membership is a `BitVec` sized to the id bound (O(1) test per id occurrence)
//! - Newly dead functions of one sweep are gathered in a `SmallVec`

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::ops::Range;

use bitvec::prelude::*;
use smallvec::SmallVec;

use crate::remapper::error::Result;
use crate::remapper::index::declared_id;
use crate::remapper::opcode::{is_annotation_op, op, OpcodeTable};
use crate::remapper::pipeline::Remapper;

impl Remapper {
    /// Remove functions that are never called and are not entry points.
    pub fn dce_funcs(&mut self) -> Result<()> {
        self.msg(3, 2, "Removing Dead Functions: ");

        let mut removed: usize = 0;
        let mut dead_ids: HashSet<u32> = HashSet::new();

        loop {
            let dead: SmallVec<[(u32, Range<usize>); 4]> = self
                .index
                .functions
                .iter()
                .filter(|(id, _)| !self.index.is_entry_point(**id) && self.index.call_count(**id) == 0)
                .map(|(id, range)| (*id, range.clone()))
                .collect();

            if dead.is_empty() {
                break;
            }

            for (id, range) in dead {
                log::debug!("removing dead function {} at words {:?}", id, range);
                self.strip_list.push(range.clone());
                self.index.functions.remove(&id);

                // calls made by the dead function no longer keep their callees alive
                let Self {
                    module,
                    table,
                    index,
                    ..
                } = self;
                let table: &dyn OpcodeTable = table.as_ref();
                module.walk_range(
                    table,
                    range,
                    |inst| {
                        if let Some(offset) =
                            table.describe(inst.opcode).and_then(|desc| desc.result_offset())
                        {
                            dead_ids.insert(inst.word(offset));
                        }
                        if inst.opcode == op::FUNCTION_CALL {
                            let callee: u32 = inst.word(3);
                            if let Some(count) = index.call_counts.get_mut(&callee) {
                                *count = count.saturating_sub(1);
                                if *count == 0 {
                                    index.call_counts.remove(&callee);
                                }
                            }
                        }
                        Ok(true)
                    },
                    |_| Ok(()),
                )?;

                removed += 1;
            }
        }

        // names and decorations of the function and of everything defined inside it
        if !dead_ids.is_empty() {
            let Self {
                module,
                table,
                strip_list,
                ..
            } = self;
            module.walk(
                table.as_ref(),
                |inst| {
                    if is_annotation_op(inst.opcode) && dead_ids.contains(&inst.word(1)) {
                        strip_list.push(inst.range());
                    }
                    Ok(true)
                },
                |_| Ok(()),
            )?;
        }

        self.stats.functions_removed += removed;
        self.msg(4, 4, &format!("{} dead functions", removed));
        self.strip()
    }

    /// Remove variables that are declared but never referenced.
    pub fn dce_vars(&mut self) -> Result<()> {
        self.msg(3, 2, "DCE Vars: ");

        let Self {
            module,
            table,
            strip_list,
            ..
        } = self;

        // declarations
        let mut use_count: HashMap<u32, u32> = HashMap::new();
        module.walk(
            table.as_ref(),
            |inst| {
                if inst.opcode == op::VARIABLE {
                    use_count.insert(inst.word(2), 0);
                }
                Ok(true)
            },
            |_| Ok(()),
        )?;

        if use_count.is_empty() {
            return Ok(());
        }

        // occurrences, not counting the target of names and decorations
        let skip_next: Cell<bool> = Cell::new(false);
        module.walk(
            table.as_ref(),
            |inst| {
                skip_next.set(is_annotation_op(inst.opcode));
                Ok(false)
            },
            |id| {
                if skip_next.replace(false) {
                    return Ok(());
                }
                if let Some(count) = use_count.get_mut(id) {
                    *count += 1;
                }
                Ok(())
            },
        )?;

        let mut removed: usize = 0;
        module.walk(
            table.as_ref(),
            |inst| {
                let target: u32 = match inst.opcode {
                    op::VARIABLE => inst.word(2),
                    opcode if is_annotation_op(opcode) => inst.word(1),
                    _ => return Ok(true),
                };
                if use_count.get(&target) == Some(&1) {
                    if inst.opcode == op::VARIABLE {
                        removed += 1;
                    }
                    strip_list.push(inst.range());
                }
                Ok(true)
            },
            |_| Ok(()),
        )?;

        self.stats.variables_removed += removed;
        self.msg(4, 4, &format!("{} dead variables", removed));
        self.strip()
    }

    /// Remove types and constants that nothing references.
    pub fn dce_types(&mut self) -> Result<()> {
        self.msg(3, 2, "DCE Types: ");

        let bound: usize = self.module.bound() as usize;
        let mut is_type: BitVec<u32> = bitvec![u32, Lsb0; 0; bound];
        for &id in self.index.type_const_by_id.keys() {
            if (id as usize) < bound {
                is_type.set(id as usize, true);
            }
        }

        let pending: Vec<Range<usize>> = self.strip_list.merged();
        let Self {
            module,
            table,
            index,
            strip_list,
            ..
        } = self;

        let mut use_count: HashMap<u32, i64> = HashMap::new();
        module.walk(
            table.as_ref(),
            |_| Ok(false),
            |id| {
                if is_type.get(*id as usize).is_some_and(|bit| *bit) {
                    *use_count.entry(*id).or_insert(0) += 1;
                }
                Ok(())
            },
        )?;

        // occurrences in code that is already scheduled for removal do not count
        for range in pending {
            module.walk_range(
                table.as_ref(),
                range,
                |_| Ok(false),
                |id| {
                    if let Some(count) = use_count.get_mut(id) {
                        *count -= 1;
                    }
                    Ok(())
                },
            )?;
        }

        let mut removed: usize = 0;
        for &position in &index.type_const_pos {
            let id: u32 = declared_id(module, position);
            if use_count.get(&id) == Some(&1) {
                let end: usize = position + module.word_count_at(position);
                strip_list.push(position..end);
                removed += 1;
            }
        }

        self.stats.types_removed += removed;
        self.msg(4, 4, &format!("{} dead types and constants", removed));
        self.strip()
    }
}
