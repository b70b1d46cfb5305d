//! Canonicalization Passes
//!
//! Three hashing strategies assign new ids to old ids that are still unmapped. Each
//! strategy hashes into its own sub-range of the id space so that the same declaration in
//! two separately compiled modules lands on the same new id.
//!
//! | Strategy | Hash | Candidate |
//! |----------|------|-----------|
//! | Types and constants | structural, see [`TypeHasher`] | `h % 3011 + 8` |
//! | Names | polynomial over the name bytes | `h % 3011 + 3019` |
//! | Function bodies | opcodes in a window around each result | `h % 19071 + 6203` |
//!
//! Collisions are expected: a candidate that is already claimed is resolved by probing
//! upward for the next free id. Every constant comes from [`HashParams`].

use std::cell::Cell;
use std::collections::HashMap;

use crate::remapper::error::Result;
use crate::remapper::id_table::IdState;
use crate::remapper::module::Module;
use crate::remapper::index::declared_id;
use crate::remapper::opcode::op;
use crate::remapper::options::HashParams;
use crate::remapper::pipeline::Remapper;
use crate::remapper::type_hash::TypeHasher;
use crate::remapper::walker::instruction_starts;

/// Opcodes whose ids the second function-body scan numbers by occurrence.
fn is_counted_op(opcode: u16) -> bool {
    matches!(
        opcode,
        op::IMAGE_SAMPLE_IMPLICIT_LOD..=op::IMAGE_SAMPLE_PROJ_DREF_EXPLICIT_LOD
            | op::DOT
            | op::COMPOSITE_EXTRACT
            | op::COMPOSITE_INSERT
            | op::VECTOR_SHUFFLE
            | op::LABEL
            | op::VARIABLE
            | op::ACCESS_CHAIN
            | op::LOAD
            | op::STORE
            | op::COMPOSITE_CONSTRUCT
            | op::FUNCTION_CALL
    )
}

/// Contribution of the instruction at `position` to a function-body hash.
#[inline]
fn opcode_hash(module: &Module, position: usize, params: &HashParams) -> u32 {
    let opcode: u16 = module.opcode_at(position);
    let mut hash: u32 = u32::from(opcode).wrapping_mul(params.fn_opcode_multiplier);
    if opcode == op::EXT_INST {
        // instruction number within the extended set
        hash = hash.wrapping_add(module.word(position + 4));
    }
    hash
}

impl Remapper {
    /// Map type and constant ids by structural hash, in declaration order.
    pub fn map_type_consts(&mut self) -> Result<()> {
        self.msg(3, 2, "Remapping Consts & Types: ");

        let params: HashParams = self.hash;
        let mut mapped: usize = 0;
        let mut hasher: TypeHasher<'_> =
            TypeHasher::new(self.module.words(), &self.index.type_const_by_id);

        for &position in &self.index.type_const_pos {
            let id: u32 = declared_id(&self.module, position);

            let hash: u32 = hasher.hash_at(position)?;
            if self.ids.claim(id, params.type_candidate(hash))?.is_some() {
                mapped += 1;
            }
        }

        self.stats.type_ids_mapped += mapped;
        log::debug!("mapped {} type and constant ids", mapped);
        Ok(())
    }

    /// Map every named id by the hash of its debug name, in name order.
    pub fn map_names(&mut self) -> Result<()> {
        self.msg(3, 2, "Remapping Names: ");

        let params: HashParams = self.hash;
        let mut mapped: usize = 0;

        for (name, &id) in &self.index.names {
            let candidate: u32 = params.name_candidate(params.hash_name(name));
            if self.ids.claim(id, candidate)?.is_some() {
                mapped += 1;
            }
        }

        self.stats.name_ids_mapped += mapped;
        log::debug!("mapped {} named ids", mapped);
        Ok(())
    }

    /// Map ids defined or used inside function bodies by the shape of the nearby code.
    ///
    /// # Algorithm
    /// 1. Each function gets a key: its new id if it is already mapped, else its 1-based
    ///    position among the module's functions; old ids never feed a hash
    /// 2. Every result-producing instruction inside a function hashes the key and the
    ///    opcodes of its neighbours (clipped to the function) and claims its result id
    /// 3. A second scan walks the ids of a fixed set of common opcodes and claims each
    ///    from a per-function occurrence counter of that opcode
    pub fn map_fn_bodies(&mut self) -> Result<()> {
        self.msg(3, 2, "Remapping Function Bodies: ");

        let params: HashParams = self.hash;
        let mut by_position: Vec<(usize, u32)> = self
            .index
            .functions
            .iter()
            .map(|(&id, range)| (range.start, id))
            .collect();
        by_position.sort_unstable();

        let fn_keys: HashMap<u32, u32> = by_position
            .iter()
            .zip(1u32..)
            .map(|(&(_, id), ordinal)| match self.ids.state(id) {
                IdState::Mapped(new_id) => (id, new_id),
                _ => (id, ordinal),
            })
            .collect();

        let mapped_first: usize = self.hash_fn_windows(&params, &fn_keys)?;
        let mapped_second: usize = self.count_fn_ids(&params, &fn_keys)?;

        self.stats.fn_body_ids_mapped += mapped_first + mapped_second;
        log::debug!(
            "mapped {} function body ids by window, {} by occurrence",
            mapped_first,
            mapped_second
        );
        Ok(())
    }

    /// First function-body scan: windowed opcode hash per result id.
    fn hash_fn_windows(&mut self, params: &HashParams, fn_keys: &HashMap<u32, u32>) -> Result<usize> {
        let starts: Vec<usize> = instruction_starts(&mut self.module, self.table.as_ref())?;
        let window: usize = params.fn_window;
        let mut fn_key: Option<u32> = None;
        let mut mapped: usize = 0;

        for (entry, &start) in starts.iter().enumerate() {
            let opcode: u16 = self.module.opcode_at(start);

            if opcode == op::FUNCTION {
                let id: u32 = self.module.word(start + 2);
                fn_key = Some(fn_keys.get(&id).copied().unwrap_or(0));
            }
            if opcode == op::FUNCTION_END {
                fn_key = None;
            }

            let Some(key) = fn_key else { continue };
            let Some(offset) = self
                .table
                .describe(opcode)
                .and_then(|desc| desc.result_offset())
            else {
                continue;
            };
            let result_id: u32 = self.module.word(start + offset);

            let mut hash: u32 = key.wrapping_mul(params.fn_key_multiplier);

            // preceding instructions, stopping before the function header
            let first_back: usize = if opcode == op::FUNCTION {
                entry
            } else {
                entry.saturating_sub(window)
            };
            for back in (first_back..entry).rev() {
                if self.module.opcode_at(starts[back]) == op::FUNCTION {
                    break;
                }
                hash = hash
                    .wrapping_mul(params.fn_multiplier)
                    .wrapping_add(opcode_hash(&self.module, starts[back], params));
            }

            // this instruction and the following ones, stopping at the function end
            for &ahead in starts.iter().skip(entry).take(window + 1) {
                if self.module.opcode_at(ahead) == op::FUNCTION_END {
                    break;
                }
                hash = hash
                    .wrapping_mul(params.fn_multiplier)
                    .wrapping_add(opcode_hash(&self.module, ahead, params));
            }

            if self.ids.claim(result_id, params.fn_candidate(hash))?.is_some() {
                mapped += 1;
            }
        }

        Ok(mapped)
    }

    /// Second function-body scan: ids of counted opcodes by occurrence.
    fn count_fn_ids(&mut self, params: &HashParams, fn_keys: &HashMap<u32, u32>) -> Result<usize> {
        let current_op: Cell<Option<u16>> = Cell::new(None);
        let current_count: Cell<u32> = Cell::new(0);
        let id_counter: Cell<u32> = Cell::new(0);
        let fn_key: Cell<u32> = Cell::new(0);
        let mut op_counter: HashMap<u16, u32> = HashMap::new();
        let mut mapped: usize = 0;

        let Self {
            module, table, ids, ..
        } = self;

        module.walk(
            table.as_ref(),
            |inst| {
                match inst.opcode {
                    op::FUNCTION => {
                        op_counter.clear();
                        id_counter.set(0);
                        let id: u32 = inst.word(2);
                        fn_key.set(fn_keys.get(&id).copied().unwrap_or(0));
                        current_op.set(None);
                    }
                    op::FUNCTION_END => {
                        fn_key.set(0);
                        current_op.set(None);
                    }
                    opcode if is_counted_op(opcode) => {
                        let count: &mut u32 = op_counter.entry(opcode).or_insert(0);
                        *count += 1;
                        current_count.set(*count);
                        id_counter.set(0);
                        current_op.set(Some(opcode));
                    }
                    _ => current_op.set(None),
                }
                Ok(false)
            },
            |id| {
                let Some(opcode) = current_op.get() else {
                    return Ok(());
                };
                id_counter.set(id_counter.get() + 1);

                let hash: u32 = current_count
                    .get()
                    .wrapping_mul(u32::from(opcode))
                    .wrapping_mul(params.fn_counter_multiplier)
                    .wrapping_add(id_counter.get())
                    .wrapping_add(fn_key.get().wrapping_mul(params.fn_counter_key_multiplier));

                if ids.claim(*id, params.fn_candidate(hash))?.is_some() {
                    mapped += 1;
                }
                Ok(())
            },
        )?;

        Ok(mapped)
    }
}
