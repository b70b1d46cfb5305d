//! Load-Store Simplification
//!
//! Two opt-in passes that remove memory traffic the remapper can prove redundant with
//! purely local reasoning.
//!
//! # Promotion (`OPT_LOADSTORE`)
//! A function-storage variable without initializer is promoted when it is stored exactly
//! once, never loaded before that store in module order, never accessed with the volatile
//! flag, and never used by anything other than its own loads, its store and the names or
//! decorations attached to it (an access chain, a call argument or being stored somewhere
//! all count as escaping). Every load of a promoted variable is replaced by the stored
//! value; the variable, its store, its loads and their annotations are stripped.
//!
//! # Forwarding (`OPT_FWD_LS`)
//! Loads through uniform, uniform-constant and input variables (directly or through an
//! access chain rooted at one) are replaced by the pointer they load from, and stores to
//! output variables make the stored value an alias of the variable. The result does not
//! conform to SPIR-V and is only meaningful to consumers that expect this form.

use std::collections::{HashMap, HashSet};

use crate::remapper::error::Result;
use crate::remapper::opcode::{is_access_chain_op, is_annotation_op, memory_access, op, storage};
use crate::remapper::pipeline::Remapper;

/// Follow `map` from `id` until an unmapped id is reached.
///
/// Bounded by the map size so a cycle cannot loop forever.
fn resolve(map: &HashMap<u32, u32>, id: u32) -> u32 {
    let mut current: u32 = id;
    for _ in 0..=map.len() {
        match map.get(&current) {
            Some(&next) if next != current => current = next,
            _ => break,
        }
    }
    current
}

impl Remapper {
    /// Promote single-store function variables to the value stored in them.
    pub fn opt_load_store(&mut self) -> Result<()> {
        self.msg(3, 2, "Promoting function variables: ");

        let Self {
            module,
            table,
            strip_list,
            ..
        } = self;

        // candidates: function storage without initializer
        let mut candidates: HashSet<u32> = HashSet::new();
        module.walk(
            table.as_ref(),
            |inst| {
                if inst.opcode == op::VARIABLE
                    && inst.word_count() == 4
                    && inst.word(3) == storage::FUNCTION
                {
                    candidates.insert(inst.word(2));
                }
                Ok(true)
            },
            |_| Ok(()),
        )?;

        if candidates.is_empty() {
            return Ok(());
        }

        let mut stored: HashMap<u32, u32> = HashMap::new();
        let mut loads: Vec<(u32, u32)> = Vec::new();
        let mut revoked: HashSet<u32> = HashSet::new();
        let mut escaped: HashSet<u32> = HashSet::new();

        module.walk(
            table.as_ref(),
            |inst| match inst.opcode {
                op::VARIABLE if candidates.contains(&inst.word(2)) => Ok(true),
                op::LOAD if candidates.contains(&inst.word(3)) => {
                    let pointer: u32 = inst.word(3);
                    if !stored.contains_key(&pointer) {
                        revoked.insert(pointer);
                    }
                    if inst.word_count() > 4 && inst.word(4) & memory_access::VOLATILE != 0 {
                        revoked.insert(pointer);
                    }
                    loads.push((inst.word(2), pointer));
                    Ok(true)
                }
                op::STORE if candidates.contains(&inst.word(1)) => {
                    let (pointer, value) = (inst.word(1), inst.word(2));
                    if candidates.contains(&value) {
                        revoked.insert(value);
                    }
                    if stored.insert(pointer, value).is_some() {
                        revoked.insert(pointer);
                    }
                    if inst.word_count() > 3 && inst.word(3) & memory_access::VOLATILE != 0 {
                        revoked.insert(pointer);
                    }
                    Ok(true)
                }
                opcode if is_annotation_op(opcode) && candidates.contains(&inst.word(1)) => {
                    Ok(true)
                }
                _ => Ok(false),
            },
            |id| {
                if candidates.contains(id) {
                    escaped.insert(*id);
                }
                Ok(())
            },
        )?;

        let promoted: HashSet<u32> = stored
            .keys()
            .copied()
            .filter(|var| !revoked.contains(var) && !escaped.contains(var))
            .collect();

        if promoted.is_empty() {
            return Ok(());
        }

        let direct: HashMap<u32, u32> = loads
            .iter()
            .filter(|(_, pointer)| promoted.contains(pointer))
            .filter_map(|(result, pointer)| stored.get(pointer).map(|value| (*result, *value)))
            .collect();
        let replacement: HashMap<u32, u32> = direct
            .keys()
            .map(|&result| (result, resolve(&direct, result)))
            .collect();

        module.walk(
            table.as_ref(),
            |inst| {
                let strip: bool = match inst.opcode {
                    op::LOAD => promoted.contains(&inst.word(3)),
                    op::STORE => promoted.contains(&inst.word(1)),
                    op::VARIABLE => promoted.contains(&inst.word(2)),
                    opcode if is_annotation_op(opcode) => {
                        let target: u32 = inst.word(1);
                        promoted.contains(&target) || replacement.contains_key(&target)
                    }
                    _ => false,
                };
                if strip {
                    strip_list.push(inst.range());
                }
                Ok(strip)
            },
            |id| {
                if let Some(&value) = replacement.get(id) {
                    *id = value;
                }
                Ok(())
            },
        )?;

        log::debug!(
            "promoted {} of {} function variables, {} loads replaced",
            promoted.len(),
            candidates.len(),
            replacement.len()
        );
        self.stats.loads_promoted += replacement.len();
        self.strip()
    }

    /// Forward interface loads and stores into their uses. Produces non-conforming output.
    pub fn forward_load_stores(&mut self) -> Result<()> {
        self.msg(3, 2, "Forwarding loads and stores: ");

        let Self {
            module,
            table,
            strip_list,
            ..
        } = self;

        // loads through uniform and input variables
        let mut roots: HashSet<u32> = HashSet::new();
        let mut load_map: HashMap<u32, u32> = HashMap::new();
        module.walk(
            table.as_ref(),
            |inst| {
                match inst.opcode {
                    op::VARIABLE
                        if inst.word_count() == 4
                            && matches!(
                                inst.word(3),
                                storage::UNIFORM | storage::UNIFORM_CONSTANT | storage::INPUT
                            ) =>
                    {
                        roots.insert(inst.word(2));
                    }
                    opcode if is_access_chain_op(opcode) && roots.contains(&inst.word(3)) => {
                        roots.insert(inst.word(2));
                    }
                    op::LOAD if roots.contains(&inst.word(3)) => {
                        load_map.insert(inst.word(2), inst.word(3));
                        strip_list.push(inst.range());
                    }
                    _ => {}
                }
                Ok(true)
            },
            |_| Ok(()),
        )?;

        module.walk(
            table.as_ref(),
            |inst| Ok(inst.opcode == op::LOAD && load_map.contains_key(&inst.word(2))),
            |id| {
                if let Some(&pointer) = load_map.get(id) {
                    *id = pointer;
                }
                Ok(())
            },
        )?;

        // stores to output variables
        let mut outputs: HashSet<u32> = HashSet::new();
        let mut store_map: HashMap<u32, u32> = HashMap::new();
        let mut store_starts: HashSet<usize> = HashSet::new();
        module.walk(
            table.as_ref(),
            |inst| {
                match inst.opcode {
                    op::VARIABLE if inst.word_count() == 4 && inst.word(3) == storage::OUTPUT => {
                        outputs.insert(inst.word(2));
                    }
                    op::STORE if outputs.contains(&inst.word(1)) => {
                        store_map.insert(inst.word(2), inst.word(1));
                        store_starts.insert(inst.start);
                        strip_list.push(inst.range());
                    }
                    _ => {}
                }
                Ok(true)
            },
            |_| Ok(()),
        )?;

        module.walk(
            table.as_ref(),
            |inst| Ok(store_starts.contains(&inst.start)),
            |id| {
                if let Some(&variable) = store_map.get(id) {
                    *id = variable;
                }
                Ok(())
            },
        )?;

        log::debug!(
            "forwarded {} loads and {} output stores",
            load_map.len(),
            store_map.len()
        );
        self.stats.loads_forwarded += load_map.len();
        self.stats.stores_forwarded += store_starts.len();
        self.strip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_chains_and_cycles() {
        let map: HashMap<u32, u32> = [(1, 2), (2, 3), (7, 8), (8, 7)].into_iter().collect();
        assert_eq!(resolve(&map, 1), 3);
        assert_eq!(resolve(&map, 3), 3);
        // a cycle terminates on one of its members
        assert!([7, 8].contains(&resolve(&map, 7)));
    }
}
