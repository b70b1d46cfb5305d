//! Instruction Walker
//!
//! The single piece of decoding logic in the remapper. Every analysis and every rewrite is
//! a pair of callbacks handed to [`Module::walk`]:
//!
//! - the **instruction callback** sees each instruction as a read-only [`Instruction`]
//!   view and returns `true` if it fully handled the instruction;
//! - the **id callback** is then invoked with a mutable reference to every id operand of
//!   each instruction that was not handled, in encoding order (result type, result id,
//!   then operands).
//!
//! # Decoding Algorithm
//! 1. Split the first word into word count and opcode; reject zero-length instructions
//!    and instructions running past the walked range.
//! 2. Run the instruction callback; skip to the next instruction if it handled this one.
//! 3. Look up the opcode descriptor; visit the result type and result id words.
//! 4. `OpExtInst`: visit the instruction-set id, skip the instruction number, treat every
//!    remaining operand as an id.
//! 5. `OpSpecConstantOp`: skip the wrapped opcode, visit its id operands, stop at the
//!    literal indices of `OpCompositeExtract`, `OpCompositeInsert` and `OpVectorShuffle`.
//! 6. Otherwise consume operands kind by kind until the instruction is exhausted.

use std::ops::Range;

use crate::remapper::error::{RemapError, Result};
use crate::remapper::module::{
    literal_string, literal_string_words, opcode_of, word_count_of, Module, HEADER_WORDS,
};
use crate::remapper::opcode::{memory_access, op, spec_constant_op_ids, OpcodeTable, OperandKind};

/// Read-only view of one instruction handed to instruction callbacks.
#[derive(Debug, Clone, Copy)]
pub struct Instruction<'a> {
    pub opcode: u16,
    /// Absolute word position of the instruction's first word.
    pub start: usize,
    /// All words of the instruction, including the first.
    pub words: &'a [u32],
}

impl<'a> Instruction<'a> {
    #[inline]
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// One past the last word of this instruction.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.words.len()
    }

    /// Word range this instruction occupies.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Word `index` of the instruction (0 is the opcode word), or 0 if absent.
    ///
    /// Id 0 never names anything, so a missing operand reads as "no id".
    #[inline]
    pub fn word(&self, index: usize) -> u32 {
        self.words.get(index).copied().unwrap_or(0)
    }

    /// Literal string starting at word `index`.
    pub fn string(&self, index: usize) -> String {
        self.words.get(index..).map(literal_string).unwrap_or_default()
    }
}

impl Module {
    /// Walk every instruction after the header.
    pub fn walk<I, F>(&mut self, table: &dyn OpcodeTable, inst_fn: I, id_fn: F) -> Result<()>
    where
        I: FnMut(&Instruction<'_>) -> Result<bool>,
        F: FnMut(&mut u32) -> Result<()>,
    {
        let end: usize = self.len();
        self.walk_range(table, HEADER_WORDS..end, inst_fn, id_fn)
    }

    /// Walk the instructions in `range`, which must start on an instruction boundary.
    ///
    /// # Errors
    /// - [`RemapError::Malformed`] for a zero-length instruction
    /// - [`RemapError::Truncated`] if an instruction runs past `range.end`
    /// - [`RemapError::UnknownOpcode`] if the table has no descriptor for an unhandled
    ///   instruction
    /// - anything returned by the callbacks
    pub fn walk_range<I, F>(
        &mut self,
        table: &dyn OpcodeTable,
        range: Range<usize>,
        mut inst_fn: I,
        mut id_fn: F,
    ) -> Result<()>
    where
        I: FnMut(&Instruction<'_>) -> Result<bool>,
        F: FnMut(&mut u32) -> Result<()>,
    {
        let end: usize = range.end.min(self.len());
        let words: &mut Vec<u32> = self.words_mut();
        let mut position: usize = range.start;

        while position < end {
            let first: u32 = words[position];
            let word_count: usize = word_count_of(first);
            let opcode: u16 = opcode_of(first);

            if word_count == 0 {
                return Err(RemapError::malformed("zero-length instruction", position));
            }
            let next: usize = position + word_count;
            if next > end {
                return Err(RemapError::Truncated {
                    position,
                    word_count,
                    end,
                });
            }

            let handled: bool = inst_fn(&Instruction {
                opcode,
                start: position,
                words: &words[position..next],
            })?;

            if !handled {
                visit_ids(table, &mut words[position..next], opcode, position, &mut id_fn)?;
            }

            position = next;
        }

        Ok(())
    }
}

/// Invoke `id_fn` on every id operand of one instruction.
fn visit_ids<F>(
    table: &dyn OpcodeTable,
    inst: &mut [u32],
    opcode: u16,
    position: usize,
    id_fn: &mut F,
) -> Result<()>
where
    F: FnMut(&mut u32) -> Result<()>,
{
    let desc = table
        .describe(opcode)
        .ok_or(RemapError::UnknownOpcode { opcode, position })?;

    let mut word: usize = 1;
    let end: usize = inst.len();

    if desc.has_type && word < end {
        id_fn(&mut inst[word])?;
        word += 1;
    }
    if desc.has_result && word < end {
        id_fn(&mut inst[word])?;
        word += 1;
    }

    if opcode == op::EXT_INST {
        // instruction set id, then the instruction number within the set
        if word < end {
            id_fn(&mut inst[word])?;
        }
        word += 2;
        while word < end {
            id_fn(&mut inst[word])?;
            word += 1;
        }
        return Ok(());
    }

    if opcode == op::SPEC_CONSTANT_OP {
        // wrapped opcode, its id operands, then literal indices for a few opcodes
        let ids_end: usize = match inst.get(word).copied().and_then(spec_constant_op_ids) {
            Some(count) => (word + 1 + count).min(end),
            None => end,
        };
        word += 1;
        while word < ids_end {
            id_fn(&mut inst[word])?;
            word += 1;
        }
        return Ok(());
    }

    for kind in desc.operands {
        if word >= end {
            break;
        }

        match kind {
            OperandKind::Id => {
                id_fn(&mut inst[word])?;
                word += 1;
            }
            OperandKind::OptionalId | OperandKind::VariableIds => {
                while word < end {
                    id_fn(&mut inst[word])?;
                    word += 1;
                }
            }
            OperandKind::LiteralNumber => word += 1,
            OperandKind::VariableLiterals => word = end,
            OperandKind::VariableLiteralId => {
                while word + 1 < end {
                    id_fn(&mut inst[word + 1])?;
                    word += 2;
                }
                word = end;
            }
            OperandKind::VariableIdLiteral => {
                while word < end {
                    id_fn(&mut inst[word])?;
                    word += 2;
                }
                word = end;
            }
            OperandKind::LiteralString => {
                word += literal_string_words(&inst[word..]);
            }
            OperandKind::MemoryAccess => {
                let mask: u32 = inst[word];
                word += 1;
                if mask & memory_access::ALIGNED != 0 {
                    word += 1;
                }
                for bit in [
                    memory_access::MAKE_POINTER_AVAILABLE,
                    memory_access::MAKE_POINTER_VISIBLE,
                ] {
                    if mask & bit != 0 && word < end {
                        id_fn(&mut inst[word])?;
                        word += 1;
                    }
                }
            }
            OperandKind::ImageOperands => {
                word += 1;
                while word < end {
                    id_fn(&mut inst[word])?;
                    word += 1;
                }
            }
        }
    }

    Ok(())
}

/// Positions of every instruction start after the header, in order.
pub fn instruction_starts(module: &mut Module, table: &dyn OpcodeTable) -> Result<Vec<usize>> {
    let mut starts: Vec<usize> = Vec::with_capacity(module.len() / 4);
    module.walk(
        table,
        |inst| {
            starts.push(inst.start);
            Ok(true)
        },
        |_| Ok(()),
    )?;
    Ok(starts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remapper::module::{encode_string, instruction_word, MAGIC_NUMBER};
    use crate::remapper::opcode::CoreOpcodeTable;

    fn module(body: &[u32]) -> Module {
        let mut words = vec![MAGIC_NUMBER, 0x0001_0000, 0, 100, 0];
        words.extend_from_slice(body);
        Module::new(words)
    }

    fn collect_ids(module: &mut Module) -> Vec<u32> {
        let mut ids = Vec::new();
        module
            .walk(
                &CoreOpcodeTable,
                |_| Ok(false),
                |id| {
                    ids.push(*id);
                    Ok(())
                },
            )
            .unwrap();
        ids
    }

    #[test]
    fn test_entry_point_interface_ids_follow_name() {
        let name = encode_string("main");
        let mut body = vec![instruction_word(3 + name.len() + 2, op::ENTRY_POINT), 4, 7];
        body.extend_from_slice(&name);
        body.extend_from_slice(&[11, 12]);

        let mut m = module(&body);
        assert_eq!(collect_ids(&mut m), vec![7, 11, 12]);
    }

    #[test]
    fn test_ext_inst_visits_set_and_operands() {
        // %9 = OpExtInst %2 %1 Sqrt %8
        let body = [instruction_word(6, op::EXT_INST), 2, 9, 1, 31, 8];
        let mut m = module(&body);
        assert_eq!(collect_ids(&mut m), vec![2, 9, 1, 8]);
    }

    #[test]
    fn test_spec_constant_op_literal_tail() {
        // %5 = OpSpecConstantOp %1 CompositeExtract %4 0 1
        let extract = [instruction_word(7, op::SPEC_CONSTANT_OP), 1, 5, 81, 4, 0, 1];
        assert_eq!(collect_ids(&mut module(&extract)), vec![1, 5, 4]);

        // %6 = OpSpecConstantOp %2 VectorShuffle %3 %4 0 3
        let shuffle = [instruction_word(8, op::SPEC_CONSTANT_OP), 2, 6, 79, 3, 4, 0, 3];
        assert_eq!(collect_ids(&mut module(&shuffle)), vec![2, 6, 3, 4]);

        // %7 = OpSpecConstantOp %1 IAdd %4 %5
        let add = [instruction_word(6, op::SPEC_CONSTANT_OP), 1, 7, 128, 4, 5];
        assert_eq!(collect_ids(&mut module(&add)), vec![1, 7, 4, 5]);
    }

    #[test]
    fn test_switch_pairs() {
        // OpSwitch %5 %6 1 %7 2 %8
        let body = [instruction_word(7, op::SWITCH), 5, 6, 1, 7, 2, 8];
        let mut m = module(&body);
        assert_eq!(collect_ids(&mut m), vec![5, 6, 7, 8]);
    }

    #[test]
    fn test_memory_access_parameters() {
        // OpLoad %1 %2 %3 Aligned|MakePointerAvailable 4 %9
        let body = [instruction_word(7, op::LOAD), 1, 2, 3, 0x2 | 0x8, 4, 9];
        let mut m = module(&body);
        assert_eq!(collect_ids(&mut m), vec![1, 2, 3, 9]);
    }

    #[test]
    fn test_handled_instructions_skip_ids() {
        let body = [
            instruction_word(2, op::LABEL),
            3,
            instruction_word(2, op::BRANCH),
            4,
        ];
        let mut m = module(&body);
        let mut ids = Vec::new();
        m.walk(
            &CoreOpcodeTable,
            |inst| Ok(inst.opcode == op::LABEL),
            |id| {
                ids.push(*id);
                Ok(())
            },
        )
        .unwrap();
        assert_eq!(ids, vec![4]);
    }

    #[test]
    fn test_id_callback_rewrites_in_place() {
        let body = [instruction_word(2, op::BRANCH), 4];
        let mut m = module(&body);
        m.walk(&CoreOpcodeTable, |_| Ok(false), |id| {
            *id += 10;
            Ok(())
        })
        .unwrap();
        assert_eq!(m.word(HEADER_WORDS + 1), 14);
    }

    #[test]
    fn test_overrun_is_rejected() {
        let body = [instruction_word(4, op::BRANCH), 4];
        let mut m = module(&body);
        let result = m.walk(&CoreOpcodeTable, |_| Ok(false), |_| Ok(()));
        assert!(matches!(result, Err(RemapError::Truncated { position: 5, .. })));
    }

    #[test]
    fn test_zero_length_is_rejected() {
        let mut m = module(&[0]);
        let result = m.walk(&CoreOpcodeTable, |_| Ok(true), |_| Ok(()));
        assert!(matches!(result, Err(RemapError::Malformed { position: 5, .. })));
    }

    #[test]
    fn test_unknown_opcode_is_rejected() {
        let mut m = module(&[instruction_word(1, 9)]);
        let result = m.walk(&CoreOpcodeTable, |_| Ok(false), |_| Ok(()));
        assert_eq!(
            result,
            Err(RemapError::UnknownOpcode {
                opcode: 9,
                position: 5
            })
        );
    }
}
