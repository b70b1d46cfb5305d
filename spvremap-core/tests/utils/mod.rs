//! Test Utilities
//!
//! A tiny SPIR-V assembler for building test modules word by word, and assertion helpers
//! for checking remapped output.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet};

use spvremap_core::remapper::module::{encode_string, instruction_word, MAGIC_NUMBER};
use spvremap_core::remapper::opcode::op;
use spvremap_core::{CoreOpcodeTable, IdTable, Module, OpcodeTable};

pub const SHADER_CAPABILITY: u32 = 1;
pub const LOGICAL: u32 = 0;
pub const GLSL450: u32 = 1;
pub const FRAGMENT: u32 = 4;
pub const ORIGIN_UPPER_LEFT: u32 = 7;
pub const PRIVATE: u32 = 6;
pub const FUNCTION_CONTROL_NONE: u32 = 0;
pub const RELAXED_PRECISION: u32 = 0;
pub const FLOAT_ONE: u32 = 0x3F80_0000;
pub const FLOAT_TWO: u32 = 0x4000_0000;

/// Word-level module builder. The header bound is given explicitly.
pub struct ModuleBuilder {
    bound: u32,
    body: Vec<u32>,
}

impl ModuleBuilder {
    pub fn new(bound: u32) -> Self {
        Self {
            bound,
            body: Vec::new(),
        }
    }

    /// Append one instruction.
    pub fn inst(&mut self, opcode: u16, operands: &[u32]) -> &mut Self {
        self.body.push(instruction_word(operands.len() + 1, opcode));
        self.body.extend_from_slice(operands);
        self
    }

    /// Append an instruction with a literal string between `before` and `after`.
    pub fn inst_with_string(
        &mut self,
        opcode: u16,
        before: &[u32],
        text: &str,
        after: &[u32],
    ) -> &mut Self {
        let mut operands: Vec<u32> = before.to_vec();
        operands.extend(encode_string(text));
        operands.extend_from_slice(after);
        self.inst(opcode, &operands)
    }

    pub fn shader_preamble(&mut self) -> &mut Self {
        self.inst(op::CAPABILITY, &[SHADER_CAPABILITY])
            .inst(op::MEMORY_MODEL, &[LOGICAL, GLSL450])
    }

    pub fn entry_point(&mut self, function: u32, name: &str, interface: &[u32]) -> &mut Self {
        self.inst_with_string(op::ENTRY_POINT, &[FRAGMENT, function], name, interface)
    }

    pub fn name(&mut self, target: u32, name: &str) -> &mut Self {
        self.inst_with_string(op::NAME, &[target], name, &[])
    }

    /// `%id = OpFunction %ret None %fn_type`, followed by a label.
    pub fn function(&mut self, id: u32, ret: u32, fn_type: u32, label: u32) -> &mut Self {
        self.inst(op::FUNCTION, &[ret, id, FUNCTION_CONTROL_NONE, fn_type])
            .inst(op::LABEL, &[label])
    }

    /// `OpReturn` and `OpFunctionEnd`.
    pub fn end_function(&mut self) -> &mut Self {
        self.inst(op::RETURN, &[]).inst(op::FUNCTION_END, &[])
    }

    pub fn words(&self) -> Vec<u32> {
        let mut words: Vec<u32> = vec![MAGIC_NUMBER, 0x0001_0000, 0, self.bound, 0];
        words.extend_from_slice(&self.body);
        words
    }

    pub fn module(&self) -> Module {
        Module::new(self.words())
    }
}

/// Opcodes of every instruction after the header.
pub fn opcodes(words: &[u32]) -> Vec<u16> {
    let mut result: Vec<u16> = Vec::new();
    let mut position: usize = 5;
    while position < words.len() {
        result.push((words[position] & 0xFFFF) as u16);
        position += (words[position] >> 16).max(1) as usize;
    }
    result
}

/// Instructions (as word slices) with the given opcode.
pub fn instructions_of(words: &[u32], opcode: u16) -> Vec<Vec<u32>> {
    let mut result: Vec<Vec<u32>> = Vec::new();
    let mut position: usize = 5;
    while position < words.len() {
        let count: usize = (words[position] >> 16).max(1) as usize;
        if (words[position] & 0xFFFF) as u16 == opcode {
            result.push(words[position..position + count].to_vec());
        }
        position += count;
    }
    result
}

/// Assert every id is below the header bound, defined at most once, and that every id
/// occurrence has a definition somewhere in the module.
pub fn assert_well_formed(words: &[u32]) {
    let mut module = Module::new(words.to_vec());
    module.validate_header().unwrap();

    let table = CoreOpcodeTable;
    let mut ids = IdTable::with_bound(module.bound());
    let mut defined: HashSet<u32> = HashSet::new();
    let mut used: BTreeSet<u32> = BTreeSet::new();
    let mut duplicate: Option<u32> = None;

    module
        .walk(
            &table,
            |inst| {
                if let Some(offset) = table.describe(inst.opcode).and_then(|d| d.result_offset()) {
                    if !defined.insert(inst.word(offset)) {
                        duplicate = Some(inst.word(offset));
                    }
                }
                Ok(false)
            },
            |id| {
                used.insert(*id);
                ids.touch(*id)
            },
        )
        .unwrap();

    assert_eq!(duplicate, None, "id defined twice");
    // forward pointer declarations are satisfied by the later pointer type
    let undefined: Vec<u32> = used.into_iter().filter(|id| !defined.contains(id)).collect();
    assert!(undefined.is_empty(), "ids used without definition: {:?}", undefined);
}
