//! SPIR-V Opcode Descriptors
//!
//! The walker never hard-codes instruction layouts: it asks an [`OpcodeTable`] whether an
//! opcode carries a result type and a result id, and which kinds of operands follow.
//! [`CoreOpcodeTable`] describes the core SPIR-V instruction set (plus the handful of
//! extension opcodes common in shader output); embedders with a different instruction set
//! plug in their own table.
//!
//! # Operand Encoding
//! Every operand kind consumes words only while words remain in the instruction, so
//! trailing optional operands (memory access masks, optional initializers, optional file
//! ids) need no dedicated kind.

/// Classification of an operand slot in an opcode descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperandKind {
    /// A single id.
    Id = 0,
    /// An optional id; consumes the remainder of the instruction as ids.
    OptionalId = 1,
    /// Zero or more ids; consumes the remainder of the instruction.
    VariableIds = 2,
    /// A single literal word.
    LiteralNumber = 3,
    /// Zero or more literal words; consumes the remainder, exposes no ids.
    VariableLiterals = 4,
    /// Repeated (literal, id) pairs.
    VariableLiteralId = 5,
    /// Repeated (id, literal) pairs.
    VariableIdLiteral = 6,
    /// A nul-terminated UTF-8 string packed into words.
    LiteralString = 7,
    /// A memory access mask followed by its parameters.
    MemoryAccess = 8,
    /// An image operands mask followed by id parameters; consumes the remainder.
    ImageOperands = 9,
}

/// Shape of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeDesc {
    /// A result type id follows the opcode word.
    pub has_type: bool,
    /// A result id follows (after the result type, if any).
    pub has_result: bool,
    /// Operand kinds, in order.
    pub operands: &'static [OperandKind],
}

impl OpcodeDesc {
    pub const fn new(has_type: bool, has_result: bool, operands: &'static [OperandKind]) -> Self {
        Self {
            has_type,
            has_result,
            operands,
        }
    }

    /// Word offset of the result id from the instruction start, if the opcode has one.
    #[inline]
    pub fn result_offset(&self) -> Option<usize> {
        self.has_result.then(|| if self.has_type { 2 } else { 1 })
    }
}

/// Read-only opcode descriptor lookup consumed by the walker.
pub trait OpcodeTable {
    /// Descriptor for `opcode`, or `None` if the opcode is unknown.
    fn describe(&self, opcode: u16) -> Option<OpcodeDesc>;
}

/// Opcode numbers used by the remapper.
pub mod op {
    pub const NOP: u16 = 0;
    pub const UNDEF: u16 = 1;
    pub const SOURCE_CONTINUED: u16 = 2;
    pub const SOURCE: u16 = 3;
    pub const SOURCE_EXTENSION: u16 = 4;
    pub const NAME: u16 = 5;
    pub const MEMBER_NAME: u16 = 6;
    pub const STRING: u16 = 7;
    pub const LINE: u16 = 8;
    pub const EXTENSION: u16 = 10;
    pub const EXT_INST_IMPORT: u16 = 11;
    pub const EXT_INST: u16 = 12;
    pub const MEMORY_MODEL: u16 = 14;
    pub const ENTRY_POINT: u16 = 15;
    pub const EXECUTION_MODE: u16 = 16;
    pub const CAPABILITY: u16 = 17;
    pub const TYPE_VOID: u16 = 19;
    pub const TYPE_BOOL: u16 = 20;
    pub const TYPE_INT: u16 = 21;
    pub const TYPE_FLOAT: u16 = 22;
    pub const TYPE_VECTOR: u16 = 23;
    pub const TYPE_MATRIX: u16 = 24;
    pub const TYPE_IMAGE: u16 = 25;
    pub const TYPE_SAMPLER: u16 = 26;
    pub const TYPE_SAMPLED_IMAGE: u16 = 27;
    pub const TYPE_ARRAY: u16 = 28;
    pub const TYPE_RUNTIME_ARRAY: u16 = 29;
    pub const TYPE_STRUCT: u16 = 30;
    pub const TYPE_OPAQUE: u16 = 31;
    pub const TYPE_POINTER: u16 = 32;
    pub const TYPE_FUNCTION: u16 = 33;
    pub const TYPE_EVENT: u16 = 34;
    pub const TYPE_DEVICE_EVENT: u16 = 35;
    pub const TYPE_RESERVE_ID: u16 = 36;
    pub const TYPE_QUEUE: u16 = 37;
    pub const TYPE_PIPE: u16 = 38;
    pub const TYPE_FORWARD_POINTER: u16 = 39;
    pub const CONSTANT_TRUE: u16 = 41;
    pub const CONSTANT_FALSE: u16 = 42;
    pub const CONSTANT: u16 = 43;
    pub const CONSTANT_COMPOSITE: u16 = 44;
    pub const CONSTANT_SAMPLER: u16 = 45;
    pub const CONSTANT_NULL: u16 = 46;
    pub const SPEC_CONSTANT_TRUE: u16 = 48;
    pub const SPEC_CONSTANT_FALSE: u16 = 49;
    pub const SPEC_CONSTANT: u16 = 50;
    pub const SPEC_CONSTANT_COMPOSITE: u16 = 51;
    pub const SPEC_CONSTANT_OP: u16 = 52;
    pub const FUNCTION: u16 = 54;
    pub const FUNCTION_PARAMETER: u16 = 55;
    pub const FUNCTION_END: u16 = 56;
    pub const FUNCTION_CALL: u16 = 57;
    pub const VARIABLE: u16 = 59;
    pub const IMAGE_TEXEL_POINTER: u16 = 60;
    pub const LOAD: u16 = 61;
    pub const STORE: u16 = 62;
    pub const COPY_MEMORY: u16 = 63;
    pub const COPY_MEMORY_SIZED: u16 = 64;
    pub const ACCESS_CHAIN: u16 = 65;
    pub const IN_BOUNDS_ACCESS_CHAIN: u16 = 66;
    pub const PTR_ACCESS_CHAIN: u16 = 67;
    pub const ARRAY_LENGTH: u16 = 68;
    pub const GENERIC_PTR_MEM_SEMANTICS: u16 = 69;
    pub const IN_BOUNDS_PTR_ACCESS_CHAIN: u16 = 70;
    pub const DECORATE: u16 = 71;
    pub const MEMBER_DECORATE: u16 = 72;
    pub const DECORATION_GROUP: u16 = 73;
    pub const GROUP_DECORATE: u16 = 74;
    pub const GROUP_MEMBER_DECORATE: u16 = 75;
    pub const VECTOR_EXTRACT_DYNAMIC: u16 = 77;
    pub const VECTOR_INSERT_DYNAMIC: u16 = 78;
    pub const VECTOR_SHUFFLE: u16 = 79;
    pub const COMPOSITE_CONSTRUCT: u16 = 80;
    pub const COMPOSITE_EXTRACT: u16 = 81;
    pub const COMPOSITE_INSERT: u16 = 82;
    pub const COPY_OBJECT: u16 = 83;
    pub const TRANSPOSE: u16 = 84;
    pub const SAMPLED_IMAGE: u16 = 86;
    pub const IMAGE_SAMPLE_IMPLICIT_LOD: u16 = 87;
    pub const IMAGE_SAMPLE_EXPLICIT_LOD: u16 = 88;
    pub const IMAGE_SAMPLE_DREF_IMPLICIT_LOD: u16 = 89;
    pub const IMAGE_SAMPLE_DREF_EXPLICIT_LOD: u16 = 90;
    pub const IMAGE_SAMPLE_PROJ_IMPLICIT_LOD: u16 = 91;
    pub const IMAGE_SAMPLE_PROJ_EXPLICIT_LOD: u16 = 92;
    pub const IMAGE_SAMPLE_PROJ_DREF_IMPLICIT_LOD: u16 = 93;
    pub const IMAGE_SAMPLE_PROJ_DREF_EXPLICIT_LOD: u16 = 94;
    pub const IMAGE_FETCH: u16 = 95;
    pub const IMAGE_GATHER: u16 = 96;
    pub const IMAGE_DREF_GATHER: u16 = 97;
    pub const IMAGE_READ: u16 = 98;
    pub const IMAGE_WRITE: u16 = 99;
    pub const GENERIC_CAST_TO_PTR_EXPLICIT: u16 = 123;
    pub const F_ADD: u16 = 129;
    pub const F_MUL: u16 = 133;
    pub const DOT: u16 = 148;
    pub const EMIT_VERTEX: u16 = 218;
    pub const END_PRIMITIVE: u16 = 219;
    pub const ATOMIC_STORE: u16 = 228;
    pub const PHI: u16 = 245;
    pub const LOOP_MERGE: u16 = 246;
    pub const SELECTION_MERGE: u16 = 247;
    pub const LABEL: u16 = 248;
    pub const BRANCH: u16 = 249;
    pub const BRANCH_CONDITIONAL: u16 = 250;
    pub const SWITCH: u16 = 251;
    pub const KILL: u16 = 252;
    pub const RETURN: u16 = 253;
    pub const RETURN_VALUE: u16 = 254;
    pub const UNREACHABLE: u16 = 255;
    pub const LIFETIME_START: u16 = 256;
    pub const LIFETIME_STOP: u16 = 257;
    pub const NO_LINE: u16 = 317;
    pub const MODULE_PROCESSED: u16 = 330;
    pub const EXECUTION_MODE_ID: u16 = 331;
    pub const DECORATE_ID: u16 = 332;
    pub const COPY_LOGICAL: u16 = 400;
    pub const TERMINATE_INVOCATION: u16 = 4416;
    pub const TYPE_RAY_QUERY_KHR: u16 = 4472;
    pub const TYPE_ACCELERATION_STRUCTURE_KHR: u16 = 5341;
    pub const DEMOTE_TO_HELPER_INVOCATION: u16 = 5380;
    pub const IS_HELPER_INVOCATION: u16 = 5381;
    pub const DECORATE_STRING: u16 = 5632;
    pub const MEMBER_DECORATE_STRING: u16 = 5633;
}

/// Storage class operand values.
pub mod storage {
    pub const UNIFORM_CONSTANT: u32 = 0;
    pub const INPUT: u32 = 1;
    pub const UNIFORM: u32 = 2;
    pub const OUTPUT: u32 = 3;
    pub const FUNCTION: u32 = 7;
}

/// Memory access mask bits.
pub mod memory_access {
    pub const VOLATILE: u32 = 0x1;
    pub const ALIGNED: u32 = 0x2;
    pub const MAKE_POINTER_AVAILABLE: u32 = 0x8;
    pub const MAKE_POINTER_VISIBLE: u32 = 0x10;
}

use OperandKind::*;

const NONE: &[OperandKind] = &[];
const IDS: &[OperandKind] = &[VariableIds];
const ONE_ID: &[OperandKind] = &[Id];
const LIT: &[OperandKind] = &[LiteralNumber];
const LITS: &[OperandKind] = &[VariableLiterals];
const STRING: &[OperandKind] = &[LiteralString];
const ID_STRING: &[OperandKind] = &[Id, LiteralString];
const ID_LIT: &[OperandKind] = &[Id, LiteralNumber];
const ID_LITS: &[OperandKind] = &[Id, VariableLiterals];
const ID_ID_LITS: &[OperandKind] = &[Id, Id, VariableLiterals];
const IMAGE_2: &[OperandKind] = &[Id, Id, ImageOperands];
const IMAGE_3: &[OperandKind] = &[Id, Id, Id, ImageOperands];
const GROUP_OP: &[OperandKind] = &[Id, LiteralNumber, Id, OptionalId];

/// Descriptor table for core SPIR-V.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreOpcodeTable;

impl OpcodeTable for CoreOpcodeTable {
    fn describe(&self, opcode: u16) -> Option<OpcodeDesc> {
        // (has result type, has result id, operands)
        let (has_type, has_result, operands): (bool, bool, &'static [OperandKind]) = match opcode {
            op::NOP => (false, false, NONE),
            op::UNDEF => (true, true, NONE),
            op::SOURCE_CONTINUED => (false, false, STRING),
            op::SOURCE => (false, false, &[LiteralNumber, LiteralNumber, Id, LiteralString]),
            op::SOURCE_EXTENSION => (false, false, STRING),
            op::NAME => (false, false, ID_STRING),
            op::MEMBER_NAME => (false, false, &[Id, LiteralNumber, LiteralString]),
            op::STRING => (false, true, STRING),
            op::LINE => (false, false, &[Id, LiteralNumber, LiteralNumber]),
            op::EXTENSION => (false, false, STRING),
            op::EXT_INST_IMPORT => (false, true, STRING),
            // The walker special-cases the operands of OpExtInst.
            op::EXT_INST => (true, true, &[Id, LiteralNumber, VariableIds]),
            op::MEMORY_MODEL => (false, false, &[LiteralNumber, LiteralNumber]),
            op::ENTRY_POINT => (false, false, &[LiteralNumber, Id, LiteralString, VariableIds]),
            op::EXECUTION_MODE => (false, false, &[Id, LiteralNumber, VariableLiterals]),
            op::CAPABILITY => (false, false, LIT),

            op::TYPE_VOID | op::TYPE_BOOL | op::TYPE_SAMPLER => (false, true, NONE),
            op::TYPE_INT => (false, true, &[LiteralNumber, LiteralNumber]),
            op::TYPE_FLOAT => (false, true, LITS),
            op::TYPE_VECTOR | op::TYPE_MATRIX => (false, true, ID_LIT),
            op::TYPE_IMAGE => (false, true, ID_LITS),
            op::TYPE_SAMPLED_IMAGE | op::TYPE_RUNTIME_ARRAY => (false, true, ONE_ID),
            op::TYPE_ARRAY => (false, true, &[Id, Id]),
            op::TYPE_STRUCT => (false, true, IDS),
            op::TYPE_OPAQUE => (false, true, STRING),
            op::TYPE_POINTER => (false, true, &[LiteralNumber, Id]),
            op::TYPE_FUNCTION => (false, true, &[Id, VariableIds]),
            op::TYPE_EVENT | op::TYPE_DEVICE_EVENT | op::TYPE_RESERVE_ID | op::TYPE_QUEUE => {
                (false, true, NONE)
            }
            op::TYPE_PIPE => (false, true, LIT),
            op::TYPE_FORWARD_POINTER => (false, false, ID_LIT),
            op::TYPE_RAY_QUERY_KHR | op::TYPE_ACCELERATION_STRUCTURE_KHR => (false, true, NONE),

            op::CONSTANT_TRUE | op::CONSTANT_FALSE | op::CONSTANT_NULL => (true, true, NONE),
            op::SPEC_CONSTANT_TRUE | op::SPEC_CONSTANT_FALSE => (true, true, NONE),
            op::CONSTANT | op::SPEC_CONSTANT => (true, true, LITS),
            op::CONSTANT_COMPOSITE | op::SPEC_CONSTANT_COMPOSITE => (true, true, IDS),
            op::CONSTANT_SAMPLER => (true, true, &[LiteralNumber, LiteralNumber, LiteralNumber]),
            op::SPEC_CONSTANT_OP => (true, true, &[LiteralNumber, VariableIds]),

            op::FUNCTION => (true, true, &[LiteralNumber, Id]),
            op::FUNCTION_PARAMETER => (true, true, NONE),
            op::FUNCTION_END => (false, false, NONE),
            op::FUNCTION_CALL => (true, true, &[Id, VariableIds]),

            op::VARIABLE => (true, true, &[LiteralNumber, OptionalId]),
            op::IMAGE_TEXEL_POINTER => (true, true, IDS),
            op::LOAD => (true, true, &[Id, MemoryAccess]),
            op::STORE => (false, false, &[Id, Id, MemoryAccess]),
            op::COPY_MEMORY => (false, false, &[Id, Id, MemoryAccess, MemoryAccess]),
            op::COPY_MEMORY_SIZED => (false, false, &[Id, Id, Id, MemoryAccess, MemoryAccess]),
            op::ACCESS_CHAIN
            | op::IN_BOUNDS_ACCESS_CHAIN
            | op::PTR_ACCESS_CHAIN
            | op::IN_BOUNDS_PTR_ACCESS_CHAIN
            | op::GENERIC_PTR_MEM_SEMANTICS => (true, true, IDS),
            op::ARRAY_LENGTH => (true, true, ID_LIT),

            op::DECORATE => (false, false, &[Id, LiteralNumber, VariableLiterals]),
            op::MEMBER_DECORATE => (false, false, &[Id, LiteralNumber, LiteralNumber, VariableLiterals]),
            op::DECORATION_GROUP => (false, true, NONE),
            op::GROUP_DECORATE => (false, false, IDS),
            op::GROUP_MEMBER_DECORATE => (false, false, &[Id, VariableIdLiteral]),
            op::DECORATE_ID => (false, false, &[Id, LiteralNumber, VariableIds]),
            op::DECORATE_STRING => (false, false, &[Id, LiteralNumber, VariableLiterals]),
            op::MEMBER_DECORATE_STRING => (false, false, &[Id, LiteralNumber, LiteralNumber, VariableLiterals]),

            op::VECTOR_EXTRACT_DYNAMIC
            | op::VECTOR_INSERT_DYNAMIC
            | op::COMPOSITE_CONSTRUCT
            | op::COPY_OBJECT
            | op::TRANSPOSE => (true, true, IDS),
            op::VECTOR_SHUFFLE => (true, true, ID_ID_LITS),
            op::COMPOSITE_EXTRACT => (true, true, ID_LITS),
            op::COMPOSITE_INSERT => (true, true, ID_ID_LITS),

            op::SAMPLED_IMAGE => (true, true, IDS),
            op::IMAGE_SAMPLE_IMPLICIT_LOD
            | op::IMAGE_SAMPLE_EXPLICIT_LOD
            | op::IMAGE_SAMPLE_PROJ_IMPLICIT_LOD
            | op::IMAGE_SAMPLE_PROJ_EXPLICIT_LOD
            | op::IMAGE_FETCH
            | op::IMAGE_READ => (true, true, IMAGE_2),
            op::IMAGE_SAMPLE_DREF_IMPLICIT_LOD
            | op::IMAGE_SAMPLE_DREF_EXPLICIT_LOD
            | op::IMAGE_SAMPLE_PROJ_DREF_IMPLICIT_LOD
            | op::IMAGE_SAMPLE_PROJ_DREF_EXPLICIT_LOD
            | op::IMAGE_GATHER
            | op::IMAGE_DREF_GATHER => (true, true, IMAGE_3),
            op::IMAGE_WRITE => (false, false, IMAGE_3),
            // OpImage and the image queries
            100..=107 => (true, true, IDS),

            op::GENERIC_CAST_TO_PTR_EXPLICIT => (true, true, ID_LIT),
            // Conversions
            109..=122 | 124 => (true, true, IDS),
            // Arithmetic
            126..=152 => (true, true, IDS),
            // Relational and logical
            154..=191 => (true, true, IDS),
            // Bit manipulation
            194..=205 => (true, true, IDS),
            // Derivatives
            207..=215 => (true, true, IDS),

            op::EMIT_VERTEX | op::END_PRIMITIVE => (false, false, NONE),
            220 | 221 => (false, false, ONE_ID),
            // Control and memory barriers
            224 | 225 => (false, false, IDS),
            op::ATOMIC_STORE => (false, false, IDS),
            227 | 229..=242 => (true, true, IDS),

            op::PHI => (true, true, IDS),
            op::LOOP_MERGE => (false, false, ID_ID_LITS),
            op::SELECTION_MERGE => (false, false, ID_LIT),
            op::LABEL => (false, true, NONE),
            op::BRANCH => (false, false, ONE_ID),
            op::BRANCH_CONDITIONAL => (false, false, &[Id, Id, Id, VariableLiterals]),
            op::SWITCH => (false, false, &[Id, Id, VariableLiteralId]),
            op::KILL | op::RETURN | op::UNREACHABLE | op::TERMINATE_INVOCATION => (false, false, NONE),
            op::RETURN_VALUE => (false, false, ONE_ID),
            op::LIFETIME_START | op::LIFETIME_STOP => (false, false, ID_LIT),

            op::NO_LINE => (false, false, NONE),
            op::MODULE_PROCESSED => (false, false, STRING),
            op::EXECUTION_MODE_ID => (false, false, &[Id, LiteralNumber, VariableIds]),

            // Subgroup operations; 342 and 349..=364 carry a group operation literal.
            342 | 349..=364 => (true, true, GROUP_OP),
            333..=341 | 343..=348 | 365 | 366 => (true, true, IDS),

            op::COPY_LOGICAL => (true, true, IDS),
            // OpPtrEqual, OpPtrNotEqual, OpPtrDiff
            401..=403 => (true, true, IDS),

            op::DEMOTE_TO_HELPER_INVOCATION => (false, false, NONE),
            op::IS_HELPER_INVOCATION => (true, true, NONE),

            _ => return None,
        };

        Some(OpcodeDesc::new(has_type, has_result, operands))
    }
}

/// Whether `opcode` declares a type.
pub fn is_type_op(opcode: u16) -> bool {
    matches!(
        opcode,
        op::TYPE_VOID..=op::TYPE_PIPE | op::TYPE_RAY_QUERY_KHR | op::TYPE_ACCELERATION_STRUCTURE_KHR
    )
}

/// Whether `opcode` declares a module-level constant.
pub fn is_const_op(opcode: u16) -> bool {
    matches!(
        opcode,
        op::CONSTANT_TRUE..=op::CONSTANT_NULL | op::SPEC_CONSTANT_TRUE..=op::SPEC_CONSTANT_OP
    )
}

/// Whether `opcode` is debug information removed by the `STRIP` option.
pub fn is_strip_op(opcode: u16) -> bool {
    matches!(
        opcode,
        op::SOURCE
            | op::SOURCE_CONTINUED
            | op::SOURCE_EXTENSION
            | op::NAME
            | op::MEMBER_NAME
            | op::LINE
            | op::NO_LINE
            | op::MODULE_PROCESSED
    )
}

/// Whether `opcode` only attaches a name or decoration to its first operand.
pub fn is_annotation_op(opcode: u16) -> bool {
    matches!(
        opcode,
        op::NAME | op::DECORATE | op::DECORATE_ID | op::DECORATE_STRING
    )
}

/// Whether `opcode` is an access chain (derives a pointer from a base pointer).
pub fn is_access_chain_op(opcode: u16) -> bool {
    matches!(
        opcode,
        op::ACCESS_CHAIN | op::IN_BOUNDS_ACCESS_CHAIN | op::PTR_ACCESS_CHAIN | op::IN_BOUNDS_PTR_ACCESS_CHAIN
    )
}

/// Id operands of an `OpSpecConstantOp` wrapping `wrapped` before its literal tail.
///
/// `None` means every operand is an id.
pub fn spec_constant_op_ids(wrapped: u32) -> Option<usize> {
    match u16::try_from(wrapped).ok()? {
        op::COMPOSITE_EXTRACT => Some(1),
        op::COMPOSITE_INSERT | op::VECTOR_SHUFFLE => Some(2),
        _ => None,
    }
}
