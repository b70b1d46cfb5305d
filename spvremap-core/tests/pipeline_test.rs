// Integration tests for the full remapping pipeline and its failure modes
mod utils;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spvremap_core::remapper::module::{instruction_word, MAGIC_NUMBER};
use spvremap_core::remapper::opcode::op;
use spvremap_core::{
    remap_words, ErrorCategory, HashParams, Module, RemapError, RemapOptions, Remapper,
};
use utils::*;

/// A debug-annotated shader: source, a file string, names and one function. Bound 6.
fn annotated() -> ModuleBuilder {
    let mut b = ModuleBuilder::new(6);
    b.shader_preamble()
        .entry_point(3, "main", &[])
        .inst_with_string(op::STRING, &[5], "shader.frag", &[])
        .inst(op::SOURCE, &[2, 450, 5])
        .name(3, "main")
        .name(1, "void")
        .inst(op::TYPE_VOID, &[1])
        .inst(op::TYPE_FUNCTION, &[2, 1])
        .function(3, 1, 2, 4)
        .end_function();
    b
}

fn remap_err(words: Vec<u32>, options: RemapOptions) -> RemapError {
    Remapper::from_words(words)
        .with_options(options)
        .remap()
        .unwrap_err()
}

#[test]
fn test_bad_magic_reaches_error_hook() {
    let calls: Rc<Cell<usize>> = Rc::new(Cell::new(0));
    let seen = Rc::clone(&calls);

    let mut remapper = Remapper::from_words(vec![0xDEAD_BEEF, 0x0001_0000, 0, 1, 0])
        .with_error_hook(move |_| seen.set(seen.get() + 1));
    let error = remapper.remap().unwrap_err();

    assert_eq!(error, RemapError::BadMagic { found: 0xDEAD_BEEF });
    assert_eq!(error.category(), ErrorCategory::Structural);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_short_module_is_rejected() {
    let error = remap_err(vec![MAGIC_NUMBER, 0x0001_0000], RemapOptions::default());
    assert_eq!(error, RemapError::TooShort { words: 2, required: 5 });
}

#[test]
fn test_truncated_instruction_is_rejected() {
    let mut words = ModuleBuilder::new(2).words();
    words.extend([instruction_word(5, op::TYPE_VOID), 1]);

    let error = remap_err(words, RemapOptions::default());
    assert!(matches!(
        error,
        RemapError::Truncated {
            position: 5,
            word_count: 5,
            ..
        }
    ));
    assert_eq!(error.category(), ErrorCategory::Structural);
}

#[test]
fn test_unknown_opcode_is_rejected() {
    let mut b = ModuleBuilder::new(2);
    b.inst(9, &[1]);

    let error = remap_err(b.words(), RemapOptions::default());
    assert_eq!(error, RemapError::UnknownOpcode { opcode: 9, position: 5 });
}

#[test]
fn test_nested_function_is_rejected() {
    let mut b = ModuleBuilder::new(7);
    b.inst(op::TYPE_VOID, &[1])
        .inst(op::TYPE_FUNCTION, &[2, 1])
        .function(3, 1, 2, 4)
        .function(5, 1, 2, 6)
        .end_function()
        .end_function();

    let error = remap_err(b.words(), RemapOptions::default());
    assert!(matches!(error, RemapError::Malformed { .. }));
    assert_eq!(error.category(), ErrorCategory::Structural);
}

#[test]
fn test_id_out_of_bound_is_rejected() {
    let mut b = ModuleBuilder::new(2);
    b.inst(op::TYPE_VOID, &[5]);

    let error = remap_err(b.words(), RemapOptions::default());
    assert_eq!(error, RemapError::IdOutOfBound { id: 5, bound: 2 });
    assert_eq!(error.category(), ErrorCategory::IdState);
}

#[test]
fn test_undeclared_component_type_is_rejected() {
    let mut b = ModuleBuilder::new(3);
    b.inst(op::TYPE_VECTOR, &[2, 1, 4]);

    let error = remap_err(b.words(), RemapOptions::MAP_TYPES);
    assert_eq!(error, RemapError::TypeNotFound { id: 1 });
}

#[test]
fn test_hash_range_past_id_space_is_rejected() {
    let hash = HashParams {
        name_offset: u32::MAX - 10,
        ..HashParams::default()
    };
    let error = Remapper::from_words(annotated().words())
        .with_hash_params(hash)
        .remap()
        .unwrap_err();

    assert_eq!(error, RemapError::HashRange { strategy: "name" });
    assert_eq!(error.category(), ErrorCategory::Unsupported);
}

#[test]
fn test_strip_removes_debug_info_only() {
    let (input, mut words) = (annotated().words(), annotated().words());
    let stats = remap_words(&mut words, RemapOptions::STRIP).unwrap();

    assert!(instructions_of(&words, op::NAME).is_empty());
    assert!(instructions_of(&words, op::SOURCE).is_empty());
    assert_eq!(instructions_of(&words, op::STRING).len(), 1);
    assert_eq!(instructions_of(&words, op::FUNCTION).len(), 1);
    assert_eq!(stats.input_words, input.len());
    assert_eq!(stats.output_words, words.len());
    assert_eq!(stats.words_stripped, input.len() - words.len());
    assert_well_formed(&words);
}

#[test]
fn test_without_strip_names_survive() {
    let mut words = annotated().words();
    remap_words(&mut words, RemapOptions::MAP_ALL).unwrap();

    assert_eq!(instructions_of(&words, op::NAME).len(), 2);
    assert_eq!(instructions_of(&words, op::SOURCE).len(), 1);
    assert_well_formed(&words);
}

#[test]
fn test_remap_words_compacts_sparse_ids() {
    let mut b = ModuleBuilder::new(100);
    b.shader_preamble()
        .entry_point(40, "main", &[])
        .inst(op::TYPE_VOID, &[10])
        .inst(op::TYPE_FUNCTION, &[20, 10])
        .function(40, 10, 20, 90)
        .end_function();
    let mut words = b.words();

    let stats = remap_words(&mut words, RemapOptions::empty()).unwrap();

    assert_eq!(stats.input_bound, 100);
    assert_eq!(stats.output_bound, 5);
    assert_eq!(stats.remainder_ids_mapped, 4);
    assert_eq!(instructions_of(&words, op::TYPE_FUNCTION)[0][1..], [2, 1]);
    assert_well_formed(&words);
}

#[test]
fn test_log_hook_respects_verbosity() {
    let run = |verbosity: u32| -> Vec<String> {
        let lines: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&lines);
        let mut remapper = Remapper::from_words(annotated().words())
            .with_verbosity(verbosity)
            .with_log_hook(move |line| sink.borrow_mut().push(line.to_string()));
        remapper.remap().unwrap();
        drop(remapper);
        Rc::try_unwrap(lines).unwrap().into_inner()
    };

    assert!(run(0).is_empty());

    let quiet = run(2);
    let chatty = run(3);
    assert!(quiet.iter().any(|line| line.contains("validating")));
    assert!(!quiet.iter().any(|line| line.contains("Remapping Names")));
    assert!(chatty.iter().any(|line| line.contains("Remapping Names")));
    assert!(chatty.len() > quiet.len());
}

#[test]
fn test_big_endian_bytes_round_trip() {
    let words = annotated().words();
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_be_bytes()).collect();

    let module = Module::from_bytes(&bytes).unwrap();
    assert_eq!(module.words(), words.as_slice());

    let mut remapper = Remapper::new(module).with_options(RemapOptions::empty());
    remapper.remap().unwrap();
    let out: Vec<u8> = remapper.module().to_bytes();
    assert_eq!(&out[..4], &MAGIC_NUMBER.to_be_bytes());
}

#[test]
fn test_full_pipeline_output_is_well_formed() {
    let mut words = annotated().words();
    let input_len: usize = words.len();
    let stats = remap_words(&mut words, RemapOptions::ALL).unwrap();

    assert!(words.len() <= input_len);
    assert!(stats.output_bound >= 1);
    assert_well_formed(&words);
}

#[test]
#[should_panic(expected = "ids used without definition")]
fn test_well_formed_check_rejects_dangling_name() {
    let mut b = ModuleBuilder::new(4);
    b.name(3, "ghost").inst(op::TYPE_VOID, &[1]);
    assert_well_formed(&b.words());
}
