//! Structural Type Hashing
//!
//! Computes a hash for every type and constant declaration from its shape alone, so that
//! structurally equal declarations in separately compiled modules hash equally no matter
//! which ids they were given.
//!
//! # Algorithm
//! - Scalars and opaque kinds map to small fixed constants
//! - Composite types fold in the hashes of the types they reference, found by
//!   declaration position (member ids are still old ids at this point)
//! - Constants fold in their type's hash and their literal words or constituent hashes
//! - Results are memoized per declaration position
//! - A reference back into a declaration still being hashed (pointer cycles through
//!   forward pointers) folds [`CYCLE_HASH`] instead of recursing
//!
//! All arithmetic wraps: the hash is only ever used modulo a small prime.

use std::collections::{HashMap, HashSet};

use crate::remapper::error::{RemapError, Result};
use crate::remapper::module::{opcode_of, word_count_of};
use crate::remapper::opcode::{op, spec_constant_op_ids};

/// Folded in place of a declaration that is part of a reference cycle.
pub const CYCLE_HASH: u32 = 0x3F;

/// Memoizing hasher over an immutable view of the module.
pub struct TypeHasher<'a> {
    words: &'a [u32],
    /// Type or constant id to declaration position.
    by_id: &'a HashMap<u32, usize>,
    memo: HashMap<usize, u32>,
    in_progress: HashSet<usize>,
}

impl<'a> TypeHasher<'a> {
    pub fn new(words: &'a [u32], by_id: &'a HashMap<u32, usize>) -> Self {
        Self {
            words,
            by_id,
            memo: HashMap::with_capacity(by_id.len()),
            in_progress: HashSet::new(),
        }
    }

    #[inline]
    fn word(&self, position: usize) -> u32 {
        self.words.get(position).copied().unwrap_or(0)
    }

    /// Hash of the type or constant `id`.
    ///
    /// # Errors
    /// [`RemapError::TypeNotFound`] if `id` is not declared as a type or constant.
    pub fn hash_id(&mut self, id: u32) -> Result<u32> {
        let position: usize = *self
            .by_id
            .get(&id)
            .ok_or(RemapError::TypeNotFound { id })?;
        self.hash_at(position)
    }

    /// Hash of an operand that may be either a type/constant id or a literal.
    fn hash_operand(&mut self, word: u32) -> Result<u32> {
        if self.by_id.contains_key(&word) {
            self.hash_id(word)
        } else {
            Ok(word)
        }
    }

    /// Hash of the declaration starting at `position`.
    ///
    /// # Errors
    /// - [`RemapError::TypeNotFound`] if a referenced id is not a type or constant
    /// - [`RemapError::UnsupportedType`] for a declaration kind without a hash
    pub fn hash_at(&mut self, position: usize) -> Result<u32> {
        if let Some(&hash) = self.memo.get(&position) {
            return Ok(hash);
        }
        if !self.in_progress.insert(position) {
            return Ok(CYCLE_HASH);
        }

        let result: Result<u32> = self.compute(position);
        self.in_progress.remove(&position);

        let hash: u32 = result?;
        self.memo.insert(position, hash);
        Ok(hash)
    }

    /// Weighted sum `Σ w * hash(word w)` over words `from..word_count`.
    fn fold_ids(&mut self, position: usize, from: usize, word_count: usize) -> Result<u32> {
        let mut hash: u32 = 0;
        for w in from..word_count {
            let id: u32 = self.word(position + w);
            let member: u32 = self.hash_id(id)?;
            hash = hash.wrapping_add((w as u32).wrapping_mul(member));
        }
        Ok(hash)
    }

    /// Weighted sum `Σ w * word w` over literal words `from..word_count`.
    fn fold_literals(&self, position: usize, from: usize, word_count: usize) -> u32 {
        (from..word_count).fold(0u32, |hash, w| {
            hash.wrapping_add((w as u32).wrapping_mul(self.word(position + w)))
        })
    }

    fn compute(&mut self, position: usize) -> Result<u32> {
        let first: u32 = self.word(position);
        let opcode: u16 = opcode_of(first);
        let word_count: usize = word_count_of(first);
        let words: &'a [u32] = self.words;
        let at = |offset: usize| words.get(position + offset).copied().unwrap_or(0);

        let hash: u32 = match opcode {
            op::TYPE_VOID => 0,
            op::TYPE_BOOL => 1,
            // width, signedness
            op::TYPE_INT => 3u32.wrapping_add(at(2)).wrapping_add(at(3)),
            op::TYPE_FLOAT => 5u32.wrapping_add(at(2)),
            op::TYPE_VECTOR => {
                let count: u32 = at(3);
                let component: u32 = self.hash_id(at(2))?;
                6u32.wrapping_add(component.wrapping_mul(count.wrapping_sub(1)))
            }
            op::TYPE_MATRIX => {
                let count: u32 = at(3);
                let column: u32 = self.hash_id(at(2))?;
                30u32.wrapping_add(column.wrapping_mul(count.wrapping_sub(1)))
            }
            op::TYPE_IMAGE => {
                let (dim, depth, arrayed, ms, sampled) = (at(3), at(4), at(5), at(6), at(7));
                let sampled_type: u32 = self.hash_id(at(2))?;
                120u32
                    .wrapping_add(sampled_type)
                    .wrapping_add(dim)
                    .wrapping_add(depth.wrapping_mul(8 * 16))
                    .wrapping_add(arrayed.wrapping_mul(4 * 16))
                    .wrapping_add(ms.wrapping_mul(2 * 16))
                    .wrapping_add(sampled.wrapping_mul(16))
            }
            op::TYPE_SAMPLER => 500,
            op::TYPE_SAMPLED_IMAGE => 502u32.wrapping_add(self.hash_id(at(2))?),
            op::TYPE_ARRAY => {
                let (element_id, length_id) = (at(2), at(3));
                let element: u32 = self.hash_id(element_id)?;
                let length: u32 = self.hash_id(length_id)?;
                501u32.wrapping_add(element.wrapping_mul(length))
            }
            op::TYPE_RUNTIME_ARRAY => 5000u32.wrapping_add(self.hash_id(at(2))?),
            op::TYPE_STRUCT => 10000u32.wrapping_add(self.fold_ids(position, 2, word_count)?),
            op::TYPE_OPAQUE => 6000u32.wrapping_add(at(2)),
            op::TYPE_POINTER => {
                let storage: u32 = at(2);
                let pointee: u32 = self.hash_id(at(3))?;
                100000u32.wrapping_add(pointee).wrapping_add(storage)
            }
            op::TYPE_FUNCTION => 200000u32.wrapping_add(self.fold_ids(position, 2, word_count)?),
            op::TYPE_EVENT => 300000,
            op::TYPE_DEVICE_EVENT => 300001,
            op::TYPE_RESERVE_ID => 300002,
            op::TYPE_QUEUE => 300003,
            op::TYPE_PIPE => 300004u32.wrapping_add(at(2)),
            op::TYPE_ACCELERATION_STRUCTURE_KHR => 300020,
            op::TYPE_RAY_QUERY_KHR => 300021,

            op::CONSTANT_TRUE => 300007,
            op::CONSTANT_FALSE => 300008,
            op::SPEC_CONSTANT_TRUE => 300017,
            op::SPEC_CONSTANT_FALSE => 300018,
            op::CONSTANT_COMPOSITE => {
                let ty: u32 = self.hash_id(at(1))?;
                let members: u32 = self.fold_ids(position, 3, word_count)?;
                300011u32.wrapping_add(ty).wrapping_add(members)
            }
            op::CONSTANT => {
                let ty: u32 = self.hash_id(at(1))?;
                400011u32
                    .wrapping_add(ty)
                    .wrapping_add(self.fold_literals(position, 3, word_count))
            }
            op::CONSTANT_NULL => 500009u32.wrapping_add(self.hash_id(at(1))?),
            op::CONSTANT_SAMPLER => {
                let ty: u32 = self.hash_id(at(1))?;
                600011u32
                    .wrapping_add(ty)
                    .wrapping_add(self.fold_literals(position, 3, word_count))
            }
            op::SPEC_CONSTANT => {
                let ty: u32 = self.hash_id(at(1))?;
                700011u32
                    .wrapping_add(ty)
                    .wrapping_add(self.fold_literals(position, 3, word_count))
            }
            op::SPEC_CONSTANT_COMPOSITE => {
                let ty: u32 = self.hash_id(at(1))?;
                let members: u32 = self.fold_ids(position, 3, word_count)?;
                800011u32.wrapping_add(ty).wrapping_add(members)
            }
            op::SPEC_CONSTANT_OP => {
                // operands are ids except for the literal indices of a few opcodes
                let ty: u32 = self.hash_id(at(1))?;
                let ids_end: usize = spec_constant_op_ids(at(3))
                    .map_or(word_count, |count| (4 + count).min(word_count));
                let mut hash: u32 = 900011u32
                    .wrapping_add(ty)
                    .wrapping_add(at(3).wrapping_mul(7));
                for w in 4..word_count {
                    let operand: u32 = if w < ids_end {
                        self.hash_operand(at(w))?
                    } else {
                        at(w)
                    };
                    hash = hash.wrapping_add((w as u32).wrapping_mul(operand));
                }
                hash
            }

            _ => return Err(RemapError::UnsupportedType { opcode, position }),
        };

        Ok(hash)
    }
}
