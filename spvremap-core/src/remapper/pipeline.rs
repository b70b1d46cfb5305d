//! Remapping Pipeline
//!
//! [`Remapper`] owns one module and every piece of state derived from it, and runs the
//! enabled passes in a fixed order.
//!
//! # Pipeline Stages
//! 1. **Validate**: header length, magic number and schema
//! 2. **Scan**: build the module index and mark every used id
//! 3. **Initial strip**: drop debug info when `STRIP` is enabled
//! 4. **Load-store promotion** (`OPT_LOADSTORE`)
//! 5. **Load-store forwarding** (`OPT_FWD_LS`)
//! 6. **Function DCE** (`DCE_FUNCS`)
//! 7. **Variable DCE** (`DCE_VARS`)
//! 8. **Type DCE** (`DCE_TYPES`)
//! 9. **Type/constant canonicalization** (`MAP_TYPES`)
//! 10. **Name canonicalization** (`MAP_NAMES`)
//! 11. **Function-body canonicalization** (`MAP_FUNCS`)
//! 12. **Remainder**: sequential ids for everything still unmapped
//! 13. **Apply**: rewrite every id occurrence in one walk
//! 14. **Final strip**
//!
//! DCE runs before canonicalization so no hashed id range is spent on code that is about
//! to disappear, and ids are rewritten exactly once after every decision is made.
//!
//! # State Consistency
//! Positions never survive a compaction: every [`Remapper::strip`] that removes words
//! rescans the module before any later pass reads the index or the id table.

use serde::{Deserialize, Serialize};

use crate::remapper::config::RemapConfig;
use crate::remapper::error::{RemapError, Result};
use crate::remapper::id_table::IdTable;
use crate::remapper::index::ModuleIndex;
use crate::remapper::module::Module;
use crate::remapper::opcode::{is_strip_op, CoreOpcodeTable, OpcodeTable};
use crate::remapper::options::{HashParams, RemapOptions};
use crate::remapper::strip::StripList;

/// Callback receiving the error that aborted a run.
pub type ErrorHook = Box<dyn FnMut(&RemapError)>;

/// Callback receiving verbosity-gated progress messages.
pub type LogHook = Box<dyn FnMut(&str)>;

/// Counters collected during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapStats {
    pub input_words: usize,
    pub output_words: usize,
    pub input_bound: u32,
    pub output_bound: u32,
    /// Words removed by all compactions together.
    pub words_stripped: usize,
    pub functions_removed: usize,
    pub variables_removed: usize,
    /// Types and constants removed.
    pub types_removed: usize,
    pub loads_promoted: usize,
    pub loads_forwarded: usize,
    pub stores_forwarded: usize,
    pub type_ids_mapped: usize,
    pub name_ids_mapped: usize,
    pub fn_body_ids_mapped: usize,
    pub remainder_ids_mapped: usize,
}

/// In-place id remapper for one SPIR-V module.
pub struct Remapper {
    pub(crate) module: Module,
    pub(crate) options: RemapOptions,
    pub(crate) verbosity: u32,
    pub(crate) hash: HashParams,
    pub(crate) table: Box<dyn OpcodeTable>,
    pub(crate) ids: IdTable,
    pub(crate) index: ModuleIndex,
    pub(crate) strip_list: StripList,
    pub(crate) stats: RemapStats,
    error_hook: ErrorHook,
    log_hook: LogHook,
}

impl Remapper {
    /// Remapper with default options, the core opcode table and logging hooks.
    pub fn new(module: Module) -> Self {
        Self {
            module,
            options: RemapOptions::default(),
            verbosity: 0,
            hash: HashParams::default(),
            table: Box::new(CoreOpcodeTable),
            ids: IdTable::default(),
            index: ModuleIndex::default(),
            strip_list: StripList::new(),
            stats: RemapStats::default(),
            error_hook: Box::new(|error| log::error!("{}", error)),
            log_hook: Box::new(|message| log::debug!("{}", message)),
        }
    }

    pub fn from_words(words: Vec<u32>) -> Self {
        Self::new(Module::new(words))
    }

    pub fn with_options(mut self, options: RemapOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u32) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_hash_params(mut self, hash: HashParams) -> Self {
        self.hash = hash;
        self
    }

    /// Apply options, verbosity and hash parameters from a configuration.
    pub fn with_config(self, config: &RemapConfig) -> Self {
        self.with_options(config.options)
            .with_verbosity(config.verbosity)
            .with_hash_params(config.hash)
    }

    pub fn with_opcode_table(mut self, table: Box<dyn OpcodeTable>) -> Self {
        self.table = table;
        self
    }

    /// Replace the error hook. It is called once with the error that aborts
    /// [`Remapper::remap`]; the error is returned to the caller afterwards.
    pub fn with_error_hook(mut self, hook: impl FnMut(&RemapError) + 'static) -> Self {
        self.error_hook = Box::new(hook);
        self
    }

    /// Replace the log hook receiving messages at or below the verbosity level.
    pub fn with_log_hook(mut self, hook: impl FnMut(&str) + 'static) -> Self {
        self.log_hook = Box::new(hook);
        self
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn index(&self) -> &ModuleIndex {
        &self.index
    }

    pub fn id_table(&self) -> &IdTable {
        &self.ids
    }

    pub fn options(&self) -> RemapOptions {
        self.options
    }

    pub fn stats(&self) -> &RemapStats {
        &self.stats
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    pub fn into_words(self) -> Vec<u32> {
        self.module.into_words()
    }

    /// Emit `text` through the log hook if the verbosity is at least `level`.
    pub(crate) fn msg(&mut self, level: u32, indent: usize, text: &str) {
        if self.verbosity >= level {
            let line: String = format!("{:indent$}{}", "", text, indent = indent);
            (self.log_hook)(&line);
        }
    }

    /// Run the whole pipeline under the configured options.
    ///
    /// # Returns
    /// Statistics of the run. The module is rewritten in place.
    ///
    /// # Errors
    /// Any failure aborts the run; the error hook sees it before it is returned and the
    /// module is left in an unspecified state.
    pub fn remap(&mut self) -> Result<RemapStats> {
        match self.run() {
            Ok(()) => Ok(self.stats.clone()),
            Err(error) => {
                (self.error_hook)(&error);
                Err(error)
            }
        }
    }

    fn run(&mut self) -> Result<()> {
        self.validate()?;
        self.build_local_maps()?;

        let bound: u32 = self.module.bound();
        self.msg(3, 4, &format!("ID bound: {}", bound));
        log::debug!(
            "remapping {} words, bound {}, options {:?}",
            self.module.len(),
            bound,
            self.options
        );

        self.strip()?;

        let options: RemapOptions = self.options;
        if options.contains(RemapOptions::OPT_LOADSTORE) {
            self.opt_load_store()?;
        }
        if options.contains(RemapOptions::OPT_FWD_LS) {
            self.forward_load_stores()?;
        }
        if options.contains(RemapOptions::DCE_FUNCS) {
            self.dce_funcs()?;
        }
        if options.contains(RemapOptions::DCE_VARS) {
            self.dce_vars()?;
        }
        if options.contains(RemapOptions::DCE_TYPES) {
            self.dce_types()?;
        }
        if options.contains(RemapOptions::MAP_TYPES) {
            self.map_type_consts()?;
        }
        if options.contains(RemapOptions::MAP_NAMES) {
            self.map_names()?;
        }
        if options.contains(RemapOptions::MAP_FUNCS) {
            self.map_fn_bodies()?;
        }

        self.map_remainder()?;
        self.apply_map()?;
        self.strip()?;

        self.stats.output_words = self.module.len();
        self.stats.output_bound = self.module.bound();
        log::info!(
            "remapped module: {} -> {} words, bound {} -> {}",
            self.stats.input_words,
            self.stats.output_words,
            self.stats.input_bound,
            self.stats.output_bound
        );
        Ok(())
    }

    /// Check the header and reset all per-run state.
    pub fn validate(&mut self) -> Result<()> {
        self.msg(2, 2, "validating: ");
        self.module.validate_header()?;
        if let Some(strategy) = self.hash.out_of_range() {
            return Err(RemapError::HashRange { strategy });
        }

        self.index.clear_all();
        self.strip_list.clear();
        self.stats = RemapStats {
            input_words: self.module.len(),
            input_bound: self.module.bound(),
            ..RemapStats::default()
        };
        Ok(())
    }

    /// Rebuild the module index and the id table from the current buffer.
    ///
    /// Debug instructions are scheduled for stripping when `STRIP` is enabled. Names are
    /// accumulated, not replaced.
    pub fn build_local_maps(&mut self) -> Result<()> {
        self.msg(2, 2, "build local maps: ");

        let strip_debug: bool = self.options.contains(RemapOptions::STRIP);
        let bound: u32 = self.module.bound();
        self.ids.reset(bound);
        self.index.clear();

        let Self {
            module,
            table,
            ids,
            index,
            strip_list,
            ..
        } = self;

        module.walk(
            table.as_ref(),
            |inst| {
                if strip_debug && is_strip_op(inst.opcode) {
                    strip_list.push(inst.range());
                }
                index.record(inst)?;
                Ok(false)
            },
            |id| ids.touch(*id),
        )?;

        index.finish()
    }

    /// Compact away every pending strip range and rescan.
    ///
    /// No-op when nothing is pending.
    pub fn strip(&mut self) -> Result<()> {
        if self.strip_list.is_empty() {
            return Ok(());
        }

        let removed: usize = self.strip_list.compact(self.module.words_mut());
        self.stats.words_stripped += removed;
        self.msg(3, 2, &format!("stripped {} words", removed));

        self.build_local_maps()
    }

    /// Give every still unmapped id the next free sequential id and shrink the bound.
    pub fn map_remainder(&mut self) -> Result<()> {
        self.msg(3, 2, "Remapping remainder: ");

        let (count, bound) = self.ids.map_remainder()?;
        self.stats.remainder_ids_mapped += count;
        self.module.set_bound(bound);
        Ok(())
    }

    /// Rewrite every id occurrence through the id table.
    ///
    /// # Errors
    /// [`RemapError::IdNotMapped`] for any id without a mapping.
    pub fn apply_map(&mut self) -> Result<()> {
        self.msg(3, 2, "Applying map: ");

        let Self {
            module, table, ids, ..
        } = self;

        module.walk(
            table.as_ref(),
            |_| Ok(false),
            |id| {
                *id = ids.mapped(*id)?;
                Ok(())
            },
        )
    }
}

/// Remap a word buffer in place with default hooks.
///
/// # Errors
/// Returns the first error of the run; `words` is left unspecified in that case.
pub fn remap_words(words: &mut Vec<u32>, options: RemapOptions) -> Result<RemapStats> {
    let mut remapper: Remapper = Remapper::from_words(std::mem::take(words)).with_options(options);
    let result: Result<RemapStats> = remapper.remap();
    *words = remapper.into_words();
    result
}
