//! Toy C Compiler - Optimization Pipeline
//!
//! AST-to-AST rewrites applied to each function after semantic
//! analysis and before code generation. Passes run in a fixed order:
//!
//! 1. Constant folding, constant propagation, and dead-code elimination
//!    (one integrated pass)
//! 2. Common subexpression elimination
//! 3. Loop-invariant code motion
//! 4. Strength reduction
//!
//! Rewritten nodes keep the node id of what they replace, so the
//! per-node offset annotations from semantic analysis stay valid.
//! Passes that synthesize new nodes draw ids from a generator seeded
//! past the highest id in the translation unit and register offsets
//! for them. The pipeline is idempotent: running it a second time
//! leaves the tree unchanged.

mod cse;
mod fold;
mod licm;
mod strength;
mod vars;

use std::mem;
use toycc_common::{CompilerError, FunctionInfo};
use toycc_frontend::ast::{NodeIdGenerator, Statement, StatementKind, TranslationUnit};

/// Runs the optimization pipeline over a translation unit
pub struct Optimizer {
    ids: NodeIdGenerator,
}

impl Optimizer {
    /// Create an optimizer whose id generator resumes past every node
    /// id already present in `unit`.
    pub fn new(unit: &TranslationUnit) -> Self {
        Optimizer {
            ids: NodeIdGenerator::resuming_after(unit),
        }
    }

    /// Optimize every function body in place. `infos` must be the
    /// semantic results for `unit`, in the same order; offset maps are
    /// extended for nodes the passes synthesize.
    pub fn optimize(
        &mut self,
        unit: &mut TranslationUnit,
        infos: &mut [FunctionInfo],
    ) -> Result<(), CompilerError> {
        for (function, info) in unit.functions.iter_mut().zip(infos.iter_mut()) {
            log::debug!("optimizing function '{}'", function.name);
            let placeholder = Statement {
                node_id: function.body.node_id,
                kind: StatementKind::Empty,
                line: function.body.line,
            };
            let body = mem::replace(&mut function.body, placeholder);
            let body = fold::run(body);
            let body = cse::run(body, info, &mut self.ids)?;
            let body = licm::run(body, &mut self.ids);
            let body = strength::run(body, &mut self.ids);
            function.body = body;
        }
        Ok(())
    }
}
