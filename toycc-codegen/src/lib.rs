//! Toy C Compiler - Code Generation
//!
//! Lowers the optimized, annotated AST to RISC-V assembly text.
//! Functions are emitted in file order, each framed by a `.globl`
//! directive, a prologue, the lowered body, and a single epilogue
//! reached through a per-function label. All offsets come from the
//! annotation maps produced by semantic analysis; a missing entry is
//! an internal inconsistency between passes, never a source error.

pub mod asm;
mod emit;
mod frame;
mod peephole;

use asm::LabelGenerator;
use emit::FunctionEmitter;
use thiserror::Error;
use toycc_common::{CompilerError, FunctionInfo, NodeId};
use toycc_frontend::ast::TranslationUnit;

/// Internal consistency failures during lowering
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodegenError {
    #[error("no stack offset recorded for expression node {node_id}")]
    MissingExprOffset { node_id: NodeId },

    #[error("no stack offset recorded for statement node {node_id}")]
    MissingStmtOffset { node_id: NodeId },

    #[error("no stack offset recorded for variable '{name}'")]
    MissingVariableOffset { name: String },

    #[error("break or continue reached lowering outside a loop")]
    MissingLoopContext,
}

impl From<CodegenError> for CompilerError {
    fn from(err: CodegenError) -> Self {
        CompilerError::InternalError {
            message: err.to_string(),
        }
    }
}

/// Generates assembly for a whole translation unit. One label
/// generator spans every function, so labels are unique per
/// compilation.
#[derive(Debug, Default)]
pub struct CodeGenerator {
    labels: LabelGenerator,
}

impl CodeGenerator {
    pub fn new() -> Self {
        CodeGenerator {
            labels: LabelGenerator::new(),
        }
    }

    /// Lower every function in `unit`. `infos` must be the semantic
    /// results in the same order.
    pub fn generate(
        &mut self,
        unit: &TranslationUnit,
        infos: &[FunctionInfo],
    ) -> Result<String, CodegenError> {
        let mut output = String::new();
        for (function, info) in unit.functions.iter().zip(infos) {
            log::debug!("lowering function '{}'", function.name);
            let instrs = FunctionEmitter::new(info, &mut self.labels).emit_function(function)?;
            let instrs = peephole::run(instrs);
            output.push_str(&asm::render(&instrs));
            output.push('\n');
        }
        Ok(output)
    }
}

/// Convenience wrapper for one-shot compilation
pub fn generate_assembly(
    unit: &TranslationUnit,
    infos: &[FunctionInfo],
) -> Result<String, CodegenError> {
    CodeGenerator::new().generate(unit, infos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use toycc_frontend::Frontend;

    fn compile(source: &str) -> String {
        let (unit, infos) = Frontend::analyze_source(source).unwrap();
        generate_assembly(&unit, &infos).unwrap()
    }

    #[test]
    fn test_minimal_main() {
        let asm = compile("int main() { return 0; }");
        let expected = "\
.globl main
main:
    addi sp, sp, -16
    sw ra, 12(sp)
    sw s0, 8(sp)
    addi s0, sp, 16
    li a0, 0
    j __func_end_main
__func_end_main:
    lw ra, 12(sp)
    lw s0, 8(sp)
    addi sp, sp, 16
    jr ra

";
        assert_eq!(asm, expected);
    }

    #[test]
    fn test_frame_size_grows_with_locals() {
        let asm = compile("int main() { int a = 1; int b = 2; return a + b; }");
        // 12 reserved + 2 slots = 20, aligned to 32
        assert!(asm.contains("addi sp, sp, -32"));
        assert!(asm.contains("sw ra, 28(sp)"));
        assert!(asm.contains("sw s0, 24(sp)"));
        assert!(asm.contains("addi s0, sp, 32"));
    }

    #[test]
    fn test_parameters_stored_from_argument_registers() {
        let asm = compile(
            "int add(int a, int b) { return a + b; }\n\
             int main() { return add(1, 2); }",
        );
        assert!(asm.contains("sw a0, -12(s0)"));
        assert!(asm.contains("sw a1, -16(s0)"));
    }

    #[test]
    fn test_ninth_parameter_read_from_caller_frame() {
        let asm = compile(
            "int wide(int p0, int p1, int p2, int p3, int p4, int p5, int p6, int p7, int p8) {\n\
                 return p8;\n\
             }\n\
             int main() { return wide(1, 2, 3, 4, 5, 6, 7, 8, 9); }",
        );
        // parameter 8 sits at 32(s0) in the caller's outgoing area and
        // is copied into slot 8 of the callee frame
        assert!(asm.contains("lw t0, 32(s0)"));
        assert!(asm.contains("sw t0, -44(s0)"));
        // the call pushes 9 words plus 12 bytes of alignment padding
        assert!(asm.contains("addi sp, sp, -12"));
        assert!(asm.contains("addi sp, sp, 48"));
        assert!(asm.contains("lw a7, 28(sp)"));
    }

    #[test]
    fn test_call_marshals_arguments_from_stack() {
        let asm = compile(
            "int add(int a, int b) { return a + b; }\n\
             int main() { return add(1, 2); }",
        );
        // two argument words need 8 bytes of padding to stay aligned
        assert!(asm.contains("addi sp, sp, -8"));
        assert!(asm.contains("lw a0, 0(sp)"));
        assert!(asm.contains("lw a1, 4(sp)"));
        assert!(asm.contains("call add"));
        assert!(asm.contains("addi sp, sp, 16"));
    }

    #[test]
    fn test_if_else_branches_through_labels() {
        let asm = compile(
            "int main() { int x = 1; if (x) { return 1; } else { return 2; } }",
        );
        assert!(asm.contains("beqz t0, Lelse_0"));
        assert!(asm.contains("j Lend_1"));
        assert!(asm.contains("Lelse_0:"));
        assert!(asm.contains("Lend_1:"));
    }

    #[test]
    fn test_while_with_break_and_continue() {
        let asm = compile(
            "int main() {\n\
                 int i = 0;\n\
                 while (1) {\n\
                     if (i > 3) { break; }\n\
                     i = i + 1;\n\
                     continue;\n\
                 }\n\
                 return i;\n\
             }",
        );
        assert!(asm.contains("Lwhile_begin_0:"));
        assert!(asm.contains("beqz t0, Lwhile_end_1"));
        // break jumps to the loop end, continue back to the condition
        assert!(asm.contains("j Lwhile_end_1"));
        assert!(asm.contains("j Lwhile_begin_0"));
        assert!(asm.contains("Lwhile_end_1:"));
    }

    #[test]
    fn test_short_circuit_and() {
        let asm = compile("int main() { int a = 1; int b = 2; return a && b; }");
        assert!(asm.contains("beqz t0, Lfalse_0"));
        assert!(asm.contains("sltu t0, zero, t0"));
        assert!(asm.contains("Lfalse_0:"));
        assert!(asm.contains("li t0, 0"));
    }

    #[test]
    fn test_short_circuit_or() {
        let asm = compile("int main() { int a = 0; int b = 2; return a || b; }");
        assert!(asm.contains("bnez t0, Ltrue_0"));
        assert!(asm.contains("Ltrue_0:"));
        assert!(asm.contains("li t0, 1"));
    }

    #[test]
    fn test_comparison_sequences() {
        let asm = compile("int main() { int a = 1; int b = 2; return a <= b; }");
        assert!(asm.contains("slt t2, t1, t0"));
        assert!(asm.contains("xori t0, t2, 1"));

        let asm = compile("int main() { int a = 1; int b = 2; return a == b; }");
        assert!(asm.contains("xor t2, t0, t1"));
        assert!(asm.contains("sltu t0, zero, t2"));
        assert!(asm.contains("xori t0, t0, 1"));
    }

    #[test]
    fn test_labels_unique_across_functions() {
        let asm = compile(
            "int f(int x) { if (x) { return 1; } return 0; }\n\
             int main() { if (f(1)) { return 1; } return 0; }",
        );
        let mut labels: Vec<&str> = asm
            .lines()
            .filter(|line| !line.starts_with(' ') && line.ends_with(':'))
            .collect();
        let total = labels.len();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), total);
    }

    #[test]
    fn test_functions_emitted_in_file_order() {
        let asm = compile(
            "int helper() { return 1; }\n\
             int main() { return helper(); }",
        );
        let helper_pos = asm.find(".globl helper").unwrap();
        let main_pos = asm.find(".globl main").unwrap();
        assert!(helper_pos < main_pos);
    }

    #[test]
    fn test_void_function_returns_without_value() {
        let asm = compile(
            "void noop() { return; }\n\
             int main() { noop(); return 0; }",
        );
        assert!(asm.contains("__func_end_noop:"));
        assert!(asm.contains("call noop"));
    }

    #[test]
    fn test_missing_annotation_is_internal_error() {
        let (unit, mut infos) = Frontend::analyze_source("int main() { int x = 1; return x; }").unwrap();
        infos[0].expr_offsets.clear();
        let err = generate_assembly(&unit, &infos).unwrap_err();
        assert!(matches!(err, CodegenError::MissingExprOffset { .. }));
    }
}
