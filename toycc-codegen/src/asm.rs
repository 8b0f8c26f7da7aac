//! RISC-V instruction model
//!
//! The emitter builds a typed instruction stream and renders it to
//! text at the end, so the peephole pass can match on structure
//! instead of strings. Only the registers and instructions the
//! lowering actually uses are modeled.

use std::fmt;

/// Registers used by the calling convention and the evaluation stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    /// Hard-wired zero
    Zero,
    /// Return address
    Ra,
    /// Stack pointer
    Sp,
    /// Frame base
    S0,
    /// Argument/return registers `a0` through `a7`
    A(u8),
    T0,
    T1,
    T2,
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reg::Zero => write!(f, "zero"),
            Reg::Ra => write!(f, "ra"),
            Reg::Sp => write!(f, "sp"),
            Reg::S0 => write!(f, "s0"),
            Reg::A(n) => write!(f, "a{}", n),
            Reg::T0 => write!(f, "t0"),
            Reg::T1 => write!(f, "t1"),
            Reg::T2 => write!(f, "t2"),
        }
    }
}

/// One assembly line: an instruction, a label, or the `.globl` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Li { rd: Reg, imm: i32 },
    Lw { rd: Reg, offset: i32, base: Reg },
    Sw { rs: Reg, offset: i32, base: Reg },
    Addi { rd: Reg, rs: Reg, imm: i32 },
    Add { rd: Reg, rs1: Reg, rs2: Reg },
    Sub { rd: Reg, rs1: Reg, rs2: Reg },
    Mul { rd: Reg, rs1: Reg, rs2: Reg },
    Div { rd: Reg, rs1: Reg, rs2: Reg },
    Rem { rd: Reg, rs1: Reg, rs2: Reg },
    Slt { rd: Reg, rs1: Reg, rs2: Reg },
    Sltu { rd: Reg, rs1: Reg, rs2: Reg },
    Xor { rd: Reg, rs1: Reg, rs2: Reg },
    Sll { rd: Reg, rs1: Reg, rs2: Reg },
    Xori { rd: Reg, rs: Reg, imm: i32 },
    Mv { rd: Reg, rs: Reg },
    Beqz { rs: Reg, target: String },
    Bnez { rs: Reg, target: String },
    J { target: String },
    Call { target: String },
    Jr { rs: Reg },
    Label(String),
    Globl(String),
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Li { rd, imm } => write!(f, "li {}, {}", rd, imm),
            Instr::Lw { rd, offset, base } => write!(f, "lw {}, {}({})", rd, offset, base),
            Instr::Sw { rs, offset, base } => write!(f, "sw {}, {}({})", rs, offset, base),
            Instr::Addi { rd, rs, imm } => write!(f, "addi {}, {}, {}", rd, rs, imm),
            Instr::Add { rd, rs1, rs2 } => write!(f, "add {}, {}, {}", rd, rs1, rs2),
            Instr::Sub { rd, rs1, rs2 } => write!(f, "sub {}, {}, {}", rd, rs1, rs2),
            Instr::Mul { rd, rs1, rs2 } => write!(f, "mul {}, {}, {}", rd, rs1, rs2),
            Instr::Div { rd, rs1, rs2 } => write!(f, "div {}, {}, {}", rd, rs1, rs2),
            Instr::Rem { rd, rs1, rs2 } => write!(f, "rem {}, {}, {}", rd, rs1, rs2),
            Instr::Slt { rd, rs1, rs2 } => write!(f, "slt {}, {}, {}", rd, rs1, rs2),
            Instr::Sltu { rd, rs1, rs2 } => write!(f, "sltu {}, {}, {}", rd, rs1, rs2),
            Instr::Xor { rd, rs1, rs2 } => write!(f, "xor {}, {}, {}", rd, rs1, rs2),
            Instr::Sll { rd, rs1, rs2 } => write!(f, "sll {}, {}, {}", rd, rs1, rs2),
            Instr::Xori { rd, rs, imm } => write!(f, "xori {}, {}, {}", rd, rs, imm),
            Instr::Mv { rd, rs } => write!(f, "mv {}, {}", rd, rs),
            Instr::Beqz { rs, target } => write!(f, "beqz {}, {}", rs, target),
            Instr::Bnez { rs, target } => write!(f, "bnez {}, {}", rs, target),
            Instr::J { target } => write!(f, "j {}", target),
            Instr::Call { target } => write!(f, "call {}", target),
            Instr::Jr { rs } => write!(f, "jr {}", rs),
            Instr::Label(name) => write!(f, "{}:", name),
            Instr::Globl(name) => write!(f, ".globl {}", name),
        }
    }
}

/// Render an instruction stream: labels and directives flush left,
/// instructions indented four spaces.
pub fn render(instrs: &[Instr]) -> String {
    let mut out = String::new();
    for instr in instrs {
        match instr {
            Instr::Label(_) | Instr::Globl(_) => {
                out.push_str(&instr.to_string());
            }
            _ => {
                out.push_str("    ");
                out.push_str(&instr.to_string());
            }
        }
        out.push('\n');
    }
    out
}

/// Compilation-wide label allocator. Labels carry a monotonically
/// increasing suffix so nested constructs and separate functions can
/// never collide.
#[derive(Debug, Default)]
pub struct LabelGenerator {
    next_id: u32,
}

impl LabelGenerator {
    pub fn new() -> Self {
        LabelGenerator { next_id: 0 }
    }

    pub fn next(&mut self, base: &str) -> String {
        let id = self.next_id;
        self.next_id += 1;
        format!("{}_{}", base, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_instruction_display() {
        assert_eq!(Instr::Li { rd: Reg::T0, imm: -5 }.to_string(), "li t0, -5");
        assert_eq!(
            Instr::Lw {
                rd: Reg::A(3),
                offset: -12,
                base: Reg::S0,
            }
            .to_string(),
            "lw a3, -12(s0)",
        );
        assert_eq!(
            Instr::Sltu {
                rd: Reg::T0,
                rs1: Reg::Zero,
                rs2: Reg::T0,
            }
            .to_string(),
            "sltu t0, zero, t0",
        );
        assert_eq!(
            Instr::Beqz {
                rs: Reg::T0,
                target: "Lelse_0".to_string(),
            }
            .to_string(),
            "beqz t0, Lelse_0",
        );
        assert_eq!(Instr::Jr { rs: Reg::Ra }.to_string(), "jr ra");
    }

    #[test]
    fn test_render_indents_instructions_only() {
        let instrs = vec![
            Instr::Globl("main".to_string()),
            Instr::Label("main".to_string()),
            Instr::Li { rd: Reg::A(0), imm: 0 },
            Instr::Jr { rs: Reg::Ra },
        ];
        assert_eq!(render(&instrs), ".globl main\nmain:\n    li a0, 0\n    jr ra\n");
    }

    #[test]
    fn test_label_generator_is_monotonic() {
        let mut labels = LabelGenerator::new();
        assert_eq!(labels.next("Lelse"), "Lelse_0");
        assert_eq!(labels.next("Lend"), "Lend_1");
        assert_eq!(labels.next("Lelse"), "Lelse_2");
    }
}
