//! Peephole cleanup of the instruction stream
//!
//! A stack-pointer decrement immediately followed by an equal
//! increment is a push/pop pair whose value is never used; both
//! instructions are dropped. Removing one pair can make another pair
//! adjacent, so the scan repeats until nothing changes.

use crate::asm::{Instr, Reg};

fn cancelling_pair(first: &Instr, second: &Instr) -> bool {
    match (first, second) {
        (
            Instr::Addi {
                rd: Reg::Sp,
                rs: Reg::Sp,
                imm: down,
            },
            Instr::Addi {
                rd: Reg::Sp,
                rs: Reg::Sp,
                imm: up,
            },
        ) => *down < 0 && *up == -*down,
        _ => false,
    }
}

pub(crate) fn run(instrs: Vec<Instr>) -> Vec<Instr> {
    let mut instrs = instrs;
    loop {
        let mut out = Vec::with_capacity(instrs.len());
        let mut changed = false;
        let mut iter = instrs.into_iter().peekable();
        while let Some(instr) = iter.next() {
            if let Some(next) = iter.peek() {
                if cancelling_pair(&instr, next) {
                    iter.next();
                    changed = true;
                    continue;
                }
            }
            out.push(instr);
        }
        if !changed {
            return out;
        }
        instrs = out;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addi_sp(imm: i32) -> Instr {
        Instr::Addi {
            rd: Reg::Sp,
            rs: Reg::Sp,
            imm,
        }
    }

    #[test]
    fn test_adjacent_pair_removed() {
        let instrs = vec![
            Instr::Li { rd: Reg::T0, imm: 1 },
            addi_sp(-4),
            addi_sp(4),
            Instr::Jr { rs: Reg::Ra },
        ];
        assert_eq!(
            run(instrs),
            vec![Instr::Li { rd: Reg::T0, imm: 1 }, Instr::Jr { rs: Reg::Ra }],
        );
    }

    #[test]
    fn test_mismatched_magnitudes_kept() {
        let instrs = vec![addi_sp(-8), addi_sp(4)];
        assert_eq!(run(instrs.clone()), instrs);
    }

    #[test]
    fn test_increment_before_decrement_kept() {
        // only push-then-pop cancels; the reverse order reorders live data
        let instrs = vec![addi_sp(4), addi_sp(-4)];
        assert_eq!(run(instrs.clone()), instrs);
    }

    #[test]
    fn test_removal_cascades_to_fixpoint() {
        let instrs = vec![addi_sp(-4), addi_sp(-8), addi_sp(8), addi_sp(4)];
        assert_eq!(run(instrs), Vec::new());
    }

    #[test]
    fn test_frame_addis_with_other_registers_kept() {
        let instrs = vec![
            Instr::Addi {
                rd: Reg::S0,
                rs: Reg::Sp,
                imm: 16,
            },
            addi_sp(-16),
        ];
        assert_eq!(run(instrs.clone()), instrs);
    }
}
