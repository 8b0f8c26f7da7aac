//! Function lowering
//!
//! Expressions are evaluated with an explicit runtime stack: each
//! sub-expression leaves its value pushed on `sp`, and a binary
//! operator evaluates its left operand to the stack, its right operand
//! into `t1`, then pops the left into `t0`. Keeping the left value in
//! memory rather than a register is what makes it survive a call in
//! the right operand without a register allocator.
//!
//! `gen_expr_to_reg` shortcuts the common leaves (literal, variable,
//! call) directly into the destination register; anything else goes
//! through the stack and gets moved.

use crate::asm::{Instr, LabelGenerator, Reg};
use crate::frame;
use crate::CodegenError;
use toycc_common::types::WORD_SIZE;
use toycc_common::FunctionInfo;
use toycc_frontend::ast::{
    BinaryOp, Expression, ExpressionKind, Function, Statement, StatementKind, UnaryOp,
};

/// Lowers one function to an instruction stream
pub(crate) struct FunctionEmitter<'a> {
    info: &'a FunctionInfo,
    labels: &'a mut LabelGenerator,
    instrs: Vec<Instr>,
    /// (begin, end) label pair per enclosing loop
    loop_labels: Vec<(String, String)>,
    /// Bytes pushed below the frame since the prologue; keeps call
    /// sites 16-byte aligned mid-expression
    sp_depth: i32,
}

impl<'a> FunctionEmitter<'a> {
    pub(crate) fn new(info: &'a FunctionInfo, labels: &'a mut LabelGenerator) -> Self {
        FunctionEmitter {
            info,
            labels,
            instrs: Vec::new(),
            loop_labels: Vec::new(),
            sp_depth: 0,
        }
    }

    pub(crate) fn emit_function(mut self, function: &Function) -> Result<Vec<Instr>, CodegenError> {
        let frame_size = frame::frame_size(self.info);

        self.push_instr(Instr::Globl(self.info.name.clone()));
        self.push_instr(Instr::Label(self.info.name.clone()));

        // prologue: allocate the frame, save ra and s0 into the top
        // two reserved slots, establish the frame base
        self.push_instr(Instr::Addi {
            rd: Reg::Sp,
            rs: Reg::Sp,
            imm: -frame_size,
        });
        self.push_instr(Instr::Sw {
            rs: Reg::Ra,
            offset: frame_size - 4,
            base: Reg::Sp,
        });
        self.push_instr(Instr::Sw {
            rs: Reg::S0,
            offset: frame_size - 8,
            base: Reg::Sp,
        });
        self.push_instr(Instr::Addi {
            rd: Reg::S0,
            rs: Reg::Sp,
            imm: frame_size,
        });

        self.emit_param_stores()?;
        self.gen_stmt(&function.body)?;

        // epilogue, reached by every return through one label
        self.push_instr(Instr::Label(epilogue_label(&self.info.name)));
        self.push_instr(Instr::Lw {
            rd: Reg::Ra,
            offset: frame_size - 4,
            base: Reg::Sp,
        });
        self.push_instr(Instr::Lw {
            rd: Reg::S0,
            offset: frame_size - 8,
            base: Reg::Sp,
        });
        self.push_instr(Instr::Addi {
            rd: Reg::Sp,
            rs: Reg::Sp,
            imm: frame_size,
        });
        self.push_instr(Instr::Jr { rs: Reg::Ra });

        Ok(self.instrs)
    }

    /// First 8 parameters arrive in `a0..a7`; the rest were pushed by
    /// the caller and sit at `4i(s0)`. All are copied into their slots.
    fn emit_param_stores(&mut self) -> Result<(), CodegenError> {
        for (index, param) in self.info.params.iter().enumerate() {
            let offset = self.var_offset(param)?;
            if index < 8 {
                self.push_instr(Instr::Sw {
                    rs: Reg::A(index as u8),
                    offset,
                    base: Reg::S0,
                });
            } else {
                self.push_instr(Instr::Lw {
                    rd: Reg::T0,
                    offset: index as i32 * WORD_SIZE,
                    base: Reg::S0,
                });
                self.push_instr(Instr::Sw {
                    rs: Reg::T0,
                    offset,
                    base: Reg::S0,
                });
            }
        }
        Ok(())
    }

    fn push_instr(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    fn var_offset(&self, name: &str) -> Result<i32, CodegenError> {
        self.info
            .var_offsets
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::MissingVariableOffset {
                name: name.to_string(),
            })
    }

    fn expr_offset(&self, expr: &Expression) -> Result<i32, CodegenError> {
        self.info
            .expr_offsets
            .get(&expr.node_id)
            .copied()
            .ok_or(CodegenError::MissingExprOffset {
                node_id: expr.node_id,
            })
    }

    fn stmt_offset(&self, stmt: &Statement) -> Result<i32, CodegenError> {
        self.info
            .stmt_offsets
            .get(&stmt.node_id)
            .copied()
            .ok_or(CodegenError::MissingStmtOffset {
                node_id: stmt.node_id,
            })
    }

    /// Push `t0` onto the runtime stack
    fn push_t0(&mut self) {
        self.push_instr(Instr::Addi {
            rd: Reg::Sp,
            rs: Reg::Sp,
            imm: -WORD_SIZE,
        });
        self.push_instr(Instr::Sw {
            rs: Reg::T0,
            offset: 0,
            base: Reg::Sp,
        });
        self.sp_depth += WORD_SIZE;
    }

    /// Pop the runtime stack into `t0`
    fn pop_t0(&mut self) {
        self.push_instr(Instr::Lw {
            rd: Reg::T0,
            offset: 0,
            base: Reg::Sp,
        });
        self.push_instr(Instr::Addi {
            rd: Reg::Sp,
            rs: Reg::Sp,
            imm: WORD_SIZE,
        });
        self.sp_depth -= WORD_SIZE;
    }

    fn gen_stmt(&mut self, stmt: &Statement) -> Result<(), CodegenError> {
        match &stmt.kind {
            StatementKind::Block(stmts) => {
                for sub in stmts {
                    self.gen_stmt(sub)?;
                }
                Ok(())
            }
            StatementKind::Empty => Ok(()),
            StatementKind::Expression(expr) => self.gen_expr_to_reg(expr, Reg::T0),
            StatementKind::Declare { init, .. } => {
                self.gen_expr_to_reg(init, Reg::T0)?;
                let offset = self.stmt_offset(stmt)?;
                self.push_instr(Instr::Sw {
                    rs: Reg::T0,
                    offset,
                    base: Reg::S0,
                });
                Ok(())
            }
            StatementKind::Assign { value, .. } => {
                self.gen_expr_to_reg(value, Reg::T0)?;
                let offset = self.stmt_offset(stmt)?;
                self.push_instr(Instr::Sw {
                    rs: Reg::T0,
                    offset,
                    base: Reg::S0,
                });
                Ok(())
            }
            StatementKind::If {
                condition,
                then_stmt,
                else_stmt,
            } => {
                let else_label = self.labels.next("Lelse");
                let end_label = self.labels.next("Lend");
                self.gen_expr_to_reg(condition, Reg::T0)?;
                self.push_instr(Instr::Beqz {
                    rs: Reg::T0,
                    target: else_label.clone(),
                });
                self.gen_stmt(then_stmt)?;
                self.push_instr(Instr::J {
                    target: end_label.clone(),
                });
                self.push_instr(Instr::Label(else_label));
                if let Some(else_stmt) = else_stmt {
                    self.gen_stmt(else_stmt)?;
                }
                self.push_instr(Instr::Label(end_label));
                Ok(())
            }
            StatementKind::While { condition, body } => {
                let begin_label = self.labels.next("Lwhile_begin");
                let end_label = self.labels.next("Lwhile_end");
                self.push_instr(Instr::Label(begin_label.clone()));
                self.gen_expr_to_reg(condition, Reg::T0)?;
                self.push_instr(Instr::Beqz {
                    rs: Reg::T0,
                    target: end_label.clone(),
                });
                self.loop_labels
                    .push((begin_label.clone(), end_label.clone()));
                self.gen_stmt(body)?;
                self.loop_labels.pop();
                self.push_instr(Instr::J {
                    target: begin_label,
                });
                self.push_instr(Instr::Label(end_label));
                Ok(())
            }
            StatementKind::Break => {
                let (_, end_label) = self
                    .loop_labels
                    .last()
                    .ok_or(CodegenError::MissingLoopContext)?;
                let target = end_label.clone();
                self.push_instr(Instr::J { target });
                Ok(())
            }
            StatementKind::Continue => {
                let (begin_label, _) = self
                    .loop_labels
                    .last()
                    .ok_or(CodegenError::MissingLoopContext)?;
                let target = begin_label.clone();
                self.push_instr(Instr::J { target });
                Ok(())
            }
            StatementKind::Return(value) => {
                if let Some(expr) = value {
                    self.gen_expr_to_reg(expr, Reg::A(0))?;
                }
                self.push_instr(Instr::J {
                    target: epilogue_label(&self.info.name),
                });
                Ok(())
            }
        }
    }

    /// Evaluate `expr` and leave its value pushed on the runtime stack
    fn gen_expr_stack(&mut self, expr: &Expression) -> Result<(), CodegenError> {
        match &expr.kind {
            ExpressionKind::IntLiteral(value) => {
                self.push_instr(Instr::Li {
                    rd: Reg::T0,
                    imm: *value,
                });
                self.push_t0();
                Ok(())
            }
            ExpressionKind::Identifier(_) => {
                let offset = self.expr_offset(expr)?;
                self.push_instr(Instr::Lw {
                    rd: Reg::T0,
                    offset,
                    base: Reg::S0,
                });
                self.push_t0();
                Ok(())
            }
            ExpressionKind::Unary { op, operand } => {
                self.gen_expr_to_reg(operand, Reg::T0)?;
                match op {
                    UnaryOp::Plus => {}
                    UnaryOp::Minus => self.push_instr(Instr::Sub {
                        rd: Reg::T0,
                        rs1: Reg::Zero,
                        rs2: Reg::T0,
                    }),
                    UnaryOp::LogicalNot => {
                        self.push_instr(Instr::Sltu {
                            rd: Reg::T0,
                            rs1: Reg::Zero,
                            rs2: Reg::T0,
                        });
                        self.push_instr(Instr::Xori {
                            rd: Reg::T0,
                            rs: Reg::T0,
                            imm: 1,
                        });
                    }
                }
                self.push_t0();
                Ok(())
            }
            ExpressionKind::Binary {
                op: BinaryOp::LogicalAnd,
                left,
                right,
            } => {
                let false_label = self.labels.next("Lfalse");
                let end_label = self.labels.next("Lend");
                self.gen_expr_stack(left)?;
                self.pop_t0();
                self.push_instr(Instr::Beqz {
                    rs: Reg::T0,
                    target: false_label.clone(),
                });
                self.gen_expr_stack(right)?;
                self.pop_t0();
                // normalize the right value to 0/1
                self.push_instr(Instr::Sltu {
                    rd: Reg::T0,
                    rs1: Reg::Zero,
                    rs2: Reg::T0,
                });
                self.push_instr(Instr::J {
                    target: end_label.clone(),
                });
                self.push_instr(Instr::Label(false_label));
                self.push_instr(Instr::Li { rd: Reg::T0, imm: 0 });
                self.push_instr(Instr::Label(end_label));
                self.push_t0();
                Ok(())
            }
            ExpressionKind::Binary {
                op: BinaryOp::LogicalOr,
                left,
                right,
            } => {
                let true_label = self.labels.next("Ltrue");
                let end_label = self.labels.next("Lend");
                self.gen_expr_stack(left)?;
                self.pop_t0();
                self.push_instr(Instr::Bnez {
                    rs: Reg::T0,
                    target: true_label.clone(),
                });
                self.gen_expr_stack(right)?;
                self.pop_t0();
                self.push_instr(Instr::Sltu {
                    rd: Reg::T0,
                    rs1: Reg::Zero,
                    rs2: Reg::T0,
                });
                self.push_instr(Instr::J {
                    target: end_label.clone(),
                });
                self.push_instr(Instr::Label(true_label));
                self.push_instr(Instr::Li { rd: Reg::T0, imm: 1 });
                self.push_instr(Instr::Label(end_label));
                self.push_t0();
                Ok(())
            }
            ExpressionKind::Binary { op, left, right } => {
                // left survives on the stack across whatever the right
                // operand does, including calls
                self.gen_expr_stack(left)?;
                self.gen_expr_to_reg(right, Reg::T1)?;
                self.pop_t0();
                self.emit_binary_op(*op);
                self.push_t0();
                Ok(())
            }
            ExpressionKind::Call { callee, arguments } => {
                self.emit_call(callee, arguments, true)
            }
        }
    }

    /// Lowering for a binary operator with the left operand in `t0`
    /// and the right in `t1`; the result lands in `t0`.
    fn emit_binary_op(&mut self, op: BinaryOp) {
        let (t0, t1, t2, zero) = (Reg::T0, Reg::T1, Reg::T2, Reg::Zero);
        match op {
            BinaryOp::Add => self.push_instr(Instr::Add { rd: t0, rs1: t0, rs2: t1 }),
            BinaryOp::Sub => self.push_instr(Instr::Sub { rd: t0, rs1: t0, rs2: t1 }),
            BinaryOp::Mul => self.push_instr(Instr::Mul { rd: t0, rs1: t0, rs2: t1 }),
            BinaryOp::Div => self.push_instr(Instr::Div { rd: t0, rs1: t0, rs2: t1 }),
            BinaryOp::Mod => self.push_instr(Instr::Rem { rd: t0, rs1: t0, rs2: t1 }),
            BinaryOp::LeftShift => self.push_instr(Instr::Sll { rd: t0, rs1: t0, rs2: t1 }),
            BinaryOp::Less => self.push_instr(Instr::Slt { rd: t0, rs1: t0, rs2: t1 }),
            BinaryOp::Greater => self.push_instr(Instr::Slt { rd: t0, rs1: t1, rs2: t0 }),
            BinaryOp::LessEqual => {
                self.push_instr(Instr::Slt { rd: t2, rs1: t1, rs2: t0 });
                self.push_instr(Instr::Xori { rd: t0, rs: t2, imm: 1 });
            }
            BinaryOp::GreaterEqual => {
                self.push_instr(Instr::Slt { rd: t2, rs1: t0, rs2: t1 });
                self.push_instr(Instr::Xori { rd: t0, rs: t2, imm: 1 });
            }
            BinaryOp::Equal => {
                self.push_instr(Instr::Xor { rd: t2, rs1: t0, rs2: t1 });
                self.push_instr(Instr::Sltu { rd: t0, rs1: zero, rs2: t2 });
                self.push_instr(Instr::Xori { rd: t0, rs: t0, imm: 1 });
            }
            BinaryOp::NotEqual => {
                self.push_instr(Instr::Xor { rd: t2, rs1: t0, rs2: t1 });
                self.push_instr(Instr::Sltu { rd: t0, rs1: zero, rs2: t2 });
            }
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                unreachable!("short-circuit operators are lowered with branches")
            }
        }
    }

    /// Evaluate `expr` directly into `reg` where a shortcut exists,
    /// falling back to the stack evaluator.
    fn gen_expr_to_reg(&mut self, expr: &Expression, reg: Reg) -> Result<(), CodegenError> {
        match &expr.kind {
            ExpressionKind::IntLiteral(value) => {
                self.push_instr(Instr::Li {
                    rd: reg,
                    imm: *value,
                });
                Ok(())
            }
            ExpressionKind::Identifier(_) => {
                let offset = self.expr_offset(expr)?;
                self.push_instr(Instr::Lw {
                    rd: reg,
                    offset,
                    base: Reg::S0,
                });
                Ok(())
            }
            ExpressionKind::Call { callee, arguments } => {
                self.emit_call(callee, arguments, false)?;
                if reg != Reg::A(0) {
                    self.push_instr(Instr::Mv {
                        rd: reg,
                        rs: Reg::A(0),
                    });
                }
                Ok(())
            }
            _ => {
                self.gen_expr_stack(expr)?;
                self.pop_t0();
                if reg != Reg::T0 {
                    self.push_instr(Instr::Mv { rd: reg, rs: Reg::T0 });
                }
                Ok(())
            }
        }
    }

    /// Lower a call: pad the stack to keep the call site 16-byte
    /// aligned, evaluate and push arguments right-to-left (so argument
    /// `i` ends up at `4i(sp)`), load the first 8 into `a0..a7`, call,
    /// then deallocate the argument area. When the result is needed it
    /// is pushed onto the evaluation stack.
    fn emit_call(
        &mut self,
        callee: &str,
        arguments: &[Expression],
        push_return: bool,
    ) -> Result<(), CodegenError> {
        let args_bytes = arguments.len() as i32 * WORD_SIZE;
        let pad = (16 - (self.sp_depth + args_bytes) % 16) % 16;
        if pad > 0 {
            self.push_instr(Instr::Addi {
                rd: Reg::Sp,
                rs: Reg::Sp,
                imm: -pad,
            });
            self.sp_depth += pad;
        }

        for arg in arguments.iter().rev() {
            self.gen_expr_stack(arg)?;
        }
        for index in 0..arguments.len().min(8) {
            self.push_instr(Instr::Lw {
                rd: Reg::A(index as u8),
                offset: index as i32 * WORD_SIZE,
                base: Reg::Sp,
            });
        }
        self.push_instr(Instr::Call {
            target: callee.to_string(),
        });

        let outgoing = args_bytes + pad;
        if outgoing > 0 {
            self.push_instr(Instr::Addi {
                rd: Reg::Sp,
                rs: Reg::Sp,
                imm: outgoing,
            });
            self.sp_depth -= outgoing;
        }

        if push_return {
            self.push_instr(Instr::Mv {
                rd: Reg::T0,
                rs: Reg::A(0),
            });
            self.push_t0();
        }
        Ok(())
    }
}

fn epilogue_label(name: &str) -> String {
    format!("__func_end_{}", name)
}
