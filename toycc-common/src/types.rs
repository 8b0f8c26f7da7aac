//! Shared compiler data types
//!
//! This module defines the types that cross phase boundaries: the node
//! identity used to key annotation maps, the (tiny) type system, and the
//! per-function symbol table produced by semantic analysis and consumed
//! read-only by code generation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Unique identifier for AST nodes.
///
/// Annotation maps are keyed by `NodeId` rather than by node address, so
/// optimizer rewrites that preserve a node's id keep its annotations
/// valid without any re-resolution.
pub type NodeId = u32;

/// Types in the toy C subset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Int,
    Void,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Void => write!(f, "void"),
        }
    }
}

impl Default for Type {
    fn default() -> Self {
        Type::Int
    }
}

/// Bytes reserved at the top of every frame for the saved `ra` and `s0`
/// registers (8 bytes) plus one spare word, matching the frame layout the
/// code generator emits. Storage slot `k` lives at `-FRAME_RESERVED - 4k`
/// relative to `s0`.
pub const FRAME_RESERVED: i32 = 12;

/// Size in bytes of one storage slot (machine word)
pub const WORD_SIZE: i32 = 4;

/// Frame displacement of storage slot `k` (0-indexed, parameters first)
pub fn slot_offset(slot: usize) -> i32 {
    -FRAME_RESERVED - WORD_SIZE * slot as i32
}

/// Per-function symbol table produced by semantic analysis
///
/// Holds everything the later phases need to know about one function:
/// its signature, its position in the file (calls may only target
/// functions at or before the caller's position), the frame population,
/// and the annotation maps that record resolved storage offsets against
/// AST node identities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub return_type: Type,
    /// Parameter names in declaration order
    pub params: Vec<String>,
    /// Position of the definition in the translation unit
    pub index_in_file: usize,
    /// Number of local variables, not counting parameters
    pub num_locals: usize,
    /// Variable name -> frame offset, declarations only (frame sizing)
    pub var_offsets: HashMap<String, i32>,
    /// Identifier expression node -> resolved frame offset
    pub expr_offsets: HashMap<NodeId, i32>,
    /// Declare/assign statement node -> target frame offset
    pub stmt_offsets: HashMap<NodeId, i32>,
}

impl FunctionInfo {
    /// Total storage slots in this function's frame
    pub fn total_slots(&self) -> usize {
        self.params.len() + self.num_locals
    }
}
