//! Stack frame layout
//!
//! Every local (parameters included) occupies one 4-byte slot below
//! the frame base `s0`. The top of the frame reserves 12 bytes for the
//! saved return address, the saved frame base, and padding; the whole
//! frame is rounded up to the 16-byte stack alignment the calling
//! convention requires.

use toycc_common::types::{FRAME_RESERVED, WORD_SIZE};
use toycc_common::FunctionInfo;

fn align16(bytes: i32) -> i32 {
    (bytes + 15) / 16 * 16
}

/// Total frame size in bytes for a function
pub fn frame_size(info: &FunctionInfo) -> i32 {
    align16(FRAME_RESERVED + WORD_SIZE * info.total_slots() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with_slots(params: usize, locals: usize) -> FunctionInfo {
        FunctionInfo {
            name: "f".to_string(),
            params: (0..params).map(|i| format!("p{}", i)).collect(),
            num_locals: locals,
            ..FunctionInfo::default()
        }
    }

    #[test]
    fn test_frame_size_rounds_to_sixteen() {
        // 12 reserved bytes alone round up to one alignment unit
        assert_eq!(frame_size(&info_with_slots(0, 0)), 16);
        // 12 + 4 = 16 exactly
        assert_eq!(frame_size(&info_with_slots(0, 1)), 16);
        // 12 + 8 = 20 -> 32
        assert_eq!(frame_size(&info_with_slots(1, 1)), 32);
        // 12 + 20 = 32 exactly
        assert_eq!(frame_size(&info_with_slots(2, 3)), 32);
        assert_eq!(frame_size(&info_with_slots(8, 2)), 64);
    }
}
