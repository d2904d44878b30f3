//! Test helpers shared by the convolution crates: tolerant array comparison and numerical gradient checking.
pub mod relatively_close;
