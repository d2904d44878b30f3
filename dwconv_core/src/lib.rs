//! Shapes, errors and buffer helpers shared by the depthwise convolution passes.

pub mod errors;
pub mod exec;
pub mod shape;
pub mod tensor;
