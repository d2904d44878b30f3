pub mod depthwise_conv;
pub mod depthwise_frame;
