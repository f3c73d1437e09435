//! Passes that ship with the framework, enough to build the first lessons.
mod accumulation;
mod constant_color;
mod copy_to_output;

pub use accumulation::SimpleAccumulationPass;
pub use constant_color::ConstantColorPass;
pub use copy_to_output::CopyToOutputPass;
