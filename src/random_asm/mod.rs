pub mod asm_maker;
pub mod catalog;
pub mod inst_generator;
pub mod labels;
pub mod sampler;
