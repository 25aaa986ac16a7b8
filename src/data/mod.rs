pub mod seed;
pub mod synth;
