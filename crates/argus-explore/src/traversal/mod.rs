pub mod engine;
pub mod replay;
pub mod score;
pub mod strategy;
pub mod trace;
pub mod tree;
