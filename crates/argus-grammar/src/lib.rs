pub mod compile;
pub mod grammar;
pub mod parameter;
pub mod validate;
pub mod value;

pub use compile::{compile, BasicTest, CompiledBounds};
pub use grammar::{MatchPolicy, ParameterGrammar};
pub use parameter::Parameter;
