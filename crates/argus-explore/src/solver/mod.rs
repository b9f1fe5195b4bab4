pub mod random;
pub mod rng;

/// The ordered argument strings for one invocation of the subject.
pub type ArgVector = Vec<String>;
