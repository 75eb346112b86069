pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Add, Cat, Dag, GetJson, Init, Pinned, Resolve, Rm};
