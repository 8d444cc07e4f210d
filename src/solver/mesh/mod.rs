pub mod geometry;
pub mod structs;
pub mod structured;

#[cfg(test)]
mod tests;

pub use structs::*;
pub use structured::*;
