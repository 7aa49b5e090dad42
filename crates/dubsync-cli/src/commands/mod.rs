pub mod concat;
pub mod serve;
