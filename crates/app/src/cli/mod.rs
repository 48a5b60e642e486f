pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Download, Grant, Grants, Info, Init, Ls, Revoke, Upload, Version};
