// engine/mod.rs - 索引存储层
//! 提供索引存储接口和基于 Tantivy 的实现

pub mod core;
pub mod builder;
pub mod store;

pub use core::*;
pub use builder::*;
pub use store::*;
