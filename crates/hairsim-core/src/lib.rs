//! # HairSim Core
//!
//! 植发模拟系统的核心模块，提供基础数据结构、错误定义和通用工具。

pub mod error;
pub mod models;
pub mod procedures;
pub mod utils;

pub use error::{HairSimError, Result};
pub use models::*;
pub use procedures::{find_procedure, Procedure, HAIR_TRANSPLANT_ID, PROCEDURES};
