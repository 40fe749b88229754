//! PMD 模型加载和运行时管理

mod loader;
mod runtime;

pub use loader::{read_bone_table, read_ik_table, PmdFile};
pub use runtime::MmdModel;

#[cfg(test)]
pub(crate) use loader::test_data as pmd_test_data;
