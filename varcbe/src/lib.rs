//! Compiles variable component sources into a VarC table and reads it back.

pub mod build;
pub mod component;
pub mod error;
pub mod fixed;
pub mod instance;
pub mod offsets;
pub mod options;
pub mod precompile;
pub mod records;
pub mod shared;
pub mod store;
pub mod var_idx;
pub mod varc;

#[cfg(test)]
mod test_util {
    use std::path::{Path, PathBuf};

    pub(crate) fn testdata_dir() -> PathBuf {
        let dir = Path::new("../resources/testdata/varc");
        assert!(dir.is_dir());
        dir.to_path_buf()
    }
}
