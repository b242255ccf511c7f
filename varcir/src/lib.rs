//! Intermediate representation of variable component sources

pub mod coords;
pub mod error;
pub mod ir;
pub mod source;
pub mod types;
pub mod variations;

#[cfg(test)]
mod test_util {
    use std::path::{Path, PathBuf};

    pub(crate) fn testdata_dir() -> PathBuf {
        let dir = Path::new("../resources/testdata/varc");
        assert!(dir.is_dir());
        dir.to_path_buf()
    }
}
