use std::fs::DirBuilder;
use std::path::Path;

pub fn create_dir(path: &Path) -> std::io::Result<()> {
    DirBuilder::new().recursive(true).create(path)
}

#[cfg(test)]
mod tests {
    use crate::utils::fs::create_dir;

    #[test]
    pub fn create_dir_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b");
        create_dir(&path).unwrap();
        // existing directories are fine
        create_dir(&path).unwrap();
        assert!(path.is_dir());
    }
}
