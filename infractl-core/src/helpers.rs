use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use log::debug;

pub fn get_nanos_since_unix_epoch() -> u128 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos()
}

/// Returns a path in the system temp directory that's unique for the current instant,
/// e.g. `/tmp/infractl-1697451234123456789.yaml`.
pub fn unique_temp_path(prefix: &str, extension: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "{prefix}-{}.{extension}",
        get_nanos_since_unix_epoch()
    ))
}

/// A file that only lives as long as this guard does.
///
/// The contents are written with owner-only permissions, the file is removed on drop.
#[derive(Debug)]
pub struct ScopedFile {
    path: PathBuf,
}

impl ScopedFile {
    pub fn create(path: PathBuf, contents: &[u8]) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&path)?;
        let guard = Self { path };

        file.write_all(contents)?;
        file.flush()?;

        Ok(guard)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedFile {
    fn drop(&mut self) {
        if let Err(error) = fs::remove_file(&self.path) {
            debug!("Couldn't remove {:?}: {error}", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{unique_temp_path, ScopedFile};

    #[test]
    fn scoped_file_is_removed_on_drop() {
        let path = unique_temp_path("infractl-test", "yaml");

        {
            let file = ScopedFile::create(path.clone(), b"kind: Namespace").unwrap();
            assert_eq!(fs::read_to_string(file.path()).unwrap(), "kind: Namespace");
        }

        assert!(!path.exists());
    }

    #[test]
    fn unique_temp_paths_carry_prefix_and_extension() {
        let path = unique_temp_path("infractl", "yaml");
        let file_name = path.file_name().unwrap().to_str().unwrap();

        assert!(file_name.starts_with("infractl-"));
        assert!(file_name.ends_with(".yaml"));
    }
}
