//! The bootstrap filesystem image.
//!
//! [`default_image`] builds the tree every fresh system starts from:
//! binary directories, the guest home, the environment file seeding
//! `PATH`, and the package sources file (kept as data; package
//! installation itself is not part of this crate).

use crate::programs;
use crate::vfs::{PathError, Vfs};

pub const HOME_PATH: &str = "/home/guest";
pub const SYS_PROGRAMS_PATH: &str = "/sys/bin";
pub const USR_PROGRAMS_PATH: &str = "/usr/bin";
pub const ENV_PATH: &str = "/sys/etc/env";
pub const SOURCES_PATH: &str = "/sys/etc/apt/sources";

const DEFAULT_ENV: &str = "PATH=/sys/bin;/usr/bin\n";
const DEFAULT_SOURCES: &str = "/public/repository\n";

/// The default boot image: system directories plus every built-in
/// program installed under `/sys/bin`.
pub fn default_image() -> Result<Vfs, PathError> {
    let mut vfs = Vfs::new();
    vfs.make_directory(SYS_PROGRAMS_PATH)?;
    vfs.make_directory(USR_PROGRAMS_PATH)?;
    vfs.make_directory(HOME_PATH)?;
    vfs.make_file(ENV_PATH, DEFAULT_ENV)?;
    vfs.make_file(SOURCES_PATH, DEFAULT_SOURCES)?;

    for (name, program) in programs::builtins() {
        vfs.make_sys_file(&format!("{SYS_PROGRAMS_PATH}/{name}"), program)?;
    }
    Ok(vfs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_image_layout() {
        let vfs = default_image().unwrap();
        assert!(vfs.find_directory(SYS_PROGRAMS_PATH).is_ok());
        assert!(vfs.find_directory(USR_PROGRAMS_PATH).is_ok());
        assert!(vfs.find_directory(HOME_PATH).is_ok());

        let env = vfs.find(ENV_PATH).unwrap().unwrap();
        assert_eq!(vfs.read_file(env), Some(DEFAULT_ENV));
        let sources = vfs.find(SOURCES_PATH).unwrap().unwrap();
        assert_eq!(vfs.read_file(sources), Some(DEFAULT_SOURCES));
    }

    #[test]
    fn test_builtins_are_installed_as_executables() {
        let vfs = default_image().unwrap();
        for name in ["echo", "printf", "grep", "cat", "mkdir", "ls", "env", "cd", "rm", "cp"] {
            let id = vfs
                .find(&format!("{SYS_PROGRAMS_PATH}/{name}"))
                .unwrap()
                .unwrap_or_else(|| panic!("{name} missing"));
            assert!(vfs.program(id).is_some(), "{name} is not executable");
        }
    }
}
