// sv_files.rs — directory-backed file system for level and config files
//
// Copyright (C) 1997-2001 Id Software, Inc.
// Licensed under the GNU General Public License v2 or later.

use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use sofsim_game::game_import::FileSystem;

/// Ordered list of directories. The most recently added directory is
/// searched first, so a mod directory shadows the base data.
#[derive(Debug, Clone, Default)]
pub struct DiskFileSystem {
    search_paths: Vec<PathBuf>,
}

impl DiskFileSystem {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            search_paths: vec![basedir.into()],
        }
    }

    pub fn add_game_directory(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        debug!("added search path {}", dir.display());
        self.search_paths.insert(0, dir);
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// First existing file named `name` under the search paths.
    pub fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        check_relative(name)?;
        self.search_paths
            .iter()
            .map(|dir| dir.join(name))
            .find(|p| p.is_file())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", name)))
    }
}

/// Names are game-relative: no absolute paths, no `..`, no drive letters.
fn check_relative(name: &str) -> io::Result<()> {
    let bad = name.is_empty()
        || name.contains("..")
        || name.contains(':')
        || name.starts_with('/')
        || name.starts_with('\\')
        || Path::new(name).is_absolute();
    if bad {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to open \"{}\"", name),
        ));
    }
    Ok(())
}

impl FileSystem for DiskFileSystem {
    fn load_file(&self, path: &str) -> io::Result<Vec<u8>> {
        let full = self.resolve(path)?;
        debug!("loading {}", full.display());
        std::fs::read(full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sofsim-fs-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("maps")).unwrap();
        dir
    }

    #[test]
    fn test_load_from_base() {
        let base = scratch_dir("base");
        std::fs::write(base.join("maps/a.ent"), "{ }").unwrap();
        let fs = DiskFileSystem::new(&base);
        assert_eq!(fs.load_file("maps/a.ent").unwrap(), b"{ }");
        let err = fs.load_file("maps/missing.ent").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        let _ = std::fs::remove_dir_all(&base);
    }

    #[test]
    fn test_game_directory_shadows_base() {
        let base = scratch_dir("shadow-base");
        let game = scratch_dir("shadow-game");
        std::fs::write(base.join("maps/a.ent"), "base").unwrap();
        std::fs::write(base.join("maps/b.ent"), "only base").unwrap();
        std::fs::write(game.join("maps/a.ent"), "game").unwrap();

        let mut fs = DiskFileSystem::new(&base);
        fs.add_game_directory(&game);
        assert_eq!(fs.load_file("maps/a.ent").unwrap(), b"game");
        assert_eq!(fs.load_file("maps/b.ent").unwrap(), b"only base");
        assert_eq!(fs.search_paths().len(), 2);

        let _ = std::fs::remove_dir_all(&base);
        let _ = std::fs::remove_dir_all(&game);
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let fs = DiskFileSystem::new(std::env::temp_dir());
        for name in ["../etc/passwd", "/etc/passwd", "c:/x", ""] {
            let err = fs.load_file(name).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{}", name);
        }
    }
}
