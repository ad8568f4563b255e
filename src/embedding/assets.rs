//! Staging of the embedded indexer script into the working directory

use crate::error::ProcessError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Subdirectory holding the script and its manifest
pub const LIB_DIR: &str = "lib";
/// Subdirectory holding the vector store
pub const CHROMA_DIR: &str = "chroma";

const CHECKSUM_SUFFIX: &str = ".sha256";

/// A file shipped inside the binary
#[derive(Debug, Clone, Copy)]
pub struct Asset {
    pub name: &'static str,
    pub contents: &'static [u8],
}

pub const ASSETS: &[Asset] = &[
    Asset {
        name: "indexer.py",
        contents: include_bytes!("python/indexer.py"),
    },
    Asset {
        name: "pyproject.toml",
        contents: include_bytes!("python/pyproject.toml"),
    },
];

/// Create `wd`, `wd/lib` and `wd/chroma`, and make sure `lib` holds the
/// current script assets.
///
/// Returns `true` when the assets were (re)written.
pub fn prepare_working_directory(wd: &Path) -> Result<bool, ProcessError> {
    prepare_with_assets(wd, ASSETS)
}

pub(crate) fn prepare_with_assets(wd: &Path, assets: &[Asset]) -> Result<bool, ProcessError> {
    let lib = wd.join(LIB_DIR);
    ensure_dir(wd)?;
    ensure_dir(&lib)?;
    ensure_dir(&wd.join(CHROMA_DIR))?;

    if !assets.iter().any(|asset| requires_update(&lib, asset)) {
        tracing::debug!("Indexer assets in {:?} are up to date", lib);
        return Ok(false);
    }

    tracing::info!("Updating indexer assets in {:?}", lib);
    fs::remove_dir_all(&lib).map_err(|e| dir_error(&lib, e))?;
    ensure_dir(&lib)?;

    for asset in assets {
        let path = lib.join(asset.name);
        fs::write(&path, asset.contents).map_err(|e| dir_error(&path, e))?;

        let sidecar = lib.join(format!("{}{}", asset.name, CHECKSUM_SUFFIX));
        fs::write(&sidecar, checksum(asset.contents)).map_err(|e| dir_error(&sidecar, e))?;
    }

    Ok(true)
}

pub(crate) fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn requires_update(lib: &Path, asset: &Asset) -> bool {
    let expected = checksum(asset.contents);

    let sidecar = lib.join(format!("{}{}", asset.name, CHECKSUM_SUFFIX));
    match fs::read_to_string(&sidecar) {
        Ok(recorded) if recorded.trim() == expected => {}
        _ => return true,
    }

    match fs::read(lib.join(asset.name)) {
        Ok(contents) => checksum(&contents) != expected,
        Err(_) => true,
    }
}

fn ensure_dir(path: &Path) -> Result<(), ProcessError> {
    fs::create_dir_all(path).map_err(|e| dir_error(path, e))
}

fn dir_error(path: &Path, err: std::io::Error) -> ProcessError {
    ProcessError::WorkingDirectory {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEST_ASSETS: &[Asset] = &[
        Asset {
            name: "indexer.py",
            contents: b"print('hello')\n",
        },
        Asset {
            name: "pyproject.toml",
            contents: b"[project]\nname = \"test\"\n",
        },
    ];

    #[test]
    fn test_checksum_format() {
        assert_eq!(
            checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(checksum(b"abc").len(), 64);
    }

    #[test]
    fn test_fresh_directory_is_populated() {
        let temp_dir = TempDir::new().unwrap();
        let wd = temp_dir.path().join("work");

        assert!(prepare_with_assets(&wd, TEST_ASSETS).unwrap());

        let lib = wd.join(LIB_DIR);
        assert!(wd.join(CHROMA_DIR).is_dir());
        for asset in TEST_ASSETS {
            assert_eq!(fs::read(lib.join(asset.name)).unwrap(), asset.contents);
            assert_eq!(
                fs::read_to_string(lib.join(format!("{}.sha256", asset.name))).unwrap(),
                checksum(asset.contents)
            );
        }
    }

    #[test]
    fn test_up_to_date_directory_is_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let wd = temp_dir.path();
        prepare_with_assets(wd, TEST_ASSETS).unwrap();

        let extra = wd.join(LIB_DIR).join("uv.lock");
        fs::write(&extra, "lock").unwrap();

        assert!(!prepare_with_assets(wd, TEST_ASSETS).unwrap());
        assert!(extra.exists());
    }

    #[test]
    fn test_stale_sidecar_wipes_and_rewrites() {
        let temp_dir = TempDir::new().unwrap();
        let wd = temp_dir.path();
        prepare_with_assets(wd, TEST_ASSETS).unwrap();

        let lib = wd.join(LIB_DIR);
        fs::write(lib.join("pyproject.toml.sha256"), "0000").unwrap();
        fs::write(lib.join("stale.txt"), "old").unwrap();

        assert!(prepare_with_assets(wd, TEST_ASSETS).unwrap());
        assert!(!lib.join("stale.txt").exists());
        assert_eq!(
            fs::read_to_string(lib.join("pyproject.toml.sha256")).unwrap(),
            checksum(TEST_ASSETS[1].contents)
        );
    }

    #[test]
    fn test_missing_artifact_triggers_rewrite() {
        let temp_dir = TempDir::new().unwrap();
        let wd = temp_dir.path();
        prepare_with_assets(wd, TEST_ASSETS).unwrap();

        let script = wd.join(LIB_DIR).join("indexer.py");
        fs::remove_file(&script).unwrap();

        assert!(prepare_with_assets(wd, TEST_ASSETS).unwrap());
        assert_eq!(fs::read(&script).unwrap(), TEST_ASSETS[0].contents);
    }

    #[test]
    fn test_edited_artifact_triggers_rewrite() {
        let temp_dir = TempDir::new().unwrap();
        let wd = temp_dir.path();
        prepare_with_assets(wd, TEST_ASSETS).unwrap();

        let script = wd.join(LIB_DIR).join("indexer.py");
        fs::write(&script, "print('patched')\n").unwrap();

        assert!(prepare_with_assets(wd, TEST_ASSETS).unwrap());
        assert_eq!(fs::read(&script).unwrap(), TEST_ASSETS[0].contents);
    }

    #[test]
    fn test_working_directory_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let wd = temp_dir.path().join("occupied");
        fs::write(&wd, "not a directory").unwrap();

        let result = prepare_with_assets(&wd, TEST_ASSETS);
        assert!(matches!(
            result,
            Err(ProcessError::WorkingDirectory { .. })
        ));
    }

    #[test]
    fn test_bundled_assets_are_embedded() {
        assert_eq!(ASSETS.len(), 2);
        let script = std::str::from_utf8(ASSETS[0].contents).unwrap();
        assert!(script.contains("READY"));
        assert!(script.contains("--db-path"));
    }
}
