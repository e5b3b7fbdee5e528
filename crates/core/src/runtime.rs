//! ONNX Runtime shared library discovery for the `load-dynamic` build of `ort`.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use tracing::{info, warn};

const ORT_DYLIB_ENV: &str = "ORT_DYLIB_PATH";

#[cfg(unix)]
const ORT_LIB_NAME: &str = "libonnxruntime.so";
#[cfg(windows)]
const ORT_LIB_NAME: &str = "onnxruntime.dll";

/// How the ONNX Runtime library path was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrtDylib {
    /// `ORT_DYLIB_PATH` was already set by the user.
    Preset(PathBuf),
    /// Found in one of the candidate directories.
    Discovered(PathBuf),
    /// Nothing found; `ort` falls back to its default search.
    Missing,
}

/// Probed in order:
///   1. `<exe_dir>/` (Windows only)
///   2. `<exe_dir>/lib/`
///   3. `<exe_dir>/../lib/`
///   4. `<cwd>/lib/`
///   5. `/usr/local/lib/`, `/usr/lib/` (Unix only)
fn candidate_lib_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(exe) = env::current_exe().and_then(|p| p.canonicalize()) {
        if let Some(exe_dir) = exe.parent() {
            #[cfg(windows)]
            {
                dirs.push(exe_dir.to_path_buf());
            }
            dirs.push(exe_dir.join("lib"));
            if let Some(parent) = exe_dir.parent() {
                dirs.push(parent.join("lib"));
            }
        }
    }
    if let Ok(cwd) = env::current_dir() {
        let cwd_lib = cwd.join("lib");
        if !dirs.contains(&cwd_lib) {
            dirs.push(cwd_lib);
        }
    }
    #[cfg(unix)]
    {
        dirs.push(PathBuf::from("/usr/local/lib"));
        dirs.push(PathBuf::from("/usr/lib"));
    }
    dirs
}

fn find_ort_dylib_in_dirs(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(ORT_LIB_NAME))
        .find(|candidate| candidate.is_file())
}

fn resolve_ort_dylib(preset: Option<OsString>, dirs: &[PathBuf]) -> OrtDylib {
    match preset.filter(|value| !value.is_empty()) {
        Some(path) => OrtDylib::Preset(PathBuf::from(path)),
        None => find_ort_dylib_in_dirs(dirs).map_or(OrtDylib::Missing, OrtDylib::Discovered),
    }
}

/// Fill in `ORT_DYLIB_PATH` when unset. Call before any session is built.
pub fn setup_runtime_libs() -> OrtDylib {
    let resolved = resolve_ort_dylib(env::var_os(ORT_DYLIB_ENV), &candidate_lib_dirs());
    if let OrtDylib::Discovered(path) = &resolved {
        env::set_var(ORT_DYLIB_ENV, path);
    }
    resolved
}

/// Log the outcome of [`setup_runtime_libs`]. Call after tracing is initialized.
pub fn log_runtime_lib_status(status: &OrtDylib) {
    match status {
        OrtDylib::Preset(path) | OrtDylib::Discovered(path) if !path.is_file() => {
            warn!("{ORT_DYLIB_ENV} set to {} but file not found", path.display());
        }
        OrtDylib::Preset(path) => info!("ORT library (from {ORT_DYLIB_ENV}): {}", path.display()),
        OrtDylib::Discovered(path) => info!("ORT library: {}", path.display()),
        OrtDylib::Missing => {
            warn!("{ORT_DYLIB_ENV} not set, ORT will try default search paths")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn candidate_lib_dirs_contains_system_paths() {
        let dirs = candidate_lib_dirs();
        assert!(dirs.contains(&PathBuf::from("/usr/local/lib")));
        assert!(dirs.contains(&PathBuf::from("/usr/lib")));
    }

    #[test]
    fn candidate_lib_dirs_includes_cwd_lib() {
        let dirs = candidate_lib_dirs();
        if let Ok(cwd) = env::current_dir() {
            assert!(dirs.contains(&cwd.join("lib")));
        }
    }

    #[test]
    fn preset_path_wins_over_discovery() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        std::fs::write(temp.path().join(ORT_LIB_NAME), b"lib").expect("fake lib");

        let resolved = resolve_ort_dylib(
            Some(OsString::from("/opt/ort/custom.so")),
            &[temp.path().to_path_buf()],
        );
        assert_eq!(resolved, OrtDylib::Preset(PathBuf::from("/opt/ort/custom.so")));
    }

    #[test]
    fn discovery_prefers_first_matching_dir() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let empty = temp.path().join("empty");
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        for dir in [&empty, &first, &second] {
            std::fs::create_dir_all(dir).expect("dir should be created");
        }
        std::fs::write(first.join(ORT_LIB_NAME), b"first").expect("first lib");
        std::fs::write(second.join(ORT_LIB_NAME), b"second").expect("second lib");

        let resolved = resolve_ort_dylib(Some(OsString::new()), &[empty, first.clone(), second]);
        assert_eq!(resolved, OrtDylib::Discovered(first.join(ORT_LIB_NAME)));
    }

    #[test]
    fn missing_when_no_dir_has_the_library() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        assert_eq!(
            resolve_ort_dylib(None, &[temp.path().to_path_buf()]),
            OrtDylib::Missing
        );
    }
}
