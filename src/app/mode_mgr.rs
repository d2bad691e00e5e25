// listsift - app/mode_mgr.rs
//
// Manages loading of mode profiles from both built-in sources (embedded
// in the binary) and user-defined TOML files on disk. User modes override
// built-in modes with the same ID.

use crate::core::mode::{self, ModeProfile};
use crate::util::constants;
use crate::util::error::ModeError;
use std::path::{Path, PathBuf};

/// Load all available modes: built-in first, then user-defined overrides.
///
/// User modes with the same ID as a built-in mode replace the built-in.
/// Invalid modes are logged and skipped (non-fatal).
///
/// Returns the merged list and any non-fatal errors encountered.
pub fn load_all_modes(user_modes_dir: Option<&Path>) -> (Vec<ModeProfile>, Vec<ModeError>) {
    let mut modes = mode::load_builtin_modes();
    let mut errors = Vec::new();

    tracing::info!(builtin_count = modes.len(), "Loaded built-in modes");

    if let Some(dir) = user_modes_dir {
        if dir.is_dir() {
            let (user_modes, user_errors) = load_user_modes(dir);
            errors.extend(user_errors);

            for user_mode in user_modes {
                if let Some(pos) = modes.iter().position(|m| m.id == user_mode.id) {
                    tracing::info!(mode_id = %user_mode.id, "User mode overrides built-in");
                    modes[pos] = user_mode;
                } else {
                    tracing::info!(mode_id = %user_mode.id, "Loaded user-defined mode");
                    modes.push(user_mode);
                }
            }
        } else {
            tracing::debug!(
                dir = %dir.display(),
                "User modes directory does not exist (skipping)"
            );
        }
    }

    if modes.len() > constants::MAX_MODES {
        tracing::warn!(
            count = modes.len(),
            max = constants::MAX_MODES,
            "Too many modes loaded, truncating"
        );
        errors.push(ModeError::TooManyModes {
            count: modes.len(),
            max: constants::MAX_MODES,
        });
        modes.truncate(constants::MAX_MODES);
    }

    tracing::info!(total = modes.len(), "Mode loading complete");

    (modes, errors)
}

/// Load user-defined modes from a directory (non-recursive, *.toml only).
fn load_user_modes(dir: &Path) -> (Vec<ModeProfile>, Vec<ModeError>) {
    let mut modes: Vec<ModeProfile> = Vec::new();
    let mut sources: Vec<(String, PathBuf)> = Vec::new();
    let mut errors = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            errors.push(ModeError::Io {
                path: dir.to_path_buf(),
                source: e,
            });
            return (modes, errors);
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == "toml"))
        .collect();
    paths.sort();

    for path in paths {
        match load_mode_file(&path) {
            Ok(profile) => {
                // Two user files with the same ID is an error; the first
                // one loaded wins.
                if let Some((_, first)) =
                    sources.iter().find(|(id, _)| *id == profile.id)
                {
                    errors.push(ModeError::DuplicateId {
                        id: profile.id.clone(),
                        path1: first.clone(),
                        path2: path.clone(),
                    });
                    continue;
                }
                sources.push((profile.id.clone(), path));
                modes.push(profile);
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Skipping invalid user mode");
                errors.push(e);
            }
        }
    }

    (modes, errors)
}

/// Read, parse, and compile a single user mode file.
fn load_mode_file(path: &PathBuf) -> Result<ModeProfile, ModeError> {
    let metadata = std::fs::metadata(path).map_err(|e| ModeError::Io {
        path: path.clone(),
        source: e,
    })?;
    if metadata.len() > constants::MAX_MODE_FILE_SIZE {
        return Err(ModeError::FileTooLarge {
            path: path.clone(),
            size: metadata.len(),
            max_size: constants::MAX_MODE_FILE_SIZE,
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ModeError::Io {
        path: path.clone(),
        source: e,
    })?;

    let def = mode::parse_mode_toml(&content, path)?;
    mode::validate_and_compile(def, false)
}

/// Platform default directory for user mode profiles, when resolvable.
pub fn default_user_modes_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", constants::APP_NAME)
        .map(|dirs| dirs.config_dir().join(constants::MODES_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builtin_modes_load_without_user_dir() {
        let (modes, errors) = load_all_modes(None);
        assert!(!modes.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_user_mode_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let override_toml = crate::core::mode::builtin_mode_sources()[0]
            .1
            .replace("name = \"Shopee commission export\"", "name = \"Overridden\"");
        let path = dir.path().join("override.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(override_toml.as_bytes()).unwrap();

        let (modes, errors) = load_all_modes(Some(dir.path()));
        assert!(errors.is_empty());
        let overridden = modes.iter().find(|m| m.id == "shopee-basic").unwrap();
        assert_eq!(overridden.name, "Overridden");
        assert!(!overridden.is_builtin);
        // No duplicate entry left behind.
        assert_eq!(modes.iter().filter(|m| m.id == "shopee-basic").count(), 1);
    }

    #[test]
    fn test_invalid_user_mode_is_skipped_with_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not valid toml [").unwrap();

        let (modes, errors) = load_all_modes(Some(dir.path()));
        assert!(!modes.is_empty()); // built-ins still load
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ModeError::TomlParse { .. }));
    }

    #[test]
    fn test_missing_user_dir_is_not_an_error() {
        let (_, errors) = load_all_modes(Some(Path::new("/nonexistent/modes")));
        assert!(errors.is_empty());
    }
}
