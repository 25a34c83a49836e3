use crate::error::{LocateError, Result};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Stdio};

/// Remove files left over from a previous run; absent files are fine.
pub(crate) fn remove_stale(paths: &[&Path]) -> Result<()> {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => debug!("removed stale {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(LocateError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }
    Ok(())
}

pub(crate) fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).map_err(|source| LocateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("wrote {}:\n{}", path.display(), contents);
    Ok(())
}

/// Run a program to completion in `dir`, optionally feeding `stdin` from a file.
///
/// A non-zero exit status is only logged; whether the run produced a usable
/// location is decided by its report.
pub(crate) fn run_program(
    program: &str,
    args: &[String],
    dir: &Path,
    env: &BTreeMap<String, String>,
    stdin: Option<&Path>,
) -> Result<()> {
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(dir)
        .envs(env)
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if let Some(path) = stdin {
        let file = File::open(path).map_err(|source| LocateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        command.stdin(file);
    }
    info!("running {} in {}", program, dir.display());
    let status = command.status().map_err(|source| LocateError::Launch {
        program: program.to_string(),
        source,
    })?;
    if !status.success() {
        warn!("{} exited with {}", program, status);
    }
    Ok(())
}

/// Read a report, treating a missing or blank file as a failed run.
pub(crate) fn read_output(path: &Path) -> Result<String> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(LocateError::MissingOutput(path.to_path_buf()))
        }
        Err(source) => {
            return Err(LocateError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if text.trim().is_empty() {
        return Err(LocateError::EmptyOutput(path.to_path_buf()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_stale_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("3dloc-in");
        fs::write(&present, "x").unwrap();
        let absent = dir.path().join("3dloc-out");
        remove_stale(&[&present, &absent]).unwrap();
        assert!(!present.exists());
    }

    #[test]
    fn test_read_output_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hypo.prt");
        assert!(matches!(read_output(&path), Err(LocateError::MissingOutput(_))));
        fs::write(&path, "\n  \n").unwrap();
        assert!(matches!(read_output(&path), Err(LocateError::EmptyOutput(_))));
        fs::write(&path, "report").unwrap();
        assert_eq!(read_output(&path).unwrap(), "report");
    }

    #[test]
    fn test_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_program(
            "spk-no-such-program",
            &[],
            dir.path(),
            &BTreeMap::new(),
            None,
        );
        assert!(matches!(result, Err(LocateError::Launch { .. })));
    }
}
