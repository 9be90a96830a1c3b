use std::{env, io, path::PathBuf};

use anyhow::{anyhow, Result};

/// Overrides the default application directory.
pub const DIR_VARIABLE: &str = "TIMEX_DIR";

pub fn create_application_default_path() -> Result<PathBuf> {
    let path = match env::var_os(DIR_VARIABLE).filter(|v| !v.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => platform_default_path()?,
    };

    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

#[cfg(windows)]
fn platform_default_path() -> Result<PathBuf> {
    let mut path = env::var("APPDATA")
        .map(PathBuf::from)
        .map_err(|_| anyhow!("APPDATA should be present on Windows"))?;
    path.push("timex");
    Ok(path)
}

#[cfg(not(windows))]
fn platform_default_path() -> Result<PathBuf> {
    let mut path = env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|_| {
            env::var("HOME").map(|home| {
                let mut path = PathBuf::from(home);
                path.push(".local/state");
                path
            })
        })
        .map_err(|_| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))?;
    path.push("timex");
    Ok(path)
}
