use crate::error::*;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Make a CA supplied token safe to use as a file name: every
/// character outside `[A-Za-z0-9_-]` becomes `_`. Tokens carrying a
/// path separator, and empty tokens, are refused outright.
pub fn sanitize_token(token: &str) -> Result<String, Error> {
  if token.is_empty() || token.contains('/') || token.contains('\\') {
    return Err(Error::DangerousToken(token.to_string()));
  }
  let sanitized: String = token
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
        c
      } else {
        '_'
      }
    })
    .collect();
  if sanitized.is_empty()
    || sanitized.contains(std::path::MAIN_SEPARATOR)
    || sanitized.contains('\\')
  {
    return Err(Error::DangerousToken(token.to_string()));
  }
  Ok(sanitized)
}

/// Create the challenge directory, including parents.
pub fn prepare_dir(dir: &Path) -> Result<(), Error> {
  fs::create_dir_all(dir).map_err(io_err(dir))
}

/// Clear the challenge file path before writing. A symlink is removed
/// so the write can't land on its target. Empty directories are
/// removed; a directory with content needs `force`.
pub fn clear_token_path(path: &Path, force: bool) -> Result<(), Error> {
  let file_type = match fs::symlink_metadata(path) {
    Ok(meta) => meta.file_type(),
    Err(_) => return Ok(()),
  };
  if file_type.is_symlink() {
    warn!("{} is a symlink, removing it", path.display());
    return fs::remove_file(path).map_err(io_err(path));
  }
  if !file_type.is_dir() {
    return Ok(());
  }
  warn!("{} exists", path.display());
  if fs::remove_dir(path).is_ok() {
    return Ok(());
  }
  if !force {
    return Err(Error::ChallengePathOccupied(path.to_path_buf()));
  }
  fs::remove_dir_all(path).map_err(io_err(path))?;
  info!("Removed {}", path.display());
  Ok(())
}

/// A published challenge response. The file is removed when this
/// value is dropped, so it never outlives the validation attempt.
#[derive(Debug)]
pub struct ChallengeFile {
  path: PathBuf,
  removed: bool,
}

impl ChallengeFile {
  pub fn write(
    dir: &Path,
    token: &str,
    key_authorization: &str,
  ) -> Result<Self, Error> {
    let path = dir.join(token);
    fs::write(&path, key_authorization).map_err(io_err(&path))?;
    debug!(path = %path.display(), "wrote challenge file");
    Ok(ChallengeFile {
      path,
      removed: false,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn remove(mut self) -> Result<(), Error> {
    self.removed = true;
    fs::remove_file(&self.path).map_err(io_err(&self.path))
  }
}

impl Drop for ChallengeFile {
  fn drop(&mut self) {
    if self.removed {
      return;
    }
    let path = self.path.display();
    if let Err(err) = fs::remove_file(&self.path) {
      warn!(path = %path, error = %err, "failed to remove challenge file");
    } else {
      debug!(path = %path, "removed challenge file");
    }
  }
}
