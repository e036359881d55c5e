//! File system utilities.

use std::{
    ffi::OsString,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

/// Moves a file, falling back to a copy when `src` and `dst` live on different filesystems.
///
/// A partially written file never shows up at `dst`. Across filesystems the
/// data is copied into a hidden staging file next to `dst`, synced to disk and
/// renamed into place, and only then is `src` removed.
///
/// # Examples
///
/// ```no_run
/// use cutil::fs::move_file;
///
/// move_file("/dev/shm/capture.mkv", "/output/eDP-1/capture.mkv").unwrap();
/// ```
pub fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> io::Result<()> {
    let (src, dst) = (src.as_ref(), dst.as_ref());

    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => move_by_copy(src, dst),
        Err(e) => Err(e),
    }
}

fn move_by_copy(src: &Path, dst: &Path) -> io::Result<()> {
    let staging = staging_path(dst)?;

    if let Err(e) = copy_synced(src, &staging).and_then(|_| fs::rename(&staging, dst)) {
        _ = fs::remove_file(&staging);
        return Err(e);
    }

    fs::remove_file(src)
}

fn copy_synced(src: &Path, dst: &Path) -> io::Result<()> {
    let mut reader = File::open(src)?;
    let mut writer = File::create(dst)?;
    io::copy(&mut reader, &mut writer)?;
    writer.sync_all()
}

/// `dir/.name.partial` for `dir/name`
fn staging_path(dst: &Path) -> io::Result<PathBuf> {
    let name = dst.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", dst.display()),
        )
    })?;

    let mut staging = OsString::from(".");
    staging.push(name);
    staging.push(".partial");

    Ok(dst.with_file_name(staging))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_move_file() -> io::Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("capture.mkv");
        let dst = dir.path().join("out").join("12-00-00.mkv");
        fs::create_dir_all(dst.parent().unwrap())?;
        fs::write(&src, b"video")?;

        move_file(&src, &dst)?;

        assert!(!src.exists());
        assert_eq!(fs::read(&dst)?, b"video");
        Ok(())
    }

    #[test]
    fn test_move_file_missing_source() {
        let dir = tempdir().unwrap();
        let err = move_file(dir.path().join("nope"), dir.path().join("dst")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_move_by_copy() -> io::Result<()> {
        let src_dir = tempdir()?;
        let dst_dir = tempdir()?;
        let src = src_dir.path().join("capture.mkv");
        let dst = dst_dir.path().join("13-15-00.mkv");
        fs::write(&src, vec![7u8; 100_000])?;

        move_by_copy(&src, &dst)?;

        assert!(!src.exists());
        assert_eq!(fs::read(&dst)?, vec![7u8; 100_000]);
        assert!(!dst_dir.path().join(".13-15-00.mkv.partial").exists());
        Ok(())
    }

    #[test]
    fn test_move_by_copy_cleans_staging_on_failure() -> io::Result<()> {
        let src_dir = tempdir()?;
        let dst_dir = tempdir()?;
        let src = src_dir.path().join("capture.mkv");
        fs::write(&src, b"video")?;

        // renaming a file over a non-empty directory fails
        let dst = dst_dir.path().join("taken");
        fs::create_dir(&dst)?;
        fs::write(dst.join("keep"), b"")?;

        assert!(move_by_copy(&src, &dst).is_err());
        assert!(src.exists());
        assert!(!dst_dir.path().join(".taken.partial").exists());
        Ok(())
    }

    #[test]
    fn test_staging_path() {
        assert_eq!(
            staging_path(Path::new("/output/eDP-1/2024-01-02/10-15-00.mkv")).unwrap(),
            PathBuf::from("/output/eDP-1/2024-01-02/.10-15-00.mkv.partial")
        );
        assert!(staging_path(Path::new("/")).is_err());
    }
}
