//! Archive extraction

use std::ffi::OsStr;
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;
use tokio::fs;
use tracing::{debug, info};

use crate::errors::InstallerError;
use crate::exec;

/// Archive formats the installer can unpack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarGz,
    Zip,
    SevenZip,
}

impl ArchiveKind {
    /// Detect the format from the file name
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if name.ends_with(".7z") {
            Some(ArchiveKind::SevenZip)
        } else {
            None
        }
    }
}

/// Unpack `archive` into `dest` and delete it
///
/// A file that is not an archive is moved into `dest` unchanged.
pub async fn extract(archive: &Path, dest: &Path, seven_zip: &str) -> Result<(), InstallerError> {
    fs::create_dir_all(dest).await?;

    let Some(kind) = ArchiveKind::detect(archive) else {
        if let Some(name) = archive.file_name() {
            let target = dest.join(name);
            if target != archive {
                debug!("Not an archive, moving {} to {}", archive.display(), dest.display());
                fs::rename(archive, &target).await?;
            }
        }
        return Ok(());
    };

    info!("Extracting {} to {}", archive.display(), dest.display());
    match kind {
        ArchiveKind::TarGz => {
            let src = archive.to_path_buf();
            let out = dest.to_path_buf();
            tokio::task::spawn_blocking(move || unpack_tar_gz(&src, &out))
                .await
                .map_err(|e| InstallerError::Internal(e.to_string()))??;
        }
        ArchiveKind::Zip | ArchiveKind::SevenZip => {
            let out_flag = format!("-o{}", dest.display());
            exec::run(
                seven_zip,
                [
                    OsStr::new("x"),
                    archive.as_os_str(),
                    OsStr::new(&out_flag),
                    OsStr::new("-y"),
                ],
                None,
            )
            .await?;
        }
    }

    fs::remove_file(archive).await?;
    Ok(())
}

fn unpack_tar_gz(archive: &Path, dest: &Path) -> Result<(), InstallerError> {
    let file = std::fs::File::open(archive)?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.unpack(dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tar_gz(path: &Path) {
        let file = std::fs::File::create(path).unwrap();
        let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(enc);
        let data = b"print('hi')";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "ComfyUI_windows_portable/main.py", &data[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_detect() {
        assert_eq!(ArchiveKind::detect(Path::new("a/b.TAR.GZ")), Some(ArchiveKind::TarGz));
        assert_eq!(ArchiveKind::detect(Path::new("ffmpeg.zip")), Some(ArchiveKind::Zip));
        assert_eq!(ArchiveKind::detect(Path::new("portable.7z")), Some(ArchiveKind::SevenZip));
        assert_eq!(ArchiveKind::detect(Path::new("model.safetensors")), None);
    }

    #[tokio::test]
    async fn test_extract_tar_gz_removes_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("portable.tar.gz");
        write_tar_gz(&archive);

        let dest = tmp.path().join("out");
        extract(&archive, &dest, "7z").await.unwrap();

        assert!(dest.join("ComfyUI_windows_portable/main.py").exists());
        assert!(!archive.exists());
    }

    #[tokio::test]
    async fn test_plain_file_is_moved() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("vae.safetensors");
        std::fs::write(&file, b"w").unwrap();

        let dest = tmp.path().join("models/vae");
        extract(&file, &dest, "7z").await.unwrap();
        assert!(dest.join("vae.safetensors").exists());

        // Already in place
        let in_place = dest.join("vae.safetensors");
        extract(&in_place, &dest, "7z").await.unwrap();
        assert!(in_place.exists());
        assert_eq!(in_place.file_name(), Some(OsStr::new("vae.safetensors")));
    }
}
