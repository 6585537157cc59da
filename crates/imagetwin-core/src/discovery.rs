use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{ImageFile, ImageFormat};

/// Discover supported image files in the provided directories
pub fn discover_images<P: AsRef<Path>>(
    directories: &[P],
    config: &Config,
) -> Result<Vec<ImageFile>> {
    let paths: Vec<PathBuf> = directories
        .iter()
        .map(|dir| dir.as_ref().to_path_buf())
        .collect();

    paths
        .par_iter()
        .map(|dir| discover_images_in_directory(dir, config))
        .collect::<Vec<Result<Vec<ImageFile>>>>()
        .into_iter()
        .try_fold(Vec::new(), |mut acc, result| {
            acc.extend(result?);
            Ok(acc)
        })
}

/// Discover supported image files in a single directory
pub fn discover_images_in_directory(directory: &Path, config: &Config) -> Result<Vec<ImageFile>> {
    if !directory.exists() {
        return Err(Error::FileNotFound(directory.to_path_buf()));
    }

    let max_depth = config.max_depth.unwrap_or(usize::MAX);

    let mut image_files = Vec::new();

    for entry in WalkDir::new(directory)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();

        match image_format_of(path) {
            Some(format) if format.is_supported() => match file_metadata(path) {
                Ok((size, last_modified)) => {
                    image_files.push(ImageFile {
                        path: path.to_path_buf(),
                        size,
                        last_modified,
                        format,
                    });
                }
                Err(e) => {
                    // Log error but continue with other files
                    log::warn!("Error reading metadata for {}: {}", path.display(), e);
                }
            },
            _ => {}
        }
    }

    Ok(image_files)
}

/// Get image format from file extension
fn image_format_of(path: &Path) -> Option<ImageFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(ImageFormat::from_extension)
}

fn file_metadata(path: &Path) -> io::Result<(u64, std::time::SystemTime)> {
    let metadata = fs::metadata(path)?;
    Ok((metadata.len(), metadata.modified()?))
}

/// Returns true if the given path has a supported image extension
pub fn is_image_path(path: &Path) -> bool {
    match image_format_of(path) {
        Some(format) => format.is_supported(),
        None => false,
    }
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn create_test_image(dir: &Path, name: &str, ext: &str) -> PathBuf {
        let file_path = dir.join(format!("{}.{}", name, ext));
        let mut file = File::create(&file_path).unwrap();
        // Write some dummy data to simulate an image
        file.write_all(b"DUMMY IMAGE DATA").unwrap();
        file_path
    }

    fn setup_test_directory() -> (tempfile::TempDir, Vec<PathBuf>) {
        let dir = tempdir().unwrap();

        let subdir_path = dir.path().join("subdir");
        fs::create_dir(&subdir_path).unwrap();

        let files = vec![
            create_test_image(dir.path(), "image1", "jpg"),
            create_test_image(dir.path(), "image2", "png"),
            create_test_image(dir.path(), "image3", "webp"),
            create_test_image(dir.path(), "image4", "gif"),
            create_test_image(&subdir_path, "subdir_image1", "jpeg"),
            create_test_image(&subdir_path, "subdir_image2", "bmp"),
        ];

        // Create a non-image file
        let non_image_path = dir.path().join("document.txt");
        let mut file = File::create(&non_image_path).unwrap();
        file.write_all(b"NOT AN IMAGE").unwrap();

        (dir, files)
    }

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("test.jpg")));
        assert!(is_image_path(Path::new("test.jpeg")));
        assert!(is_image_path(Path::new("test.png")));
        assert!(is_image_path(Path::new("test.bmp")));
        assert!(is_image_path(Path::new("test.gif")));
        assert!(is_image_path(Path::new("test.tiff")));
        assert!(is_image_path(Path::new("test.webp")));
        assert!(is_image_path(Path::new("test.JPG")));
        assert!(!is_image_path(Path::new("test.txt")));
        assert!(!is_image_path(Path::new("test.heic")));
        assert!(!is_image_path(Path::new("test")));
    }

    #[test]
    fn test_discover_images_in_directory() {
        let (dir, files) = setup_test_directory();
        let config = Config::default();

        let discovered = discover_images_in_directory(dir.path(), &config).unwrap();

        // 4 in root + 2 in subdir
        assert_eq!(discovered.len(), 6);

        let discovered_paths: Vec<PathBuf> = discovered.iter().map(|f| f.path.clone()).collect();
        for file_path in &files {
            assert!(discovered_paths.contains(file_path));
        }

        assert!(!discovered_paths.contains(&dir.path().join("document.txt")));
    }

    #[test]
    fn test_discover_images_with_depth_limit() {
        let (dir, _) = setup_test_directory();

        let mut config = Config::default();
        config.max_depth = Some(1);

        let discovered = discover_images_in_directory(dir.path(), &config).unwrap();

        // Only the 4 image files in the root directory
        assert_eq!(discovered.len(), 4);

        for file in &discovered {
            assert_eq!(file.path.parent().unwrap(), dir.path());
        }
    }

    #[test]
    fn test_discover_images_nonexistent_directory() {
        let config = Config::default();
        let result =
            discover_images_in_directory(Path::new("/path/that/does/not/exist"), &config);

        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_discover_images_multiple_directories() {
        let (dir1, files1) = setup_test_directory();
        let (dir2, files2) = setup_test_directory();

        let config = Config::default();
        let directories = vec![dir1.path(), dir2.path()];

        let discovered = discover_images(&directories, &config).unwrap();

        assert_eq!(discovered.len(), 12);

        let discovered_paths: Vec<PathBuf> = discovered.iter().map(|f| f.path.clone()).collect();
        for file_path in files1.iter().chain(files2.iter()) {
            assert!(discovered_paths.contains(file_path));
        }
    }
}
