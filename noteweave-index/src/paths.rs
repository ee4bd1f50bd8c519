use std::path::{Path, PathBuf};

use crate::IndexSettings;
use crate::errors::{IndexError, IndexResult};

pub const NOTES_DIR: &str = "notes";
pub const MARKDOWN_EXT: &str = "md";

const FORBIDDEN_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '[', ']', '#'];

pub fn data_root() -> IndexResult<PathBuf> {
    if let Ok(override_dir) = std::env::var("NOTEWEAVE_DATA_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let dir = dirs::data_dir().ok_or(IndexError::MissingDataDir)?;
    Ok(dir.join("noteweave"))
}

pub fn notes_root(settings: &IndexSettings) -> IndexResult<PathBuf> {
    if let Some(path) = &settings.root_override {
        return Ok(path.clone());
    }
    Ok(data_root()?.join(NOTES_DIR))
}

/// Filename stem for a title: forbidden characters removed, whitespace
/// collapsed, leading and trailing dots dropped so the file is never hidden.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !c.is_control() && !FORBIDDEN_FILENAME_CHARS.contains(c))
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let stem = collapsed.trim_matches('.').trim();
    if stem.is_empty() {
        "Untitled".to_string()
    } else {
        stem.to_string()
    }
}

/// `<stem>.md` for a title.
pub fn filename_for_title(title: &str) -> String {
    format!("{}.{MARKDOWN_EXT}", sanitize_filename(title))
}

pub fn is_markdown(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(MARKDOWN_EXT)
}

pub fn file_stem(filename: &str) -> &str {
    filename
        .strip_suffix(&format!(".{MARKDOWN_EXT}"))
        .unwrap_or(filename)
}

/// First `<stem>.md`, `<stem> 2.md`, `<stem> 3.md`, ... that does not exist in `dir`.
pub async fn unique_filename(dir: &Path, filename: &str) -> IndexResult<String> {
    let stem = file_stem(filename);
    let mut candidate = filename.to_string();
    let mut counter = 2;
    while tokio::fs::try_exists(dir.join(&candidate)).await? {
        candidate = format!("{stem} {counter}.{MARKDOWN_EXT}");
        counter += 1;
    }
    Ok(candidate)
}

/// Validate a folder name supplied by a caller.
pub fn validate_folder_name(name: &str) -> IndexResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.starts_with('.')
        || trimmed.contains(['/', '\\'])
        || trimmed.chars().any(char::is_control)
    {
        return Err(IndexError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

/// Validate a bare filename (no directory components).
pub fn validate_filename(name: &str) -> IndexResult<&str> {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(IndexError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Write through a temporary file so readers never observe a partial document.
pub async fn write_atomic(path: &Path, content: &str) -> IndexResult<()> {
    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, content).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_forbidden_characters() {
        assert_eq!(sanitize_filename("What? A: <Note>/draft"), "What A Notedraft");
        assert_eq!(sanitize_filename("  many   spaces  "), "many spaces");
        assert_eq!(sanitize_filename("ends with dots..."), "ends with dots");
        assert_eq!(sanitize_filename("???"), "Untitled");
        assert_eq!(sanitize_filename(".profile"), "profile");
        assert_eq!(sanitize_filename(". hidden ."), "hidden");
        assert_eq!(sanitize_filename("..."), "Untitled");
    }

    #[test]
    fn different_titles_can_share_a_filename() {
        assert_eq!(filename_for_title("A/B"), filename_for_title("AB"));
    }

    #[test]
    fn folder_names_are_validated() {
        assert!(validate_folder_name("projects").is_ok());
        assert_eq!(validate_folder_name("  work ").unwrap(), "work");
        for bad in ["", "..", ".trash", "a/b", "a\\b"] {
            assert!(validate_folder_name(bad).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn stem_strips_extension() {
        assert_eq!(file_stem("Note A.md"), "Note A");
        assert_eq!(file_stem("README"), "README");
    }

    #[tokio::test]
    async fn unique_filename_appends_counter() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_filename(dir.path(), "Note.md").await.unwrap(), "Note.md");

        tokio::fs::write(dir.path().join("Note.md"), "").await.unwrap();
        tokio::fs::write(dir.path().join("Note 2.md"), "").await.unwrap();
        assert_eq!(unique_filename(dir.path(), "Note.md").await.unwrap(), "Note 3.md");
    }

    #[tokio::test]
    async fn write_atomic_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Doc.md");
        write_atomic(&path, "hello").await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "hello");
        assert!(!dir.path().join("Doc.md.tmp").exists());
    }
}
