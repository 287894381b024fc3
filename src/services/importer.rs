use anyhow::Result;
use std::path::{Path, PathBuf};

const IMPORTABLE_EXTENSIONS: [&str; 3] = ["pdf", "csv", "xlsx"];

/// Documents directly inside `folder` that can be uploaded, sorted by path.
pub fn collect_documents(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        anyhow::bail!("Not a folder: {}", folder.display());
    }

    let mut entries = walkdir::WalkDir::new(folder)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .filter(|e| is_importable(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect::<Vec<_>>();
    entries.sort();
    Ok(entries)
}

pub fn is_importable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMPORTABLE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// File stem used as the invoice name when none is given.
pub fn default_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "invoice".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_top_level_documents_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PDF", "a.csv", "notes.txt", "sheet.xlsx"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.pdf"), b"x").unwrap();

        let found = collect_documents(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.PDF", "sheet.xlsx"]);
    }

    #[test]
    fn missing_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_documents(&dir.path().join("absent")).is_err());
        assert_eq!(default_name(Path::new("/in/march-hosting.pdf")), "march-hosting");
    }
}
