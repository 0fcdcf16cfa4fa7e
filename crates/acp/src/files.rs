use std::path::Path;

use crate::error::AcpError;

/// Lists every regular file under `root`, recursively, as paths relative
/// to `root`. A thin walk, not an indexer: no gitignore handling, no
/// metadata beyond "is this a file".
pub async fn list_files(root: impl Into<String>) -> Result<Vec<String>, AcpError> {
    let root = root.into();
    tokio::task::spawn_blocking(move || walk(Path::new(&root)))
        .await
        .expect("blocking directory walk panicked")
}

fn walk(root: &Path) -> Result<Vec<String>, AcpError> {
    let mut out = Vec::new();
    visit(root, root, &mut out)?;
    out.sort();
    Ok(out)
}

fn visit(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), AcpError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_name = entry.file_name();
        if file_name.to_string_lossy().starts_with('.') {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            visit(root, &path, out)?;
        } else if file_type.is_file() {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            out.push(relative);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_nested_files_and_skips_dotfiles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src").join("main.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join(".hidden"), "secret").unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();

        let mut files = list_files(dir.path().to_string_lossy().into_owned())
            .await
            .unwrap();
        files.sort();
        assert_eq!(files, vec!["Cargo.toml".to_string(), "src/main.rs".to_string()]);
    }
}
