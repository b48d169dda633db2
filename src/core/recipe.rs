//! MB-007: Recipe file loading.
//!
//! A recipe is plain text, one command per line. Blank lines and `#`
//! comments (whole-line or trailing) are dropped; the 1-based source line
//! numbers are kept so diagnostics point at the file.

use super::error::{Result, SimError};
use super::parser;
use super::types::ParsedLine;
use std::path::{Path, PathBuf};

/// Recipe extension, optional when naming a recipe.
pub const RECIPE_EXTENSION: &str = ".txt";

/// One meaningful recipe line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeLine {
    pub number: usize,
    pub text: String,
}

/// A loaded recipe.
#[derive(Debug, Clone)]
pub struct Recipe {
    pub name: String,
    pub lines: Vec<RecipeLine>,
}

impl Recipe {
    /// Parse every line into commands.
    pub fn parse(&self) -> Result<Vec<ParsedLine>> {
        parser::parse_recipe(&self.lines)
    }
}

/// Strip blanks and comments, keeping line numbers.
pub fn strip_comments(content: &str) -> Vec<RecipeLine> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, raw)| {
            let text = raw.split('#').next().unwrap_or_default().trim();
            (!text.is_empty()).then(|| RecipeLine {
                number: i + 1,
                text: text.to_string(),
            })
        })
        .collect()
}

/// Build a recipe from text.
pub fn parse_recipe_text(name: &str, content: &str) -> Recipe {
    Recipe {
        name: name.to_string(),
        lines: strip_comments(content),
    }
}

/// Load a recipe from disk.
pub fn load_recipe(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    Ok(parse_recipe_text(&name, &content))
}

/// Resolve a user-supplied recipe name: the `.txt` extension is optional.
///
/// An existing path is taken as-is; otherwise `.txt` is appended unless the
/// name already ends with it (case-insensitive).
pub fn resolve_recipe_path(name: &str) -> PathBuf {
    let given = PathBuf::from(name);
    if given.is_file() || name.to_ascii_lowercase().ends_with(RECIPE_EXTENSION) {
        return given;
    }
    PathBuf::from(format!("{name}{RECIPE_EXTENSION}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mb007_strip_comments() {
        let content = "# header\n\nDefine X = 5 min   # five minutes\n   Open Ga, In  \n#Close Ga\nWait 1 s\n";
        let lines = strip_comments(content);
        assert_eq!(
            lines,
            vec![
                RecipeLine {
                    number: 3,
                    text: "Define X = 5 min".to_string()
                },
                RecipeLine {
                    number: 4,
                    text: "Open Ga, In".to_string()
                },
                RecipeLine {
                    number: 6,
                    text: "Wait 1 s".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_mb007_load_recipe() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("growth.txt");
        std::fs::write(&path, "Open Ga\nWait 10 s\nClose Ga\n").unwrap();
        let recipe = load_recipe(&path).unwrap();
        assert_eq!(recipe.name, "growth");
        assert_eq!(recipe.lines.len(), 3);
        let parsed = recipe.parse().unwrap();
        assert_eq!(parsed[1].line, 2);
    }

    #[test]
    fn test_mb007_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_recipe(&dir.path().join("nope.txt")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_mb007_resolve_path() {
        assert_eq!(resolve_recipe_path("growth"), PathBuf::from("growth.txt"));
        assert_eq!(resolve_recipe_path("growth.txt"), PathBuf::from("growth.txt"));
        assert_eq!(resolve_recipe_path("GROWTH.TXT"), PathBuf::from("GROWTH.TXT"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recipe.rcp");
        std::fs::write(&path, "Wait 1").unwrap();
        let name = path.to_str().unwrap();
        assert_eq!(resolve_recipe_path(name), path);
    }

    #[test]
    fn test_mb007_parse_error_carries_line() {
        let recipe = parse_recipe_text("r", "Open Ga\n\n# note\nFrobnicate\n");
        let err = recipe.parse().unwrap_err();
        assert!(matches!(err, SimError::Parse { line: 4, .. }));
    }
}
