//! System prompt assembly and the environment context seeded into fresh sessions.

use std::path::Path;

use crate::message::Message;

pub const BASE_SYSTEM_PROMPT: &str = r#"You are "shrew", a minimalist CLI coding agent.
You have the power to execute shell commands on the user's machine.
To execute a command, wrap it in <run>tags like this: <run>ls -la</run>.
To reason about a problem, use <think>...</think> tags.
Use standard CLI tools. Always explain what you are doing briefly.
After running a command, you will receive the output.
Continue until the task is complete.
Your output should be formatted as Markdown."#;

pub const MAX_CONTEXT_FILES: usize = 100;

/// Concatenate every `*.md` file in `dir`, by file name. A missing or
/// unreadable directory yields nothing.
pub fn load_skills(dir: &Path) -> String {
    let entries = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(_) => return String::new(),
    };

    let mut files: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();

    let mut skills = String::new();
    for path in files {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => skills.push_str(&format!("\n### Skill: {name}\n{content}\n")),
            Err(e) => tracing::warn!("skipping skill {}: {e}", path.display()),
        }
    }
    skills
}

pub fn system_prompt(skills_dir: &Path) -> String {
    let mut prompt = BASE_SYSTEM_PROMPT.to_string();
    prompt.push_str(&load_skills(skills_dir));
    prompt
}

/// Working directory plus up to [`MAX_CONTEXT_FILES`] file paths under it.
/// Hidden and gitignored entries are skipped, as is anything in `node_modules`.
pub fn gather_context(root: &Path) -> String {
    let mut builder = ignore::WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(true)
        .filter_entry(|e| e.file_name() != "node_modules")
        .sort_by_file_name(|a, b| a.cmp(b));

    let mut files: Vec<String> = builder
        .build()
        .flatten()
        .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().into_owned())
        })
        .take(MAX_CONTEXT_FILES)
        .collect();
    files.sort();

    format!(
        "Working Dir: {}\nFiles (top {MAX_CONTEXT_FILES}):\n - {}",
        root.display(),
        files.join("\n - ")
    )
}

/// First message of a fresh session.
pub fn context_message(root: &Path) -> Message {
    Message::user(format!("Context: {}", gather_context(root)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_skills_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(load_skills(&dir.path().join("skills")), "");
        assert_eq!(system_prompt(&dir.path().join("skills")), BASE_SYSTEM_PROMPT);
    }

    #[test]
    fn skills_are_appended_in_name_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.md"), "second").unwrap();
        std::fs::write(dir.path().join("a.md"), "first").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(
            load_skills(dir.path()),
            "\n### Skill: a.md\nfirst\n\n### Skill: b.md\nsecond\n"
        );
    }

    #[test]
    fn context_lists_files_and_skips_noise() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("src/main.rs"), "").unwrap();
        std::fs::write(root.join("README.md"), "").unwrap();
        std::fs::write(root.join(".env"), "").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();

        let ctx = gather_context(root);
        assert!(ctx.starts_with(&format!("Working Dir: {}\n", root.display())));
        assert!(ctx.contains(" - README.md"));
        assert!(ctx.contains("main.rs"));
        assert!(!ctx.contains(".env"));
        assert!(!ctx.contains("node_modules"));
    }

    #[test]
    fn context_is_capped() {
        let dir = TempDir::new().unwrap();
        for i in 0..(MAX_CONTEXT_FILES + 20) {
            std::fs::write(dir.path().join(format!("f{i:03}.txt")), "").unwrap();
        }
        let ctx = gather_context(dir.path());
        assert_eq!(ctx.matches("\n - ").count(), MAX_CONTEXT_FILES);
    }

    #[test]
    fn context_message_is_a_user_message() {
        let dir = TempDir::new().unwrap();
        let msg = context_message(dir.path());
        assert_eq!(msg.role, crate::message::Role::User);
        assert!(msg.content.starts_with("Context: Working Dir: "));
    }
}
