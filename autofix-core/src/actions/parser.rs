//! Extracts actions from a model response
//!
//! Only fenced code blocks are considered. A block becomes a file write
//! when it carries a path annotation, a list of commands when its language
//! is a shell, and a list of deletes when its language is `delete`.
//! Everything else is ignored.

use super::safety::SafetyPolicy;
use super::workspace::{Workspace, normalize_relative};
use super::{CommandAction, FileAction, ParsedActions};
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use regex_utils::{fence, shell};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Languages whose blocks list paths to delete
const DELETE_LANGUAGES: &[&str] = &["delete", "rm", "remove"];

/// Languages that print a transcript, where only prompted lines are commands
const TRANSCRIPT_LANGUAGES: &[&str] = &["console", "terminal", "shell-session"];

struct FencedBlock {
    info: String,
    content: String,
}

enum BlockIntent {
    Write { path: PathBuf, content: String },
    Delete(Vec<PathBuf>),
    Commands(Vec<String>),
}

/// Parses model responses into workspace actions
pub struct ActionParser {
    workspace: Arc<dyn Workspace>,
    policy: SafetyPolicy,
}

impl ActionParser {
    pub fn new(workspace: Arc<dyn Workspace>, policy: SafetyPolicy) -> Self {
        Self { workspace, policy }
    }

    /// Parse a response; reads the workspace to tell creates from edits
    pub async fn parse(&self, response: &str) -> ParsedActions {
        // path -> (content, None for delete); last block for a path wins
        let mut files: Vec<(PathBuf, Option<String>)> = Vec::new();
        let mut commands = Vec::new();

        for block in fenced_blocks(response) {
            match classify_block(&block) {
                Some(BlockIntent::Write { path, content }) => upsert(&mut files, path, Some(content)),
                Some(BlockIntent::Delete(paths)) => {
                    for path in paths {
                        upsert(&mut files, path, None);
                    }
                }
                Some(BlockIntent::Commands(lines)) => commands.extend(lines),
                None => debug!("Ignoring code block with info `{}`", block.info),
            }
        }

        let mut actions = ParsedActions::default();
        for (path, content) in files {
            let prior = if self.workspace.exists(&path).await {
                self.workspace.read_file(&path).await.ok()
            } else {
                None
            };
            let action = match (content, prior) {
                (Some(content), Some(prior)) => FileAction::edit(path, content, prior),
                (Some(content), None) => FileAction::create(path, content),
                (None, prior @ Some(_)) => FileAction::delete(path, prior),
                (None, None) => {
                    debug!("Skipping delete of missing file {}", path.display());
                    continue;
                }
            };
            actions.files.push(action);
        }
        actions.commands = commands
            .into_iter()
            .map(|cmd| CommandAction::new(cmd).gated_by(&self.policy))
            .collect();

        debug!(
            "Parsed {} file actions and {} commands",
            actions.files.len(),
            actions.commands.len()
        );
        actions
    }
}

fn upsert(files: &mut Vec<(PathBuf, Option<String>)>, path: PathBuf, content: Option<String>) {
    match files.iter_mut().find(|(existing, _)| *existing == path) {
        Some(entry) => entry.1 = content,
        None => files.push((path, content)),
    }
}

fn fenced_blocks(markdown: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<FencedBlock> = None;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                current = Some(FencedBlock { info: info.to_string(), content: String::new() });
            }
            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.content.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }
    blocks
}

fn classify_block(block: &FencedBlock) -> Option<BlockIntent> {
    let info = fence::parse_info(&block.info);
    let lang = info.lang.as_deref().unwrap_or_default();

    if DELETE_LANGUAGES.contains(&lang) {
        let paths: Vec<PathBuf> = block
            .content
            .lines()
            .map(|line| line.trim().trim_start_matches("- ").trim())
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(checked_path)
            .collect();
        return (!paths.is_empty()).then_some(BlockIntent::Delete(paths));
    }

    let (path, content) = match info.path {
        Some(path) => (Some(path), block.content.clone()),
        None => split_path_marker(&block.content),
    };

    if let Some(path) = path {
        let path = checked_path(&path)?;
        if content.trim().is_empty() {
            debug!("Ignoring empty block for {}", path.display());
            return None;
        }
        return Some(BlockIntent::Write { path, content });
    }

    if shell::is_shell_language(lang) {
        let transcript = TRANSCRIPT_LANGUAGES.contains(&lang);
        let lines = command_lines(&block.content, transcript);
        return (!lines.is_empty()).then_some(BlockIntent::Commands(lines));
    }

    None
}

/// A first content line such as `// filepath: src/a.ts` names the file
fn split_path_marker(content: &str) -> (Option<String>, String) {
    let mut lines = content.splitn(2, '\n');
    let first = lines.next().unwrap_or_default();
    match fence::path_marker(first) {
        Some(path) => (Some(path), lines.next().unwrap_or_default().to_string()),
        None => (None, content.to_string()),
    }
}

fn checked_path(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim().trim_matches(|c| c == '`' || c == '"' || c == '\'');
    if raw.is_empty() {
        return None;
    }
    let path = Path::new(raw);
    if path.is_absolute() || raw.starts_with('~') {
        warn!("Discarding absolute path {}", raw);
        return None;
    }
    let normalized = normalize_relative(path);
    if normalized.is_none() {
        warn!("Discarding path that escapes the workspace: {}", raw);
    }
    normalized
}

fn command_lines(content: &str, transcript: bool) -> Vec<String> {
    let mut joined: Vec<String> = Vec::new();
    let mut pending = String::new();
    for line in content.lines() {
        let trimmed = line.trim_end();
        if let Some(head) = trimmed.strip_suffix('\\') {
            pending.push_str(head);
            pending.push(' ');
            continue;
        }
        pending.push_str(trimmed);
        joined.push(std::mem::take(&mut pending));
    }
    if !pending.trim().is_empty() {
        joined.push(pending);
    }

    let prompted = |line: &str| shell::strip_prompt(line) != line.trim_start();
    let only_prompted = transcript && joined.iter().any(|l| prompted(l));

    joined
        .iter()
        .filter(|line| !only_prompted || prompted(line))
        .map(|line| shell::strip_prompt(line).trim().to_string())
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("REM "))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{FileOp, LocalWorkspace};
    use tempfile::TempDir;

    fn parser(dir: &TempDir) -> ActionParser {
        ActionParser::new(Arc::new(LocalWorkspace::new(dir.path())), SafetyPolicy::default())
    }

    #[tokio::test]
    async fn test_path_annotations() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/app.ts"), "old\n").unwrap();

        let response = r#"Here is the fix.

```typescript:src/app.ts
export const x = 1;
```

```python title="tools/run.py"
print("hi")
```

```rust
// filepath: src/lib.rs
pub fn f() {}
```

```python
print("no path, ignored")
```
"#;
        let actions = parser(&dir).parse(response).await;
        assert_eq!(actions.files.len(), 3);
        assert!(actions.commands.is_empty());

        let edit = &actions.files[0];
        assert_eq!(edit.op, FileOp::Edit);
        assert_eq!(edit.path, PathBuf::from("src/app.ts"));
        assert_eq!(edit.prior_content.as_deref(), Some("old\n"));

        assert_eq!(actions.files[1].op, FileOp::Create);
        assert_eq!(actions.files[1].path, PathBuf::from("tools/run.py"));

        let marked = &actions.files[2];
        assert_eq!(marked.path, PathBuf::from("src/lib.rs"));
        assert_eq!(marked.new_content.as_deref(), Some("pub fn f() {}\n"));
    }

    #[tokio::test]
    async fn test_shell_blocks_become_commands() {
        let dir = TempDir::new().unwrap();
        let response = "```bash\n# install deps\n$ npm install left-pad\nnpm run build \\\n  --verbose\n```\n\n```console\n$ cargo test\nrunning 3 tests\n```\n";
        let actions = parser(&dir).parse(response).await;
        let commands: Vec<&str> = actions.commands.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(commands, vec!["npm install left-pad", "npm run build    --verbose", "cargo test"]);
        assert!(actions.commands[0].is_dangerous);
        assert!(!actions.commands[1].is_dangerous);
    }

    #[tokio::test]
    async fn test_unsafe_paths_and_empty_blocks_are_dropped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "x").unwrap();
        let response = "```rust:/etc/passwd\nroot\n```\n\n```rust:../outside.rs\nfn x() {}\n```\n\n```text:notes.txt\n\n```\n\n```delete\n\n```\n";
        let actions = parser(&dir).parse(response).await;
        assert!(actions.is_empty());
        assert!(dir.path().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_block_and_last_block_wins() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("old.js"), "legacy").unwrap();
        let response = "```js:src/a.js\nfirst\n```\n\n```js:src/a.js\nsecond\n```\n\n```delete\nold.js\nnot-there.js\n```\n";
        let actions = parser(&dir).parse(response).await;
        assert_eq!(actions.files.len(), 2);
        assert_eq!(actions.files[0].new_content.as_deref(), Some("second\n"));
        let delete = &actions.files[1];
        assert_eq!(delete.op, FileOp::Delete);
        assert!(delete.requires_approval());
        assert_eq!(delete.prior_content.as_deref(), Some("legacy"));
    }
}
