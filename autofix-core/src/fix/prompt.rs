//! Fix prompt construction

use crate::errors::ParsedError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write;
use std::path::Path;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a precise code repair assistant. \
     You receive one failing error with its surrounding source and reply with the smallest change that fixes it. \
     Never rewrite unrelated code and never add commentary inside code blocks.";

const RESPONSE_FORMAT: &str = "Reply format:\n\
     - Return the COMPLETE updated file in a fenced block annotated with its path, e.g. ```ts:src/app.ts\n\
     - Put shell commands (installing a missing package, for example) in a ```bash block, one per line\n\
     - List files to remove in a ```delete block, one path per line\n\
     - Do not include any other code blocks";

static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^\s*(?:import\b|export\b|from\s+\S+\s+import\b|use\s+[\w:{]|extern\s+crate\b|mod\s+\w+;|#include\b|package\s+\w|require\s*\(|(?:const|let|var)\s+.*=\s*require\s*\(|using\s+[\w.]+;|library\b|part\b)"#,
    )
    .expect("Invalid regex pattern")
});

/// Inputs for one fix prompt
pub struct FixPrompt<'a> {
    pub target: &'a ParsedError,
    /// Current content of the target's file, if readable
    pub source: Option<&'a str>,
    /// Other queued errors from the same file
    pub co_errors: &'a [ParsedError],
    pub attempt: u32,
    pub max_attempts: u32,
    pub context_radius: usize,
}

impl FixPrompt<'_> {
    pub fn render(&self) -> String {
        let target = self.target;
        let mut prompt = format!("Fix the following {} error.\n\nError: {}\n", target.kind, target.message);

        if let Some(location) = target.location() {
            let _ = writeln!(prompt, "Location: {}", location);
        }
        if let Some(code) = &target.code {
            let _ = writeln!(prompt, "Code: {}", code);
        }
        if let Some(framework) = &target.framework {
            let _ = writeln!(prompt, "Reported by: {}", framework);
        }
        if let Some(suggestion) = &target.suggestion {
            let _ = writeln!(prompt, "Hint: {}", suggestion);
        }
        if self.attempt > 1 {
            let _ = writeln!(
                prompt,
                "\nThis is attempt {} of {}. Earlier attempts did not resolve the error; try a different approach.",
                self.attempt, self.max_attempts
            );
        }

        if let (Some(source), Some(file)) = (self.source, target.file.as_deref()) {
            let lang = fence_language(file);
            let imports = import_lines(source);
            if !imports.is_empty() {
                let _ = write!(prompt, "\nImports and exports in {}:\n```{}\n{}\n```\n", file, lang, imports.join("\n"));
            }
            let (start, end, excerpt) = context_window(source, target.line, self.context_radius);
            let _ = write!(
                prompt,
                "\nSource of {} (lines {}-{}, error line marked with >>):\n```{}\n{}```\n",
                file, start, end, lang, excerpt
            );
        } else if !target.raw_text.trim().is_empty() {
            let _ = write!(prompt, "\nOutput:\n```text\n{}\n```\n", target.raw_text.trim());
        }

        if !self.co_errors.is_empty() {
            prompt.push_str("\nOther errors in the same file (fix them too if the change is related):\n");
            for error in self.co_errors {
                let _ = writeln!(prompt, "- {}", error);
            }
        }

        prompt.push('\n');
        prompt.push_str(RESPONSE_FORMAT);
        prompt
    }
}

/// Lines around `line` (1-based) with line numbers; returns the shown range
fn context_window(source: &str, line: Option<u32>, radius: usize) -> (usize, usize, String) {
    let lines: Vec<&str> = source.lines().collect();
    if lines.is_empty() {
        return (0, 0, String::new());
    }
    let target = line.map(|l| (l as usize).clamp(1, lines.len()));
    let (start, end) = match target {
        Some(t) => (t.saturating_sub(radius).max(1), t.saturating_add(radius).min(lines.len())),
        None => (1, lines.len().min(radius.saturating_mul(2).saturating_add(1))),
    };
    let width = end.to_string().len();

    let mut excerpt = String::new();
    for number in start..=end {
        let marker = if Some(number) == target { ">>" } else { "  " };
        let _ = writeln!(excerpt, "{}{:>width$} | {}", marker, number, lines[number - 1], width = width);
    }
    (start, end, excerpt)
}

fn import_lines(source: &str) -> Vec<&str> {
    source.lines().filter(|line| IMPORT_LINE.is_match(line)).take(40).collect()
}

fn fence_language(file: &str) -> &str {
    Path::new(file).extension().and_then(|e| e.to_str()).unwrap_or("text")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ErrorKind, Severity};

    fn source() -> String {
        let mut text = String::from("import { a } from './a';\nuse std::fmt;\n");
        for i in 3..=40 {
            text.push_str(&format!("let v{} = {};\n", i, i));
        }
        text
    }

    #[test]
    fn test_context_window_marks_target() {
        let text = source();
        let (start, end, excerpt) = context_window(&text, Some(20), 2);
        assert_eq!((start, end), (18, 22));
        assert!(excerpt.contains(">>20 | let v20 = 20;"));
        assert_eq!(excerpt.lines().count(), 5);

        let (start, _, _) = context_window(&text, Some(1), 15);
        assert_eq!(start, 1);
    }

    #[test]
    fn test_huge_radius_shows_whole_file() {
        let text = source();
        let total = text.lines().count();
        assert_eq!(context_window(&text, Some(20), usize::MAX).0, 1);
        assert_eq!(context_window(&text, Some(20), usize::MAX).1, total);
        assert_eq!(context_window(&text, None, usize::MAX).1, total);
    }

    #[test]
    fn test_render_includes_everything_relevant() {
        let text = source();
        let target = ParsedError::new(ErrorKind::TypeError, Severity::Error, "Type mismatch")
            .at("src/app.ts", 20, Some(5))
            .with_code("TS2322");
        let co = vec![ParsedError::new(ErrorKind::Lint, Severity::Error, "unused").at("src/app.ts", 30, None)];
        let prompt = FixPrompt {
            target: &target,
            source: Some(&text),
            co_errors: &co,
            attempt: 2,
            max_attempts: 3,
            context_radius: 15,
        }
        .render();

        assert!(prompt.starts_with("Fix the following type-error error."));
        assert!(prompt.contains("Location: src/app.ts:20:5"));
        assert!(prompt.contains("Code: TS2322"));
        assert!(prompt.contains("attempt 2 of 3"));
        assert!(prompt.contains("import { a } from './a';"));
        assert!(prompt.contains("```ts\n"));
        assert!(prompt.contains(">>20 | let v20 = 20;"));
        assert!(prompt.contains("- [lint] unused (src/app.ts:30)"));
    }

    #[test]
    fn test_fileless_error_uses_raw_output() {
        let mut target = ParsedError::new(ErrorKind::Build, Severity::Error, "linker failed");
        target.raw_text = "error: linking with `cc` failed".to_string();
        let prompt = FixPrompt {
            target: &target,
            source: None,
            co_errors: &[],
            attempt: 1,
            max_attempts: 3,
            context_radius: 15,
        }
        .render();
        assert!(prompt.contains("error: linking with `cc` failed"));
        assert!(!prompt.contains("attempt 1"));
    }
}
