//! Regex utilities for autofix
//! Extracted to a separate crate for compilation optimization

use once_cell::sync::Lazy;
use regex::Regex;

/// Fenced code block annotations (info strings and in-block path markers)
pub mod fence {
    use super::*;

    /// `lang:path` in a single info-string token
    pub static LANG_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(?P<lang>[A-Za-z0-9_+#.-]*):(?P<path>[^\s:][^\s]*)$")
            .expect("Invalid regex pattern")
    });

    /// `path=...`, `file=...`, `filename=...`, `title=...` attributes
    pub static ATTR_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"^(?i:path|file|filename|title)=(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>\S*))$"#)
            .expect("Invalid regex pattern")
    });

    /// A token that looks like a relative file path (has a directory part or an extension)
    pub static PATH_LIKE_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(?:[\w.@-]+/)*[\w.@-]*[\w@-]\.[A-Za-z0-9]{1,10}$|^(?:[\w.@-]+/)+[\w.@-]+$")
            .expect("Invalid regex pattern")
    });

    /// First-line path marker inside a block, e.g. `// filepath: src/lib.rs`
    pub static PATH_MARKER_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)^\s*(?://|#|--|;|<!--|/\*)\s*(?:file\s*path|filepath|filename|file|path)\s*:\s*(?P<path>[^\s]+?)\s*(?:-->|\*/)?\s*$",
        )
        .expect("Invalid regex pattern")
    });

    /// Parsed fence info string
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct FenceInfo {
        pub lang: Option<String>,
        pub path: Option<String>,
    }

    /// Parse the info string of a fenced block (the text after the opening backticks)
    pub fn parse_info(info: &str) -> FenceInfo {
        let mut tokens = info.split_whitespace();
        let Some(first) = tokens.next() else {
            return FenceInfo::default();
        };

        let mut result = FenceInfo::default();

        if let Some(caps) = LANG_PATH_PATTERN.captures(first) {
            let lang = &caps["lang"];
            if !lang.is_empty() {
                result.lang = Some(lang.to_lowercase());
            }
            result.path = Some(caps["path"].to_string());
            return result;
        }

        if looks_like_path(first) && !is_known_language(first) {
            result.path = Some(first.to_string());
        } else {
            result.lang = Some(first.to_lowercase());
        }

        for token in tokens {
            if let Some(caps) = ATTR_PATTERN.captures(token) {
                let value = caps
                    .name("dq")
                    .or_else(|| caps.name("sq"))
                    .or_else(|| caps.name("bare"))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                result.path = Some(value);
                break;
            }
            if result.path.is_none() && looks_like_path(token) {
                result.path = Some(token.to_string());
            }
        }

        result
    }

    /// Extract a path from a first-line marker comment
    pub fn path_marker(line: &str) -> Option<String> {
        PATH_MARKER_PATTERN.captures(line).map(|caps| caps["path"].to_string())
    }

    /// Whether a token looks like a relative file path
    pub fn looks_like_path(token: &str) -> bool {
        PATH_LIKE_PATTERN.is_match(token)
    }

    fn is_known_language(token: &str) -> bool {
        // Tokens like `c++` or `objective-c` never reach here; these are the
        // ones that also match the path pattern.
        matches!(token.to_lowercase().as_str(), "vue.js" | "node.js" | "next.js" | "asp.net")
    }
}

/// Shell line normalisation used by the action parser and safety gate
pub mod shell {
    use super::*;

    /// Interactive prompt markers that models copy into shell blocks
    pub static PROMPT_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(?:PS(?: [^>]*)?>|\$|%|>)\s+").expect("Invalid regex pattern")
    });

    /// Leading `VAR=value` assignments
    pub static ENV_ASSIGN_PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"^(?:[A-Za-z_][A-Za-z0-9_]*=(?:"[^"]*"|'[^']*'|\S*)\s+)+"#)
            .expect("Invalid regex pattern")
    });

    const SHELL_LANGUAGES: &[&str] = &[
        "bash",
        "sh",
        "shell",
        "shellscript",
        "shell-session",
        "zsh",
        "fish",
        "console",
        "terminal",
        "powershell",
        "pwsh",
        "ps",
        "ps1",
        "cmd",
        "bat",
    ];

    /// Whether a fence language denotes shell commands
    pub fn is_shell_language(lang: &str) -> bool {
        SHELL_LANGUAGES.contains(&lang.to_lowercase().as_str())
    }

    /// Strip a leading prompt marker (`$ `, `> `, `% `, `PS> `)
    pub fn strip_prompt(line: &str) -> &str {
        let trimmed = line.trim_start();
        match PROMPT_PATTERN.find(trimmed) {
            Some(m) => &trimmed[m.end()..],
            None => trimmed,
        }
    }

    /// Strip leading environment assignments (`FOO=1 BAR=2 cmd` -> `cmd`)
    pub fn strip_env_assignments(segment: &str) -> &str {
        let trimmed = segment.trim_start();
        match ENV_ASSIGN_PATTERN.find(trimmed) {
            Some(m) => &trimmed[m.end()..],
            None => trimmed,
        }
    }

    /// Split a command line on `&&`, `||`, `;`, `|`, a background `&` and
    /// newlines, honouring quotes
    ///
    /// The `&` of a redirection (`2>&1`, `&> log`) does not split.
    pub fn split_segments(command: &str) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut quote: Option<char> = None;
        let mut chars = command.chars().peekable();

        while let Some(c) = chars.next() {
            match quote {
                Some(q) => {
                    current.push(c);
                    if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '\'' | '"' => {
                        quote = Some(c);
                        current.push(c);
                    }
                    '&' if chars.peek() == Some(&'&') => {
                        chars.next();
                        push_segment(&mut segments, &mut current);
                    }
                    '&' if current.ends_with(['>', '<']) || chars.peek() == Some(&'>') => current.push(c),
                    '&' => push_segment(&mut segments, &mut current),
                    '|' => {
                        if chars.peek() == Some(&'|') {
                            chars.next();
                        }
                        push_segment(&mut segments, &mut current);
                    }
                    ';' | '\n' => push_segment(&mut segments, &mut current),
                    _ => current.push(c),
                },
            }
        }
        push_segment(&mut segments, &mut current);
        segments
    }

    fn push_segment(segments: &mut Vec<String>, current: &mut String) {
        let segment = current.trim();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        current.clear();
    }

    /// Targets of output redirections outside quotes (`> out.txt`, `>> log`)
    ///
    /// File-descriptor duplications such as `2>&1` or `>&-` are not targets;
    /// `>&file` is.
    pub fn redirect_targets(command: &str) -> Vec<String> {
        let mut targets = Vec::new();
        let mut quote: Option<char> = None;
        let chars: Vec<char> = command.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if let Some(q) = quote {
                if c == q {
                    quote = None;
                }
                i += 1;
                continue;
            }
            match c {
                '\'' | '"' => quote = Some(c),
                '>' => {
                    let mut j = i + 1;
                    if j < chars.len() && chars[j] == '>' {
                        j += 1;
                    }
                    if j < chars.len() && chars[j] == '&' {
                        j += 1;
                        if j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '-') {
                            i = j + 1;
                            continue;
                        }
                    }
                    while j < chars.len() && chars[j].is_whitespace() {
                        j += 1;
                    }
                    let start = j;
                    while j < chars.len() && !chars[j].is_whitespace() && !";|&".contains(chars[j])
                    {
                        j += 1;
                    }
                    targets.push(chars[start..j].iter().collect());
                    i = j;
                    continue;
                }
                _ => {}
            }
            i += 1;
        }
        targets
    }

    /// Whether the command uses `$(...)` or backtick substitution outside single quotes
    pub fn has_substitution(command: &str) -> bool {
        let mut in_single = false;
        let mut prev = '\0';
        for c in command.chars() {
            match c {
                '\'' => in_single = !in_single,
                '`' if !in_single => return true,
                '(' if !in_single && prev == '$' => return true,
                _ => {}
            }
            prev = c;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_info_lang_path() {
        let info = fence::parse_info("rust:src/main.rs");
        assert_eq!(info.lang.as_deref(), Some("rust"));
        assert_eq!(info.path.as_deref(), Some("src/main.rs"));
    }

    #[test]
    fn test_fence_info_attributes_and_bare_paths() {
        let info = fence::parse_info(r#"typescript title="src/app.ts""#);
        assert_eq!(info.lang.as_deref(), Some("typescript"));
        assert_eq!(info.path.as_deref(), Some("src/app.ts"));

        let info = fence::parse_info("python app/models.py");
        assert_eq!(info.path.as_deref(), Some("app/models.py"));

        let info = fence::parse_info("python");
        assert_eq!(info.lang.as_deref(), Some("python"));
        assert!(info.path.is_none());

        let info = fence::parse_info("src/lib.rs");
        assert!(info.lang.is_none());
        assert_eq!(info.path.as_deref(), Some("src/lib.rs"));
    }

    #[test]
    fn test_path_marker() {
        assert_eq!(fence::path_marker("// filepath: src/a.ts"), Some("src/a.ts".to_string()));
        assert_eq!(fence::path_marker("# File: tools/run.py"), Some("tools/run.py".to_string()));
        assert_eq!(
            fence::path_marker("<!-- filepath: web/index.html -->"),
            Some("web/index.html".to_string())
        );
        assert_eq!(fence::path_marker("// just a comment"), None);
    }

    #[test]
    fn test_strip_prompt_and_env() {
        assert_eq!(shell::strip_prompt("$ npm test"), "npm test");
        assert_eq!(shell::strip_prompt("PS C:\\proj> dotnet build"), "dotnet build");
        assert_eq!(shell::strip_prompt("cargo check"), "cargo check");
        assert_eq!(shell::strip_env_assignments("RUST_LOG=debug cargo test"), "cargo test");
    }

    #[test]
    fn test_split_segments_respects_quotes() {
        let segments = shell::split_segments("cd web && npm run build | tee 'a|b'; echo done");
        assert_eq!(segments, vec!["cd web", "npm run build", "tee 'a|b'", "echo done"]);
    }

    #[test]
    fn test_split_segments_background_operator() {
        assert_eq!(shell::split_segments("npm test & rm -rf ~"), vec!["npm test", "rm -rf ~"]);
        assert_eq!(shell::split_segments("cargo build 2>&1 | tail"), vec!["cargo build 2>&1", "tail"]);
        assert_eq!(shell::split_segments("cargo build &> /dev/null"), vec!["cargo build &> /dev/null"]);
        assert_eq!(shell::split_segments("sleep 1 &"), vec!["sleep 1"]);
    }

    #[test]
    fn test_redirect_and_substitution() {
        assert_eq!(shell::redirect_targets("cargo build 2>&1"), Vec::<String>::new());
        assert_eq!(shell::redirect_targets("echo hi > out.txt"), vec!["out.txt"]);
        assert_eq!(shell::redirect_targets("echo '>' x"), Vec::<String>::new());
        assert_eq!(shell::redirect_targets("echo x >&notes.txt"), vec!["notes.txt"]);
        assert_eq!(shell::redirect_targets("echo x >&2 2>&-"), Vec::<String>::new());
        assert!(shell::has_substitution("echo $(whoami)"));
        assert!(!shell::has_substitution("echo '$(whoami)'"));
    }
}
