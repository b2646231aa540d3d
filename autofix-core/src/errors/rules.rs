//! Declarative error-pattern table
//!
//! Every entry is evaluated independently against the whole input. Patterns
//! use named capture groups which the generic extractor reads:
//! `msg` (required), `file`, `line`, `col`, `code`, `rule`, `severity`.
//! More specific rules come first: when two rules extract the same
//! identity, the earlier one wins deduplication.

use super::{ErrorKind, Severity};

/// How fields are pulled out of a pattern match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// Named capture groups only
    Captures,
    /// Named groups, with the file taken from the closest preceding
    /// unindented path line when the match carries none (ESLint "stylish")
    FileHeader,
}

/// One ecosystem-specific family of error patterns
#[derive(Debug)]
pub struct ErrorRule {
    pub name: &'static str,
    pub kind: ErrorKind,
    /// Used when the match has no `severity` group
    pub severity: Severity,
    pub framework: Option<&'static str>,
    pub patterns: &'static [&'static str],
    pub extractor: Extractor,
    /// Message template, `{msg}` is replaced by the captured message
    pub template: Option<&'static str>,
    pub suggestion: Option<&'static str>,
}

const fn rule(
    name: &'static str,
    kind: ErrorKind,
    framework: Option<&'static str>,
    patterns: &'static [&'static str],
) -> ErrorRule {
    ErrorRule {
        name,
        kind,
        severity: Severity::Error,
        framework,
        patterns,
        extractor: Extractor::Captures,
        template: None,
        suggestion: None,
    }
}

impl ErrorRule {
    const fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    const fn extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    const fn template(mut self, template: &'static str) -> Self {
        self.template = Some(template);
        self
    }

    const fn suggest(mut self, suggestion: &'static str) -> Self {
        self.suggestion = Some(suggestion);
        self
    }
}

/// Summary lines that contain error keywords but are not errors themselves
pub const NOISE: &[&str] = &[
    "aborting due to",
    "could not compile",
    "some errors have detailed explanations",
    "for more information about this error",
    "build failed, waiting for other jobs",
    "process didn't exit successfully",
    "a complete log of this run",
    "command failed with exit code",
    "found 0 errors",
];

/// Header line used by [`Extractor::FileHeader`]
pub const FILE_HEADER_PATTERN: &str = r"(?m)^(?P<file>(?:[A-Za-z]:)?[^\s:][^\s]*\.[A-Za-z0-9]+)\s*$";

/// Keywords that indicate a failure even when no rule matches
pub const INDICATOR_PATTERN: &str = r"(?i)\b(?:errors?|failed|failure|fatal|exception|panicked|traceback|warnings?|cannot find|not found|undefined|unresolved)\b|✘|══╡";

pub static RULES: &[ErrorRule] = &[
    // Rust
    rule(
        "rustc-unresolved-import",
        ErrorKind::MissingModule,
        Some("rust"),
        &[r"(?m)^(?P<severity>error)\[(?P<code>E0432|E0433|E0463)\]: (?P<msg>.+)\n\s*--> (?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+)"],
    ),
    rule(
        "rustc-syntax",
        ErrorKind::Syntax,
        Some("rust"),
        &[r"(?m)^(?P<severity>error): (?P<msg>(?:expected|unexpected|mismatched closing delimiter|this file contains an unclosed delimiter|unterminated).*)\n\s*--> (?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+)"],
    ),
    rule(
        "rustc-type",
        ErrorKind::TypeError,
        Some("rust"),
        &[r"(?m)^(?P<severity>error)\[(?P<code>E0308|E0277|E0599|E0061|E0382|E0499|E0502|E0425|E0412|E0369|E0560|E0609|E0614|E0618|E0106|E0107)\]: (?P<msg>.+)\n\s*--> (?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+)"],
    ),
    rule(
        "rustc-lint",
        ErrorKind::Lint,
        Some("rust"),
        &[r"(?m)^(?P<severity>warning|error): (?P<msg>.+)\n\s*--> (?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+)\n(?:[ \t0-9|].*\n|\n){0,15}?\s*= note: `?#\[(?:warn|deny)\((?P<rule>[\w:]+)\)\]`? (?:on by default|implied by)"],
    ),
    rule(
        "rustc",
        ErrorKind::Build,
        Some("rust"),
        &[r"(?m)^(?P<severity>error|warning)(?:\[(?P<code>E\d{4})\])?: (?P<msg>.+)\n\s*--> (?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+)"],
    ),
    rule(
        "rust-panic",
        ErrorKind::Runtime,
        Some("rust"),
        &[
            r"(?m)^thread '[^']*' panicked at (?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+):\n(?P<msg>.+)$",
            r"(?m)^thread '[^']*' panicked at '(?P<msg>.*)', (?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+)",
        ],
    ),
    rule("rust-test", ErrorKind::Test, Some("rust"), &[r"(?m)^---- (?P<msg>\S+) stdout ----$"])
        .template("test failed: {msg}"),
    // TypeScript
    rule(
        "tsc-missing-module",
        ErrorKind::MissingModule,
        Some("typescript"),
        &[
            r"(?m)^(?P<file>[^\s(:]+\.(?:ts|tsx|mts|cts|js|jsx|vue|svelte))\((?P<line>\d+),(?P<col>\d+)\): (?P<severity>error|warning) (?P<code>TS2307|TS2305|TS2792|TS7016): (?P<msg>.+)$",
            r"(?m)^(?P<file>[^\s:]+\.(?:ts|tsx|mts|cts|js|jsx|vue|svelte)):(?P<line>\d+):(?P<col>\d+) - (?P<severity>error|warning) (?P<code>TS2307|TS2305|TS2792|TS7016): (?P<msg>.+)$",
        ],
    )
    .suggest("Check the import path or install the missing package and its type declarations."),
    rule(
        "tsc-syntax",
        ErrorKind::Syntax,
        Some("typescript"),
        &[
            r"(?m)^(?P<file>[^\s(:]+\.(?:ts|tsx|mts|cts|js|jsx|vue|svelte))\((?P<line>\d+),(?P<col>\d+)\): (?P<severity>error) (?P<code>TS1005|TS1002|TS1003|TS1109|TS1128|TS1161|TS1381|TS1382|TS17002|TS17008): (?P<msg>.+)$",
            r"(?m)^(?P<file>[^\s:]+\.(?:ts|tsx|mts|cts|js|jsx|vue|svelte)):(?P<line>\d+):(?P<col>\d+) - (?P<severity>error) (?P<code>TS1005|TS1002|TS1003|TS1109|TS1128|TS1161|TS1381|TS1382|TS17002|TS17008): (?P<msg>.+)$",
        ],
    ),
    rule(
        "tsc",
        ErrorKind::TypeError,
        Some("typescript"),
        &[
            r"(?m)^(?P<file>[^\s(:]+\.(?:ts|tsx|mts|cts|js|jsx|vue|svelte))\((?P<line>\d+),(?P<col>\d+)\): (?P<severity>error|warning) (?P<code>TS\d+): (?P<msg>.+)$",
            r"(?m)^(?P<file>[^\s:]+\.(?:ts|tsx|mts|cts|js|jsx|vue|svelte)):(?P<line>\d+):(?P<col>\d+) - (?P<severity>error|warning) (?P<code>TS\d+): (?P<msg>.+)$",
        ],
    ),
    // JavaScript runtimes and bundlers
    rule(
        "node-missing-module",
        ErrorKind::MissingModule,
        Some("node"),
        &[r"(?m)^\s*(?:Error: )?(?P<msg>Cannot find module '[^']+')(?: from '(?P<file>[^']+)')?\s*$"],
    )
    .suggest("Install the package or fix the relative import path."),
    rule(
        "bundler-missing-module",
        ErrorKind::MissingModule,
        Some("webpack"),
        &[
            r"(?m)Module not found: (?:Error: )?(?P<msg>Can't resolve '[^']+')(?: in '(?P<file>[^']+)')?",
            r#"(?m)(?P<msg>(?:Rollup failed|Failed) to resolve import "[^"]+") from "(?P<file>[^"]+)""#,
        ],
    ),
    rule(
        "js-syntax",
        ErrorKind::Syntax,
        Some("node"),
        &[
            r"(?m)^SyntaxError: (?P<file>[^\s:]+): (?P<msg>.+?) \((?P<line>\d+):(?P<col>\d+)\)",
            r"(?m)^(?P<code>SyntaxError): (?P<msg>.+)\n\s+at (?:.*?\()?(?P<file>(?:[A-Za-z]:)?[^\s():]+):(?P<line>\d+):(?P<col>\d+)\)?",
        ],
    ),
    rule(
        "node-runtime",
        ErrorKind::Runtime,
        Some("node"),
        &[r"(?m)^(?:Uncaught )?(?P<code>TypeError|ReferenceError|RangeError|URIError|Error): (?P<msg>.+)\n\s+at (?:.*?\()?(?P<file>(?:[A-Za-z]:)?[^\s():]+):(?P<line>\d+):(?P<col>\d+)\)?"],
    ),
    rule(
        "esbuild",
        ErrorKind::Build,
        Some("esbuild"),
        &[r"(?m)^\s*(?:✘ )?\[ERROR\] (?P<msg>.+)\n\s*\n\s*(?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+):"],
    ),
    rule(
        "webpack",
        ErrorKind::Build,
        Some("webpack"),
        &[r"(?m)^ERROR in (?:\./)?(?P<file>\S+?)(?: (?P<line>\d+):(?P<col>\d+)(?:-\d+)?)?\n(?P<msg>.+)$"],
    ),
    rule(
        "eslint-stylish",
        ErrorKind::Lint,
        Some("eslint"),
        &[r"(?m)^\s+(?P<line>\d+):(?P<col>\d+)\s+(?P<severity>error|warning)\s+(?P<msg>.+?)\s{2,}(?P<rule>[\w@/-]+)\s*$"],
    )
    .extractor(Extractor::FileHeader),
    rule(
        "eslint-unix",
        ErrorKind::Lint,
        Some("eslint"),
        &[r"(?m)^(?P<file>[^\s:]+):(?P<line>\d+):(?P<col>\d+): (?P<msg>.+?) \[(?P<severity>Error|Warning)/(?P<rule>[\w@/-]+)\]$"],
    ),
    rule(
        "jest",
        ErrorKind::Test,
        Some("jest"),
        &[r"(?m)^\s*● (?P<msg>.+ › .+)$"],
    )
    .template("test failed: {msg}"),
    rule(
        "vitest",
        ErrorKind::Test,
        Some("vitest"),
        &[r"(?m)^\s*(?:×|✗|FAIL)\s+(?P<file>[^\s>]+\.(?:test|spec)\.[cm]?[jt]sx?) > (?P<msg>.+)$"],
    )
    .template("test failed: {msg}"),
    // React
    rule(
        "react-key",
        ErrorKind::Lint,
        Some("react"),
        &[r#"(?m)Warning: (?P<msg>Each child in a list should have a unique "key" prop)"#],
    )
    .severity(Severity::Warning)
    .suggest("Give every element rendered from a list a stable, unique `key` prop."),
    rule(
        "react-hooks",
        ErrorKind::Runtime,
        Some("react"),
        &[
            r"(?m)(?P<msg>Invalid hook call\. Hooks can only be called inside of the body of a function component)",
            r"(?m)(?P<msg>Rendered (?:more|fewer) hooks than (?:during the previous render|expected))",
        ],
    )
    .suggest("Call hooks unconditionally at the top level of a function component."),
    rule(
        "react-render-loop",
        ErrorKind::Runtime,
        Some("react"),
        &[r"(?m)(?P<msg>Too many re-renders\. React limits the number of renders to prevent an infinite loop)"],
    )
    .suggest("Move state updates out of the render path, into effects or event handlers."),
    rule(
        "react-hydration",
        ErrorKind::Runtime,
        Some("react"),
        &[r"(?m)(?P<msg>Hydration failed because .+?)\.?$"],
    ),
    // Python
    rule(
        "python-syntax",
        ErrorKind::Syntax,
        Some("python"),
        &[r#"(?m)^\s*File "(?P<file>[^"]+)", line (?P<line>\d+)[^\n]*\n(?:[ \t]+[^\n]*\n){0,2}(?P<code>SyntaxError|IndentationError|TabError): (?P<msg>.+)$"#],
    ),
    rule(
        "python-import",
        ErrorKind::MissingModule,
        Some("python"),
        &[r#"(?m)^\s*File "(?P<file>[^"]+)", line (?P<line>\d+)[^\n]*\n(?:[ \t]+[^\n]*\n){0,2}(?P<code>ModuleNotFoundError|ImportError): (?P<msg>.+)$"#],
    )
    .suggest("Install the missing package into the active environment or fix the import path."),
    rule(
        "python-type",
        ErrorKind::TypeError,
        Some("python"),
        &[r#"(?m)^\s*File "(?P<file>[^"]+)", line (?P<line>\d+)[^\n]*\n(?:[ \t]+[^\n]*\n){0,2}(?P<code>TypeError): (?P<msg>.+)$"#],
    ),
    rule(
        "python-runtime",
        ErrorKind::Runtime,
        Some("python"),
        &[r#"(?m)^\s*File "(?P<file>[^"]+)", line (?P<line>\d+)[^\n]*\n(?:[ \t]+[^\n]*\n){0,2}(?P<code>[A-Za-z_][\w.]*(?:Error|Exception)): (?P<msg>.+)$"#],
    ),
    rule(
        "mypy",
        ErrorKind::TypeError,
        Some("python"),
        &[r"(?m)^(?P<file>[^\s:]+\.pyi?):(?P<line>\d+):(?:(?P<col>\d+):)? (?P<severity>error|note): (?P<msg>.+?)(?:\s+\[(?P<code>[\w-]+)\])?$"],
    ),
    rule(
        "pylint",
        ErrorKind::Lint,
        Some("python"),
        &[r"(?m)^(?P<file>[^\s:]+\.py):(?P<line>\d+):(?P<col>\d+): (?P<code>[CRWEF]\d{4}): (?P<msg>.+?) \((?P<rule>[\w-]+)\)$"],
    )
    .severity(Severity::Warning),
    rule(
        "flake8",
        ErrorKind::Lint,
        Some("python"),
        &[r"(?m)^(?P<file>[^\s:]+\.py):(?P<line>\d+):(?P<col>\d+): (?P<code>[A-Z]+\d+) (?P<msg>.+)$"],
    )
    .severity(Severity::Warning),
    rule(
        "pytest",
        ErrorKind::Test,
        Some("pytest"),
        &[r"(?m)^FAILED (?P<file>[^\s:]+\.py)::(?P<msg>\S+(?: - .+)?)$"],
    )
    .template("test failed: {msg}"),
    rule(
        "pip",
        ErrorKind::MissingModule,
        Some("python"),
        &[r"(?m)^ERROR: (?P<msg>(?:Could not find a version that satisfies the requirement|No matching distribution found for) .+)$"],
    ),
    // Go
    rule(
        "go-missing-module",
        ErrorKind::MissingModule,
        Some("go"),
        &[r"(?m)^(?:(?:\./)?(?P<file>[^\s:]+\.go):(?P<line>\d+):(?P<col>\d+): )?(?P<msg>no required module provides package [^\s;]+|cannot find package [^\s;]+|package [^\s;]+ is not in (?:GOROOT|std)[^\n]*)"],
    )
    .suggest("Run `go get` for the package or fix the import path."),
    rule(
        "go-syntax",
        ErrorKind::Syntax,
        Some("go"),
        &[r"(?m)^(?:\./)?(?P<file>[^\s:]+\.go):(?P<line>\d+):(?P<col>\d+): (?P<msg>syntax error: .+)$"],
    ),
    rule(
        "go-type",
        ErrorKind::TypeError,
        Some("go"),
        &[r"(?m)^(?:\./)?(?P<file>[^\s:]+\.go):(?P<line>\d+):(?P<col>\d+): (?P<msg>(?:undefined|cannot use|too many|not enough|invalid operation|mismatched types|declared and not used|missing return|assignment mismatch)[^\n]*)$"],
    ),
    rule("go-test", ErrorKind::Test, Some("go"), &[r"(?m)^--- FAIL: (?P<msg>\S+)"])
        .template("test failed: {msg}"),
    rule(
        "go",
        ErrorKind::Build,
        Some("go"),
        &[r"(?m)^(?:\./)?(?P<file>[^\s:]+\.go):(?P<line>\d+)(?::(?P<col>\d+))?: (?P<msg>.+)$"],
    ),
    // C family and Swift
    rule(
        "c-missing-header",
        ErrorKind::MissingModule,
        Some("c"),
        &[r"(?m)^(?P<file>[^\s:]+\.(?:c|cc|cpp|cxx|h|hh|hpp|m|mm)):(?P<line>\d+):(?P<col>\d+): (?P<severity>fatal error|error): (?P<msg>'?[^':\n]+'? file not found|[^:\n]+: No such file or directory)$"],
    ),
    rule(
        "c-family",
        ErrorKind::Build,
        Some("c"),
        &[r"(?m)^(?P<file>[^\s:]+\.(?:c|cc|cpp|cxx|h|hh|hpp|m|mm|swift)):(?P<line>\d+):(?P<col>\d+): (?P<severity>fatal error|error|warning): (?P<msg>.+)$"],
    ),
    // JVM and .NET
    rule(
        "javac-missing-package",
        ErrorKind::MissingModule,
        Some("java"),
        &[r"(?m)^(?P<file>[^\s:]+\.java):(?P<line>\d+): (?P<severity>error): (?P<msg>package \S+ does not exist)$"],
    ),
    rule(
        "javac",
        ErrorKind::Build,
        Some("java"),
        &[
            r"(?m)^(?P<file>[^\s:]+\.java):(?P<line>\d+): (?P<severity>error|warning): (?P<msg>.+)$",
            r"(?m)^\[ERROR\] (?P<file>[^\s:\[]+\.(?:java|kt)):\[(?P<line>\d+),(?P<col>\d+)\] (?P<msg>.+)$",
        ],
    ),
    rule(
        "kotlin",
        ErrorKind::Build,
        Some("kotlin"),
        &[
            r"(?m)^(?P<severity>e|w): (?P<file>[^\s:]+\.kts?): \((?P<line>\d+), (?P<col>\d+)\): (?P<msg>.+)$",
            r"(?m)^(?P<severity>e|w): file://(?P<file>[^\s:]+\.kts?):(?P<line>\d+):(?P<col>\d+) (?P<msg>.+)$",
        ],
    ),
    rule(
        "csharp-missing-type",
        ErrorKind::MissingModule,
        Some("csharp"),
        &[r"(?m)^(?P<file>[^\s(]+\.cs)\((?P<line>\d+),(?P<col>\d+)\): (?P<severity>error) (?P<code>CS0246|CS0234): (?P<msg>.+?)(?: \[[^\]]+\])?$"],
    ),
    rule(
        "csharp",
        ErrorKind::Build,
        Some("csharp"),
        &[r"(?m)^(?P<file>[^\s(]+\.cs)\((?P<line>\d+),(?P<col>\d+)\): (?P<severity>error|warning) (?P<code>CS\d+): (?P<msg>.+?)(?: \[[^\]]+\])?$"],
    ),
    // Dart and Flutter
    rule(
        "dart-missing-package",
        ErrorKind::MissingModule,
        Some("flutter"),
        &[r"(?m)^(?:(?P<file>[^\s:]+\.dart):(?P<line>\d+):(?P<col>\d+): )?Error: (?P<msg>Couldn't resolve the package '[^']+'.*|Error when reading '[^']+': No such file or directory)$"],
    )
    .suggest("Add the package to pubspec.yaml and run `flutter pub get`."),
    rule(
        "dart-analyzer-error",
        ErrorKind::TypeError,
        Some("flutter"),
        &[
            r"(?m)^\s*(?P<severity>error) [•-] (?P<msg>.+?) [•-] (?P<file>[^\s:]+\.dart):(?P<line>\d+):(?P<col>\d+) [•-] (?P<rule>\w+)$",
            r"(?m)^\s*(?P<severity>error) - (?P<file>[^\s:]+\.dart):(?P<line>\d+):(?P<col>\d+) - (?P<msg>.+?) - (?P<rule>\w+)$",
        ],
    ),
    rule(
        "dart-analyzer-lint",
        ErrorKind::Lint,
        Some("flutter"),
        &[
            r"(?m)^\s*(?P<severity>warning|info) [•-] (?P<msg>.+?) [•-] (?P<file>[^\s:]+\.dart):(?P<line>\d+):(?P<col>\d+) [•-] (?P<rule>\w+)$",
            r"(?m)^\s*(?P<severity>warning|info) - (?P<file>[^\s:]+\.dart):(?P<line>\d+):(?P<col>\d+) - (?P<msg>.+?) - (?P<rule>\w+)$",
        ],
    ),
    rule(
        "dart-compile",
        ErrorKind::Build,
        Some("flutter"),
        &[r"(?m)^(?P<file>[^\s:]+\.dart):(?P<line>\d+):(?P<col>\d+): (?P<severity>Error|Warning): (?P<msg>.+)$"],
    ),
    rule(
        "flutter-overflow",
        ErrorKind::Runtime,
        Some("flutter"),
        &[r"(?m)(?P<msg>A Render\w+ overflowed by [\d.]+ pixels on the (?:right|left|bottom|top))"],
    )
    .suggest("Wrap the overflowing child in Expanded or Flexible, or make the parent scrollable."),
    rule(
        "flutter-exception",
        ErrorKind::Runtime,
        Some("flutter"),
        &[
            r"(?m)^══╡ EXCEPTION CAUGHT BY (?P<rule>[A-Z ]+?) ╞═*\n(?P<msg>.+)$",
            r"(?m)(?P<msg>setState\(\) called after dispose\(\)[^\n]*)",
        ],
    ),
    // PHP and Ruby
    rule(
        "php-parse",
        ErrorKind::Syntax,
        Some("php"),
        &[r"(?m)^(?:PHP )?Parse error: (?P<msg>.+?) in (?P<file>\S+\.php) on line (?P<line>\d+)"],
    ),
    rule(
        "php-fatal",
        ErrorKind::Runtime,
        Some("php"),
        &[r"(?m)^(?:PHP )?(?:Fatal error|Uncaught \w+): (?P<msg>.+?) in (?P<file>\S+\.php)(?: on line |:)(?P<line>\d+)"],
    ),
    rule(
        "ruby-load",
        ErrorKind::MissingModule,
        Some("ruby"),
        &[r"(?m)^(?P<file>[^\s:]+\.rb):(?P<line>\d+):in [^\n]*?: (?P<msg>cannot load such file -- \S+) \((?P<code>LoadError)\)$"],
    ),
    rule(
        "ruby",
        ErrorKind::Runtime,
        Some("ruby"),
        &[r"(?m)^(?P<file>[^\s:]+\.rb):(?P<line>\d+):in [^\n]*?: (?P<msg>.+?) \((?P<code>\w+(?:Error|Exception))\)$"],
    ),
    // Package managers and build drivers
    rule(
        "npm",
        ErrorKind::Build,
        Some("npm"),
        &[r"(?m)^npm (?:ERR!|error) (?P<msg>(?:[Mm]issing script: .+|ERESOLVE.*|Could not resolve dependency:.*))$"],
    ),
    rule("make", ErrorKind::Build, Some("make"), &[r"(?m)^make(?:\[\d+\])?: \*\*\* (?P<msg>.+)$"]),
    // Fallback: an explicit error line with nothing else to go on
    rule(
        "generic",
        ErrorKind::Other,
        None,
        &[r"(?m)^(?:error|ERROR|Error)(?:\[(?P<code>[\w-]+)\])?:\s+(?P<msg>.+)$"],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use std::collections::HashSet;

    #[test]
    fn test_all_patterns_compile_with_msg_group() {
        for rule in RULES {
            for pattern in rule.patterns {
                let re = Regex::new(pattern)
                    .unwrap_or_else(|e| panic!("rule {} has invalid pattern: {}", rule.name, e));
                assert!(
                    re.capture_names().flatten().any(|n| n == "msg"),
                    "rule {} is missing a msg group",
                    rule.name
                );
            }
        }
        Regex::new(FILE_HEADER_PATTERN).unwrap();
        Regex::new(INDICATOR_PATTERN).unwrap();
    }

    #[test]
    fn test_rule_names_are_unique() {
        let mut seen = HashSet::new();
        for rule in RULES {
            assert!(seen.insert(rule.name), "duplicate rule name {}", rule.name);
        }
    }
}
