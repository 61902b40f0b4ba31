use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding the crate's own Rust sources.
const SOURCE_DIRS: [&str; 4] = ["tobit", "src", "tests", "benches"];

/// One source lint: a line regex plus a filter that decides whether a matching
/// line is really a violation.
struct Rule {
    name: &'static str,
    pattern: &'static str,
    advice: &'static str,
    accept: fn(&str) -> bool,
}

// Collects the violating lines of a single file.
struct LineCollector {
    accept: fn(&str) -> bool,
    violations: Vec<String>,
}

impl Sink for LineCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if (self.accept)(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn is_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("//") || trimmed.contains("/*")
}

fn is_doc_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("///") || trimmed.starts_with("//!")
}

// Text of a line comment with its leading slashes and bang removed.
fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    trimmed
        .strip_prefix("//")
        .map(|rest| rest.trim_start_matches(['/', '!']).trim())
}

// Underscore-prefixed identifiers in code, ignoring comments and string literals.
fn underscore_binding(line: &str) -> bool {
    if is_comment(line) {
        return false;
    }
    let inside_quotes = line
        .split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'));
    !inside_quotes
}

fn forbidden_word(line: &str) -> bool {
    is_comment(line)
}

// Bold markers are allowed in doc comments only.
fn stars_outside_docs(line: &str) -> bool {
    !is_doc_comment(line)
}

fn shouting_comment(line: &str) -> bool {
    let Some(text) = comment_text(line) else {
        return false;
    };
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    !letters.is_empty() && letters.iter().all(|c| c.is_uppercase())
}

fn always(line: &str) -> bool {
    !line.is_empty()
}

const RULES: [Rule; 5] = [
    Rule {
        name: "underscore-prefixed identifiers",
        pattern: r"\b(_[a-zA-Z0-9_]+)\b",
        advice: "Either use the binding (removing the underscore) or remove it completely.",
        accept: underscore_binding,
    },
    Rule {
        name: "forbidden comment words",
        pattern: r"(//|/\*).*(?:FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE)",
        advice: "Comments describe the code as it is, not its edit history.",
        accept: forbidden_word,
    },
    Rule {
        name: "'**' in non-doc comments",
        pattern: r"(//|/\*).*\*\*",
        advice: "Emphasis markers belong in doc comments only.",
        accept: stars_outside_docs,
    },
    Rule {
        name: "all-uppercase comments",
        pattern: r"//.*",
        advice: "Write comments in sentence case.",
        accept: shouting_comment,
    },
    Rule {
        name: "#[allow(dead_code)] attributes",
        pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        advice: "Either use the code (removing the attribute) or remove it completely.",
        accept: always,
    },
];

fn rust_sources() -> Vec<PathBuf> {
    SOURCE_DIRS
        .iter()
        .flat_map(|dir| WalkDir::new(dir).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
        .collect()
}

fn check_file(rule: &Rule, path: &Path, searcher: &mut Searcher) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern)?;
    let mut collector = LineCollector {
        accept: rule.accept,
        violations: Vec::new(),
    };
    searcher.search_path(&matcher, path, &mut collector)?;

    if collector.violations.is_empty() {
        return Ok(());
    }
    let mut error_msg = format!(
        "\n❌ ERROR: Found {} {} in {}:\n",
        collector.violations.len(),
        rule.name,
        path.display()
    );
    for violation in &collector.violations {
        error_msg.push_str(&format!("   {violation}\n"));
    }
    error_msg.push_str(&format!("\n⚠️ {} are not allowed in this project.\n", rule.name));
    error_msg.push_str(&format!("   {}\n", rule.advice));
    Err(error_msg.into())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    let mut searcher = Searcher::new();
    for path in rust_sources() {
        for rule in &RULES {
            if let Err(e) = check_file(rule, &path, &mut searcher) {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
    }
}
