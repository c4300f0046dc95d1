use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding the crate's own Rust sources.
const SOURCE_ROOTS: [&str; 5] = ["population", "study", "src", "tests", "benches"];

// A source policy enforced on every Rust file of the crate.
struct Policy {
    pattern: &'static str,
    description: &'static str,
    advice: &'static str,
    skip_line: fn(&str) -> bool,
}

// Collects the lines of a single file that violate one policy.
struct PolicyCollector<'a> {
    policy: &'a Policy,
    violations: Vec<String>,
    file_path: PathBuf,
}

impl<'a> PolicyCollector<'a> {
    fn new(policy: &'a Policy, file_path: &Path) -> Self {
        Self {
            policy,
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.policy.description,
            file_name
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!("\n⚠️ {}\n", self.policy.advice));

        Some(error_msg)
    }
}

impl Sink for PolicyCollector<'_> {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if !(self.policy.skip_line)(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with("//")
}

// Underscore matches inside comments or string literals are not variable names.
fn skip_non_code(line: &str) -> bool {
    if is_comment(line) {
        return true;
    }
    line.split('"')
        .enumerate()
        .any(|(i, part)| i % 2 == 1 && part.contains('_'))
}

fn never_skip(_: &str) -> bool {
    false
}

const POLICIES: [Policy; 3] = [
    Policy {
        pattern: r"\b(_[a-zA-Z0-9_]+)\b",
        description: "underscore-prefixed variables",
        advice: "Underscore-prefixed variable names are not allowed. Use the variable or remove it.",
        skip_line: skip_non_code,
    },
    Policy {
        pattern: r"//.*(?:FIXED|CORRECTED|FIX|NEW|CHANGED|CHANGE|MODIFIED|UPDATED|UPDATE)",
        description: "forbidden comment patterns",
        advice: "Comments narrating edits (FIXED, NEW, CHANGED, UPDATED, ...) are not allowed. Remove them.",
        skip_line: never_skip,
    },
    Policy {
        pattern: r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        description: "#[allow(dead_code)] attributes",
        advice: "#[allow(dead_code)] is not allowed. Use the code or remove it.",
        skip_line: never_skip,
    },
];

fn rust_sources() -> impl Iterator<Item = PathBuf> {
    SOURCE_ROOTS.into_iter().flat_map(|root| {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
            .map(|e| e.into_path())
    })
}

fn scan(policy: &Policy) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(policy.pattern)?;
    let mut searcher = Searcher::new();

    for path in rust_sources() {
        let mut collector = PolicyCollector::new(policy, &path);
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    for policy in &POLICIES {
        if let Err(e) = scan(policy) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
