//! What generated skill code may not touch.

use std::collections::BTreeSet;

pub const FORBIDDEN_MODULES: &[&str] = &[
    "os",
    "sys",
    "subprocess",
    "shutil",
    "socket",
    "http",
    "urllib",
    "requests",
    "httpx",
    "importlib",
    "ctypes",
    "multiprocessing",
    "threading",
    "signal",
    "pathlib",
    "tempfile",
    "glob",
    "fnmatch",
    "io",
    "pickle",
    "shelve",
    "marshal",
    "code",
    "codeop",
    "compileall",
    "py_compile",
];

pub const FORBIDDEN_BUILTINS: &[&str] = &[
    "eval",
    "exec",
    "compile",
    "__import__",
    "open",
    "globals",
    "locals",
    "vars",
    "dir",
    "getattr",
    "setattr",
    "delattr",
    "breakpoint",
    "exit",
    "quit",
];

/// Substrings that mark a string literal as smuggling code execution.
pub const SUSPICIOUS_PATTERNS: &[&str] = &["__import__", "eval(", "exec("];

/// A capability combination worth a warning, with the hazard it creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensitivePair {
    pub first: String,
    pub second: String,
    pub hazard: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyPolicy {
    pub forbidden_modules: BTreeSet<String>,
    pub forbidden_builtins: BTreeSet<String>,
    pub suspicious_patterns: Vec<String>,
    pub sensitive_pairs: Vec<SensitivePair>,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            forbidden_modules: FORBIDDEN_MODULES.iter().map(|m| (*m).to_string()).collect(),
            forbidden_builtins: FORBIDDEN_BUILTINS.iter().map(|b| (*b).to_string()).collect(),
            suspicious_patterns: SUSPICIOUS_PATTERNS.iter().map(|p| (*p).to_string()).collect(),
            sensitive_pairs: vec![SensitivePair {
                first: "user:input".to_string(),
                second: "memory:write".to_string(),
                hazard: "can write arbitrary data to memory from user input".to_string(),
            }],
        }
    }
}

impl SafetyPolicy {
    /// Whether `module` (dotted or not) falls under a forbidden top-level package.
    #[must_use]
    pub fn forbids_module(&self, module: &str) -> bool {
        let top = module.trim_start_matches('.').split('.').next().unwrap_or_default();
        self.forbidden_modules.contains(top)
    }

    #[must_use]
    pub fn forbids_call(&self, name: &str) -> bool {
        self.forbidden_builtins.contains(name)
    }

    #[must_use]
    pub fn suspicious(&self, literal: &str) -> bool {
        self.suspicious_patterns.iter().any(|p| literal.contains(p.as_str()))
    }
}
