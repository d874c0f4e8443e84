//! skillgate analyze - Run the static safety analyzer on source files

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::Args;
use colored::Colorize;
use serde_json::json;
use walkdir::WalkDir;

use crate::analyzer::{ActiveCapabilities, AnalysisResult, StaticAnalyzer};
use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::core::Capability;
use crate::error::{Result, SgError};
use crate::pipeline::actions::active_capabilities;
use crate::skills::builtin_catalog;
use crate::storage::Manifest;

const SOURCE_EXTENSION: &str = "py";

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Source file, or a directory whose .py files are analyzed
    pub path: PathBuf,

    /// Capability the code would be granted (repeatable)
    #[arg(long = "capability", short = 'c', value_name = "TOKEN")]
    pub capabilities: Vec<String>,

    /// Check capability composition against the installed skills
    #[arg(long)]
    pub against_manifest: bool,
}

pub fn run(ctx: &AppContext, args: &AnalyzeArgs) -> Result<()> {
    let proposed = args
        .capabilities
        .iter()
        .map(|token| Capability::parse(token).map(|_| token.trim().to_string()))
        .collect::<Result<BTreeSet<String>>>()?;
    let active = if args.against_manifest {
        let manifest = Manifest::load_or_default(&ctx.root)?;
        active_capabilities(&manifest, &builtin_catalog(), &ctx.admin_store()?)?
    } else {
        ActiveCapabilities::new()
    };

    let files = source_files(&args.path);
    if files.is_empty() {
        return Err(SgError::NotFound(format!(
            "no .{SOURCE_EXTENSION} files under {}",
            args.path.display()
        )));
    }

    let analyzer = StaticAnalyzer::default();
    let results: Vec<(PathBuf, AnalysisResult)> = files
        .into_iter()
        .map(|file| {
            let result = analyzer.analyze_file(&file, &proposed, &active);
            (file, result)
        })
        .collect();
    let blocking: Vec<String> = results
        .iter()
        .flat_map(|(file, result)| {
            result
                .issue_messages()
                .into_iter()
                .map(move |issue| format!("{}: {issue}", file.display()))
        })
        .collect();

    if ctx.output_format.is_machine_readable() {
        if !blocking.is_empty() {
            return Err(SgError::Analysis(blocking));
        }
        let files: Vec<_> = results
            .iter()
            .map(|(file, result)| json!({ "file": file.display().to_string(), "result": result }))
            .collect();
        let mut response = robot_ok(json!({ "clean": true, "files": files }));
        response.warnings = results
            .iter()
            .flat_map(|(_, result)| result.warning_messages())
            .collect();
        return emit_robot(&response);
    }

    for (file, result) in &results {
        print_human(ctx, file, result);
    }
    if !blocking.is_empty() {
        return Err(SgError::Analysis(blocking));
    }
    Ok(())
}

/// `path` itself when it is a file, otherwise every `.py` file beneath it
/// in sorted order.
fn source_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|file| file.extension().is_some_and(|ext| ext == SOURCE_EXTENSION))
        .collect()
}

fn print_human(ctx: &AppContext, file: &Path, result: &AnalysisResult) {
    let colors = ctx.output_format.use_colors();
    let verdict = match (result.clean, colors) {
        (true, true) => "CLEAN".green().bold().to_string(),
        (false, true) => "BLOCKED".red().bold().to_string(),
        (true, false) => "CLEAN".to_string(),
        (false, false) => "BLOCKED".to_string(),
    };

    let mut layout = HumanLayout::new().plain(!colors);
    layout
        .title("Static analysis")
        .kv("File", &file.display().to_string())
        .kv("Verdict", &verdict)
        .kv("Summary", &result.summary());
    if !result.issues.is_empty() {
        layout.blank().section("Issues");
        for issue in result.issue_messages() {
            layout.bullet(&issue);
        }
    }
    if !result.warnings.is_empty() {
        layout.blank().section("Warnings");
        for warning in result.warning_messages() {
            layout.bullet(&warning);
        }
    }
    layout.blank();
    emit_human(layout);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn directories_yield_sorted_python_files() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("pkg")).unwrap();
        std::fs::write(temp.path().join("pkg/skill.py"), "x = 1\n").unwrap();
        std::fs::write(temp.path().join("a.py"), "y = 2\n").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "hi").unwrap();

        let files = source_files(temp.path());
        assert_eq!(files, [temp.path().join("a.py"), temp.path().join("pkg/skill.py")]);
    }

    #[test]
    fn a_single_file_is_taken_as_is() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("skill.txt");
        std::fs::write(&file, "x = 1\n").unwrap();
        assert_eq!(source_files(&file), [file]);
    }
}
