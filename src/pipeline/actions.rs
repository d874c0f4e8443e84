//! Work performed before each forward transition.
//!
//! Every action returns the note for the history entry on success and a
//! typed error on failure; the orchestrator turns either into an
//! [`Outcome`](crate::pipeline::transition::Outcome).

use std::collections::BTreeSet;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::analyzer::{ActiveCapabilities, StaticAnalyzer};
use crate::collab::{CodeGenerator, Generation, SystemContext, interpret};
use crate::core::capability::Capability;
use crate::core::registry::SkillCatalog;
use crate::error::{Result, SgError};
use crate::pipeline::status::Status;
use crate::security::validate_identifier;
use crate::storage::{Manifest, ProposalRecord, ProposalStore};

/// Prefix of manifest modules that were installed by the pipeline.
pub const INSTALLED_MODULE_PREFIX: &str = "skills.";

/// `new → discovered`: required fields, token format and a path-safe slug.
pub fn validate(record: &ProposalRecord) -> Result<Option<String>> {
    let spec = &record.proposal;
    let missing = spec.missing_required();
    if !missing.is_empty() {
        return Err(SgError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }
    for token in &spec.capabilities {
        Capability::parse(token)?;
    }
    validate_identifier(&spec.slug)
        .map_err(|err| SgError::Validation(format!("Invalid slug: {err}")))?;
    validate_identifier(&spec.module_name())
        .map_err(|err| SgError::Validation(format!("Invalid module name: {err}")))?;
    Ok(None)
}

/// `discovered → implementation`: obtain source and write it under
/// `proposals/_implementations/`.
pub fn generate(
    record: &mut ProposalRecord,
    generator: &dyn CodeGenerator,
    system: &SystemContext,
    store: &ProposalStore,
) -> Result<Option<String>> {
    let raw = generator.generate(&record.proposal, system)?;
    let code = match interpret(&raw) {
        Generation::Infeasible(reason) => return Err(SgError::Infeasible(reason)),
        Generation::Source(code) if code.is_empty() => {
            return Err(SgError::Generation("generator returned no code".to_string()));
        }
        Generation::Source(code) => code,
    };

    let relative = store.implementation_path(record.slug());
    let mut contents = code;
    contents.push('\n');
    let path = store.sandbox().write(&relative, &contents)?;
    let digest = hex::encode(Sha256::digest(contents.as_bytes()));
    info!(slug = record.slug(), path = %path.display(), bytes = contents.len(), "implementation written");

    record.context.code_path = Some(path);
    Ok(Some(format!("sha256:{digest}")))
}

/// The implementation file for a record: the one generated this run, or the
/// one left on disk by an earlier run.
#[must_use]
pub fn implementation_file(record: &ProposalRecord, store: &ProposalStore) -> Option<PathBuf> {
    if let Some(path) = &record.context.code_path {
        return Some(path.clone());
    }
    let candidate = store.sandbox().root().join(store.implementation_path(record.slug()));
    candidate.is_file().then_some(candidate)
}

/// `implementation → agent-review`: static safety scan plus composition review.
pub fn analyze(
    record: &mut ProposalRecord,
    analyzer: &StaticAnalyzer,
    active: &ActiveCapabilities,
    store: &ProposalStore,
) -> Result<Option<String>> {
    let Some(path) = implementation_file(record, store) else {
        return Err(SgError::Analysis(vec![format!(
            "No implementation code found for '{}'",
            record.slug()
        )]));
    };
    let proposed: BTreeSet<String> = record.proposal.capabilities.iter().cloned().collect();
    let result = analyzer.analyze_file(&path, &proposed, active);

    for warning in &result.warnings {
        warn!(slug = record.slug(), %warning, "composition warning");
    }
    let summary = result.summary();
    let blocked = result.has_critical_issues();
    let issues = result.issue_messages();
    record.context.code_path = Some(path);
    record.context.analysis = Some(result);

    if blocked {
        return Err(SgError::Analysis(issues));
    }
    Ok(Some(summary))
}

/// Capabilities of every skill the manifest activates.
///
/// Catalogued entries report what their constructor declares. Installed
/// entries report the capabilities of the accepted proposal they came from.
pub fn active_capabilities(
    manifest: &Manifest,
    catalog: &SkillCatalog,
    store: &ProposalStore,
) -> Result<ActiveCapabilities> {
    let mut active = ActiveCapabilities::new();
    let mut accepted: Option<Vec<ProposalRecord>> = None;

    for entry in &manifest.skills {
        if let Some(catalogued) = catalog.lookup(&entry.module, &entry.class) {
            let skill = catalogued.build();
            let tokens = skill.capabilities().iter().map(ToString::to_string).collect();
            active.insert(skill.name().to_string(), tokens);
            continue;
        }

        let Some(module) = entry.module.strip_prefix(INSTALLED_MODULE_PREFIX) else {
            debug!(module = %entry.module, "manifest entry has no known capabilities");
            continue;
        };
        if accepted.is_none() {
            accepted = Some(store.list(Some(Status::Accepted))?);
        }
        let source = accepted
            .iter()
            .flatten()
            .find(|record| record.proposal.module_name() == module);
        match source {
            Some(record) => {
                active.insert(
                    module.to_string(),
                    record.proposal.capabilities.iter().cloned().collect(),
                );
            }
            None => debug!(%module, "no accepted proposal for installed module"),
        }
    }
    Ok(active)
}
