//! Turning resolved artifacts into download tasks

use aptsync_types::{
    Artifact, DownloadDecision, DownloadTask, FetchReason, IntegrityConflict, LocalFileState,
};
use std::collections::HashMap;

/// Deduplicated work list plus the declarations that disagreed
#[derive(Debug, Clone, Default)]
pub struct DownloadPlan {
    /// One task per destination, in first-declaration order
    pub tasks: Vec<DownloadTask>,
    pub conflicts: Vec<IntegrityConflict>,
}

impl DownloadPlan {
    #[must_use]
    pub fn to_fetch(&self) -> usize {
        self.tasks.iter().filter(|t| t.decision.is_fetch()).count()
    }

    #[must_use]
    pub fn to_skip(&self) -> usize {
        self.tasks.len() - self.to_fetch()
    }

    #[must_use]
    pub fn planned_bytes(&self) -> u64 {
        self.tasks.iter().map(DownloadTask::planned_bytes).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Decides, per destination, whether bytes must move
#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadPlanner {
    force_update: bool,
}

impl DownloadPlanner {
    #[must_use]
    pub fn new(force_update: bool) -> Self {
        Self { force_update }
    }

    /// Plan downloads for `artifacts` given what is on disk.
    ///
    /// `local` is keyed by artifact `rel_path`. The first declaration of a
    /// destination wins; a later one with another size or digest is reported
    /// as a conflict and dropped. Output order follows the input order, so
    /// the same input always yields the same plan.
    #[must_use]
    pub fn plan(
        &self,
        artifacts: impl IntoIterator<Item = Artifact>,
        local: &HashMap<String, LocalFileState>,
    ) -> DownloadPlan {
        let mut plan = DownloadPlan::default();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for artifact in artifacts {
            if let Some(&at) = seen.get(&artifact.rel_path) {
                let first = &plan.tasks[at].artifact;
                if let Some(message) = disagreement(first, &artifact) {
                    plan.conflicts.push(IntegrityConflict {
                        rel_path: artifact.rel_path.clone(),
                        first_owner: first.owner,
                        conflicting_owner: artifact.owner,
                        message,
                    });
                }
                continue;
            }

            let decision = self.decide(&artifact, local.get(&artifact.rel_path));
            seen.insert(artifact.rel_path.clone(), plan.tasks.len());
            plan.tasks.push(DownloadTask { artifact, decision });
        }
        plan
    }

    /// Size mismatch wins over everything but absence
    #[must_use]
    pub fn decide(&self, artifact: &Artifact, local: Option<&LocalFileState>) -> DownloadDecision {
        match local {
            None => DownloadDecision::Fetch(FetchReason::Absent),
            Some(state) if state.size != artifact.size => {
                DownloadDecision::Fetch(FetchReason::SizeMismatch {
                    local: state.size,
                    expected: artifact.size,
                })
            }
            Some(_) if self.force_update => DownloadDecision::Fetch(FetchReason::Forced),
            Some(_) => DownloadDecision::Skip,
        }
    }
}

fn disagreement(first: &Artifact, later: &Artifact) -> Option<String> {
    if first.size != later.size {
        return Some(format!(
            "declared size {} then {}",
            first.size, later.size
        ));
    }
    first
        .checksums
        .conflict_with(&later.checksums)
        .map(|(ours, theirs)| format!("declared {ours} then {theirs}"))
}
