use std::collections::BTreeMap;

use arbor_core::NormalizedPath;
use arbor_vfs::ServerHost;

use crate::ProjectName;

/// Process-wide budget for non-TypeScript bytes across all gated projects.
pub const DEFAULT_SIZE_BUDGET: u64 = 20 * 1024 * 1024;

/// Admission policy over the summed sizes of non-TypeScript files.
///
/// Each admitted project records the bytes it was charged; the total across
/// projects never exceeds the budget. The used total is recomputed from the
/// map on every call rather than kept as a running counter, which keeps the
/// bound trivially correct across create/reload/remove in any order.
#[derive(Debug)]
pub struct SizeLimit {
    budget: u64,
    accounted: BTreeMap<ProjectName, u64>,
}

impl SizeLimit {
    pub fn new(budget: u64) -> Self {
        Self { budget, accounted: BTreeMap::new() }
    }

    /// Decide whether `candidates` fit. On admission the project's
    /// contribution is recorded and `true` is returned; on refusal the
    /// project is recorded at zero and the caller disables its language
    /// service.
    ///
    /// A reload passes through here again, so a project that shrank can
    /// regain admission.
    pub fn admit(
        &mut self,
        name: &ProjectName,
        candidates: &[NormalizedPath],
        host: &dyn ServerHost,
    ) -> bool {
        // Reset before measuring so a reload is charged fresh.
        self.accounted.insert(name.clone(), 0);
        let used: u64 = self.accounted.values().sum();
        let available = self.budget.saturating_sub(used);

        let mut total: u64 = 0;
        for path in candidates {
            if path.has_typescript_extension() {
                continue;
            }
            total += host.file_size(path).unwrap_or(0);
            if total > available {
                tracing::info!(
                    project = %name,
                    total_bytes = total,
                    available_bytes = available,
                    "project exceeds the non-source size budget"
                );
                return false;
            }
        }

        self.accounted.insert(name.clone(), total);
        true
    }

    pub fn forget(&mut self, name: &ProjectName) {
        self.accounted.remove(name);
    }

    pub fn accounted_total(&self) -> u64 {
        self.accounted.values().sum()
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }
}

impl Default for SizeLimit {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE_BUDGET)
    }
}
