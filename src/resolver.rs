//! Package compatibility resolution.
//!
//! Looks up both packages, evaluates the full cross-product of their
//! declared licenses against the stored matrix, and aggregates with an
//! optimistic union: the packages are compatible if ANY license pair is.
//! The per-pair results are preserved so callers wanting stricter
//! all-pairs semantics can re-aggregate.

use std::sync::Arc;

use tracing::{debug, info};

use crate::model::{
    CompatibilityVerdict, LicensePairCheck, PackageInfo, PackageResolution,
};
use crate::stores::{CompatibilityStore, PackageStore};
use crate::types::LicenseerError;

/// Resolves two package names to a structured compatibility verdict.
pub struct CompatibilityResolver {
    packages: Arc<dyn PackageStore>,
    compatibility: Arc<dyn CompatibilityStore>,
}

impl CompatibilityResolver {
    pub fn new(
        packages: Arc<dyn PackageStore>,
        compatibility: Arc<dyn CompatibilityStore>,
    ) -> Self {
        Self {
            packages,
            compatibility,
        }
    }

    /// Resolve both names and evaluate the license cross-product.
    ///
    /// A missing package is data, reported as [`PackageResolution::NotFound`]
    /// with the missing names in query order. Store errors propagate; there
    /// are no retries at this layer.
    pub async fn resolve_packages(
        &self,
        name1: &str,
        name2: &str,
    ) -> Result<PackageResolution, LicenseerError> {
        let package1 = self.packages.get_package(name1).await?;
        let package2 = self.packages.get_package(name2).await?;

        let (package1, package2) = match (package1, package2) {
            (Some(p1), Some(p2)) => (p1, p2),
            (found1, found2) => {
                let mut missing = Vec::new();
                if found1.is_none() {
                    missing.push(name1.to_string());
                }
                if found2.is_none() {
                    missing.push(name2.to_string());
                }
                info!(missing = ?missing, "package lookup incomplete");
                return Ok(PackageResolution::NotFound {
                    missing,
                    found: found1.or(found2),
                });
            }
        };

        let verdict = self.check_pair(package1, package2).await?;
        Ok(PackageResolution::Resolved(verdict))
    }

    /// Evaluate the cross-product of two packages' declared licenses.
    ///
    /// Packages with no declared licenses yield an empty cross-product,
    /// which the union aggregates to incompatible.
    pub async fn check_pair(
        &self,
        package1: PackageInfo,
        package2: PackageInfo,
    ) -> Result<CompatibilityVerdict, LicenseerError> {
        let mut pairs = Vec::with_capacity(package1.licenses.len() * package2.licenses.len());
        for lic1 in &package1.licenses {
            for lic2 in &package2.licenses {
                let is_compatible = self
                    .compatibility
                    .get_compatibility(&lic1.spdx_id, &lic2.spdx_id)
                    .await?
                    // Absent matrix entries count as incompatible, same as
                    // a stored No.
                    .unwrap_or(false);
                pairs.push(LicensePairCheck {
                    license1: lic1.spdx_id.clone(),
                    license2: lic2.spdx_id.clone(),
                    is_compatible,
                });
            }
        }

        let overall_compatible = pairs.iter().any(|pair| pair.is_compatible);
        debug!(
            package1 = %package1.package.name,
            package2 = %package2.package.name,
            pairs = pairs.len(),
            overall_compatible,
            "compatibility cross-product evaluated"
        );

        Ok(CompatibilityVerdict {
            package1,
            package2,
            pairs,
            overall_compatible,
        })
    }
}
