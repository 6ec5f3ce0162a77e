//! Manifest reconciliation
//!
//! Computes which per-platform digests a tag must reference after a build on
//! one machine, so that publishing never erases the images other machines
//! published for their architectures.

use crate::manifest::{Digest, ManifestEntry, ManifestSnapshot};
use crate::platform::{Platform, SupportedPlatforms};

/// Why an existing entry was left out of the publish set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Same platform as the fresh build.
    Superseded,
    /// Platform is not in the supported set.
    Unsupported,
    /// A previous entry already covers this platform.
    Duplicate,
}

/// The digests one publish must register under the target tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSet {
    built: Digest,
    local: Platform,
    retained: Vec<ManifestEntry>,
    dropped: Vec<(ManifestEntry, DropReason)>,
}

impl PublishSet {
    pub fn built(&self) -> &Digest {
        &self.built
    }

    pub fn local_platform(&self) -> &Platform {
        &self.local
    }

    /// Entries of other platforms carried over from the snapshot.
    pub fn retained(&self) -> &[ManifestEntry] {
        &self.retained
    }

    pub fn dropped(&self) -> &[(ManifestEntry, DropReason)] {
        &self.dropped
    }

    /// Fresh digest first, then the retained ones in snapshot order.
    pub fn digests(&self) -> Vec<Digest> {
        let mut digests = vec![self.built.clone()];
        for entry in &self.retained {
            if !digests.contains(&entry.digest) {
                digests.push(entry.digest.clone());
            }
        }
        digests
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        &self.built == digest || self.retained.iter().any(|e| &e.digest == digest)
    }
}

/// Merge a fresh build for `local` into the snapshot of the tag.
///
/// Existing entries survive only when their platform is supported and is not
/// the local one; the local platform is always represented by `built`.
pub fn reconcile(
    snapshot: &ManifestSnapshot,
    built: &Digest,
    local: &Platform,
    supported: &SupportedPlatforms,
) -> PublishSet {
    let mut retained: Vec<ManifestEntry> = Vec::new();
    let mut dropped = Vec::new();

    for entry in snapshot.entries() {
        let reason = if &entry.platform == local {
            Some(DropReason::Superseded)
        } else if !supported.contains(&entry.platform) {
            Some(DropReason::Unsupported)
        } else if retained.iter().any(|e| e.platform == entry.platform) {
            Some(DropReason::Duplicate)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                tracing::debug!(
                    "Dropping {} ({}): {:?}",
                    entry.digest,
                    entry.platform,
                    reason
                );
                dropped.push((entry.clone(), reason));
            }
            None => retained.push(entry.clone()),
        }
    }

    PublishSet {
        built: built.clone(),
        local: local.clone(),
        retained,
        dropped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(s: &str) -> Digest {
        Digest::parse(s).unwrap()
    }

    fn entry(platform: &str, d: &str) -> ManifestEntry {
        ManifestEntry::new(platform.parse().unwrap(), digest(d))
    }

    fn amd64_arm64() -> SupportedPlatforms {
        SupportedPlatforms::default()
    }

    fn sorted(mut digests: Vec<Digest>) -> Vec<Digest> {
        digests.sort();
        digests
    }

    #[test]
    fn test_first_publish() {
        let result = reconcile(
            &ManifestSnapshot::Absent,
            &digest("sha256:aaa"),
            &Platform::linux_amd64(),
            &amd64_arm64(),
        );

        assert_eq!(result.digests(), vec![digest("sha256:aaa")]);
        assert!(result.dropped().is_empty());
    }

    #[test]
    fn test_local_entry_superseded_other_kept() {
        let snapshot = ManifestSnapshot::Present(vec![
            entry("linux/amd64", "sha256:old"),
            entry("linux/arm64", "sha256:arm1"),
        ]);

        let result = reconcile(
            &snapshot,
            &digest("sha256:new"),
            &Platform::linux_amd64(),
            &amd64_arm64(),
        );

        assert_eq!(
            result.digests(),
            vec![digest("sha256:new"), digest("sha256:arm1")]
        );
        assert_eq!(
            result.dropped(),
            &[(entry("linux/amd64", "sha256:old"), DropReason::Superseded)]
        );
    }

    #[test]
    fn test_unsupported_platform_pruned() {
        let snapshot = ManifestSnapshot::Present(vec![
            entry("linux/amd64", "sha256:old"),
            entry("linux/riscv64", "sha256:stale"),
        ]);

        let result = reconcile(
            &snapshot,
            &digest("sha256:new"),
            &Platform::linux_amd64(),
            &amd64_arm64(),
        );

        assert_eq!(result.digests(), vec![digest("sha256:new")]);
        assert!(!result.contains(&digest("sha256:stale")));
        assert!(
            result
                .dropped()
                .iter()
                .any(|(e, r)| e.digest == digest("sha256:stale") && *r == DropReason::Unsupported)
        );
    }

    #[test]
    fn test_build_on_arm64_keeps_amd64() {
        let snapshot = ManifestSnapshot::Present(vec![
            entry("linux/amd64", "sha256:amd1"),
            entry("linux/arm64/v8", "sha256:armold"),
        ]);

        let result = reconcile(
            &snapshot,
            &digest("sha256:armnew"),
            &Platform::linux_arm64(),
            &amd64_arm64(),
        );

        assert_eq!(
            result.digests(),
            vec![digest("sha256:armnew"), digest("sha256:amd1")]
        );
    }

    #[test]
    fn test_assumed_amd64_single_manifest() {
        // A single manifest decodes as linux/amd64
        let snapshot = ManifestSnapshot::Present(vec![entry("linux/amd64", "sha256:single")]);

        let on_amd64 = reconcile(
            &snapshot,
            &digest("sha256:new"),
            &Platform::linux_amd64(),
            &amd64_arm64(),
        );
        assert_eq!(on_amd64.digests(), vec![digest("sha256:new")]);

        let on_arm64 = reconcile(
            &snapshot,
            &digest("sha256:new"),
            &Platform::linux_arm64(),
            &amd64_arm64(),
        );
        assert_eq!(
            on_arm64.digests(),
            vec![digest("sha256:new"), digest("sha256:single")]
        );
    }

    #[test]
    fn test_same_digest_as_built_is_not_duplicated() {
        let snapshot = ManifestSnapshot::Present(vec![
            entry("linux/amd64", "sha256:same"),
            entry("linux/arm64", "sha256:arm1"),
        ]);

        let result = reconcile(
            &snapshot,
            &digest("sha256:same"),
            &Platform::linux_amd64(),
            &amd64_arm64(),
        );

        assert_eq!(
            result.digests(),
            vec![digest("sha256:same"), digest("sha256:arm1")]
        );
    }

    #[test]
    fn test_one_digest_per_platform() {
        let snapshot = ManifestSnapshot::Present(vec![
            entry("linux/arm64", "sha256:arm1"),
            entry("linux/arm64", "sha256:arm2"),
        ]);

        let result = reconcile(
            &snapshot,
            &digest("sha256:new"),
            &Platform::linux_amd64(),
            &amd64_arm64(),
        );

        assert_eq!(
            result.digests(),
            vec![digest("sha256:new"), digest("sha256:arm1")]
        );
        assert!(result.digests().len() <= amd64_arm64().len());
    }

    #[test]
    fn test_unsupported_entries_do_not_affect_result() {
        let supported = amd64_arm64();
        let local = Platform::linux_amd64();
        let built = digest("sha256:new");

        let base = ManifestSnapshot::Present(vec![
            entry("linux/amd64", "sha256:old"),
            entry("linux/arm64", "sha256:arm1"),
        ]);
        let noisy = ManifestSnapshot::Present(vec![
            entry("unknown/unknown", "sha256:att"),
            entry("linux/amd64", "sha256:old"),
            entry("linux/s390x", "sha256:s390"),
            entry("linux/arm64", "sha256:arm1"),
        ]);

        assert_eq!(
            sorted(reconcile(&base, &built, &local, &supported).digests()),
            sorted(reconcile(&noisy, &built, &local, &supported).digests())
        );
    }

    #[test]
    fn test_properties_over_mixed_snapshots() {
        let supported =
            SupportedPlatforms::parse_list("linux/amd64,linux/arm64,linux/arm/v7").unwrap();
        let platforms = [
            "linux/amd64",
            "linux/arm64",
            "linux/arm/v7",
            "linux/riscv64",
            "linux/s390x",
        ];

        // Every subset of platforms, each with a distinct stale digest
        for mask in 0u32..(1 << platforms.len()) {
            let entries: Vec<ManifestEntry> = platforms
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(i, p)| entry(p, &format!("sha256:old{}", i)))
                .collect();
            let snapshot = ManifestSnapshot::Present(entries.clone());

            for local in supported.iter() {
                let built = digest("sha256:fresh");
                let result = reconcile(&snapshot, &built, local, &supported);

                // Freshness
                assert!(result.contains(&built));
                assert!(result.digests().len() <= supported.len());

                for e in &entries {
                    if !supported.contains(&e.platform) {
                        // Pruning
                        assert!(!result.contains(&e.digest));
                    } else if &e.platform == local {
                        // Supersession
                        assert!(!result.contains(&e.digest));
                    } else {
                        assert!(result.contains(&e.digest));
                    }
                }
            }
        }
    }
}
