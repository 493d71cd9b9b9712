//! Approval tier policy.
//!
//! Capabilities not listed here resolve to [`ApprovalTier::Individual`], so a
//! new or unknown tool is never auto-approved by accident. Always look up the
//! *mapped* capability id, never the raw LLM-facing name.

use tldw_agent_core::agent::AgentSettings;
use tldw_agent_core::session::ApprovalTier;

const TIERS: &[(&str, ApprovalTier)] = &[
    ("fs.list", ApprovalTier::Auto),
    ("fs.read", ApprovalTier::Auto),
    ("search.grep", ApprovalTier::Auto),
    ("search.files", ApprovalTier::Auto),
    ("git.status", ApprovalTier::Auto),
    ("git.diff", ApprovalTier::Auto),
    ("git.log", ApprovalTier::Auto),
    ("fs.write", ApprovalTier::Batch),
    ("fs.apply_patch", ApprovalTier::Batch),
    ("fs.mkdir", ApprovalTier::Batch),
    ("fs.delete", ApprovalTier::Batch),
    ("git.add", ApprovalTier::Batch),
    ("git.commit", ApprovalTier::Batch),
    ("exec.run", ApprovalTier::Individual),
];

/// Tier for a capability id, `Individual` when unlisted.
pub fn tier_for(capability: &str) -> ApprovalTier {
    TIERS
        .iter()
        .find(|(cap, _)| *cap == capability)
        .map(|(_, tier)| *tier)
        .unwrap_or(ApprovalTier::Individual)
}

/// Whether a call of this tier may run without asking.
pub fn should_auto_approve(tier: ApprovalTier, settings: &AgentSettings) -> bool {
    match tier {
        ApprovalTier::Auto => true,
        ApprovalTier::Batch => settings.auto_approve_writes,
        ApprovalTier::Individual => settings.auto_approve_exec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{catalog_names, map_tool_name};

    fn settings(writes: bool, exec: bool) -> AgentSettings {
        AgentSettings {
            auto_approve_writes: writes,
            auto_approve_exec: exec,
            ..Default::default()
        }
    }

    #[test]
    fn read_tools_are_auto() {
        assert_eq!(tier_for("fs.read"), ApprovalTier::Auto);
        assert_eq!(tier_for("git.diff"), ApprovalTier::Auto);
    }

    #[test]
    fn writes_are_batch_and_exec_is_individual() {
        assert_eq!(tier_for("fs.write"), ApprovalTier::Batch);
        assert_eq!(tier_for("git.commit"), ApprovalTier::Batch);
        assert_eq!(tier_for("exec.run"), ApprovalTier::Individual);
    }

    #[test]
    fn unknown_capability_fails_closed() {
        assert_eq!(tier_for("browser.open_tab"), ApprovalTier::Individual);
        assert_eq!(tier_for(map_tool_name("totally_new_tool")), ApprovalTier::Individual);
        assert_eq!(tier_for(""), ApprovalTier::Individual);
    }

    #[test]
    fn raw_llm_names_are_not_in_the_table() {
        // `fs_read` is only auto once mapped to `fs.read`
        assert_eq!(tier_for("fs_read"), ApprovalTier::Individual);
        assert_eq!(tier_for(map_tool_name("fs_read")), ApprovalTier::Auto);
    }

    #[test]
    fn every_catalog_tool_has_an_explicit_tier() {
        for (name, capability) in catalog_names() {
            assert!(
                TIERS.iter().any(|(cap, _)| *cap == capability),
                "{name} ({capability}) has no tier entry"
            );
        }
    }

    #[test]
    fn auto_tier_ignores_settings() {
        for (w, e) in [(false, false), (true, false), (false, true), (true, true)] {
            assert!(should_auto_approve(ApprovalTier::Auto, &settings(w, e)));
        }
    }

    #[test]
    fn batch_follows_write_flag() {
        assert!(!should_auto_approve(ApprovalTier::Batch, &settings(false, true)));
        assert!(should_auto_approve(ApprovalTier::Batch, &settings(true, false)));
    }

    #[test]
    fn individual_follows_exec_flag() {
        assert!(!should_auto_approve(ApprovalTier::Individual, &settings(true, false)));
        assert!(should_auto_approve(ApprovalTier::Individual, &settings(false, true)));
    }

    #[test]
    fn defaults_gate_everything_but_auto() {
        let defaults = AgentSettings::default();
        assert!(!should_auto_approve(ApprovalTier::Batch, &defaults));
        assert!(!should_auto_approve(ApprovalTier::Individual, &defaults));
    }
}
