//! Recognized hook names

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Keys a module's table may register functions under; anything else is
/// ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookName {
    GetCommands,
    GetLanguageServers,
    GetPrefsSchema,
    OnBuildStarted,
    OnBuildFinished,
    OnBundleStarted,
    OnBundleFinished,
    OnTargetLaunched,
    OnTargetTerminated,
}

impl HookName {
    pub const ALL: [HookName; 9] = [
        HookName::GetCommands,
        HookName::GetLanguageServers,
        HookName::GetPrefsSchema,
        HookName::OnBuildStarted,
        HookName::OnBuildFinished,
        HookName::OnBundleStarted,
        HookName::OnBundleFinished,
        HookName::OnTargetLaunched,
        HookName::OnTargetTerminated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookName::GetCommands => "get_commands",
            HookName::GetLanguageServers => "get_language_servers",
            HookName::GetPrefsSchema => "get_prefs_schema",
            HookName::OnBuildStarted => "on_build_started",
            HookName::OnBuildFinished => "on_build_finished",
            HookName::OnBundleStarted => "on_bundle_started",
            HookName::OnBundleFinished => "on_bundle_finished",
            HookName::OnTargetLaunched => "on_target_launched",
            HookName::OnTargetTerminated => "on_target_terminated",
        }
    }

    /// `on_*` hooks react to editor events; the rest provide data
    pub fn is_lifecycle(&self) -> bool {
        self.as_str().starts_with("on_")
    }
}

impl FromStr for HookName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HookName::ALL
            .iter()
            .find(|hook| hook.as_str() == s)
            .copied()
            .ok_or(())
    }
}

impl fmt::Display for HookName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
