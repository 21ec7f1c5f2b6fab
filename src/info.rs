//! The version record and its renderings

use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Write};

/// Version metadata of a checkout at the time it was collected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    /// Short hash of HEAD, or "unknown"
    pub commit: String,
    /// Current branch, or "unknown"
    pub branch: String,
    /// Nearest reachable tag, or "unknown"
    pub version: String,
    /// Commits since `version`, "0" when on the tag or untagged
    pub tag_distance: String,
    pub dirty: bool,
    /// Raw `git status --porcelain` listing
    pub dirty_files: String,
    #[serde(serialize_with = "serialize_joined")]
    pub origins: BTreeSet<String>,
    pub commit_date: String,
}

fn serialize_joined<S>(set: &BTreeSet<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&join(set))
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

impl VersionInfo {
    /// Remote URLs joined with commas
    pub fn origins_joined(&self) -> String {
        join(&self.origins)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// `KEY=value` pairs for build scripts
    ///
    /// `dirty_files` is left out since it spans several lines.
    pub fn env_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("GIT_COMMIT", self.commit.clone()),
            ("GIT_BRANCH", self.branch.clone()),
            ("VERSION", self.version.clone()),
            ("GIT_TAG_DISTANCE", self.tag_distance.clone()),
            ("BUILD_DIRTY", if self.dirty { "1" } else { "0" }.to_string()),
            ("GIT_ORIGIN", self.origins_joined()),
            ("GIT_COMMIT_DATE", self.commit_date.clone()),
        ]
    }

    pub fn write_env<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (key, value) in self.env_pairs() {
            writeln!(out, "{}={}", key, value)?;
        }
        Ok(())
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "commit: {}", self.commit)?;
        writeln!(f, "branch: {}", self.branch)?;
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "tag_distance: {}", self.tag_distance)?;
        writeln!(f, "dirty: {}", self.dirty)?;
        writeln!(f, "dirty_files:")?;
        for line in self.dirty_files.lines() {
            writeln!(f, "  {}", line)?;
        }
        writeln!(f, "origins: {}", self.origins_joined())?;
        writeln!(f, "commit_date: {}", self.commit_date)
    }
}
