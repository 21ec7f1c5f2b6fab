//! Collect version metadata from a git checkout

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;

use crate::config::Config;
use crate::error::QueryError;
use crate::info::VersionInfo;
use crate::query::{GitCli, QueryRunner};
use crate::verbosity::Verbosity;

/// Placeholder for values git could not tell us
pub const UNKNOWN: &str = "unknown";

/// What `rev-parse --abbrev-ref HEAD` prints when no branch is checked out
const DETACHED_HEAD: &str = "HEAD";

/// strftime layout of the commit date, shared by git and the epoch override
const DATE_LAYOUT: &str = "%d/%m/%Y-%H:%M:%S";

/// Fields of [`VersionInfo`] that are backed by a git query
///
/// `dirty` is absent: its queries answer through the exit status itself,
/// see [`VersionInfoCollector::is_dirty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Commit,
    DirtyFiles,
    Branch,
    Version,
    TagDistance,
    CommitDate,
    Origins,
}

/// What to do when a field's query exits non-zero or reports no value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Substitute this value and carry on
    Sentinel(&'static str),
    /// Abort the whole collection
    Fatal,
}

/// Per-field failure policy
///
/// Absence of a commit, branch, tag or remote is normal for young or
/// detached checkouts. Status and log must work on any valid repository,
/// so their failure means the directory is not one.
pub fn failure_policy(field: Field) -> FailurePolicy {
    match field {
        Field::Commit | Field::Branch | Field::Version => FailurePolicy::Sentinel(UNKNOWN),
        Field::TagDistance => FailurePolicy::Sentinel("0"),
        Field::Origins => FailurePolicy::Sentinel(""),
        Field::DirtyFiles | Field::CommitDate => FailurePolicy::Fatal,
    }
}

/// Collect version metadata for the checkout containing `source_dir`
pub fn collect(source_dir: &Path, config: Config, verbosity: Verbosity) -> Result<VersionInfo> {
    let runner = GitCli::new(source_dir, verbosity);
    VersionInfoCollector::new(runner, config, verbosity).collect()
}

/// Runs the fixed sequence of git queries and folds them into a [`VersionInfo`]
pub struct VersionInfoCollector<R> {
    runner: R,
    config: Config,
    verbosity: Verbosity,
}

impl<R: QueryRunner> VersionInfoCollector<R> {
    pub fn new(runner: R, config: Config, verbosity: Verbosity) -> Self {
        Self {
            runner,
            config,
            verbosity,
        }
    }

    pub fn collect(&self) -> Result<VersionInfo> {
        let short = format!("--short={}", self.config.hash_length);
        let commit = self.resolve(Field::Commit, &["rev-parse", &short, "HEAD"])?;

        // Status first: outside a repository it fails with a plain
        // "not a git repository", where `git diff` dumps its usage text
        let dirty_files = self.resolve(Field::DirtyFiles, &["status", "--porcelain"])?;
        let dirty = self.is_dirty()?;

        let branch = match &self.config.branch_override {
            Some(branch) => {
                self.verbosity.info(&format!("Using branch override: {}", branch));
                branch.clone()
            }
            None => self.current_branch()?,
        };

        let version = self.resolve(Field::Version, &["describe", "--tags", "--abbrev=0"])?;
        let tag_distance = match self.query(Field::TagDistance, &["describe", "--tags"])? {
            Some(described) => parse_tag_distance(&described, &version),
            None => fallback(Field::TagDistance),
        };

        let commit_date = match self.config.source_date_epoch {
            Some(epoch) => {
                self.verbosity.info("Using SOURCE_DATE_EPOCH as commit date");
                epoch.format(DATE_LAYOUT).to_string()
            }
            None => {
                let date = format!("--date=format-local:{}", DATE_LAYOUT);
                self.resolve(Field::CommitDate, &["log", "-1", "--format=%cd", &date])?
            }
        };

        let remotes = self.resolve(Field::Origins, &["remote", "-v"])?;
        let origins = parse_remotes(&remotes);

        Ok(VersionInfo {
            commit,
            branch,
            version,
            tag_distance,
            dirty,
            dirty_files,
            origins,
            commit_date,
        })
    }

    /// Run a query and return its stdout
    ///
    /// A non-zero exit yields `Ok(None)` when the field has a sentinel and an
    /// error when the field is fatal.
    fn query(&self, field: Field, args: &[&str]) -> Result<Option<String>, QueryError> {
        let output = self.runner.run(args)?;
        if output.success() {
            return Ok(Some(output.stdout));
        }

        match failure_policy(field) {
            FailurePolicy::Sentinel(value) => {
                self.verbosity.info(&format!(
                    "git {} failed, using {:?} for {:?}",
                    args.join(" "),
                    value,
                    field
                ));
                Ok(None)
            }
            FailurePolicy::Fatal => Err(QueryError::Failed {
                args: args.join(" "),
                status: output.status,
                stderr: output.stderr,
            }),
        }
    }

    /// Like [`Self::query`], with the sentinel substituted
    fn resolve(&self, field: Field, args: &[&str]) -> Result<String, QueryError> {
        Ok(self.query(field, args)?.unwrap_or_else(|| fallback(field)))
    }

    /// Branch name, with a detached HEAD reported like a failed query
    fn current_branch(&self) -> Result<String, QueryError> {
        let branch = self.resolve(Field::Branch, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        if branch != DETACHED_HEAD {
            return Ok(branch);
        }

        let value = fallback(Field::Branch);
        self.verbosity.info(&format!(
            "HEAD is detached, using {:?} for {:?}",
            value,
            Field::Branch
        ));
        Ok(value)
    }

    /// Uncommitted changes in either the index or the working tree
    fn is_dirty(&self) -> Result<bool, QueryError> {
        let unstaged = self.diff_quiet(&["diff", "--quiet"])?;
        let staged = self.diff_quiet(&["diff", "--cached", "--quiet"])?;
        Ok(unstaged || staged)
    }

    /// `git diff --quiet` signals through its exit status: 0 clean, 1 dirty
    fn diff_quiet(&self, args: &[&str]) -> Result<bool, QueryError> {
        let output = self.runner.run(args)?;
        match output.status {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            status => Err(QueryError::UnexpectedStatus {
                args: args.join(" "),
                status,
                // Misuse prints the whole usage text, the first line says why
                stderr: output.stderr.lines().next().unwrap_or_default().to_string(),
            }),
        }
    }
}

fn fallback(field: Field) -> String {
    match failure_policy(field) {
        FailurePolicy::Sentinel(value) => value.to_string(),
        FailurePolicy::Fatal => String::new(),
    }
}

/// Extract the commit count from `git describe --tags` output
///
/// `v1.2.0-3-gdeadbeef` gives "3"; a bare tag (HEAD is tagged) gives "0".
/// The known tag is stripped first so hyphens inside tag names are not
/// mistaken for the separator.
fn parse_tag_distance(described: &str, tag: &str) -> String {
    let suffix = described.strip_prefix(tag).unwrap_or(described);
    suffix
        .split('-')
        .nth(1)
        .filter(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or("0")
        .to_string()
}

/// Collect the distinct URLs from `git remote -v` output
///
/// Lines look like `origin\thttps://host/repo.git (fetch)`.
fn parse_remotes(listing: &str) -> BTreeSet<String> {
    listing
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let (_name, destination) = line.split_once('\t')?;
            let url = destination
                .rsplit_once(' ')
                .map_or(destination, |(url, _direction)| url);
            Some(url.to_string()).filter(|url| !url.is_empty())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryOutput;
    use chrono::DateTime;
    use std::cell::RefCell;
    use std::collections::HashMap;

    const LOG_ARGS: &str = "log -1 --format=%cd --date=format-local:%d/%m/%Y-%H:%M:%S";

    /// Answers queries from a table keyed by the joined arguments
    #[derive(Default)]
    struct FakeGit {
        answers: HashMap<String, QueryOutput>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeGit {
        fn answer(mut self, args: &str, status: i32, stdout: &str) -> Self {
            self.answers.insert(
                args.to_string(),
                QueryOutput {
                    stdout: stdout.to_string(),
                    stderr: match status {
                        0 => String::new(),
                        _ => "fatal: simulated\nusage: git diff [<options>]".to_string(),
                    },
                    status: Some(status),
                },
            );
            self
        }

        /// A tagged, clean checkout with one remote
        fn healthy() -> Self {
            Self::default()
                .answer("rev-parse --short=8 HEAD", 0, "1a2b3c4d")
                .answer("diff --quiet", 0, "")
                .answer("diff --cached --quiet", 0, "")
                .answer("status --porcelain", 0, "")
                .answer("rev-parse --abbrev-ref HEAD", 0, "main")
                .answer("describe --tags --abbrev=0", 0, "v1.0.0")
                .answer("describe --tags", 0, "v1.0.0-3-g1a2b3c4d")
                .answer(LOG_ARGS, 0, "05/03/2024-14:07:09")
                .answer(
                    "remote -v",
                    0,
                    "origin\thttps://example.com/repo.git (fetch)\n\
                     origin\thttps://example.com/repo.git (push)",
                )
        }
    }

    impl QueryRunner for &FakeGit {
        fn run(&self, args: &[&str]) -> Result<QueryOutput, QueryError> {
            let key = args.join(" ");
            self.calls.borrow_mut().push(key.clone());
            Ok(self.answers.get(&key).cloned().unwrap_or(QueryOutput {
                stdout: String::new(),
                stderr: "fatal: not a git repository".to_string(),
                status: Some(128),
            }))
        }
    }

    fn collect_with(git: &FakeGit, config: Config) -> Result<VersionInfo> {
        VersionInfoCollector::new(git, config, Verbosity).collect()
    }

    #[test]
    fn healthy_checkout() {
        let info = collect_with(&FakeGit::healthy(), Config::default()).unwrap();
        assert_eq!(info.commit, "1a2b3c4d");
        assert_eq!(info.branch, "main");
        assert_eq!(info.version, "v1.0.0");
        assert_eq!(info.tag_distance, "3");
        assert!(!info.dirty);
        assert_eq!(info.dirty_files, "");
        assert_eq!(info.origins_joined(), "https://example.com/repo.git");
        assert_eq!(info.commit_date, "05/03/2024-14:07:09");
    }

    #[test]
    fn guarded_queries_fall_back_to_sentinels() {
        let git = FakeGit::healthy()
            .answer("rev-parse --short=8 HEAD", 128, "")
            .answer("rev-parse --abbrev-ref HEAD", 128, "")
            .answer("describe --tags --abbrev=0", 128, "")
            .answer("describe --tags", 128, "")
            .answer("remote -v", 128, "");

        let info = collect_with(&git, Config::default()).unwrap();
        assert_eq!(info.commit, UNKNOWN);
        assert_eq!(info.branch, UNKNOWN);
        assert_eq!(info.version, UNKNOWN);
        assert_eq!(info.tag_distance, "0");
        assert!(info.origins.is_empty());
    }

    #[test]
    fn diff_exit_one_means_dirty() {
        let git = FakeGit::healthy()
            .answer("diff --quiet", 1, "")
            .answer("status --porcelain", 0, " M src/lib.rs");

        let info = collect_with(&git, Config::default()).unwrap();
        assert!(info.dirty);
        assert_eq!(info.dirty_files, " M src/lib.rs");
    }

    #[test]
    fn staged_change_means_dirty() {
        let git = FakeGit::healthy()
            .answer("diff --cached --quiet", 1, "")
            .answer("status --porcelain", 0, "M  src/lib.rs");

        let info = collect_with(&git, Config::default()).unwrap();
        assert!(info.dirty);
        assert_eq!(info.dirty_files, "M  src/lib.rs");
    }

    #[test]
    fn unexpected_diff_status_is_fatal() {
        for args in ["diff --quiet", "diff --cached --quiet"] {
            let git = FakeGit::healthy().answer(args, 129, "");
            let err = collect_with(&git, Config::default()).unwrap_err();
            match err.downcast_ref::<QueryError>() {
                Some(QueryError::UnexpectedStatus { status: Some(129), stderr, .. }) => {
                    assert_eq!(stderr, "fatal: simulated", "{args}");
                }
                other => panic!("{args}: unexpected error {other:?}"),
            }
        }
    }

    #[test]
    fn detached_head_has_unknown_branch() {
        let git = FakeGit::healthy().answer("rev-parse --abbrev-ref HEAD", 0, "HEAD");
        let info = collect_with(&git, Config::default()).unwrap();
        assert_eq!(info.branch, UNKNOWN);
    }

    #[test]
    fn unguarded_failures_abort() {
        for args in ["status --porcelain", LOG_ARGS] {
            let git = FakeGit::healthy().answer(args, 128, "");
            let err = collect_with(&git, Config::default()).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<QueryError>(), Some(QueryError::Failed { .. })),
                "{args}: {err:?}"
            );
        }
    }

    #[test]
    fn not_a_repository_fails_on_status() {
        let git = FakeGit::default();
        let err = collect_with(&git, Config::default()).unwrap_err();
        match err.downcast_ref::<QueryError>() {
            Some(QueryError::Failed { args, stderr, .. }) => {
                assert_eq!(args, "status --porcelain");
                assert_eq!(stderr, "fatal: not a git repository");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!git.calls.borrow().iter().any(|c| c.starts_with("diff ")));
    }

    #[test]
    fn branch_override_skips_the_branch_query() {
        let git = FakeGit::healthy();
        let config = Config {
            branch_override: Some("release/2.0".to_string()),
            ..Config::default()
        };

        let info = collect_with(&git, config).unwrap();
        assert_eq!(info.branch, "release/2.0");
        assert!(!git.calls.borrow().iter().any(|c| c == "rev-parse --abbrev-ref HEAD"));
    }

    #[test]
    fn source_date_epoch_replaces_the_log_query() {
        let git = FakeGit::healthy();
        let config = Config {
            source_date_epoch: DateTime::from_timestamp(0, 0),
            ..Config::default()
        };

        let info = collect_with(&git, config).unwrap();
        assert_eq!(info.commit_date, "01/01/1970-00:00:00");
        assert!(!git.calls.borrow().iter().any(|c| c.starts_with("log ")));
    }

    #[test]
    fn hash_length_is_passed_to_rev_parse() {
        let git = FakeGit::healthy().answer("rev-parse --short=12 HEAD", 0, "1a2b3c4d5e6f");
        let config = Config {
            hash_length: 12,
            ..Config::default()
        };

        assert_eq!(collect_with(&git, config).unwrap().commit, "1a2b3c4d5e6f");
    }

    #[test]
    fn policy_table() {
        assert_eq!(failure_policy(Field::Commit), FailurePolicy::Sentinel(UNKNOWN));
        assert_eq!(failure_policy(Field::TagDistance), FailurePolicy::Sentinel("0"));
        assert_eq!(failure_policy(Field::Origins), FailurePolicy::Sentinel(""));
        assert_eq!(failure_policy(Field::DirtyFiles), FailurePolicy::Fatal);
        assert_eq!(failure_policy(Field::CommitDate), FailurePolicy::Fatal);
    }

    #[test]
    fn tag_distance_parsing() {
        assert_eq!(parse_tag_distance("v1.0.0-3-g1a2b3c4d", "v1.0.0"), "3");
        assert_eq!(parse_tag_distance("v1.0.0", "v1.0.0"), "0");
        assert_eq!(parse_tag_distance("v2.0-rc1", "v2.0-rc1"), "0");
        assert_eq!(parse_tag_distance("v2.0-rc1-12-gabcdef01", "v2.0-rc1"), "12");
        assert_eq!(parse_tag_distance("release-7-gabcdef01", UNKNOWN), "7");
    }

    #[test]
    fn remote_parsing() {
        let listing = "origin\thttps://example.com/a.git (fetch)\n\
                       origin\thttps://example.com/a.git (push)\n\
                       \n\
                       mirror\t/srv/git/with space.git (fetch)\n\
                       garbage line";
        let origins = parse_remotes(listing);
        assert_eq!(
            origins.into_iter().collect::<Vec<_>>(),
            vec!["/srv/git/with space.git", "https://example.com/a.git"]
        );
    }
}
