//! Build-on-Push CLI
//!
//! The `bop` command drives automated scratch builds of dist-git branches.
//!
//! ## Commands
//!
//! - `classify`: Show the type and staging target of a branch
//! - `resolve`: Show which targets a branch builds
//! - `enable` / `disable` / `remove`: Manage a component's dispatcher job
//! - `dispatch`: Handle a pushed commit (run by the dispatcher job)
//! - `build`: Issue scratch builds and report their results (run by worker jobs)

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use bop_core::settings::env;
use bop_core::{
    split_targets, BranchClassifier, BranchConfig, BranchName, BuildAttemptSet, BuildExecutor,
    BuildReport, BuildTarget, BuildTargetResolver, CiSettings, CiSource, Commit, CommitCi,
    ErrorReport, FsCommitterStore, JenkinsCli, JobScheduler, RhpkgExecutor,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{error, info, warn, Level};

#[derive(Parser)]
#[command(name = "bop")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build-on-Push: automated scratch builds for dist-git branches", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Output format of command results
    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Instance settings, usually provided by the Jenkins environment.
#[derive(Args, Debug, Default)]
struct SettingsArgs {
    /// CI project page
    #[arg(long, env = env::PROJECT_URL, global = true)]
    project_url: Option<String>,

    /// Root URL of the dist-git service
    #[arg(long, env = env::DISTGIT_URL, global = true)]
    distgit_url: Option<String>,

    /// Jenkins master URL
    #[arg(long, env = env::JENKINS_URL, global = true)]
    jenkins_url: Option<String>,

    /// Documentation page describing staging branches
    #[arg(long, env = env::STAGING_BRANCH_DOC, global = true)]
    staging_branch_doc: Option<String>,

    /// Contact for CI administrators
    #[arg(long, env = env::ADMINS, global = true)]
    admins: Option<String>,

    /// Where bugs against the CI should be filed
    #[arg(long, env = env::BUG_DESTINATION, global = true)]
    bug_destination: Option<String>,

    /// Jenkins CLI command prefix
    #[arg(long, env = env::JENKINS_CLI, global = true)]
    jenkins_cli: Option<String>,

    #[arg(long, env = env::BUILD_URL, global = true, hide = true)]
    build_url: Option<String>,

    #[arg(long, env = env::JOB_NAME, global = true, hide = true)]
    job_name: Option<String>,

    #[arg(long, env = env::BUILD_NUMBER, global = true, hide = true)]
    build_number: Option<String>,
}

impl From<SettingsArgs> for CiSettings {
    fn from(args: SettingsArgs) -> Self {
        fn set(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }

        CiSettings {
            project_url: set(args.project_url),
            distgit_url: set(args.distgit_url),
            jenkins_url: set(args.jenkins_url),
            staging_branch_doc_url: set(args.staging_branch_doc),
            admins: set(args.admins),
            bug_destination: set(args.bug_destination),
            jenkins_cli: set(args.jenkins_cli),
            build_url: set(args.build_url),
            job_name: set(args.job_name),
            build_number: set(args.build_number),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show the type and staging target of a branch
    Classify {
        /// Dist-git branch name
        branch: String,
    },

    /// Show which targets a branch builds
    Resolve {
        /// Dist-git branch name
        branch: String,

        /// The branch's ci.yaml file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Create or enable a component's dispatcher job
    Enable {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Disable a component's dispatcher job
    Disable {
        /// Dist-git component
        #[arg(long)]
        component: String,
    },

    /// Delete a component's dispatcher job
    Remove {
        /// Dist-git component
        #[arg(long)]
        component: String,
    },

    /// Decide whether a pushed commit is built, and trigger its worker job
    Dispatch {
        #[command(flatten)]
        job: JobArgs,

        /// Branch the commit was pushed to
        #[arg(long)]
        branch: String,

        /// Commit hash
        #[arg(long)]
        hash: Option<String>,

        /// Commit message
        #[arg(long)]
        description: Option<String>,

        /// Checkout of the pushed branch, searched for ci.yaml
        #[arg(long)]
        tree: Option<PathBuf>,
    },

    /// Issue scratch builds for a branch and report the results
    Build(BuildArgs),
}

#[derive(Args, Debug, Clone)]
struct JobArgs {
    /// Dist-git component
    #[arg(long)]
    component: String,

    /// Jenkins slave label the jobs run on
    #[arg(long)]
    slave: String,

    /// GitHub user owning the CI repository
    #[arg(long)]
    ci_user: String,

    /// Branch of the CI repository
    #[arg(long, default_value = "master")]
    ci_branch: String,
}

impl JobArgs {
    fn source(&self) -> CiSource {
        CiSource::new(self.ci_user.as_str()).with_branch(self.ci_branch.as_str())
    }
}

#[derive(Args, Debug, Clone)]
struct BuildArgs {
    /// Dist-git component
    #[arg(long)]
    component: String,

    /// Branch being built
    #[arg(long)]
    branch: String,

    /// Space-separated build targets
    #[arg(long, env = "BREW_TARGETS")]
    targets: String,

    /// Directory receiving one log file per target
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,

    /// Dist-git checkout the builds are issued from
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    /// Who pushed the commit being built
    #[arg(long)]
    committer: Option<String>,

    /// Directory of task-to-committer mapping files
    #[arg(long)]
    mapping_dir: Option<PathBuf>,

    /// Also write the report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    bop_core::init_tracing(cli.json, level);

    let settings = CiSettings::from(cli.settings);
    let format = cli.format;

    match cli.command {
        Commands::Classify { branch } => {
            println!("{}", classify_output(&branch, format)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resolve { branch, config } => {
            println!("{}", resolve_output(&branch, config.as_deref(), format)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Enable { job } => cmd_enable(&settings, &job).await.map(|()| ExitCode::SUCCESS),
        Commands::Disable { component } => cmd_disable(&settings, &component)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Remove { component } => cmd_remove(&settings, &component)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Dispatch {
            job,
            branch,
            hash,
            description,
            tree,
        } => {
            let mut commit = Commit::new(branch);
            if let Some(hash) = hash {
                commit = commit.with_hash(hash);
            }
            if let Some(description) = description {
                commit = commit.with_description(description);
            }
            cmd_dispatch(&settings, &job, &commit, tree.as_deref(), format)
                .await
                .map(|()| ExitCode::SUCCESS)
        }
        Commands::Build(args) => cmd_build(&settings, &args).await,
    }
}

fn classify_output(branch: &str, format: Format) -> Result<String> {
    let branch_type = BranchClassifier::classify(branch);
    let target = BranchClassifier::staging_target(branch);

    Ok(match format {
        Format::Text => match &target {
            Ok(target) => format!("{branch}: {branch_type} branch, staging target {target}"),
            Err(e) => format!("{branch}: {branch_type} branch ({e})"),
        },
        Format::Json => serde_json::to_string_pretty(&json!({
            "branch": branch,
            "type": branch_type,
            "staging_target": target.ok(),
        }))?,
    })
}

fn resolve_output(branch: &str, config: Option<&Path>, format: Format) -> Result<String> {
    let config = config
        .map(BranchConfig::from_path)
        .transpose()
        .context("Failed to load branch config")?;
    let branch_type = BranchClassifier::classify(branch);
    let targets = BuildTargetResolver::resolve(branch_type, branch, config.as_ref())?;

    Ok(match format {
        Format::Text if targets.is_empty() => format!("{branch}: nothing to build"),
        Format::Text => bop_core::join_targets(&targets),
        Format::Json => serde_json::to_string_pretty(&targets)?,
    })
}

fn jenkins(settings: &CiSettings) -> Result<Arc<dyn JobScheduler>> {
    let url = settings
        .jenkins_url
        .as_deref()
        .context("Jenkins URL not set (--jenkins-url or JENKINS_URL)")?;
    Ok(Arc::new(JenkinsCli::new(url, settings.clone())))
}

async fn cmd_enable(settings: &CiSettings, job: &JobArgs) -> Result<()> {
    let ci = CommitCi::new(jenkins(settings)?, job.component.as_str(), settings.clone());
    ci.enable(&job.slave, &job.source())
        .await
        .with_context(|| format!("Failed to enable Build-on-Push for {}", job.component))?;
    println!("Build-on-Push enabled for {}", job.component);
    Ok(())
}

async fn cmd_disable(settings: &CiSettings, component: &str) -> Result<()> {
    let ci = CommitCi::new(jenkins(settings)?, component, settings.clone());
    ci.disable()
        .await
        .with_context(|| format!("Failed to disable Build-on-Push for {component}"))?;
    println!("Build-on-Push disabled for {component}");
    Ok(())
}

async fn cmd_remove(settings: &CiSettings, component: &str) -> Result<()> {
    let ci = CommitCi::new(jenkins(settings)?, component, settings.clone());
    ci.remove()
        .await
        .with_context(|| format!("Failed to remove Build-on-Push for {component}"))?;
    println!("Build-on-Push removed for {component}");
    Ok(())
}

async fn cmd_dispatch(
    settings: &CiSettings,
    job: &JobArgs,
    commit: &Commit,
    tree: Option<&Path>,
    format: Format,
) -> Result<()> {
    let config = match tree {
        Some(tree) => BranchConfig::discover(tree).context("Failed to read branch config")?,
        None => None,
    };

    let ci = CommitCi::new(jenkins(settings)?, job.component.as_str(), settings.clone());
    let decision = ci
        .dispatch(commit, config.as_ref(), &job.slave, &job.source())
        .await
        .with_context(|| format!("Failed to dispatch commit on {}", commit.branch))?;

    match format {
        Format::Text => println!("{}", decision.outcome.render_text()),
        Format::Json => println!("{}", serde_json::to_string_pretty(&decision)?),
    }
    Ok(())
}

async fn cmd_build(settings: &CiSettings, args: &BuildArgs) -> Result<ExitCode> {
    let executor = Arc::new(RhpkgExecutor::new(&args.workdir));
    let (report, passed) = run_worker(executor, settings, args).await;

    println!("{report}");
    if let Some(path) = &args.report {
        std::fs::write(path, &report)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Run the builds and render the report to send: a build report when all
/// builds ran, an error report otherwise.
async fn run_worker(
    executor: Arc<dyn BuildExecutor>,
    settings: &CiSettings,
    args: &BuildArgs,
) -> (String, bool) {
    let targets = split_targets(&args.targets);
    match build_and_report(executor, settings, args, &targets).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "Build-on-Push worker failed");
            let report = ErrorReport {
                error: &e,
                component: &args.component,
                branch: &args.branch,
                targets: &targets,
                settings,
            };
            (report.render(), false)
        }
    }
}

async fn build_and_report(
    executor: Arc<dyn BuildExecutor>,
    settings: &CiSettings,
    args: &BuildArgs,
    targets: &[BuildTarget],
) -> bop_core::Result<(String, bool)> {
    std::fs::create_dir_all(&args.log_dir)?;

    let mut builds = BuildAttemptSet::new(executor, &args.log_dir);
    builds.start(targets.iter().cloned())?;
    builds.await_all().await?;

    match (&args.committer, &args.mapping_dir) {
        (Some(committer), Some(dir)) => {
            let store = FsCommitterStore::new(dir)?;
            let recorded = builds.record_committer(&store, committer).await?;
            info!(committer = %committer, recorded, "Recorded committer of Brew tasks");
        }
        (Some(_), None) => warn!("No mapping directory given, committer not recorded"),
        (None, _) => {}
    }

    let branch = BranchName::from(args.branch.as_str());
    let report = BuildReport {
        component: &args.component,
        branch: &branch,
        builds: &builds,
        settings,
    };
    Ok((report.render()?, builds.all_passed()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bop_core::fakes::ScriptedExecutor;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn build_args(log_dir: &Path, targets: &str) -> BuildArgs {
        BuildArgs {
            component: "bash".to_string(),
            branch: "rhel-7.3-staging".to_string(),
            targets: targets.to_string(),
            log_dir: log_dir.to_path_buf(),
            workdir: PathBuf::from("."),
            committer: None,
            mapping_dir: None,
            report: None,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_command() {
        let cli = Cli::try_parse_from([
            "bop",
            "build",
            "--component",
            "bash",
            "--branch",
            "rhel-7.3-staging",
            "--targets",
            "rhel-7.3-candidate extras-rhel-7.3-candidate",
        ])
        .unwrap();

        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.component, "bash");
                assert_eq!(split_targets(&args.targets).len(), 2);
                assert_eq!(args.log_dir, PathBuf::from("."));
            }
            _ => panic!("expected build command"),
        }
    }

    #[test]
    fn test_settings_read_library_variable_names() {
        let command = Cli::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id().as_str() == id)
                .and_then(|arg| arg.get_env())
                .map(|name| name.to_string_lossy().into_owned())
        };

        assert_eq!(env_of("distgit_url").as_deref(), Some(env::DISTGIT_URL));
        assert_eq!(env_of("jenkins_url").as_deref(), Some(env::JENKINS_URL));
        assert_eq!(env_of("build_number").as_deref(), Some(env::BUILD_NUMBER));
    }

    #[test]
    fn test_empty_settings_count_as_unset() {
        let settings = CiSettings::from(SettingsArgs {
            jenkins_url: Some(String::new()),
            admins: Some("ci-admins@example.com".to_string()),
            ..Default::default()
        });
        assert_eq!(settings.jenkins_url, None);
        assert_eq!(settings.admins.as_deref(), Some("ci-admins@example.com"));
        assert!(jenkins(&settings).is_err());
    }

    #[test]
    fn test_classify_output() {
        assert_eq!(
            classify_output("rhel-7.3-staging", Format::Text).unwrap(),
            "rhel-7.3-staging: staging branch, staging target rhel-7.3-candidate"
        );

        let parsed: serde_json::Value =
            serde_json::from_str(&classify_output("john-feature-branch", Format::Json).unwrap()).unwrap();
        assert_eq!(parsed["type"], "private");
        assert!(parsed["staging_target"].is_null());
    }

    #[test]
    fn test_resolve_output_with_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(BranchConfig::FILE_NAME);
        std::fs::write(&path, "auto-build:\n  targets:\n    - test-1-target\n").unwrap();

        assert_eq!(
            resolve_output("rhel-7.3-staging", Some(&path), Format::Text).unwrap(),
            "test-1-target rhel-7.3-candidate"
        );
        assert_eq!(
            resolve_output("john-feature-branch", None, Format::Text).unwrap(),
            "john-feature-branch: nothing to build"
        );
    }

    #[tokio::test]
    async fn test_worker_reports_failed_build() {
        let dir = TempDir::new().unwrap();
        let executor = Arc::new(ScriptedExecutor::new().fail("rhel-7.3-candidate"));
        let args = build_args(dir.path(), "rhel-7.2-candidate rhel-7.3-candidate");

        let (report, passed) = run_worker(executor, &CiSettings::default(), &args).await;

        assert!(!passed);
        assert!(report.contains("Final result:  FAIL (1 builds failed)"));
    }

    #[tokio::test]
    async fn test_worker_records_committer() {
        let dir = TempDir::new().unwrap();
        let mapping_dir = TempDir::new().unwrap();
        let mut args = build_args(dir.path(), "rhel-7.3-candidate");
        args.committer = Some("jdoe@example.com".to_string());
        args.mapping_dir = Some(mapping_dir.path().to_path_buf());

        let (_, passed) = run_worker(Arc::new(ScriptedExecutor::new()), &CiSettings::default(), &args).await;

        assert!(passed);
        let mappings: Vec<_> = std::fs::read_dir(mapping_dir.path()).unwrap().collect();
        assert_eq!(mappings.len(), 1);
    }

    #[tokio::test]
    async fn test_worker_error_produces_error_report() {
        let dir = TempDir::new().unwrap();
        let executor = Arc::new(ScriptedExecutor::new().error_for("rhel-7.3-candidate"));
        let args = build_args(dir.path(), "rhel-7.3-candidate");

        let (report, passed) = run_worker(executor, &CiSettings::default(), &args).await;

        assert!(!passed);
        assert!(report.starts_with("There was a problem during a Brew build attempt."));
        assert!(report.contains("Error message: build execution failed for target rhel-7.3-candidate"));
    }
}
