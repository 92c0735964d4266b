//! Job scheduler collaborator.
//!
//! [`JobScheduler`] is the narrow surface the Build-on-Push service needs from
//! Jenkins. [`JenkinsCli`] implements it over the Jenkins Java CLI.

use std::collections::BTreeMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error};

use crate::error::{BopError, Result};
use crate::jobs::Job;
use crate::settings::CiSettings;

/// Operations on the job scheduler.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// True if a job with the job's name or display name exists.
    async fn job_exists(&self, job: &Job) -> Result<bool>;

    async fn create_job(&self, job: &Job) -> Result<()>;

    async fn update_job(&self, job: &Job) -> Result<()>;

    async fn enable_job(&self, name: &str) -> Result<()>;

    async fn disable_job(&self, name: &str) -> Result<()>;

    async fn delete_job(&self, name: &str) -> Result<()>;

    /// Trigger a job build. Fails if the job is missing or disabled.
    async fn trigger_job(&self, name: &str, parameters: &BTreeMap<String, String>) -> Result<()>;

    async fn set_build_description(&self, job_name: &str, build: &str, description: &str) -> Result<()>;
}

/// Default Jenkins CLI invocation.
pub const DEFAULT_CLI: &[&str] = &["/usr/bin/java", "-jar", "/var/lib/jenkins/jenkins-cli.jar"];

/// Default job renderer: reads Job Builder YAML on stdin, writes job XML to stdout.
pub const DEFAULT_RENDERER: &[&str] = &["jenkins-jobs", "test"];

/// Jenkins instance driven through the Java CLI.
pub struct JenkinsCli {
    cli: Vec<String>,
    renderer: Vec<String>,
    settings: CiSettings,
}

impl JenkinsCli {
    /// Create a client for the Jenkins master at `url`.
    ///
    /// The CLI command prefix comes from `settings.jenkins_cli` when set.
    pub fn new(url: &str, settings: CiSettings) -> Self {
        let mut cli: Vec<String> = match settings.jenkins_cli.as_deref() {
            Some(prefix) => prefix.split_whitespace().map(str::to_string).collect(),
            None => DEFAULT_CLI.iter().map(|s| s.to_string()).collect(),
        };
        cli.push("-noCertificateCheck".to_string());
        cli.extend(["-s".to_string(), url.to_string()]);

        Self {
            cli,
            renderer: DEFAULT_RENDERER.iter().map(|s| s.to_string()).collect(),
            settings,
        }
    }

    /// Use a different job renderer command.
    pub fn with_renderer(mut self, renderer: Vec<String>) -> Self {
        self.renderer = renderer;
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.cli[0]);
        command.args(&self.cli[1..]).args(args);
        command
    }

    /// Run a CLI command with optional stdin, returning stdout.
    async fn run(&self, operation: &'static str, job: &str, args: &[&str], input: Option<&[u8]>) -> Result<String> {
        let mut command = self.command(args);
        command
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(operation, job, "Invoking Jenkins CLI");
        let output = pipe_through(command, input).await.map_err(|e| BopError::Scheduler {
            operation,
            job: job.to_string(),
            detail: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(operation, job, stderr = %stderr, "Jenkins CLI command failed");
            return Err(BopError::Scheduler {
                operation,
                job: job.to_string(),
                detail: format!("{} ({})", output.status, stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Render a job's XML definition through the renderer command.
    async fn render(&self, job: &Job) -> Result<Vec<u8>> {
        let yaml = job.definition(&self.settings)?.to_yaml()?;

        let Some((program, args)) = self.renderer.split_first() else {
            return Err(BopError::Scheduler {
                operation: "render-job",
                job: job.name(),
                detail: "no job renderer configured".to_string(),
            });
        };

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = pipe_through(command, Some(yaml.as_bytes())).await?;
        if !output.status.success() {
            return Err(BopError::Scheduler {
                operation: "render-job",
                job: job.name(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

async fn pipe_through(mut command: Command, input: Option<&[u8]>) -> std::io::Result<std::process::Output> {
    let mut child = command.spawn()?;
    if let Some(input) = input {
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input).await?;
        }
    }
    child.wait_with_output().await
}

/// `build <job> -p KEY=VALUE ...`
fn build_args(name: &str, parameters: &BTreeMap<String, String>) -> Vec<String> {
    let mut args = vec!["build".to_string(), name.to_string()];
    for (key, value) in parameters {
        args.push("-p".to_string());
        args.push(format!("{key}={value}"));
    }
    args
}

#[async_trait]
impl JobScheduler for JenkinsCli {
    async fn job_exists(&self, job: &Job) -> Result<bool> {
        let name = job.name();
        let display_name = job.display_name();
        let listing = self.run("list-jobs", &name, &["list-jobs"], None).await?;
        Ok(listing
            .lines()
            .any(|line| line == name || line == display_name))
    }

    async fn create_job(&self, job: &Job) -> Result<()> {
        let name = job.name();
        let xml = self.render(job).await?;
        self.run("create-job", &name, &["create-job", &name], Some(&xml)).await?;
        Ok(())
    }

    async fn update_job(&self, job: &Job) -> Result<()> {
        let name = job.name();
        let xml = self.render(job).await?;
        self.run("update-job", &name, &["update-job", &name], Some(&xml)).await?;
        Ok(())
    }

    async fn enable_job(&self, name: &str) -> Result<()> {
        self.run("enable-job", name, &["enable-job", name], None).await?;
        Ok(())
    }

    async fn disable_job(&self, name: &str) -> Result<()> {
        self.run("disable-job", name, &["disable-job", name], None).await?;
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> Result<()> {
        self.run("delete-job", name, &["delete-job", name], None).await?;
        Ok(())
    }

    async fn trigger_job(&self, name: &str, parameters: &BTreeMap<String, String>) -> Result<()> {
        let args = build_args(name, parameters);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run("build", name, &args, None).await?;
        Ok(())
    }

    async fn set_build_description(&self, job_name: &str, build: &str, description: &str) -> Result<()> {
        self.run(
            "set-build-description",
            job_name,
            &["set-build-description", job_name, build, description],
            None,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::DispatcherJob;

    fn echo_cli() -> JenkinsCli {
        let settings = CiSettings {
            jenkins_cli: Some("echo".to_string()),
            ..Default::default()
        };
        JenkinsCli::new("https://jenkins.example.com", settings)
    }

    #[test]
    fn test_default_cli_prefix() {
        let jenkins = JenkinsCli::new("https://jenkins.example.com", CiSettings::default());
        assert_eq!(jenkins.cli[0], "/usr/bin/java");
        assert!(jenkins.cli.contains(&"-noCertificateCheck".to_string()));
        assert_eq!(jenkins.cli.last().unwrap(), "https://jenkins.example.com");
    }

    #[tokio::test]
    async fn test_job_exists_matches_listing_lines() {
        // `echo` prints its arguments on one line, which never equals a job name.
        let jenkins = echo_cli();
        let job = Job::from(DispatcherJob::named("bash"));
        assert!(!jenkins.job_exists(&job).await.unwrap());

        // `printf %s\n` prints one argument per line, the job name among them.
        let settings = CiSettings {
            jenkins_cli: Some("printf %s\\n ci-bash-dispatcher-commit".to_string()),
            ..Default::default()
        };
        let jenkins = JenkinsCli::new("https://jenkins.example.com", settings);
        assert!(jenkins.job_exists(&job).await.unwrap());
        assert!(!jenkins
            .job_exists(&Job::from(DispatcherJob::named("zsh")))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_failing_command_is_scheduler_error() {
        let settings = CiSettings {
            jenkins_cli: Some("false".to_string()),
            ..Default::default()
        };
        let jenkins = JenkinsCli::new("https://jenkins.example.com", settings);

        let err = jenkins.enable_job("ci-bash-dispatcher-commit").await.unwrap_err();
        match err {
            BopError::Scheduler { operation, job, .. } => {
                assert_eq!(operation, "enable-job");
                assert_eq!(job, "ci-bash-dispatcher-commit");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_trigger_passes_parameters() {
        let mut params = BTreeMap::new();
        params.insert("BREW_TARGETS".to_string(), "a b".to_string());
        params.insert("EXTRA".to_string(), "1".to_string());

        let args = build_args("ci-bash-commit-rhel-7.3", &params);
        assert_eq!(
            args,
            ["build", "ci-bash-commit-rhel-7.3", "-p", "BREW_TARGETS=a b", "-p", "EXTRA=1"]
        );

        let jenkins = echo_cli();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = jenkins.run("build", "ci-bash-commit-rhel-7.3", &args, None).await.unwrap();
        assert_eq!(
            output.trim_end(),
            "-noCertificateCheck -s https://jenkins.example.com \
             build ci-bash-commit-rhel-7.3 -p BREW_TARGETS=a b -p EXTRA=1"
        );

        jenkins.trigger_job("ci-bash-commit-rhel-7.3", &params).await.unwrap();
    }
}
