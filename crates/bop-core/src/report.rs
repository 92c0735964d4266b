//! Operator-facing notification text.
//!
//! - [`BuildReport`] - results of a worker run, once every attempt finished
//! - [`ErrorReport`] - what went wrong when the CI itself failed
//!
//! Delivery (mail, chat, ...) is up to the caller.

use std::fmt::Write as _;

use crate::attempts::BuildAttemptSet;
use crate::branch::{BranchName, BuildTarget};
use crate::config::join_targets;
use crate::error::{BopError, Result};
use crate::settings::CiSettings;

const PLATFORM_CI_ADMINS: &str = "Platform CI administrators";
const HEADER_WIDTH: usize = 70;

/// Results of all build attempts of a worker run.
pub struct BuildReport<'a> {
    pub component: &'a str,
    pub branch: &'a BranchName,
    pub builds: &'a BuildAttemptSet,
    pub settings: &'a CiSettings,
}

impl<'a> BuildReport<'a> {
    /// One line per attempt: `  <target> : PASS|FAIL (<url>)`.
    pub fn individual_results(&self) -> Result<String> {
        let mut lines = Vec::new();
        for attempt in self.builds.attempts() {
            let url = match (&attempt.task_url, &self.settings.build_url) {
                (Some(url), _) => url.trim().to_string(),
                (None, Some(build_url)) => format!("{build_url}/artifact/{}", attempt.log_file_name()),
                (None, None) => "No URL available".to_string(),
            };
            lines.push(format!("  {} : {} ({url})", attempt.target, attempt.short_result()?));
        }
        Ok(lines.join("\n"))
    }

    /// `PASS`, or `FAIL (<n> builds failed)`.
    pub fn final_result(&self) -> Result<String> {
        if self.builds.all_passed()? {
            Ok("PASS".to_string())
        } else {
            Ok(format!("FAIL ({} builds failed)", self.builds.failed_count()?))
        }
    }

    /// Full message body. Fails while attempts are outstanding.
    pub fn render(&self) -> Result<String> {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "\nComponent:     {}\nBranch:        {}\nBrew targets:  {}\n\n\
             Final result:  {}\n\nIndividual results:\n{}\n\n\
             Debug log:      {}\n\n--\n{}\n",
            self.component,
            self.branch,
            join_targets(self.builds.targets()),
            self.final_result()?,
            self.individual_results()?,
            self.settings.debug_log_url(),
            self.settings.project_page_line(),
        );
        Ok(out)
    }
}

/// Notification sent when the CI could not produce reliable results.
pub struct ErrorReport<'a> {
    pub error: &'a BopError,
    pub component: &'a str,
    pub branch: &'a str,
    pub targets: &'a [BuildTarget],
    pub settings: &'a CiSettings,
}

impl<'a> ErrorReport<'a> {
    /// Error class explanation followed by a call to action.
    pub fn header(&self) -> String {
        let admins = match &self.settings.admins {
            Some(admins) => format!("{PLATFORM_CI_ADMINS} ({admins})"),
            None => PLATFORM_CI_ADMINS.to_string(),
        };
        let destination = match &self.settings.bug_destination {
            Some(destination) => format!(" at {destination}"),
            None => String::new(),
        };
        format!(
            "{}Please contact {admins} or file a bug{destination}.",
            self.error.header()
        )
    }

    pub fn render(&self) -> String {
        format!(
            "{}\n\nComponent:     {}\nBranch:        {}\nBrew targets:  {}\n\n\
             Error message: {}\n\nDebug log: {}\n\n--\n{}\n",
            wrap(&self.header(), HEADER_WIDTH),
            self.component,
            self.branch,
            join_targets(self.targets),
            self.error,
            self.settings.debug_log_url(),
            self.settings.project_page_line(),
        )
    }
}

/// Greedy word wrap at `width` columns.
fn wrap(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    // Width is counted in characters, not bytes.
    let mut current_width = 0;
    for word in text.split_whitespace() {
        let word_width = word.chars().count();
        if !current.is_empty() && current_width + 1 + word_width > width {
            current_width = 0;
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
            current_width += 1;
        }
        current.push_str(word);
        current_width += word_width;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}
