//! External program invocation
//!
//! The image generator and the flashing tool are opaque programs; the only
//! thing read back from them is their exit status.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

/// A program plus the arguments that always precede per-call arguments,
/// e.g. `["python3", "-m", "esp_idf_nvs_partition_gen"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolCommand(Vec<String>);

impl ToolCommand {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// The executable, or an empty string for an empty command
    pub fn program(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    /// Fixed leading arguments
    pub fn base_args(&self) -> &[String] {
        self.0.get(1..).unwrap_or_default()
    }

    /// Leading arguments followed by `args`
    pub fn args_with(&self, args: impl IntoIterator<Item = String>) -> Vec<String> {
        self.base_args().iter().cloned().chain(args).collect()
    }
}

impl std::fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// Exit status of an external program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// `None` when the process was terminated by a signal
    pub code: Option<i32>,
}

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus { code: Some(0) };

    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external programs to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, blocking until it exits
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<ExitStatus>;
}

/// Runs programs as child processes, inheriting stdio so tool output
/// reaches the operator
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<ExitStatus> {
        info!("Running {}", program);
        debug!("exec: {} {}", program, args.join(" "));

        let status = Command::new(program).args(args).status().await?;

        debug!("{} exited with {}", program, status);
        Ok(ExitStatus {
            code: status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tool_command_split() {
        let cmd = ToolCommand::new(["python3", "-m", "esptool"]);
        assert_eq!(cmd.program(), "python3");
        assert_eq!(cmd.base_args(), ["-m", "esptool"]);
        assert_eq!(
            cmd.args_with(["version".to_string()]),
            ["-m", "esptool", "version"]
        );
    }

    #[test]
    fn test_empty_tool_command() {
        let cmd = ToolCommand::new(Vec::<String>::new());
        assert_eq!(cmd.program(), "");
        assert!(cmd.base_args().is_empty());
    }

    #[test]
    fn test_tool_command_from_toml_list() {
        #[derive(Deserialize)]
        struct Wrapper {
            tool: ToolCommand,
        }
        let parsed: Wrapper = serde_json::from_str(r#"{"tool":["esptool.py"]}"#).unwrap();
        assert_eq!(parsed.tool, ToolCommand::new(["esptool.py"]));
    }

    #[test]
    fn test_exit_status() {
        assert!(ExitStatus::SUCCESS.success());
        assert!(!ExitStatus::from_code(2).success());
        assert!(!ExitStatus { code: None }.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_reports_exit_code() {
        let status = SystemRunner
            .run("sh", &["-c".to_string(), "exit 3".to_string()])
            .await
            .unwrap();
        assert_eq!(status.code, Some(3));
    }
}
