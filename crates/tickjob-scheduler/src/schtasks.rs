//! Windows Task Scheduler, driven through `schtasks.exe`.
//!
//! Definitions are imported as Task Scheduler XML (see [`crate::xml`]), which
//! carries the hidden flag and display label, so creation is a single
//! declarative call. The handle's mutate phase re-imports the document only
//! when something was changed after creation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::Local;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::gateway::{DeleteOutcome, GatewaySession, JobHandle, SchedulerGateway};
use crate::types::{JobName, ScheduledJobDefinition};
use crate::xml::{encode_utf16_le, render_task_xml};

pub const DEFAULT_SCHTASKS: &str = "schtasks.exe";

/// Gateway to the local Windows Task Scheduler.
#[derive(Debug, Clone)]
pub struct SchtasksGateway {
    program: PathBuf,
}

impl Default for SchtasksGateway {
    fn default() -> Self {
        Self::new(DEFAULT_SCHTASKS)
    }
}

impl SchtasksGateway {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl SchedulerGateway for SchtasksGateway {
    type Session = SchtasksSession;

    /// Probe the scheduler service with a plain query. Any failure to launch
    /// `schtasks` or a non-zero exit means the scheduler is unreachable.
    fn connect(&self) -> Result<SchtasksSession> {
        let output = Command::new(&self.program)
            .args(["/Query", "/FO", "CSV", "/NH"])
            .output()
            .map_err(|e| {
                SchedulerError::Connection(format!(
                    "cannot launch {}: {e}",
                    self.program.display()
                ))
            })?;
        if !output.status.success() {
            return Err(SchedulerError::Connection(failure_text(&output)));
        }
        info!(program = %self.program.display(), "connected to task scheduler");
        Ok(SchtasksSession {
            program: self.program.clone(),
        })
    }
}

/// An open connection. `schtasks` is stateless, so the session only carries
/// the program path; closing it is a no-op beyond the log line.
#[derive(Debug)]
pub struct SchtasksSession {
    program: PathBuf,
}

impl SchtasksSession {
    fn run<I, S>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Ok(Command::new(&self.program).args(args).output()?)
    }
}

impl GatewaySession for SchtasksSession {
    fn delete_job(&mut self, folder: &str, name: &JobName) -> Result<DeleteOutcome> {
        let exists = self.job_exists(folder, name).map_err(|e| SchedulerError::Delete {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        if !exists {
            return Ok(DeleteOutcome::NotFound);
        }
        let path = task_path(folder, name);
        let output = self.run(["/Delete", "/TN", path.as_str(), "/F"])?;
        if output.status.success() {
            Ok(DeleteOutcome::Deleted)
        } else if is_not_found(&output) {
            // Removed by someone else since the lookup.
            Ok(DeleteOutcome::NotFound)
        } else {
            Err(SchedulerError::Delete {
                name: name.to_string(),
                reason: failure_text(&output),
            })
        }
    }

    fn create_job<'s>(
        &'s mut self,
        folder: &str,
        definition: &ScheduledJobDefinition,
        replace: bool,
    ) -> Result<Box<dyn JobHandle + 's>> {
        let path = task_path(folder, &definition.name);
        let hidden = definition.visibility.is_hidden();
        import_task(&self.program, &path, definition, hidden, replace).map_err(|reason| {
            SchedulerError::Create {
                name: definition.name.to_string(),
                reason,
            }
        })?;

        Ok(Box::new(SchtasksHandle {
            program: &self.program,
            path,
            definition: definition.clone(),
            hidden,
            dirty: false,
        }))
    }

    fn job_exists(&mut self, folder: &str, name: &JobName) -> Result<bool> {
        let path = task_path(folder, name);
        let output = self.run(["/Query", "/TN", path.as_str()])?;
        if output.status.success() {
            Ok(true)
        } else if is_not_found(&output) {
            Ok(false)
        } else {
            Err(SchedulerError::Query {
                name: name.to_string(),
                reason: failure_text(&output),
            })
        }
    }

    fn supports_inline_visibility(&self) -> bool {
        true
    }

    fn close(self) {
        debug!("task scheduler session closed");
    }
}

struct SchtasksHandle<'s> {
    program: &'s Path,
    path: String,
    definition: ScheduledJobDefinition,
    hidden: bool,
    dirty: bool,
}

impl JobHandle for SchtasksHandle<'_> {
    fn name(&self) -> &JobName {
        &self.definition.name
    }

    fn set_display_name(&mut self, display_name: &str) {
        if self.definition.display_name.as_deref() != Some(display_name) {
            self.definition.display_name = Some(display_name.to_string());
            self.dirty = true;
        }
    }

    fn set_hidden(&mut self, hidden: bool) {
        if self.hidden != hidden {
            self.hidden = hidden;
            self.dirty = true;
        }
    }

    fn commit(self: Box<Self>) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        import_task(self.program, &self.path, &self.definition, self.hidden, true).map_err(
            |reason| SchedulerError::Mutate {
                name: self.definition.name.to_string(),
                reason,
            },
        )
    }
}

/// Write the task XML to a temp file and import it. Returns the host's error
/// text on failure.
fn import_task(
    program: &Path,
    path: &str,
    definition: &ScheduledJobDefinition,
    hidden: bool,
    replace: bool,
) -> std::result::Result<(), String> {
    let xml = render_task_xml(definition, path, hidden, Local::now().date_naive());
    let file = std::env::temp_dir().join(format!("tickjob-{}.xml", Uuid::new_v4()));
    std::fs::write(&file, encode_utf16_le(&xml))
        .map_err(|e| format!("cannot write {}: {e}", file.display()))?;

    let mut command = Command::new(program);
    command.arg("/Create").arg("/TN").arg(path).arg("/XML").arg(&file);
    if replace {
        command.arg("/F");
    }
    let result = command.output();

    if let Err(e) = std::fs::remove_file(&file) {
        warn!(file = %file.display(), "could not remove task XML: {e}");
    }

    let output = result.map_err(|e| format!("cannot launch {}: {e}", program.display()))?;
    if output.status.success() {
        Ok(())
    } else {
        Err(failure_text(&output))
    }
}

/// Full task path, e.g. `\S1_Daily_SignalPipeline` or `\Trading\S1_Daily_SignalPipeline`.
pub fn task_path(folder: &str, name: &JobName) -> String {
    let folder = folder.trim_matches('\\');
    if folder.is_empty() {
        format!("\\{name}")
    } else {
        format!("\\{folder}\\{name}")
    }
}

/// schtasks reports an unknown task name with the system "file not found"
/// message; every other non-zero exit (access denied, service errors) is a
/// real failure.
fn is_not_found(output: &Output) -> bool {
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
    .to_lowercase();
    text.contains("cannot find") || text.contains("does not exist")
}

fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = stderr.trim();
    if text.is_empty() {
        format!("schtasks exited with {}", output.status)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_path_in_root_folder() {
        let name = JobName::new("S1_Daily_SignalPipeline").unwrap();
        assert_eq!(task_path("\\", &name), "\\S1_Daily_SignalPipeline");
        assert_eq!(task_path("", &name), "\\S1_Daily_SignalPipeline");
    }

    #[test]
    fn task_path_in_subfolder() {
        let name = JobName::new("S1_Realtime_Monitor").unwrap();
        assert_eq!(task_path("\\Trading\\", &name), "\\Trading\\S1_Realtime_Monitor");
        assert_eq!(task_path("Trading", &name), "\\Trading\\S1_Realtime_Monitor");
    }

    #[test]
    fn missing_program_is_a_connection_error() {
        let gateway = SchtasksGateway::new("/nonexistent/schtasks-for-tests");
        let err = gateway.connect().unwrap_err();
        assert!(err.is_fatal());
    }

    /// A stand-in `schtasks` whose `/Query /TN` answer is read from a `mode`
    /// file next to it. Every other call succeeds.
    #[cfg(unix)]
    fn fake_schtasks(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("schtasks");
        std::fs::write(
            &script,
            r#"#!/bin/sh
if [ "$1 $2" = "/Query /TN" ]; then
    case "$(cat "$(dirname "$0")/mode")" in
        denied) echo "ERROR: Access is denied." >&2; exit 1 ;;
        missing) echo "ERROR: The system cannot find the file specified." >&2; exit 1 ;;
    esac
fi
exit 0
"#,
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn only_an_unknown_name_counts_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mode = dir.path().join("mode");
        let gateway = SchtasksGateway::new(fake_schtasks(dir.path()));
        let mut session = gateway.connect().unwrap();
        let name = JobName::new("S1_Daily_SignalPipeline").unwrap();

        std::fs::write(&mode, "denied").unwrap();
        let err = session.job_exists("\\", &name).unwrap_err();
        assert!(matches!(err, SchedulerError::Query { .. }));
        let err = session.delete_job("\\", &name).unwrap_err();
        assert!(
            matches!(err, SchedulerError::Delete { ref reason, .. } if reason.contains("Access is denied"))
        );
        assert!(!err.is_fatal());

        std::fs::write(&mode, "missing").unwrap();
        assert!(!session.job_exists("\\", &name).unwrap());
        assert_eq!(session.delete_job("\\", &name).unwrap(), DeleteOutcome::NotFound);

        std::fs::write(&mode, "exists").unwrap();
        assert!(session.job_exists("\\", &name).unwrap());
        assert_eq!(session.delete_job("\\", &name).unwrap(), DeleteOutcome::Deleted);
    }
}
