//! MB-011: JSONL run log.
//!
//! One JSON object per line, tagged by `event`: a `run_started` header, one
//! `snapshot` per simulated second, and a `run_finished` footer carrying the
//! status and history fingerprint.

use super::hasher;
use crate::core::error::{Result, SimError};
use crate::core::types::{RunOutcome, Snapshot};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// One log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        recipe: String,
        commands: usize,
        mbesim_version: String,
    },
    Snapshot {
        step: usize,
        values: Snapshot,
    },
    RunFinished {
        status: String,
        steps: usize,
        fingerprint: String,
    },
}

fn write_event(out: &mut impl Write, event: &RunEvent) -> std::io::Result<()> {
    let json = serde_json::to_string(event).map_err(std::io::Error::other)?;
    writeln!(out, "{}", json)
}

/// Write the complete log of a run, replacing any existing file.
pub fn write_run_log(path: &Path, recipe: &str, commands: usize, outcome: &RunOutcome) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| SimError::io(parent, e))?;
    }
    let file = std::fs::File::create(path).map_err(|e| SimError::io(path, e))?;
    let mut out = BufWriter::new(file);

    let write_all = |out: &mut BufWriter<std::fs::File>| -> std::io::Result<()> {
        write_event(
            out,
            &RunEvent::RunStarted {
                recipe: recipe.to_string(),
                commands,
                mbesim_version: env!("CARGO_PKG_VERSION").to_string(),
            },
        )?;
        for (i, values) in outcome.history.iter().enumerate() {
            write_event(
                out,
                &RunEvent::Snapshot {
                    step: i + 1,
                    values: values.clone(),
                },
            )?;
        }
        write_event(
            out,
            &RunEvent::RunFinished {
                status: outcome.status.to_string(),
                steps: outcome.history.len(),
                fingerprint: hasher::fingerprint(&outcome.history),
            },
        )?;
        out.flush()
    };

    write_all(&mut out).map_err(|e| SimError::io(path, e))
}

/// Read a run log back.
pub fn read_run_log(path: &Path) -> Result<Vec<RunEvent>> {
    let file = std::fs::File::open(path).map_err(|e| SimError::io(path, e))?;
    let mut events = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| SimError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let event = serde_json::from_str(&line).map_err(|e| {
            SimError::Output(format!("{} line {}: {}", path.display(), i + 1, e))
        })?;
        events.push(event);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SimConfig;
    use crate::core::executor::simulate;
    use crate::core::recipe::parse_recipe_text;
    use crate::core::types::Value;

    fn outcome(text: &str) -> RunOutcome {
        let program = parse_recipe_text("t", text).parse().unwrap();
        simulate(&program, &SimConfig::default()).unwrap()
    }

    #[test]
    fn test_mb011_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/run.jsonl");
        let out = outcome("Open Ga\nWait 3 s\n");
        write_run_log(&path, "t", 2, &out).unwrap();

        let events = read_run_log(&path).unwrap();
        assert_eq!(events.len(), 5);
        assert!(matches!(&events[0], RunEvent::RunStarted { recipe, commands: 2, .. } if recipe == "t"));
        match &events[3] {
            RunEvent::Snapshot { step, values } => {
                assert_eq!(*step, 3);
                assert_eq!(values["Time"], Value::Number(3.0));
                assert_eq!(values["Shutter.Ga"], Value::Bool(true));
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
        match &events[4] {
            RunEvent::RunFinished {
                status,
                steps,
                fingerprint,
            } => {
                assert_eq!(status, "completed");
                assert_eq!(*steps, 3);
                assert_eq!(fingerprint, &hasher::fingerprint(&out.history));
            }
            other => panic!("expected footer, got {:?}", other),
        }
    }

    #[test]
    fn test_mb011_event_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        write_run_log(&path, "t", 0, &outcome("")).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"event\":\"run_started\""));
        assert!(lines[1].contains("\"event\":\"run_finished\""));
    }

    #[test]
    fn test_mb011_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        write_run_log(&path, "t", 1, &outcome("Wait 5 s")).unwrap();
        write_run_log(&path, "t", 1, &outcome("Wait 1 s")).unwrap();
        assert_eq!(read_run_log(&path).unwrap().len(), 3);
    }

    #[test]
    fn test_mb011_read_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"event\":\"nope\"}\n").unwrap();
        assert!(matches!(read_run_log(&path), Err(SimError::Output(_))));
    }
}
