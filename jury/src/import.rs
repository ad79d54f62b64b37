//! Bulk registration from CSV
//!
//! Judges come from a plain `name,email,notes` sheet; a single malformed row
//! rejects the whole sheet. Projects come from a Devpost submission export,
//! of which only a few columns are read:
//!
//! | column | field            |
//! |--------|------------------|
//! | 0      | `name`           |
//! | 6      | `description`    |
//! | 7      | `try_link`       |
//! | 8      | `video_link`     |
//! | 9      | `challenge_list` |
//!
//! Export rows shorter than a full submission are skipped. Tables are
//! numbered in file order.

use csv::{ReaderBuilder, StringRecord};
use shared::{Judge, NewJudge, NewProject, Project};

use crate::error::{EngineError, EngineResult};
use crate::judging::JudgingService;
use crate::traits::{Clock, JudgeStore, ProjectStore};

const JUDGE_COLUMNS: usize = 3;
const DEVPOST_MIN_COLUMNS: usize = 13;

/// Submissions read from a Devpost export
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevpostImport {
    pub projects: Vec<NewProject>,
    /// Lines of rows too short to be submissions
    pub skipped: Vec<u64>,
}

pub fn parse_judges(data: &str, has_header: bool) -> EngineResult<Vec<NewJudge>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .from_reader(data.as_bytes());

    let mut judges = Vec::new();
    for result in reader.records() {
        let record = result?;
        if record.len() != JUDGE_COLUMNS {
            return Err(EngineError::InvalidImport {
                line: line_of(&record),
                detail: format!(
                    "expected {JUDGE_COLUMNS} columns (name, email, notes), found {}",
                    record.len()
                ),
            });
        }
        judges.push(NewJudge {
            name: record[0].trim().to_string(),
            email: record[1].trim().to_string(),
            notes: record[2].trim().to_string(),
        });
    }
    Ok(judges)
}

pub fn parse_devpost(data: &str) -> EngineResult<DevpostImport> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data.as_bytes());

    let mut import = DevpostImport::default();
    for result in reader.records() {
        let record = result?;
        if record.len() < DEVPOST_MIN_COLUMNS {
            import.skipped.push(line_of(&record));
            continue;
        }
        import.projects.push(NewProject {
            name: record[0].trim().to_string(),
            description: record[6].trim().to_string(),
            try_link: non_empty(&record[7]),
            video_link: non_empty(&record[8]),
            challenge_list: record[9]
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(String::from)
                .collect(),
        });
    }
    Ok(import)
}

impl<J, P, C> JudgingService<J, P, C>
where
    J: JudgeStore + 'static,
    P: ProjectStore + 'static,
    C: Clock + 'static,
{
    /// Register every judge in the sheet, or none if any row is malformed
    pub async fn import_judges(&self, data: &str, has_header: bool) -> EngineResult<Vec<Judge>> {
        let profiles = parse_judges(data, has_header)?;

        let mut judges = Vec::with_capacity(profiles.len());
        for profile in profiles {
            judges.push(self.add_judge(profile).await?);
        }
        tracing::info!(count = judges.len(), "judges imported");
        Ok(judges)
    }

    /// Register each submission of a Devpost export at the next free table
    pub async fn import_devpost(&self, data: &str) -> EngineResult<Vec<Project>> {
        let import = parse_devpost(data)?;
        if !import.skipped.is_empty() {
            tracing::warn!(lines = ?import.skipped, "skipped incomplete export rows");
        }

        let mut projects = Vec::with_capacity(import.projects.len());
        for details in import.projects {
            projects.push(self.add_project(details).await?);
        }
        tracing::info!(count = projects.len(), "projects imported");
        Ok(projects)
    }
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |p| p.line())
}

fn non_empty(field: &str) -> Option<String> {
    let field = field.trim();
    (!field.is_empty()).then(|| field.to_string())
}
