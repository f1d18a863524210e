use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Marker in the user template that is replaced by the report text.
pub const PLACEHOLDER: &str = "<INSERT_DREAM>";

/// Annotation tasks, each with its own pair of prompt files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    IsDream,
    IsLucid,
    Annotate,
    ThematicD,
    ThematicM,
    ThematicT,
}

impl Task {
    pub const ALL: [Task; 6] = [
        Task::IsDream,
        Task::IsLucid,
        Task::Annotate,
        Task::ThematicD,
        Task::ThematicM,
        Task::ThematicT,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Task::IsDream => "isdream",
            Task::IsLucid => "islucid",
            Task::Annotate => "annotate",
            Task::ThematicD => "thematicD",
            Task::ThematicM => "thematicM",
            Task::ThematicT => "thematicT",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Error)]
#[error("unknown task '{0}', expected one of: isdream, islucid, annotate, thematicD, thematicM, thematicT")]
pub struct ParseTaskError(String);

impl FromStr for Task {
    type Err = ParseTaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Task::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseTaskError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Result<Self> {
        let user = user.into();
        if !user.contains(PLACEHOLDER) {
            bail!("user prompt has no {PLACEHOLDER} placeholder");
        }
        Ok(Self { system: system.into(), user })
    }

    /// Read `prompt-system_task-<task>.txt` and `prompt-user_task-<task>.txt` from `dir`.
    pub fn load(dir: &Path, task: Task) -> Result<Self> {
        let system_path = dir.join(format!("prompt-system_task-{task}.txt"));
        let user_path = dir.join(format!("prompt-user_task-{task}.txt"));
        let system = fs::read_to_string(&system_path)
            .with_context(|| format!("reading system prompt {}", system_path.display()))?;
        let user = fs::read_to_string(&user_path)
            .with_context(|| format!("reading user prompt {}", user_path.display()))?;
        Self::new(system, user).with_context(|| format!("invalid prompt {}", user_path.display()))
    }

    pub fn render(&self, text: &str) -> String { self.user.replace(PLACEHOLDER, text) }

    /// System instruction followed by the rendered user message.
    pub fn messages(&self, text: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage { role: "system".into(), content: self.system.clone() },
            ChatMessage { role: "user".into(), content: self.render(text) },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn task_names_round_trip() {
        for task in Task::ALL {
            assert_eq!(task.as_str().parse::<Task>().unwrap(), task);
        }
        assert!("thematicd".parse::<Task>().is_err());
    }

    #[test]
    fn renders_placeholder() {
        let p = PromptTemplate::new("Answer True or False.", "Is this lucid?\n\n<INSERT_DREAM>").unwrap();
        let msgs = p.messages("I was flying.");
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[0].content, "Answer True or False.");
        assert_eq!(msgs[1].content, "Is this lucid?\n\nI was flying.");
    }

    #[test]
    fn rejects_template_without_placeholder() {
        assert!(PromptTemplate::new("sys", "no marker here").is_err());
    }

    #[test]
    fn loads_task_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("prompt-system_task-islucid.txt"), "sys").unwrap();
        fs::write(dir.path().join("prompt-user_task-islucid.txt"), "Dream: <INSERT_DREAM>").unwrap();
        let p = PromptTemplate::load(dir.path(), Task::IsLucid).unwrap();
        assert_eq!(p.render("x"), "Dream: x");
        assert!(PromptTemplate::load(dir.path(), Task::IsDream).is_err());
    }
}
