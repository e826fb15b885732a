//! Notification emails for board events
//!
//! Each constructor builds the subject, body and recipient list for one event
//! kind. Composition is pure; queueing happens through
//! [`crate::models::notification::Notification::enqueue`] and delivery in
//! `taskboard-worker`.
//!
//! | Event | Subject | Recipients |
//! |---|---|---|
//! | project created | `New project created: {title}` | project developers |
//! | project updated | `Project updated: {title}` | project developers |
//! | project deleted | `Project deleted: {title}` | developers at deletion time |
//! | task created | `New task created: {title}` | project developers |
//! | task updated | `Task updated: {title}` | assignee and board member, minus the actor |
//! | task deleted | `Task Deleted` | the assigned developer |
//! | comment created | `New comment on task: {title}` | assignee and board member, minus the author |

use serde::{Deserialize, Serialize};

use crate::models::notification::NotificationKind;

/// An email ready to be queued or sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMail {
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,

    /// De-duplicated, in first-seen order
    pub recipients: Vec<String>,
}

impl OutgoingMail {
    fn new<I, S>(kind: NotificationKind, subject: String, body: String, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for email in recipients {
            let email = email.as_ref().trim().to_lowercase();
            if !email.is_empty() && !unique.contains(&email) {
                unique.push(email);
            }
        }

        Self {
            kind,
            subject,
            body,
            recipients: unique,
        }
    }

    /// Removes one address from the recipients
    pub fn excluding(mut self, email: &str) -> Self {
        let email = email.trim().to_lowercase();
        self.recipients.retain(|r| *r != email);
        self
    }

    /// Nothing to deliver
    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }

    pub fn project_created<I, S>(title: &str, board_member_email: &str, developers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            NotificationKind::ProjectCreated,
            format!("New project created: {}", title),
            format!("A new project has been created by {}.", board_member_email),
            developers,
        )
    }

    pub fn project_updated<I, S>(title: &str, board_member_email: &str, developers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            NotificationKind::ProjectUpdated,
            format!("Project updated: {}", title),
            format!(
                "The project {} has been updated by {}.",
                title, board_member_email
            ),
            developers,
        )
    }

    pub fn project_deleted<I, S>(title: &str, board_member_email: &str, developers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            NotificationKind::ProjectDeleted,
            format!("Project deleted: {}", title),
            format!(
                "The project {} has been deleted by {}. All of its tasks were removed.",
                title, board_member_email
            ),
            developers,
        )
    }

    pub fn task_created<I, S>(
        task_title: &str,
        project_title: &str,
        board_member_email: &str,
        developers: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            NotificationKind::TaskCreated,
            format!("New task created: {}", task_title),
            format!(
                "A new task has been created by {} in the project {}.",
                board_member_email, project_title
            ),
            developers,
        )
    }

    /// `changes` lists the names of the fields that changed
    pub fn task_updated(
        task_title: &str,
        project_title: &str,
        actor_email: &str,
        changes: &[&str],
        assignee_email: &str,
        board_member_email: &str,
    ) -> Self {
        let body = if changes.is_empty() {
            format!(
                "The task {} in the project {} has been updated by {}.",
                task_title, project_title, actor_email
            )
        } else {
            format!(
                "The task {} in the project {} has been updated by {} (changed: {}).",
                task_title,
                project_title,
                actor_email,
                changes.join(", ")
            )
        };

        Self::new(
            NotificationKind::TaskUpdated,
            format!("Task updated: {}", task_title),
            body,
            [assignee_email, board_member_email],
        )
        .excluding(actor_email)
    }

    pub fn task_deleted(task_title: &str, task_description: &str, assignee_email: &str) -> Self {
        Self::new(
            NotificationKind::TaskDeleted,
            "Task Deleted".to_string(),
            format!(
                "Task \"{}\" with description \"{}\" has been deleted.",
                task_title, task_description
            ),
            [assignee_email],
        )
    }

    pub fn comment_created(
        task_title: &str,
        author_email: &str,
        text: &str,
        assignee_email: &str,
        board_member_email: &str,
    ) -> Self {
        Self::new(
            NotificationKind::CommentCreated,
            format!("New comment on task: {}", task_title),
            format!("{} commented on the task {}:\n\n{}", author_email, task_title, text),
            [assignee_email, board_member_email],
        )
        .excluding(author_email)
    }
}
