/// Access-control rules
///
/// Every rule is a pure predicate over the caller's [`AuthContext`] and the
/// rows involved. Handlers call the `require_*` wrappers, which turn a false
/// predicate into [`AuthzError::Forbidden`].
///
/// # Rules
///
/// | Action | Who |
/// |---|---|
/// | create project | board managers |
/// | update / delete project, manage its developers | the project's board member |
/// | view project | its board member and its developers |
/// | create / edit / delete task | the project's board member |
/// | change task status | the assigned developer |
/// | view task | project viewers and the assigned developer |
/// | comment on task | the assigned developer and the project's board member |
/// | edit / delete comment | its author |
/// | create / edit / delete category | board managers |
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::auth::authorization::{require_project_manager, AuthzError};
/// use taskboard_shared::auth::middleware::AuthContext;
/// use taskboard_shared::models::project::Project;
///
/// fn check(auth: &AuthContext, project: &Project) -> Result<(), AuthzError> {
///     require_project_manager(auth, project)?;
///     Ok(())
/// }
/// ```

use super::middleware::AuthContext;
use crate::models::{
    comment::Comment,
    project::Project,
    task::Task,
    user::UserRole,
};

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(&'static str),
}

/// The project's board member
pub fn can_manage_project(user: &AuthContext, project: &Project) -> bool {
    user.user_id == project.board_member_id
}

pub fn is_developer_role(user: &AuthContext) -> bool {
    user.role == UserRole::Developer
}

pub fn is_board_manager_role(user: &AuthContext) -> bool {
    user.role == UserRole::BoardManager
}

/// The task's assigned developer
pub fn can_act_on_task(user: &AuthContext, task: &Task) -> bool {
    user.user_id == task.developer_id
}

/// The comment's author
pub fn can_act_on_comment(user: &AuthContext, comment: &Comment) -> bool {
    user.user_id == comment.user_id
}

pub fn can_view_project(user: &AuthContext, project: &Project) -> bool {
    can_manage_project(user, project) || project.has_developer(user.user_id)
}

pub fn can_view_task(user: &AuthContext, project: &Project, task: &Task) -> bool {
    can_view_project(user, project) || can_act_on_task(user, task)
}

pub fn can_comment_on_task(user: &AuthContext, project: &Project, task: &Task) -> bool {
    can_act_on_task(user, task) || can_manage_project(user, project)
}

pub fn can_create_project(user: &AuthContext) -> bool {
    match user.role {
        UserRole::BoardManager => true,
        UserRole::Developer => false,
    }
}

pub fn can_manage_categories(user: &AuthContext) -> bool {
    match user.role {
        UserRole::BoardManager => true,
        UserRole::Developer => false,
    }
}

pub fn require_project_creator(user: &AuthContext) -> Result<(), AuthzError> {
    if can_create_project(user) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden("Only board managers can create projects"))
    }
}

pub fn require_project_manager(user: &AuthContext, project: &Project) -> Result<(), AuthzError> {
    if can_manage_project(user, project) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden("Only the project's board member can do this"))
    }
}

pub fn require_project_viewer(user: &AuthContext, project: &Project) -> Result<(), AuthzError> {
    if can_view_project(user, project) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden("You are not a member of this project"))
    }
}

pub fn require_task_viewer(
    user: &AuthContext,
    project: &Project,
    task: &Task,
) -> Result<(), AuthzError> {
    if can_view_task(user, project, task) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden("You are not a member of this project"))
    }
}

pub fn require_task_assignee(user: &AuthContext, task: &Task) -> Result<(), AuthzError> {
    if can_act_on_task(user, task) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden("Only the assigned developer can change the task status"))
    }
}

pub fn require_task_commenter(
    user: &AuthContext,
    project: &Project,
    task: &Task,
) -> Result<(), AuthzError> {
    if can_comment_on_task(user, project, task) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(
            "Only the assigned developer or the project's board member can comment",
        ))
    }
}

pub fn require_comment_author(user: &AuthContext, comment: &Comment) -> Result<(), AuthzError> {
    if can_act_on_comment(user, comment) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden("Only the author can modify this comment"))
    }
}

pub fn require_category_manager(user: &AuthContext) -> Result<(), AuthzError> {
    if can_manage_categories(user) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden("Only board managers can manage categories"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::{TaskPriority, TaskStatus};
    use chrono::Utc;
    use uuid::Uuid;

    struct Board {
        manager: AuthContext,
        developer: AuthContext,
        outsider: AuthContext,
        project: Project,
        task: Task,
    }

    fn board() -> Board {
        let manager = AuthContext::new(Uuid::new_v4(), UserRole::BoardManager);
        let developer = AuthContext::new(Uuid::new_v4(), UserRole::Developer);
        let outsider = AuthContext::new(Uuid::new_v4(), UserRole::Developer);

        let project = Project {
            id: Uuid::new_v4(),
            title: "Launch".to_string(),
            description: "Q1".to_string(),
            board_member_id: manager.user_id,
            developer_ids: vec![developer.user_id],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let task = Task {
            id: Uuid::new_v4(),
            project_id: project.id,
            developer_id: developer.user_id,
            title: "Ship".to_string(),
            description: "It".to_string(),
            priority: TaskPriority::High,
            status: TaskStatus::NotStarted,
            category_ids: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        Board {
            manager,
            developer,
            outsider,
            project,
            task,
        }
    }

    fn comment_by(author: Uuid, task: &Task) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            task_id: task.id,
            user_id: author,
            text: "Done".to_string(),
            file: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_board_member_manages_project() {
        let b = board();
        assert!(can_manage_project(&b.manager, &b.project));
        assert!(!can_manage_project(&b.developer, &b.project));

        // Another board manager does not own this project
        let other_manager = AuthContext::new(Uuid::new_v4(), UserRole::BoardManager);
        assert_eq!(
            require_project_manager(&other_manager, &b.project),
            Err(AuthzError::Forbidden("Only the project's board member can do this"))
        );
    }

    #[test]
    fn test_role_predicates() {
        let b = board();
        assert!(is_developer_role(&b.developer));
        assert!(!is_developer_role(&b.manager));
        assert!(is_board_manager_role(&b.manager));
        assert!(can_create_project(&b.manager));
        assert!(!can_create_project(&b.developer));
        assert!(can_manage_categories(&b.manager));
        assert!(require_category_manager(&b.developer).is_err());
        assert!(require_project_creator(&b.manager).is_ok());
    }

    #[test]
    fn test_project_visibility() {
        let b = board();
        assert!(can_view_project(&b.manager, &b.project));
        assert!(can_view_project(&b.developer, &b.project));
        assert!(!can_view_project(&b.outsider, &b.project));
        assert!(require_project_viewer(&b.outsider, &b.project).is_err());
    }

    #[test]
    fn test_task_rules() {
        let mut b = board();
        assert!(can_act_on_task(&b.developer, &b.task));
        assert!(!can_act_on_task(&b.manager, &b.task));
        assert!(require_task_assignee(&b.outsider, &b.task).is_err());

        // An assignee removed from the project still sees their task
        b.project.developer_ids.clear();
        assert!(!can_view_project(&b.developer, &b.project));
        assert!(can_view_task(&b.developer, &b.project, &b.task));
        assert!(require_task_viewer(&b.outsider, &b.project, &b.task).is_err());
    }

    #[test]
    fn test_comment_rules() {
        let b = board();
        assert!(can_comment_on_task(&b.developer, &b.project, &b.task));
        assert!(can_comment_on_task(&b.manager, &b.project, &b.task));
        assert!(!can_comment_on_task(&b.outsider, &b.project, &b.task));
        assert!(require_task_commenter(&b.outsider, &b.project, &b.task).is_err());

        let comment = comment_by(b.developer.user_id, &b.task);
        assert!(can_act_on_comment(&b.developer, &comment));
        // Role does not matter, only authorship
        assert!(!can_act_on_comment(&b.manager, &comment));
        assert!(require_comment_author(&b.manager, &comment).is_err());
    }
}
