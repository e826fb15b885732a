/// Database models for Taskboard
///
/// Each model owns the SQL for its table. Functions that run a single query
/// accept any `PgExecutor` (a pool or a transaction); the ones that run several
/// statements take `&mut PgConnection` so callers decide the transaction.
///
/// # Models
///
/// - `user`: Accounts and roles
/// - `project`: Projects and their developer sets
/// - `task`: Tasks, priorities, statuses and categories links
/// - `category`: Task labels
/// - `comment`: Comments on tasks
/// - `notification`: Email outbox drained by the worker

pub mod category;
pub mod comment;
pub mod notification;
pub mod project;
pub mod task;
pub mod user;
