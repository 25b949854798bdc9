//! Idempotent DDL for the main registry, per-plan files, and the shared
//! system-jobs store (spec §6 "Persistence layout").
//!
//! Every statement is `CREATE TABLE IF NOT EXISTS` so opening an existing
//! file is a no-op; `schema_meta` records a version so a future forward-only
//! migration has somewhere to branch from (spec §4.1's schema versioning
//! contract — no migrations ship today because there is only one version).

pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA_META_TABLE: &str = "
CREATE TABLE IF NOT EXISTS schema_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";

/// Tables owned by the main registry: plans, sessions, messages, job index.
pub const REGISTRY_TABLES: &[&str] = &[
    SCHEMA_META_TABLE,
    "
CREATE TABLE IF NOT EXISTS plans (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    title        TEXT NOT NULL,
    description  TEXT,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    plan_db_path TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
)",
    "
CREATE TABLE IF NOT EXISTS chat_sessions (
    id             TEXT PRIMARY KEY,
    plan_id        INTEGER,
    name           TEXT,
    name_source    TEXT NOT NULL DEFAULT 'default',
    is_user_named  INTEGER NOT NULL DEFAULT 0,
    is_active      INTEGER NOT NULL DEFAULT 1,
    settings_json  TEXT NOT NULL DEFAULT '{}',
    archived_at    TEXT,
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL,
    last_message_at TEXT
)",
    "
CREATE TABLE IF NOT EXISTS chat_messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id  TEXT NOT NULL,
    role        TEXT NOT NULL,
    content     TEXT NOT NULL,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    created_at  TEXT NOT NULL
)",
    "
CREATE TABLE IF NOT EXISTS plan_job_index (
    job_id      TEXT PRIMARY KEY,
    plan_id     INTEGER,
    job_type    TEXT NOT NULL,
    status      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    finished_at TEXT
)",
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_plan_job_index_plan ON plan_job_index(plan_id)",
];

/// Tables owned by a single per-plan file.
pub const PLAN_FILE_TABLES: &[&str] = &[
    SCHEMA_META_TABLE,
    "
CREATE TABLE IF NOT EXISTS plan_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
)",
    "
CREATE TABLE IF NOT EXISTS tasks (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id            INTEGER,
    position             INTEGER NOT NULL,
    path                 TEXT NOT NULL,
    depth                INTEGER NOT NULL,
    name                 TEXT NOT NULL,
    instruction          TEXT,
    metadata_json        TEXT NOT NULL DEFAULT '{}',
    status               TEXT NOT NULL DEFAULT 'pending',
    execution_result_json TEXT,
    context_combined     TEXT,
    context_sections_json TEXT,
    context_meta_json    TEXT,
    context_updated_at   TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL
)",
    "
CREATE TABLE IF NOT EXISTS task_dependencies (
    task_id    INTEGER NOT NULL,
    depends_on INTEGER NOT NULL,
    PRIMARY KEY (task_id, depends_on)
)",
    "
CREATE TABLE IF NOT EXISTS snapshots (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    note          TEXT,
    snapshot_json TEXT NOT NULL,
    created_at    TEXT NOT NULL
)",
    JOB_LOG_TABLES_SQL,
    "CREATE INDEX IF NOT EXISTS idx_tasks_parent ON tasks(parent_id, position)",
];

/// `plan_action_logs`/`plan_job_logs` are shared verbatim between per-plan
/// files and the shared system-jobs store (spec §6: "same schemas but
/// `plan_id` nullable").
const JOB_LOG_TABLES_SQL: &str = "
CREATE TABLE IF NOT EXISTS plan_action_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    plan_id     INTEGER,
    job_id      TEXT NOT NULL,
    session_id  TEXT,
    action_kind TEXT NOT NULL,
    action_name TEXT NOT NULL,
    status      TEXT NOT NULL,
    success     INTEGER NOT NULL,
    message     TEXT,
    details_json TEXT,
    sequence    INTEGER NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
)";

/// Tables for the shared store that holds jobs with no `plan_id`.
pub const SHARED_JOB_STORE_TABLES: &[&str] = &[
    SCHEMA_META_TABLE,
    "
CREATE TABLE IF NOT EXISTS jobs (
    id            TEXT PRIMARY KEY,
    job_type      TEXT NOT NULL,
    status        TEXT NOT NULL,
    plan_id       INTEGER,
    target_task_id INTEGER,
    session_id    TEXT,
    parameters_json TEXT NOT NULL DEFAULT '{}',
    result_json   TEXT,
    stats_json    TEXT,
    error         TEXT,
    created_at    TEXT NOT NULL,
    started_at    TEXT,
    finished_at   TEXT
)",
    JOB_LOG_TABLES_SQL,
    "
CREATE TABLE IF NOT EXISTS plan_job_logs (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id     TEXT NOT NULL,
    sequence   INTEGER NOT NULL,
    timestamp  TEXT NOT NULL,
    level      TEXT NOT NULL,
    message    TEXT NOT NULL,
    metadata_json TEXT
)",
    "CREATE INDEX IF NOT EXISTS idx_plan_job_logs_job ON plan_job_logs(job_id, sequence)",
    "CREATE INDEX IF NOT EXISTS idx_plan_action_logs_job ON plan_action_logs(job_id, sequence)",
];

/// Jobs themselves also live in each per-plan file when `plan_id` is set, so
/// the `jobs` table is appended there too (kept separate from
/// [`PLAN_FILE_TABLES`] only for readability; both lists are applied
/// together whenever a per-plan file is opened).
pub const PLAN_FILE_JOB_TABLE: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    id            TEXT PRIMARY KEY,
    job_type      TEXT NOT NULL,
    status        TEXT NOT NULL,
    plan_id       INTEGER,
    target_task_id INTEGER,
    session_id    TEXT,
    parameters_json TEXT NOT NULL DEFAULT '{}',
    result_json   TEXT,
    stats_json    TEXT,
    error         TEXT,
    created_at    TEXT NOT NULL,
    started_at    TEXT,
    finished_at   TEXT
)";

pub const PLAN_FILE_JOB_LOG_TABLE: &str = "
CREATE TABLE IF NOT EXISTS plan_job_logs (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id     TEXT NOT NULL,
    sequence   INTEGER NOT NULL,
    timestamp  TEXT NOT NULL,
    level      TEXT NOT NULL,
    message    TEXT NOT NULL,
    metadata_json TEXT
)";
