pub const SCHEMA_STATEMENTS: &[&str] = &[
    "PRAGMA foreign_keys = ON;",
    "CREATE TABLE IF NOT EXISTS conversations (
        chat_id TEXT PRIMARY KEY,
        participant_name TEXT NOT NULL,
        status TEXT NOT NULL,
        partition_key TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        metadata TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS messages (
        message_id TEXT PRIMARY KEY,
        chat_id TEXT NOT NULL REFERENCES conversations(chat_id) ON DELETE CASCADE,
        message_type TEXT NOT NULL,
        content TEXT NOT NULL,
        metadata TEXT NOT NULL,
        created_at TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS workflow_steps (
        step_id TEXT PRIMARY KEY,
        chat_id TEXT NOT NULL REFERENCES conversations(chat_id) ON DELETE CASCADE,
        operation TEXT NOT NULL,
        arguments TEXT NOT NULL,
        input_file TEXT,
        output_file TEXT,
        status TEXT NOT NULL,
        progress INTEGER NOT NULL,
        error_message TEXT,
        started_at TEXT,
        completed_at TEXT
    );",
    "CREATE TABLE IF NOT EXISTS files (
        chat_id TEXT NOT NULL REFERENCES conversations(chat_id) ON DELETE CASCADE,
        file_path TEXT NOT NULL,
        role TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (chat_id, file_path, role)
    );",
    "CREATE INDEX IF NOT EXISTS idx_messages_chat_created ON messages(chat_id, created_at);",
    "CREATE INDEX IF NOT EXISTS idx_steps_chat_started ON workflow_steps(chat_id, started_at);",
    "CREATE INDEX IF NOT EXISTS idx_files_chat_role ON files(chat_id, role);",
];
