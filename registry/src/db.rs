use sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    // Resolve the file path and ensure the parent directory exists.
    // Handles both "sqlite:./foo.db" and "sqlite:../foo.db" forms.
    let file_path = database_url.strip_prefix("sqlite:").unwrap_or(database_url);

    let abs_path = std::env::current_dir()?.join(file_path);
    if let Some(parent) = abs_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = sqlx::SqlitePool::connect_with(
        sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&abs_path)
            .create_if_missing(true),
    )
    .await?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Create the registry tables if they do not exist.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS executions (
            id             TEXT    PRIMARY KEY,
            run_id         INTEGER NOT NULL UNIQUE,
            repo           TEXT    NOT NULL,
            lac            TEXT    NOT NULL,
            stream         TEXT    NOT NULL,
            test           TEXT    NOT NULL,
            kind           TEXT    NOT NULL,
            environment    TEXT    NOT NULL,
            triggered_by   TEXT    NOT NULL,
            status         TEXT    NOT NULL,
            start_time     TEXT    NOT NULL,
            end_time       TEXT,
            factor         INTEGER NOT NULL,
            dashboard_url  TEXT,
            location       TEXT    NOT NULL,
            container_name TEXT    NOT NULL,
            execution_type TEXT    NOT NULL,
            workers        TEXT    NOT NULL,
            tool           TEXT    NOT NULL,
            script_version TEXT    NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS executions_status ON executions (status)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS locations (
            id          TEXT    PRIMARY KEY,
            location    TEXT    NOT NULL,
            servername  TEXT    NOT NULL,
            kind        TEXT    NOT NULL,
            environment TEXT    NOT NULL,
            factor      INTEGER NOT NULL,
            status      TEXT    NOT NULL,
            UNIQUE (location, servername, environment)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS configurations (
            parameter TEXT PRIMARY KEY,
            value     TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}
