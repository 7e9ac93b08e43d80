use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{Sqlite, SqlitePoolOptions},
    Pool,
};

pub type DbPool = Pool<Sqlite>;

pub async fn ensure_database_file(url: &str) -> Result<(), sqlx::Error> {
    let exists = Sqlite::database_exists(url).await?;

    if !exists {
        Sqlite::create_database(url).await?;
    }

    Ok(())
}

pub async fn init_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    ensure_database_file(database_url).await?;

    // Every connection to `:memory:` is its own database, so keep exactly one
    // and never recycle it.
    let options = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };
    let pool = options.connect(database_url).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cases (
            ordinal INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            name TEXT,
            issue TEXT NOT NULL DEFAULT '',
            treatment TEXT NOT NULL DEFAULT '',
            routine TEXT NOT NULL DEFAULT '',
            improvement INTEGER NOT NULL DEFAULT 0,
            result TEXT NOT NULL DEFAULT '',
            created_at INTEGER,
            date_str TEXT NOT NULL DEFAULT '',
            stored_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now') * 1000),
            UNIQUE (collection, id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}
