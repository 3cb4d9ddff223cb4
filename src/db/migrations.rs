use anyhow::Context;
use rusqlite::Connection;

// Migrations are embedded so that in-memory databases (tests) get the same
// schema as a file-backed one.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    "CREATE TABLE experiences (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        location TEXT NOT NULL,
        image TEXT NOT NULL,
        description TEXT NOT NULL,
        price REAL NOT NULL CHECK (price >= 0),
        about TEXT NOT NULL,
        available_dates TEXT NOT NULL DEFAULT '[]',
        available_times TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE slots (
        experience_id TEXT NOT NULL REFERENCES experiences(id) ON DELETE CASCADE,
        date TEXT NOT NULL,
        time TEXT NOT NULL,
        booked INTEGER NOT NULL DEFAULT 0 CHECK (booked >= 0),
        capacity INTEGER NOT NULL DEFAULT 10 CHECK (capacity >= 1),
        PRIMARY KEY (experience_id, date, time),
        CHECK (booked <= capacity)
    );

    CREATE TABLE bookings (
        id TEXT PRIMARY KEY,
        experience_id TEXT NOT NULL REFERENCES experiences(id),
        experience_title TEXT NOT NULL,
        full_name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT,
        date TEXT NOT NULL,
        time TEXT NOT NULL,
        quantity INTEGER NOT NULL CHECK (quantity BETWEEN 1 AND 20),
        price_per_person REAL NOT NULL CHECK (price_per_person >= 0),
        subtotal REAL NOT NULL CHECK (subtotal >= 0),
        discount REAL NOT NULL DEFAULT 0 CHECK (discount >= 0),
        total REAL NOT NULL CHECK (total >= 0),
        promo_code TEXT,
        status TEXT NOT NULL DEFAULT 'confirmed',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    -- At most one active booking per (experience, date, time, email).
    CREATE UNIQUE INDEX bookings_active_slot_idx
        ON bookings (experience_id, date, time, email)
        WHERE status != 'cancelled';

    CREATE INDEX bookings_email_created_idx ON bookings (email, created_at);",
)];

pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("failed to create migrations table")?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .context("failed to check migration status")?;

        if already_applied {
            continue;
        }

        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration: {name}"))?;

        conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])
            .with_context(|| format!("failed to record migration: {name}"))?;

        tracing::info!("applied migration: {name}");
    }

    Ok(())
}
