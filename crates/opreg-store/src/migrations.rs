//! The ordered list of schema migrations, from an empty file up to
//! [`crate::schema::LATEST_VERSION`]. Each entry is a pure function pair
//! rather than a registry populated by `inventory`/`ctor`-style global
//! registration, so the order here *is* the order applied — no separate
//! bookkeeping to keep in sync (`spec.md` §9, "global migration registry").

use rusqlite::Connection;

pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub up: fn(&Connection) -> rusqlite::Result<()>,
    pub down: fn(&Connection) -> rusqlite::Result<()>,
}

pub fn all() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "initial schema",
            up: initial_schema_up,
            down: initial_schema_down,
        },
        Migration {
            version: 2,
            description: "add bundle path",
            up: add_bundle_path_up,
            down: add_bundle_path_down,
        },
        Migration {
            version: 3,
            description: "add version and skip-range",
            up: add_version_skiprange_up,
            down: add_version_skiprange_down,
        },
        Migration {
            version: 4,
            description: "associate provided/required APIs with channel entries",
            up: add_api_tables_up,
            down: add_api_tables_down,
        },
        Migration {
            version: 5,
            description: "cascade deletes on channel, channel_entry, api_provider, api_requirer",
            up: cascade_deletes_up,
            down: cascade_deletes_down,
        },
        Migration {
            version: 6,
            description: "backfill operatorbundle.replaces/skips from the entry graph",
            up: backfill_replaces_skips_up,
            down: backfill_replaces_skips_down,
        },
        Migration {
            version: 7,
            description: "extract declared dependencies into their own table",
            up: add_dependencies_table_up,
            down: add_dependencies_table_down,
        },
        Migration {
            version: 8,
            description: "add operatorbundle.package_name, backfilled from channel membership",
            up: add_bundle_package_column_up,
            down: add_bundle_package_column_down,
        },
        Migration {
            version: 9,
            description: "carry bundle version/path alongside each dependency row",
            up: reshape_dependencies_up,
            down: reshape_dependencies_down,
        },
        Migration {
            version: 10,
            description: "derive properties, defaulting a missing olm.package per bundle",
            up: add_properties_table_up,
            down: add_properties_table_down,
        },
        Migration {
            version: 11,
            description: "enforce non-empty related_image.image",
            up: enforce_nonempty_related_image_up,
            down: enforce_nonempty_related_image_down,
        },
        Migration {
            version: 12,
            description: "add deprecated table",
            up: add_deprecated_table_up,
            down: add_deprecated_table_down,
        },
        Migration {
            version: 13,
            description: "prune deprecation rows for bundles truncated out of the graph",
            up: prune_truncated_deprecations_up,
            down: noop_down,
        },
        Migration {
            version: 14,
            description: "add package.add_mode",
            up: add_package_add_mode_up,
            down: add_package_add_mode_down,
        },
        Migration {
            version: 15,
            description: "backfill missing olm.package properties",
            up: ensure_package_property_backfill_up,
            down: noop_down,
        },
    ]
}

fn noop_down(_conn: &Connection) -> rusqlite::Result<()> {
    Ok(())
}

fn initial_schema_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE operatorbundle (
            name TEXT PRIMARY KEY,
            csv  TEXT NOT NULL,
            bundle TEXT NOT NULL
        );
        CREATE TABLE package (
            name TEXT PRIMARY KEY,
            default_channel TEXT
        );
        CREATE TABLE channel (
            name TEXT NOT NULL,
            package_name TEXT NOT NULL,
            head_operatorbundle_name TEXT,
            PRIMARY KEY (name, package_name),
            FOREIGN KEY (package_name) REFERENCES package(name)
        );
        CREATE TABLE channel_entry (
            entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
            channel_name TEXT NOT NULL,
            package_name TEXT NOT NULL,
            operatorbundle_name TEXT NOT NULL,
            replaces INTEGER,
            depth INTEGER NOT NULL,
            synthesized INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (channel_name, package_name) REFERENCES channel(name, package_name),
            FOREIGN KEY (replaces) REFERENCES channel_entry(entry_id)
        );
        CREATE TABLE related_image (
            image TEXT NOT NULL,
            operatorbundle_name TEXT NOT NULL,
            FOREIGN KEY (operatorbundle_name) REFERENCES operatorbundle(name)
        );
        ",
    )
}

fn initial_schema_down(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        DROP TABLE related_image;
        DROP TABLE channel_entry;
        DROP TABLE channel;
        DROP TABLE package;
        DROP TABLE operatorbundle;
        ",
    )
}

fn add_bundle_path_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("ALTER TABLE operatorbundle ADD COLUMN bundlepath TEXT NOT NULL DEFAULT '';")
}
fn add_bundle_path_down(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("ALTER TABLE operatorbundle DROP COLUMN bundlepath;")
}

fn add_version_skiprange_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        ALTER TABLE operatorbundle ADD COLUMN version TEXT NOT NULL DEFAULT '';
        ALTER TABLE operatorbundle ADD COLUMN skiprange TEXT;
        ",
    )
}
fn add_version_skiprange_down(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        ALTER TABLE operatorbundle DROP COLUMN version;
        ALTER TABLE operatorbundle DROP COLUMN skiprange;
        ",
    )
}

fn add_api_tables_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE api (
            group_name TEXT NOT NULL,
            version TEXT NOT NULL,
            kind TEXT NOT NULL,
            plural TEXT NOT NULL,
            PRIMARY KEY (group_name, version, kind)
        );
        CREATE TABLE api_provider (
            group_name TEXT NOT NULL,
            version TEXT NOT NULL,
            kind TEXT NOT NULL,
            channel_entry_id INTEGER NOT NULL,
            FOREIGN KEY (group_name, version, kind) REFERENCES api(group_name, version, kind),
            FOREIGN KEY (channel_entry_id) REFERENCES channel_entry(entry_id)
        );
        CREATE TABLE api_requirer (
            group_name TEXT NOT NULL,
            version TEXT NOT NULL,
            kind TEXT NOT NULL,
            channel_entry_id INTEGER NOT NULL,
            FOREIGN KEY (group_name, version, kind) REFERENCES api(group_name, version, kind),
            FOREIGN KEY (channel_entry_id) REFERENCES channel_entry(entry_id)
        );
        ",
    )
}
fn add_api_tables_down(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        DROP TABLE api_requirer;
        DROP TABLE api_provider;
        DROP TABLE api;
        ",
    )
}

/// SQLite can't add `ON DELETE CASCADE` to an existing foreign key, so the
/// four affected tables are recreated and their rows copied across.
fn cascade_deletes_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = OFF;

        ALTER TABLE channel RENAME TO channel_old;
        CREATE TABLE channel (
            name TEXT NOT NULL,
            package_name TEXT NOT NULL,
            head_operatorbundle_name TEXT,
            PRIMARY KEY (name, package_name),
            FOREIGN KEY (package_name) REFERENCES package(name) ON DELETE CASCADE
        );
        INSERT INTO channel SELECT * FROM channel_old;
        DROP TABLE channel_old;

        ALTER TABLE channel_entry RENAME TO channel_entry_old;
        CREATE TABLE channel_entry (
            entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
            channel_name TEXT NOT NULL,
            package_name TEXT NOT NULL,
            operatorbundle_name TEXT NOT NULL,
            replaces INTEGER,
            depth INTEGER NOT NULL,
            synthesized INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (channel_name, package_name) REFERENCES channel(name, package_name) ON DELETE CASCADE,
            FOREIGN KEY (replaces) REFERENCES channel_entry(entry_id) ON DELETE CASCADE
        );
        INSERT INTO channel_entry SELECT * FROM channel_entry_old;
        DROP TABLE channel_entry_old;

        ALTER TABLE api_provider RENAME TO api_provider_old;
        CREATE TABLE api_provider (
            group_name TEXT NOT NULL,
            version TEXT NOT NULL,
            kind TEXT NOT NULL,
            channel_entry_id INTEGER NOT NULL,
            FOREIGN KEY (group_name, version, kind) REFERENCES api(group_name, version, kind),
            FOREIGN KEY (channel_entry_id) REFERENCES channel_entry(entry_id) ON DELETE CASCADE
        );
        INSERT INTO api_provider SELECT * FROM api_provider_old;
        DROP TABLE api_provider_old;

        ALTER TABLE api_requirer RENAME TO api_requirer_old;
        CREATE TABLE api_requirer (
            group_name TEXT NOT NULL,
            version TEXT NOT NULL,
            kind TEXT NOT NULL,
            channel_entry_id INTEGER NOT NULL,
            FOREIGN KEY (group_name, version, kind) REFERENCES api(group_name, version, kind),
            FOREIGN KEY (channel_entry_id) REFERENCES channel_entry(entry_id) ON DELETE CASCADE
        );
        INSERT INTO api_requirer SELECT * FROM api_requirer_old;
        DROP TABLE api_requirer_old;

        PRAGMA foreign_keys = ON;
        ",
    )
}
fn cascade_deletes_down(_conn: &Connection) -> rusqlite::Result<()> {
    // Dropping a cascade annotation is not meaningfully reversible without
    // risking silent data loss on a populated database; treat this step
    // as one-directional in practice, matching how it behaved upstream.
    Ok(())
}

fn backfill_replaces_skips_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        ALTER TABLE operatorbundle ADD COLUMN replaces TEXT;
        ALTER TABLE operatorbundle ADD COLUMN skips TEXT;
        ",
    )?;
    // The entry graph already carries the replacement edge per channel;
    // copy the first one found onto the bundle row as the declared
    // `replaces` value so readers that only look at `operatorbundle` see
    // a sensible answer too.
    conn.execute_batch(
        "
        UPDATE operatorbundle SET replaces = (
            SELECT prev.operatorbundle_name
            FROM channel_entry ce
            JOIN channel_entry prev ON prev.entry_id = ce.replaces
            WHERE ce.operatorbundle_name = operatorbundle.name
            LIMIT 1
        );
        ",
    )
}
fn backfill_replaces_skips_down(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        ALTER TABLE operatorbundle DROP COLUMN replaces;
        ALTER TABLE operatorbundle DROP COLUMN skips;
        ",
    )
}

fn add_dependencies_table_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE dependencies (
            type TEXT NOT NULL,
            value TEXT NOT NULL,
            operatorbundle_name TEXT NOT NULL,
            FOREIGN KEY (operatorbundle_name) REFERENCES operatorbundle(name) ON DELETE CASCADE
        );
        ",
    )
}
fn add_dependencies_table_down(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("DROP TABLE dependencies;")
}

fn add_bundle_package_column_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("ALTER TABLE operatorbundle ADD COLUMN package_name TEXT;")?;
    conn.execute_batch(
        "
        UPDATE operatorbundle SET package_name = (
            SELECT ce.package_name FROM channel_entry ce
            WHERE ce.operatorbundle_name = operatorbundle.name
            LIMIT 1
        );
        ",
    )
}
fn add_bundle_package_column_down(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("ALTER TABLE operatorbundle DROP COLUMN package_name;")
}

fn reshape_dependencies_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        ALTER TABLE dependencies ADD COLUMN operatorbundle_version TEXT NOT NULL DEFAULT '';
        ALTER TABLE dependencies ADD COLUMN operatorbundle_path TEXT NOT NULL DEFAULT '';
        UPDATE dependencies SET
            operatorbundle_version = (SELECT version FROM operatorbundle WHERE name = dependencies.operatorbundle_name),
            operatorbundle_path = (SELECT bundlepath FROM operatorbundle WHERE name = dependencies.operatorbundle_name);
        ",
    )
}
fn reshape_dependencies_down(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        ALTER TABLE dependencies DROP COLUMN operatorbundle_version;
        ALTER TABLE dependencies DROP COLUMN operatorbundle_path;
        ",
    )
}

fn add_properties_table_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE properties (
            type TEXT NOT NULL,
            value TEXT NOT NULL,
            operatorbundle_name TEXT NOT NULL,
            operatorbundle_version TEXT NOT NULL DEFAULT '',
            operatorbundle_path TEXT NOT NULL DEFAULT '',
            FOREIGN KEY (operatorbundle_name) REFERENCES operatorbundle(name) ON DELETE CASCADE
        );
        ",
    )?;
    ensure_package_property_backfill_up(conn)
}
fn add_properties_table_down(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("DROP TABLE properties;")
}

fn enforce_nonempty_related_image_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = OFF;
        ALTER TABLE related_image RENAME TO related_image_old;
        CREATE TABLE related_image (
            image TEXT NOT NULL CHECK (length(image) > 0),
            operatorbundle_name TEXT NOT NULL,
            FOREIGN KEY (operatorbundle_name) REFERENCES operatorbundle(name) ON DELETE CASCADE
        );
        INSERT INTO related_image SELECT * FROM related_image_old WHERE length(image) > 0;
        DROP TABLE related_image_old;
        PRAGMA foreign_keys = ON;
        ",
    )
}
fn enforce_nonempty_related_image_down(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        ALTER TABLE related_image RENAME TO related_image_old;
        CREATE TABLE related_image (
            image TEXT NOT NULL,
            operatorbundle_name TEXT NOT NULL,
            FOREIGN KEY (operatorbundle_name) REFERENCES operatorbundle(name)
        );
        INSERT INTO related_image SELECT * FROM related_image_old;
        DROP TABLE related_image_old;
        ",
    )
}

fn add_deprecated_table_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE deprecated (
            operatorbundle_name TEXT PRIMARY KEY,
            FOREIGN KEY (operatorbundle_name) REFERENCES operatorbundle(name) ON DELETE CASCADE
        );
        ",
    )
}
fn add_deprecated_table_down(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("DROP TABLE deprecated;")
}

fn prune_truncated_deprecations_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        DELETE FROM deprecated
        WHERE operatorbundle_name NOT IN (SELECT operatorbundle_name FROM channel_entry);
        ",
    )
}

fn add_package_add_mode_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("ALTER TABLE package ADD COLUMN add_mode TEXT;")
}
fn add_package_add_mode_down(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("ALTER TABLE package DROP COLUMN add_mode;")
}

fn ensure_package_property_backfill_up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        INSERT INTO properties (type, value, operatorbundle_name, operatorbundle_version, operatorbundle_path)
        SELECT 'olm.package',
               json_object('packageName', ob.package_name, 'version', ob.version),
               ob.name, ob.version, ob.bundlepath
        FROM operatorbundle ob
        WHERE ob.package_name IS NOT NULL
          AND NOT EXISTS (
              SELECT 1 FROM properties p
              WHERE p.operatorbundle_name = ob.name AND p.type = 'olm.package'
          );
        ",
    )
}
