use opreg_model::{Api, Bundle, Error, Result};
use rusqlite::{params, Connection};

/// Inserts (or leaves alone, if already present) the dictionary row for
/// `api`. The dictionary is shared across every bundle that mentions the
/// same GVK, so a package removal never drops it (`spec.md` §8, scenario 4).
pub fn ensure_api_row(conn: &Connection, api: &Api) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO api (group_name, version, kind, plural) VALUES (?1, ?2, ?3, ?4)",
        params![api.group, api.version, api.kind, api.plural],
    )?;
    Ok(())
}

/// Associates a channel entry with every API its bundle provides and
/// requires, ensuring each API's dictionary row exists first.
pub fn insert_entry_apis(conn: &Connection, entry_id: i64, bundle: &Bundle) -> rusqlite::Result<()> {
    for api in &bundle.provided_apis {
        ensure_api_row(conn, api)?;
        conn.execute(
            "INSERT INTO api_provider (group_name, version, kind, channel_entry_id) VALUES (?1, ?2, ?3, ?4)",
            params![api.group, api.version, api.kind, entry_id],
        )?;
    }
    for api in &bundle.required_apis {
        ensure_api_row(conn, api)?;
        conn.execute(
            "INSERT INTO api_requirer (group_name, version, kind, channel_entry_id) VALUES (?1, ?2, ?3, ?4)",
            params![api.group, api.version, api.kind, entry_id],
        )?;
    }
    Ok(())
}

/// Writes (or overwrites) a bundle's own row plus its derived facts
/// (properties, dependencies, related images). Idempotent: reloading the
/// same bundle replaces these rows rather than duplicating them.
pub fn upsert_operator_bundle_row(conn: &Connection, bundle: &Bundle) -> Result<()> {
    let csv_json = serde_json::to_string(&bundle.csv).map_err(|e| Error::ValidationFailure(e.to_string()))?;
    let objects_json = serde_json::to_string(&bundle.objects).map_err(|e| Error::ValidationFailure(e.to_string()))?;
    let skips_json = serde_json::to_string(&bundle.skips).map_err(|e| Error::ValidationFailure(e.to_string()))?;
    let skiprange = bundle.skip_range.as_ref().map(|r| r.to_string());

    conn.execute(
        "INSERT INTO operatorbundle
            (name, csv, bundle, bundlepath, version, skiprange, replaces, skips, package_name)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(name) DO UPDATE SET
            csv = excluded.csv,
            bundle = excluded.bundle,
            bundlepath = excluded.bundlepath,
            version = excluded.version,
            skiprange = excluded.skiprange,
            replaces = excluded.replaces,
            skips = excluded.skips,
            package_name = excluded.package_name",
        params![
            bundle.csv_name.as_str(),
            csv_json,
            objects_json,
            bundle.bundle_path,
            bundle.version.to_string(),
            skiprange,
            bundle.replaces.as_ref().map(|c| c.as_str().to_string()),
            skips_json,
            bundle.package_name.as_str(),
        ],
    )
    .map_err(|e| Error::TransactionFailure(e.to_string()))?;

    conn.execute("DELETE FROM properties WHERE operatorbundle_name = ?1", params![bundle.csv_name.as_str()])
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;
    for property in &bundle.properties {
        let value = serde_json::to_string(&property.value).map_err(|e| Error::ValidationFailure(e.to_string()))?;
        conn.execute(
            "INSERT INTO properties (type, value, operatorbundle_name, operatorbundle_version, operatorbundle_path)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![property.property_type, value, bundle.csv_name.as_str(), bundle.version.to_string(), bundle.bundle_path],
        )
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;
    }

    conn.execute("DELETE FROM dependencies WHERE operatorbundle_name = ?1", params![bundle.csv_name.as_str()])
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;
    for dependency in &bundle.dependencies {
        dependency.validate().map_err(Error::ValidationFailure)?;
        let dep_type = serde_json::to_string(&dependency.dependency_type).map_err(|e| Error::ValidationFailure(e.to_string()))?;
        let dep_type = dep_type.trim_matches('"').to_string();
        let value = serde_json::to_string(&dependency.value).map_err(|e| Error::ValidationFailure(e.to_string()))?;
        conn.execute(
            "INSERT INTO dependencies (type, value, operatorbundle_name, operatorbundle_version, operatorbundle_path)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![dep_type, value, bundle.csv_name.as_str(), bundle.version.to_string(), bundle.bundle_path],
        )
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;
    }

    conn.execute("DELETE FROM related_image WHERE operatorbundle_name = ?1", params![bundle.csv_name.as_str()])
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;
    for image in &bundle.related_images {
        conn.execute(
            "INSERT INTO related_image (image, operatorbundle_name) VALUES (?1, ?2)",
            params![image.image, bundle.csv_name.as_str()],
        )
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;
    }

    Ok(())
}
