use opreg_model::{Error, PackageName, Result, Version};
use rusqlite::{params, Connection};

/// Deletes `package` and cascades through its channels, entries, and
/// provider/requirer rows; any bundle left with no channel entry is then
/// swept by [`remove_stranded_bundles`] (`spec.md` §4.7, §8 scenario 4).
pub fn remove_package(conn: &Connection, package: &PackageName) -> Result<()> {
    let affected = conn
        .execute("DELETE FROM package WHERE name = ?1", params![package.as_str()])
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;
    if affected == 0 {
        return Err(Error::NotFound(package.to_string()));
    }
    remove_stranded_bundles(conn)?;
    Ok(())
}

/// Removes every channel entry for the bundle of `package` at `version`,
/// then sweeps it as stranded. Matches the source behavior of pulling a
/// single release out of a package's graph without touching its siblings.
pub fn remove_bundle_by_version(conn: &Connection, package: &PackageName, version: &Version) -> Result<()> {
    let mut stmt = conn
        .prepare("SELECT name FROM operatorbundle WHERE package_name = ?1 AND version = ?2")
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;
    let names: Vec<String> = stmt
        .query_map(params![package.as_str(), version.to_string()], |row| row.get(0))
        .map_err(|e| Error::TransactionFailure(e.to_string()))?
        .collect::<rusqlite::Result<_>>()
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;

    if names.is_empty() {
        return Err(Error::NotFound(format!("{package} {version}")));
    }

    for name in &names {
        conn.execute("DELETE FROM channel_entry WHERE operatorbundle_name = ?1", params![name])
            .map_err(|e| Error::TransactionFailure(e.to_string()))?;
    }
    remove_stranded_bundles(conn)?;
    Ok(())
}

/// Deletes every bundle absent from `channel_entry`; cascades take its
/// properties, dependencies, related images, and API associations with
/// it (`spec.md` §8 scenario 5).
pub fn remove_stranded_bundles(conn: &Connection) -> Result<usize> {
    let mut stmt = conn
        .prepare("SELECT name FROM operatorbundle WHERE name NOT IN (SELECT operatorbundle_name FROM channel_entry)")
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| Error::TransactionFailure(e.to_string()))?
        .collect::<rusqlite::Result<_>>()
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;

    for name in &names {
        conn.execute("DELETE FROM operatorbundle WHERE name = ?1", params![name])
            .map_err(|e| Error::TransactionFailure(e.to_string()))?;
    }
    Ok(names.len())
}
