use crate::remove::remove_stranded_bundles;
use opreg_model::{ChannelName, CsvName, Error, PackageName, Property, Result};
use rusqlite::{params, Connection, OptionalExtension};

struct Occurrence {
    package: PackageName,
    channel: ChannelName,
    depth: i64,
}

fn occurrences(conn: &Connection, csv: &CsvName) -> rusqlite::Result<Vec<Occurrence>> {
    let mut stmt = conn.prepare(
        "SELECT package_name, channel_name, depth FROM channel_entry
         WHERE operatorbundle_name = ?1 AND synthesized = 0",
    )?;
    let rows = stmt.query_map(params![csv.as_str()], |row| {
        Ok(Occurrence {
            package: PackageName::new(row.get::<_, String>(0)?),
            channel: ChannelName::new(row.get::<_, String>(1)?),
            depth: row.get(2)?,
        })
    })?;
    rows.collect()
}

fn is_default_channel(conn: &Connection, package: &PackageName, channel: &ChannelName) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM package WHERE name = ?1 AND default_channel = ?2",
        params![package.as_str(), channel.as_str()],
        |_| Ok(()),
    )
    .optional()
    .map(|r| r.is_some())
}

fn has_deeper_entry(conn: &Connection, package: &PackageName, channel: &ChannelName, depth: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM channel_entry WHERE package_name = ?1 AND channel_name = ?2 AND depth > ?3 LIMIT 1",
        params![package.as_str(), channel.as_str(), depth],
        |_| Ok(()),
    )
    .optional()
    .map(|r| r.is_some())
}

/// Marks `csv` deprecated in every channel it heads or appears in, and
/// truncates each channel's history below it (`spec.md` §4.4,
/// §8 scenario 2). Refuses (per occurrence) when the bundle is the
/// default channel's head with nothing deeper to fall back to.
pub fn deprecate_bundle(conn: &Connection, csv: &CsvName) -> Result<()> {
    let occurrences = occurrences(conn, csv).map_err(|e| Error::TransactionFailure(e.to_string()))?;
    if occurrences.is_empty() {
        return Err(Error::NotFound(csv.to_string()));
    }

    for occurrence in &occurrences {
        let is_default = is_default_channel(conn, &occurrence.package, &occurrence.channel)
            .map_err(|e| Error::TransactionFailure(e.to_string()))?;
        if is_default && occurrence.depth == 0 {
            let has_successor = has_deeper_entry(conn, &occurrence.package, &occurrence.channel, occurrence.depth)
                .map_err(|e| Error::TransactionFailure(e.to_string()))?;
            if !has_successor {
                return Err(Error::DeprecationWouldRemoveDefaultChannel {
                    package: occurrence.package.clone(),
                    channel: occurrence.channel.clone(),
                    csv: csv.clone(),
                });
            }
        }

        conn.execute(
            "DELETE FROM channel_entry WHERE package_name = ?1 AND channel_name = ?2 AND depth > ?3",
            params![occurrence.package.as_str(), occurrence.channel.as_str(), occurrence.depth],
        )
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;
    }

    conn.execute("INSERT INTO deprecated (operatorbundle_name) VALUES (?1)", params![csv.as_str()])
        .map_err(|e| Error::TransactionFailure(e.to_string()))?;

    let property = Property::deprecated();
    let value = serde_json::to_string(&property.value).map_err(|e| Error::ValidationFailure(e.to_string()))?;
    conn.execute(
        "INSERT INTO properties (type, value, operatorbundle_name, operatorbundle_version, operatorbundle_path)
         SELECT ?1, ?2, name, version, bundlepath FROM operatorbundle WHERE name = ?3",
        params![property.property_type, value, csv.as_str()],
    )
    .map_err(|e| Error::TransactionFailure(e.to_string()))?;

    remove_stranded_bundles(conn)?;
    Ok(())
}
