use crate::error::{QueryError, Result};
use opreg_model::{Api, Bundle, CsvName, Dependency, PackageName, Property, RelatedImage, Version};
use rusqlite::{params, Connection, OptionalExtension};

/// Reassembles a full `Bundle` from its `operatorbundle` row plus the
/// derived tables a load scattered it across. `entry_id` selects which
/// `channel_entry`'s provided/required APIs to attach — the same CSV can
/// carry different API associations at different entries when a
/// synthesized duplicate was built from a different source record, though
/// in practice the Loader always copies the same set (`spec.md` §4.6,
/// "populates provided/required APIs from the entry"). `None` is for
/// listings that enumerate `operatorbundle` directly rather than through a
/// channel — a bundle that is not wired into any channel yet has no
/// provided/required APIs to attach.
pub fn read_bundle(conn: &Connection, csv: &CsvName, entry_id: Option<i64>) -> Result<Bundle> {
    let (csv_json, objects_json, bundle_path, version_raw, skiprange_raw, replaces_raw, skips_json, package_name): (
        String,
        String,
        String,
        String,
        Option<String>,
        Option<String>,
        String,
        String,
    ) = conn
        .query_row(
            "SELECT csv, bundle, bundlepath, version, skiprange, replaces, skips, package_name
             FROM operatorbundle WHERE name = ?1",
            params![csv.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?)),
        )
        .optional()?
        .ok_or_else(|| QueryError::NotFound(csv.to_string()))?;

    let csv_value = serde_json::from_str(&csv_json).map_err(|e| QueryError::Corrupt(csv.to_string(), e.to_string()))?;
    let objects = serde_json::from_str(&objects_json).map_err(|e| QueryError::Corrupt(csv.to_string(), e.to_string()))?;
    let skips: Vec<CsvName> = serde_json::from_str::<Vec<String>>(&skips_json)
        .map_err(|e| QueryError::Corrupt(csv.to_string(), e.to_string()))?
        .into_iter()
        .map(CsvName::new)
        .collect();
    let version = Version::parse(&version_raw).map_err(|e| QueryError::Corrupt(csv.to_string(), e.to_string()))?;
    let skip_range = skiprange_raw
        .as_deref()
        .map(opreg_model::SkipRange::parse)
        .transpose()
        .map_err(|e| QueryError::Corrupt(csv.to_string(), e.to_string()))?;

    let properties = read_properties(conn, csv)?;
    let dependencies = read_dependencies(conn, csv)?;
    let related_images = read_related_images(conn, csv)?;
    let (provided_apis, required_apis) = match entry_id {
        Some(id) => read_entry_apis(conn, id)?,
        None => (Vec::new(), Vec::new()),
    };

    Ok(Bundle {
        csv_name: csv.clone(),
        package_name: PackageName::new(package_name),
        version,
        bundle_path,
        skip_range,
        replaces: replaces_raw.map(CsvName::new),
        skips,
        csv: csv_value,
        objects,
        related_images,
        provided_apis,
        required_apis,
        properties,
        dependencies,
    })
}

fn read_properties(conn: &Connection, csv: &CsvName) -> Result<Vec<Property>> {
    let mut stmt = conn.prepare("SELECT type, value FROM properties WHERE operatorbundle_name = ?1")?;
    let rows = stmt.query_map(params![csv.as_str()], |row| {
        let property_type: String = row.get(0)?;
        let value_raw: String = row.get(1)?;
        Ok((property_type, value_raw))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (property_type, value_raw) = row?;
        let value = serde_json::from_str(&value_raw).map_err(|e| QueryError::Corrupt(csv.to_string(), e.to_string()))?;
        out.push(Property { property_type, value });
    }
    Ok(out)
}

fn read_dependencies(conn: &Connection, csv: &CsvName) -> Result<Vec<Dependency>> {
    let mut stmt = conn.prepare("SELECT type, value FROM dependencies WHERE operatorbundle_name = ?1")?;
    let rows = stmt.query_map(params![csv.as_str()], |row| {
        let dep_type: String = row.get(0)?;
        let value_raw: String = row.get(1)?;
        Ok((dep_type, value_raw))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (dep_type, value_raw) = row?;
        let dependency_type = serde_json::from_value(serde_json::Value::String(dep_type.clone()))
            .map_err(|e| QueryError::Corrupt(csv.to_string(), e.to_string()))?;
        let value = serde_json::from_str(&value_raw).map_err(|e| QueryError::Corrupt(csv.to_string(), e.to_string()))?;
        out.push(Dependency { dependency_type, value });
    }
    Ok(out)
}

/// `related_image` persists only `image`, not the CSV-scoped display
/// `name` — the store schema mirrors the original registry's table shape,
/// which never carried one either. Reconstructed entries use an empty name.
pub(crate) fn read_related_images(conn: &Connection, csv: &CsvName) -> Result<Vec<RelatedImage>> {
    let mut stmt = conn.prepare("SELECT image FROM related_image WHERE operatorbundle_name = ?1")?;
    let rows = stmt.query_map(params![csv.as_str()], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for image in rows {
        if let Some(related) = RelatedImage::new("", image?) {
            out.push(related);
        }
    }
    Ok(out)
}

fn read_entry_apis(conn: &Connection, entry_id: i64) -> Result<(Vec<Api>, Vec<Api>)> {
    let mut provided_stmt = conn.prepare(
        "SELECT p.group_name, p.version, p.kind, a.plural
         FROM api_provider p JOIN api a ON (a.group_name, a.version, a.kind) = (p.group_name, p.version, p.kind)
         WHERE p.channel_entry_id = ?1",
    )?;
    let provided = provided_stmt
        .query_map(params![entry_id], |row| {
            Ok(Api::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?, row.get::<_, String>(3)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    // Required APIs are tracked without a `plural` column — a bundle never
    // owns the CRD it requires, so it has no occasion to declare one.
    let mut required_stmt = conn.prepare("SELECT group_name, version, kind FROM api_requirer WHERE channel_entry_id = ?1")?;
    let required = required_stmt
        .query_map(params![entry_id], |row| Ok(Api::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?, "")))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok((provided, required))
}
