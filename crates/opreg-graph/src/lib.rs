//! Materializes a package's upgrade graph straight from persisted
//! `channel_entry` rows, independent of whatever the Loader last cached on
//! `channel.head_operatorbundle_name` (`spec.md` §4.5) — useful both as the
//! Querier's read path and as a standalone consistency check on the store.

mod error;

pub use error::GraphError;

use opreg_model::{BundleKey, ChannelName, CsvName, PackageName, Version};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

/// One distinct bundle within a materialized channel: its identity plus
/// the bundles it replaces. Synthesized (skip) duplicates of the same CSV
/// are collapsed into this single node, contributing only their `replaces`
/// edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphBundle {
    pub key: BundleKey,
    pub replaces: Vec<BundleKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphChannel {
    pub name: ChannelName,
    pub head: BundleKey,
    pub bundles: Vec<GraphBundle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphPackage {
    pub name: PackageName,
    pub default_channel: ChannelName,
    pub channels: HashMap<ChannelName, GraphChannel>,
}

struct Row {
    entry_id: i64,
    csv_name: CsvName,
    depth: i64,
    replaces: Option<i64>,
    synthesized: bool,
    version: Version,
    bundle_path: String,
}

/// Loads `package`'s full upgrade graph, or `Ok(None)` if no such package
/// is on record.
pub fn load_package(conn: &Connection, package: &PackageName) -> Result<Option<GraphPackage>, GraphError> {
    let Some(default_channel) = conn
        .query_row(
            "SELECT default_channel FROM package WHERE name = ?1",
            params![package.as_str()],
            |row| Ok(ChannelName::new(row.get::<_, String>(0)?)),
        )
        .optional()?
    else {
        return Ok(None);
    };

    let mut channel_names_stmt = conn.prepare("SELECT name FROM channel WHERE package_name = ?1")?;
    let channel_names: Vec<ChannelName> = channel_names_stmt
        .query_map(params![package.as_str()], |row| Ok(ChannelName::new(row.get::<_, String>(0)?)))?
        .collect::<rusqlite::Result<_>>()?;

    let mut channels = HashMap::new();
    for name in channel_names {
        if let Some(channel) = load_channel(conn, package, &name)? {
            channels.insert(channel.name.clone(), channel);
        }
    }

    Ok(Some(GraphPackage { name: package.clone(), default_channel, channels }))
}

/// Loads a single channel's graph, or `Ok(None)` if it has no entries
/// (a channel declared in the manifest but never successfully built).
pub fn load_channel(conn: &Connection, package: &PackageName, channel: &ChannelName) -> Result<Option<GraphChannel>, GraphError> {
    let mut stmt = conn.prepare(
        "SELECT ce.entry_id, ce.operatorbundle_name, ce.depth, ce.replaces, ce.synthesized, ob.version, ob.bundlepath
         FROM channel_entry ce JOIN operatorbundle ob ON ob.name = ce.operatorbundle_name
         WHERE ce.channel_name = ?1 AND ce.package_name = ?2
         ORDER BY ce.depth ASC",
    )?;
    let rows: Vec<Row> = stmt
        .query_map(params![channel.as_str(), package.as_str()], |row| {
            let version_raw: String = row.get(5)?;
            let version = Version::parse(&version_raw)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)))?;
            Ok(Row {
                entry_id: row.get(0)?,
                csv_name: CsvName::new(row.get::<_, String>(1)?),
                depth: row.get(2)?,
                replaces: row.get(3)?,
                synthesized: row.get(4)?,
                version,
                bundle_path: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<_>>()?;

    if rows.is_empty() {
        return Ok(None);
    }

    let entry_to_key: HashMap<i64, BundleKey> = rows
        .iter()
        .map(|r| (r.entry_id, BundleKey { csv_name: r.csv_name.clone(), version: r.version.clone(), bundle_path: r.bundle_path.clone() }))
        .collect();

    let mut bundles: HashMap<CsvName, GraphBundle> = HashMap::new();
    let mut head: Option<BundleKey> = None;
    for row in &rows {
        let key = entry_to_key[&row.entry_id].clone();
        if row.depth == 0 && !row.synthesized {
            head = Some(key.clone());
        }
        let node = bundles.entry(row.csv_name.clone()).or_insert_with(|| GraphBundle { key: key.clone(), replaces: Vec::new() });
        if let Some(target_id) = row.replaces {
            if let Some(target_key) = entry_to_key.get(&target_id) {
                node.replaces.push(target_key.clone());
            }
        }
    }

    let Some(head) = head else {
        return Err(GraphError::NoHeadEntry { package: package.clone(), channel: channel.clone() });
    };

    Ok(Some(GraphChannel { name: channel.clone(), head, bundles: bundles.into_values().collect() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opreg_loader::Loader;
    use opreg_model::{Bundle, ChannelManifest, PackageManifest, UpdateMode};
    use opreg_store::Store;
    use pretty_assertions::assert_eq;

    fn bundle(csv: &str, version: &str, replaces: Option<&str>, skips: &[&str]) -> Bundle {
        let mut b = Bundle {
            csv_name: CsvName::new(csv),
            package_name: PackageName::new("etcd"),
            version: Version::parse(version).unwrap(),
            bundle_path: format!("quay.io/etcd/{csv}"),
            skip_range: None,
            replaces: replaces.map(CsvName::new),
            skips: skips.iter().map(|s| CsvName::new(*s)).collect(),
            csv: serde_json::json!({}),
            objects: Vec::new(),
            related_images: Vec::new(),
            provided_apis: Vec::new(),
            required_apis: Vec::new(),
            properties: Vec::new(),
            dependencies: Vec::new(),
        };
        b.ensure_package_property();
        b
    }

    #[test]
    fn collapses_synthesized_duplicates_and_finds_the_head() {
        let store = Store::create(":memory:").unwrap();
        let base = bundle("etcd.v0.9.0", "0.9.0", None, &[]);
        let head_bundle = bundle("etcd.v0.9.2", "0.9.2", Some("etcd.v0.9.0"), &["etcd.v0.9.1"]);
        let manifest = PackageManifest {
            package_name: PackageName::new("etcd"),
            default_channel: ChannelName::new("alpha"),
            channels: vec![ChannelManifest { name: ChannelName::new("alpha"), current_csv_name: CsvName::new("etcd.v0.9.2") }],
        };

        let loader = Loader::new(&store, UpdateMode::Replaces);
        loader.add_operator_bundle(&base).unwrap();
        loader.add_operator_bundle(&head_bundle).unwrap();
        loader.add_package_channels(&manifest, &[base, head_bundle]).unwrap();

        let conn = store.read_connection().unwrap();
        let package = load_package(&conn, &PackageName::new("etcd")).unwrap().expect("package loaded");
        assert_eq!(package.default_channel, ChannelName::new("alpha"));

        let channel = &package.channels[&ChannelName::new("alpha")];
        assert_eq!(channel.head.csv_name, CsvName::new("etcd.v0.9.2"));
        // Three distinct CSVs survive collapsing: head, skip placeholder, base.
        assert_eq!(channel.bundles.len(), 3);

        // Collapsing merges the head's real entry (replaces the base) with
        // its synthesized skip-sibling (replaces the skip placeholder), so
        // both edges survive on the single merged node.
        let head_node = channel.bundles.iter().find(|b| b.key.csv_name == CsvName::new("etcd.v0.9.2")).unwrap();
        let replaced_names: std::collections::HashSet<_> = head_node.replaces.iter().map(|k| k.csv_name.clone()).collect();
        assert_eq!(replaced_names, std::collections::HashSet::from([CsvName::new("etcd.v0.9.0"), CsvName::new("etcd.v0.9.1")]));
    }

    #[test]
    fn missing_package_yields_none() {
        let store = Store::create(":memory:").unwrap();
        let conn = store.read_connection().unwrap();
        assert!(load_package(&conn, &PackageName::new("nope")).unwrap().is_none());
    }
}
