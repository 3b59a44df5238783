//! Read-only access to a built catalog: package/channel listings, bundle
//! lookups, upgrade-chain traversal and API-provider resolution
//! (`spec.md` §4.6). Every method here opens its own read-only connection
//! via `Store::read_connection`, so queries never contend with a load in
//! progress.
//!
//! Streaming methods are declared to return an eagerly-collected `Vec<T>`
//! rather than a lazy iterator — a disclosed simplification. True
//! record-at-a-time wire streaming belongs at the service boundary, which
//! can drive this same connection from a `spawn_blocking` task and forward
//! rows through a channel as they're produced; duplicating that
//! machinery here would only buy an intermediate lazy layer nothing reads
//! lazily in practice.

mod error;
mod reader;

pub use error::QueryError;

use opreg_model::{Api, Bundle, Channel, ChannelEntry, ChannelName, CsvName, Dependency, EntryId, Package, PackageName, RelatedImage, Version};
use opreg_store::Store;
use rusqlite::{params, Connection, OptionalExtension};

pub type Result<T> = std::result::Result<T, QueryError>;

pub trait Querier {
    fn list_packages(&self) -> Result<Vec<PackageName>>;
    fn get_package(&self, name: &PackageName) -> Result<Package>;
    fn get_bundle(&self, package: &PackageName, channel: &ChannelName, csv: &CsvName) -> Result<Bundle>;
    fn get_bundle_for_channel(&self, package: &PackageName, channel: &ChannelName) -> Result<Bundle>;
    fn get_bundle_that_replaces(&self, csv: &CsvName, package: &PackageName, channel: &ChannelName) -> Result<Bundle>;
    fn get_channel_entries_that_replace(&self, csv: &CsvName) -> Result<Vec<ChannelEntry>>;
    fn get_channel_entries_that_provide(&self, api: &Api) -> Result<Vec<ChannelEntry>>;
    fn get_latest_channel_entries_that_provide(&self, api: &Api) -> Result<Vec<ChannelEntry>>;
    fn get_bundle_that_provides(&self, api: &Api) -> Result<Bundle>;
    fn get_images_for_bundle(&self, csv: &CsvName) -> Result<Vec<RelatedImage>>;
    fn list_images(&self) -> Result<Vec<RelatedImage>>;
    fn get_bundle_name_and_version_for_image(&self, bundle_path: &str) -> Result<(CsvName, Version)>;
    fn get_dependencies_for_bundle(&self, csv: &CsvName, version: &Version, bundle_path: &str) -> Result<Vec<Dependency>>;
    fn get_default_package(&self, package: &PackageName) -> Result<ChannelName>;
    fn list_bundles(&self) -> Result<Vec<Bundle>>;
    fn bundle_name_for_entry(&self, entry_id: EntryId) -> Result<CsvName>;
}

/// The only `Querier` implementation this catalog needs: relational reads
/// against the embedded store. `spec.md` §9 names a second,
/// declarative-config-from-files backend as a coexistence requirement of
/// the trait shape, not a feature this system builds — the trait exists
/// so that extension point is a new `impl Querier`, not a rewrite.
pub struct SqlQuerier<'s> {
    store: &'s Store,
}

impl<'s> SqlQuerier<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }

    fn conn(&self) -> Result<Connection> {
        Ok(self.store.read_connection()?)
    }
}

fn row_to_entry(
    entry_id: i64,
    package_name: &PackageName,
    channel_name: &ChannelName,
    bundle_name: CsvName,
    depth: i64,
    replaces: Option<i64>,
    synthesized: bool,
) -> ChannelEntry {
    ChannelEntry {
        entry_id: EntryId(entry_id),
        package_name: package_name.clone(),
        channel_name: channel_name.clone(),
        bundle_name,
        depth,
        replaces: replaces.map(EntryId),
        synthesized,
    }
}

impl<'s> Querier for SqlQuerier<'s> {
    fn list_packages(&self) -> Result<Vec<PackageName>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM package")?;
        let names = stmt.query_map([], |row| Ok(PackageName::new(row.get::<_, String>(0)?)))?.collect::<rusqlite::Result<_>>()?;
        Ok(names)
    }

    fn get_package(&self, name: &PackageName) -> Result<Package> {
        let conn = self.conn()?;
        let (default_channel, add_mode): (String, Option<String>) = conn
            .query_row(
                "SELECT default_channel, add_mode FROM package WHERE name = ?1",
                params![name.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| QueryError::NotFound(name.to_string()))?;

        let mut stmt = conn.prepare("SELECT name, head_operatorbundle_name FROM channel WHERE package_name = ?1")?;
        let channels = stmt
            .query_map(params![name.as_str()], |row| {
                let channel_name: String = row.get(0)?;
                let head: Option<String> = row.get(1)?;
                Ok(Channel { name: ChannelName::new(channel_name), package_name: name.clone(), head: CsvName::new(head.unwrap_or_default()) })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Package { name: name.clone(), default_channel: ChannelName::new(default_channel), add_mode, channels })
    }

    fn get_bundle(&self, package: &PackageName, channel: &ChannelName, csv: &CsvName) -> Result<Bundle> {
        let conn = self.conn()?;
        let entry_id =
            entry_id_for(&conn, package, channel, csv)?.ok_or_else(|| QueryError::NotFound(format!("{package}/{channel}/{csv}")))?;
        reader::read_bundle(&conn, csv, Some(entry_id))
    }

    fn get_bundle_for_channel(&self, package: &PackageName, channel: &ChannelName) -> Result<Bundle> {
        let conn = self.conn()?;
        let head: CsvName = conn
            .query_row(
                "SELECT head_operatorbundle_name FROM channel WHERE name = ?1 AND package_name = ?2",
                params![channel.as_str(), package.as_str()],
                |row| Ok(CsvName::new(row.get::<_, String>(0)?)),
            )
            .optional()?
            .ok_or_else(|| QueryError::NotFound(format!("{package}/{channel}")))?;
        self.get_bundle(package, channel, &head)
    }

    fn get_bundle_that_replaces(&self, csv: &CsvName, package: &PackageName, channel: &ChannelName) -> Result<Bundle> {
        let conn = self.conn()?;
        let mut target_stmt =
            conn.prepare("SELECT entry_id FROM channel_entry WHERE channel_name = ?1 AND package_name = ?2 AND operatorbundle_name = ?3")?;
        let target_ids: Vec<i64> =
            target_stmt.query_map(params![channel.as_str(), package.as_str(), csv.as_str()], |row| row.get(0))?.collect::<rusqlite::Result<_>>()?;
        if target_ids.is_empty() {
            return Err(QueryError::NotFound(format!("{package}/{channel}/{csv}")));
        }

        let placeholders = target_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT entry_id, operatorbundle_name FROM channel_entry WHERE replaces IN ({placeholders}) ORDER BY depth ASC LIMIT 1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = target_ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        let (entry_id, replacer_csv): (i64, String) = stmt
            .query_row(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?
            .ok_or_else(|| QueryError::NotFound(format!("nothing replaces {csv} in {package}/{channel}")))?;

        reader::read_bundle(&conn, &CsvName::new(replacer_csv), Some(entry_id))
    }

    fn get_channel_entries_that_replace(&self, csv: &CsvName) -> Result<Vec<ChannelEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT ce.entry_id, ce.package_name, ce.channel_name, ce.operatorbundle_name, ce.depth, ce.replaces, ce.synthesized
             FROM channel_entry ce
             JOIN channel_entry target ON target.entry_id = ce.replaces
             WHERE target.operatorbundle_name = ?1",
        )?;
        let entries = stmt
            .query_map(params![csv.as_str()], |row| {
                Ok(row_to_entry(
                    row.get(0)?,
                    &PackageName::new(row.get::<_, String>(1)?),
                    &ChannelName::new(row.get::<_, String>(2)?),
                    CsvName::new(row.get::<_, String>(3)?),
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;
        Ok(entries)
    }

    fn get_channel_entries_that_provide(&self, api: &Api) -> Result<Vec<ChannelEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT ce.entry_id, ce.package_name, ce.channel_name, ce.operatorbundle_name, ce.depth, ce.replaces, ce.synthesized
             FROM channel_entry ce
             JOIN api_provider p ON p.channel_entry_id = ce.entry_id
             WHERE p.group_name = ?1 AND p.version = ?2 AND p.kind = ?3",
        )?;
        let entries = stmt
            .query_map(params![api.group, api.version, api.kind], |row| {
                Ok(row_to_entry(
                    row.get(0)?,
                    &PackageName::new(row.get::<_, String>(1)?),
                    &ChannelName::new(row.get::<_, String>(2)?),
                    CsvName::new(row.get::<_, String>(3)?),
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;
        Ok(entries)
    }

    /// One entry per (package, channel): the minimum-depth match, computed
    /// with a correlated subquery rather than grouping in application code
    /// — the same "let SQL pick the extremum per group" shape the store
    /// crate already uses for `predecessor_of` in `opreg-loader`.
    fn get_latest_channel_entries_that_provide(&self, api: &Api) -> Result<Vec<ChannelEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT ce.entry_id, ce.package_name, ce.channel_name, ce.operatorbundle_name, ce.depth, ce.replaces, ce.synthesized
             FROM channel_entry ce
             JOIN api_provider p ON p.channel_entry_id = ce.entry_id
             WHERE p.group_name = ?1 AND p.version = ?2 AND p.kind = ?3
             AND ce.depth = (
                 SELECT MIN(ce2.depth) FROM channel_entry ce2
                 JOIN api_provider p2 ON p2.channel_entry_id = ce2.entry_id
                 WHERE p2.group_name = p.group_name AND p2.version = p.version AND p2.kind = p.kind
                   AND ce2.package_name = ce.package_name AND ce2.channel_name = ce.channel_name
             )",
        )?;
        let entries = stmt
            .query_map(params![api.group, api.version, api.kind], |row| {
                Ok(row_to_entry(
                    row.get(0)?,
                    &PackageName::new(row.get::<_, String>(1)?),
                    &ChannelName::new(row.get::<_, String>(2)?),
                    CsvName::new(row.get::<_, String>(3)?),
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;
        Ok(entries)
    }

    /// "the single head-closest bundle across default channels" (`spec.md`
    /// §4.6): restricts candidates to each package's default channel, picks
    /// the minimum depth, and fails if more than one package's default
    /// channel provides the API at that same minimum depth. Tie-breaking
    /// beyond that was left unspecified; this implementation treats any
    /// remaining tie as `Ambiguous` rather than guessing an order.
    fn get_bundle_that_provides(&self, api: &Api) -> Result<Bundle> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT ce.entry_id, ce.operatorbundle_name, ce.depth
             FROM channel_entry ce
             JOIN api_provider p ON p.channel_entry_id = ce.entry_id
             JOIN package pkg ON pkg.name = ce.package_name AND pkg.default_channel = ce.channel_name
             WHERE p.group_name = ?1 AND p.version = ?2 AND p.kind = ?3
             ORDER BY ce.depth ASC",
        )?;
        let candidates: Vec<(i64, String, i64)> =
            stmt.query_map(params![api.group, api.version, api.kind], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?.collect::<rusqlite::Result<_>>()?;

        match candidates.as_slice() {
            [] => Err(QueryError::NotFound(format!("no bundle provides {api}"))),
            [(entry_id, csv, _)] => reader::read_bundle(&conn, &CsvName::new(csv.as_str()), Some(*entry_id)),
            [(entry_id, csv, depth), rest @ ..] if !rest.iter().any(|(_, _, d)| d == depth) => {
                reader::read_bundle(&conn, &CsvName::new(csv.as_str()), Some(*entry_id))
            }
            _ => Err(QueryError::Ambiguous(format!("more than one default-channel bundle provides {api}"))),
        }
    }

    fn get_images_for_bundle(&self, csv: &CsvName) -> Result<Vec<RelatedImage>> {
        let conn = self.conn()?;
        reader::read_related_images(&conn, csv)
    }

    fn list_images(&self) -> Result<Vec<RelatedImage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT image FROM related_image")?;
        let images = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?
            .into_iter()
            .filter_map(|image| RelatedImage::new("", image))
            .collect();
        Ok(images)
    }

    fn get_bundle_name_and_version_for_image(&self, bundle_path: &str) -> Result<(CsvName, Version)> {
        let conn = self.conn()?;
        let (name, version): (String, String) = conn
            .query_row("SELECT name, version FROM operatorbundle WHERE bundlepath = ?1", params![bundle_path], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?
            .ok_or_else(|| QueryError::NotFound(bundle_path.to_string()))?;
        let version = Version::parse(&version).map_err(|e| QueryError::Corrupt(bundle_path.to_string(), e.to_string()))?;
        Ok((CsvName::new(name), version))
    }

    fn get_dependencies_for_bundle(&self, csv: &CsvName, version: &Version, bundle_path: &str) -> Result<Vec<Dependency>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT type, value FROM dependencies
             WHERE operatorbundle_name = ?1 AND operatorbundle_version = ?2 AND operatorbundle_path = ?3",
        )?;
        let rows = stmt.query_map(params![csv.as_str(), version.to_string(), bundle_path], |row| {
            let dep_type: String = row.get(0)?;
            let value_raw: String = row.get(1)?;
            Ok((dep_type, value_raw))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (dep_type, value_raw) = row?;
            let dependency_type =
                serde_json::from_value(serde_json::Value::String(dep_type)).map_err(|e| QueryError::Corrupt(csv.to_string(), e.to_string()))?;
            let value = serde_json::from_str(&value_raw).map_err(|e| QueryError::Corrupt(csv.to_string(), e.to_string()))?;
            out.push(Dependency { dependency_type, value });
        }
        Ok(out)
    }

    fn get_default_package(&self, package: &PackageName) -> Result<ChannelName> {
        let conn = self.conn()?;
        conn.query_row("SELECT default_channel FROM package WHERE name = ?1", params![package.as_str()], |row| {
            Ok(ChannelName::new(row.get::<_, String>(0)?))
        })
        .optional()?
        .ok_or_else(|| QueryError::NotFound(package.to_string()))
    }

    /// Every known bundle, independent of channel membership — a bundle
    /// can be persisted and still be stranded (`spec.md` §4.4's sweep
    /// runs at load time, not read time), so this enumerates
    /// `operatorbundle` directly rather than walking channels.
    fn list_bundles(&self) -> Result<Vec<Bundle>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM operatorbundle")?;
        let names: Vec<CsvName> = stmt.query_map([], |row| Ok(CsvName::new(row.get::<_, String>(0)?)))?.collect::<rusqlite::Result<_>>()?;

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let entry_id: Option<i64> = conn
                .query_row(
                    "SELECT entry_id FROM channel_entry WHERE operatorbundle_name = ?1 ORDER BY depth ASC LIMIT 1",
                    params![name.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            out.push(reader::read_bundle(&conn, &name, entry_id)?);
        }
        Ok(out)
    }

    /// Resolves the bundle CSV name of the entry a given `entry_id`
    /// identifies. Used by callers translating a `ChannelEntry.replaces`
    /// link (an internal entry id) into the wire schema's CSV-name-shaped
    /// `replaces` field, which has no meaning for an id defined only
    /// within this store.
    fn bundle_name_for_entry(&self, entry_id: EntryId) -> Result<CsvName> {
        let conn = self.conn()?;
        conn.query_row("SELECT operatorbundle_name FROM channel_entry WHERE entry_id = ?1", params![entry_id.0], |row| {
            Ok(CsvName::new(row.get::<_, String>(0)?))
        })
        .optional()?
        .ok_or_else(|| QueryError::NotFound(format!("channel entry {entry_id}")))
    }
}

/// Resolves the `channel_entry` row for `csv` within `(package, channel)`,
/// preferring the entry nearest the head among any synthesized duplicates
/// of the same CSV. `spec.md` §4.6 does not say which entry a plain
/// `GetBundle` lookup should prefer when more than one exists, so this
/// mirrors `GetLatestChannelEntriesThatProvide`'s nearest-to-head
/// convention rather than picking arbitrarily.
fn entry_id_for(conn: &Connection, package: &PackageName, channel: &ChannelName, csv: &CsvName) -> Result<Option<i64>> {
    let mut stmt = conn.prepare(
        "SELECT entry_id FROM channel_entry WHERE channel_name = ?1 AND package_name = ?2 AND operatorbundle_name = ?3
         ORDER BY depth ASC LIMIT 1",
    )?;
    Ok(stmt.query_row(params![channel.as_str(), package.as_str(), csv.as_str()], |row| row.get(0)).optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opreg_loader::Loader;
    use opreg_model::{ChannelManifest, Dependency as Dep, PackageManifest, Property, UpdateMode};
    use opreg_store::Store;
    use pretty_assertions::assert_eq;

    fn bundle(csv: &str, package: &str, version: &str, replaces: Option<&str>, skips: &[&str]) -> Bundle {
        let mut b = Bundle {
            csv_name: CsvName::new(csv),
            package_name: PackageName::new(package),
            version: Version::parse(version).unwrap(),
            bundle_path: format!("quay.io/{package}/{csv}"),
            skip_range: None,
            replaces: replaces.map(CsvName::new),
            skips: skips.iter().map(|s| CsvName::new(*s)).collect(),
            csv: serde_json::json!({ "kind": "ClusterServiceVersion", "metadata": { "name": csv } }),
            objects: Vec::new(),
            related_images: vec![RelatedImage::new("operator", format!("quay.io/{package}/{csv}-image")).unwrap()],
            provided_apis: vec![Api::new(format!("{package}.coreos.com"), "v1beta2", "EtcdCluster", "etcdclusters")],
            required_apis: Vec::new(),
            properties: Vec::new(),
            dependencies: vec![Dep::package("base", ">=1.0.0")],
        };
        b.ensure_package_property();
        b
    }

    fn seeded_store() -> Store {
        let store = Store::create(":memory:").unwrap();
        let base = bundle("etcd.v0.9.0", "etcd", "0.9.0", None, &[]);
        let head = bundle("etcd.v0.9.2", "etcd", "0.9.2", Some("etcd.v0.9.0"), &["etcd.v0.9.1"]);
        let manifest = PackageManifest {
            package_name: PackageName::new("etcd"),
            default_channel: ChannelName::new("alpha"),
            channels: vec![ChannelManifest { name: ChannelName::new("alpha"), current_csv_name: CsvName::new("etcd.v0.9.2") }],
        };
        let loader = Loader::new(&store, UpdateMode::Replaces);
        loader.add_operator_bundle(&base).unwrap();
        loader.add_operator_bundle(&head).unwrap();
        loader.add_package_channels(&manifest, &[base, head]).unwrap();
        store
    }

    #[test]
    fn list_and_get_package_round_trip() {
        let store = seeded_store();
        let querier = SqlQuerier::new(&store);
        assert_eq!(querier.list_packages().unwrap(), vec![PackageName::new("etcd")]);

        let package = querier.get_package(&PackageName::new("etcd")).unwrap();
        assert_eq!(package.default_channel, ChannelName::new("alpha"));
        assert_eq!(package.channels.len(), 1);
        assert_eq!(package.channels[0].head, CsvName::new("etcd.v0.9.2"));
    }

    #[test]
    fn get_package_fails_not_found_for_unknown_package() {
        let store = seeded_store();
        let querier = SqlQuerier::new(&store);
        assert!(matches!(querier.get_package(&PackageName::new("nope")), Err(QueryError::NotFound(_))));
    }

    #[test]
    fn get_bundle_for_channel_returns_the_head() {
        let store = seeded_store();
        let querier = SqlQuerier::new(&store);
        let head = querier.get_bundle_for_channel(&PackageName::new("etcd"), &ChannelName::new("alpha")).unwrap();
        assert_eq!(head.csv_name, CsvName::new("etcd.v0.9.2"));
        assert_eq!(head.related_images.len(), 1);
        assert_eq!(head.dependencies.len(), 1);
    }

    #[test]
    fn get_bundle_that_replaces_resolves_through_a_synthesized_skip_target() {
        let store = seeded_store();
        let querier = SqlQuerier::new(&store);
        let replacer = querier
            .get_bundle_that_replaces(&CsvName::new("etcd.v0.9.1"), &PackageName::new("etcd"), &ChannelName::new("alpha"))
            .unwrap();
        assert_eq!(replacer.csv_name, CsvName::new("etcd.v0.9.2"));
    }

    #[test]
    fn get_channel_entries_that_provide_finds_every_provider() {
        let store = seeded_store();
        let querier = SqlQuerier::new(&store);
        let api = Api::new("etcd.coreos.com", "v1beta2", "EtcdCluster", "");
        let entries = querier.get_channel_entries_that_provide(&api).unwrap();
        assert!(!entries.is_empty());
        assert!(entries.iter().all(|e| e.package_name == PackageName::new("etcd")));
    }

    #[test]
    fn get_latest_channel_entries_that_provide_picks_the_head_closest_entry() {
        let store = seeded_store();
        let querier = SqlQuerier::new(&store);
        let api = Api::new("etcd.coreos.com", "v1beta2", "EtcdCluster", "");
        let entries = querier.get_latest_channel_entries_that_provide(&api).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].bundle_name, CsvName::new("etcd.v0.9.2"));
    }

    #[test]
    fn get_bundle_that_provides_returns_the_unique_default_channel_provider() {
        let store = seeded_store();
        let querier = SqlQuerier::new(&store);
        let api = Api::new("etcd.coreos.com", "v1beta2", "EtcdCluster", "");
        let provider = querier.get_bundle_that_provides(&api).unwrap();
        assert_eq!(provider.csv_name, CsvName::new("etcd.v0.9.2"));
    }

    #[test]
    fn get_bundle_that_provides_fails_not_found_for_an_unknown_api() {
        let store = seeded_store();
        let querier = SqlQuerier::new(&store);
        let api = Api::new("nothing.example.com", "v1", "Widget", "");
        assert!(matches!(querier.get_bundle_that_provides(&api), Err(QueryError::NotFound(_))));
    }

    #[test]
    fn images_and_dependencies_are_queryable_by_bundle_identity() {
        let store = seeded_store();
        let querier = SqlQuerier::new(&store);
        let images = querier.get_images_for_bundle(&CsvName::new("etcd.v0.9.2")).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(querier.list_images().unwrap().len(), 2);

        let deps = querier
            .get_dependencies_for_bundle(&CsvName::new("etcd.v0.9.2"), &Version::parse("0.9.2").unwrap(), "quay.io/etcd/etcd.v0.9.2")
            .unwrap();
        assert_eq!(deps.len(), 1);

        let (name, version) = querier.get_bundle_name_and_version_for_image("quay.io/etcd/etcd.v0.9.2").unwrap();
        assert_eq!(name, CsvName::new("etcd.v0.9.2"));
        assert_eq!(version, Version::parse("0.9.2").unwrap());
    }

    #[test]
    fn get_default_package_returns_the_declared_default_channel() {
        let store = seeded_store();
        let querier = SqlQuerier::new(&store);
        assert_eq!(querier.get_default_package(&PackageName::new("etcd")).unwrap(), ChannelName::new("alpha"));
    }

    #[test]
    fn list_bundles_enumerates_every_persisted_bundle_regardless_of_channel_wiring() {
        let store = seeded_store();
        let querier = SqlQuerier::new(&store);
        let mut names: Vec<_> = querier.list_bundles().unwrap().into_iter().map(|b| b.csv_name).collect();
        names.sort();
        assert_eq!(names, vec![CsvName::new("etcd.v0.9.0"), CsvName::new("etcd.v0.9.2")]);
    }

    #[test]
    fn bundle_name_for_entry_resolves_the_replaces_link() {
        let store = seeded_store();
        let querier = SqlQuerier::new(&store);
        let head = querier.get_channel_entries_that_replace(&CsvName::new("etcd.v0.9.1")).unwrap();
        let head_entry = &head[0];
        let target = head_entry.replaces.expect("the head's entry replaces a skip placeholder");
        let name = querier.bundle_name_for_entry(target).unwrap();
        assert_eq!(name, CsvName::new("etcd.v0.9.1"));
    }
}
