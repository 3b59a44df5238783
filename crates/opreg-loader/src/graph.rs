use crate::rows::insert_entry_apis;
use opreg_model::{Bundle, ChannelName, CsvName, Error, LoadErrors, PackageName};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};

type BundlesByCsv<'a> = HashMap<CsvName, &'a Bundle>;

fn insert_entry(
    conn: &Connection,
    channel: &ChannelName,
    package: &PackageName,
    csv: &CsvName,
    depth: i64,
    replaces: Option<i64>,
    synthesized: bool,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO channel_entry (channel_name, package_name, operatorbundle_name, replaces, depth, synthesized)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![channel.as_str(), package.as_str(), csv.as_str(), replaces, depth, synthesized],
    )?;
    Ok(conn.last_insert_rowid())
}

fn set_entry_replaces(conn: &Connection, entry_id: i64, replaces: i64) -> rusqlite::Result<()> {
    conn.execute("UPDATE channel_entry SET replaces = ?1 WHERE entry_id = ?2", params![replaces, entry_id])?;
    Ok(())
}

/// Creates the skip placeholder + synthesized-self pair for every `skip`
/// `bundle` declares, at `at_depth` (`spec.md` §4.4 step 3).
fn synthesize_skips(
    conn: &Connection,
    channel: &ChannelName,
    package: &PackageName,
    bundle: &Bundle,
    at_depth: i64,
) -> rusqlite::Result<()> {
    for skip in &bundle.skips {
        let placeholder_id = insert_entry(conn, channel, package, skip, at_depth, None, false)?;
        let synth_id = insert_entry(conn, channel, package, &bundle.csv_name, at_depth, Some(placeholder_id), true)?;
        insert_entry_apis(conn, synth_id, bundle)?;
    }
    Ok(())
}

/// Builds a channel's entire entry chain from its declared head, walking
/// `replaces` backward until a terminal bundle, a missing replacee, or a
/// cycle is found (`spec.md` §4.4, "Loading a package").
pub fn build_fresh_channel(
    conn: &Connection,
    package: &PackageName,
    channel: &ChannelName,
    head_csv: &CsvName,
    bundles: &BundlesByCsv,
    errors: &mut LoadErrors,
) -> rusqlite::Result<()> {
    let Some(mut current_bundle) = bundles.get(head_csv).copied() else {
        errors.push(
            head_csv.clone(),
            Error::MissingChannelEntry { package: package.clone(), channel: channel.clone(), csv: head_csv.clone() },
        );
        return Ok(());
    };

    conn.execute(
        "UPDATE channel SET head_operatorbundle_name = ?1 WHERE name = ?2 AND package_name = ?3",
        params![head_csv.as_str(), channel.as_str(), package.as_str()],
    )?;

    let mut visited: HashSet<CsvName> = HashSet::from([head_csv.clone()]);
    let mut current_csv = head_csv.clone();
    let mut entry_id = insert_entry(conn, channel, package, &current_csv, 0, None, false)?;
    insert_entry_apis(conn, entry_id, current_bundle)?;

    let mut depth = 0i64;
    loop {
        synthesize_skips(conn, channel, package, current_bundle, depth + 1)?;

        let Some(next_csv) = current_bundle.replaces.clone() else {
            break;
        };
        if visited.contains(&next_csv) {
            errors.push(
                current_csv.clone(),
                Error::Cycle { package: package.clone(), channel: channel.clone(), csv: next_csv },
            );
            break;
        }
        let Some(next_bundle) = bundles.get(&next_csv).copied() else {
            errors.push(
                current_csv.clone(),
                Error::MissingReplacee {
                    package: package.clone(),
                    channel: channel.clone(),
                    replacing: current_csv.clone(),
                    missing: next_csv,
                },
            );
            break;
        };

        visited.insert(next_csv.clone());
        let next_id = insert_entry(conn, channel, package, &next_csv, depth + 1, None, false)?;
        insert_entry_apis(conn, next_id, next_bundle)?;
        set_entry_replaces(conn, entry_id, next_id)?;

        entry_id = next_id;
        depth += 1;
        current_csv = next_csv;
        current_bundle = next_bundle;
    }

    Ok(())
}

struct ExistingEntry {
    entry_id: i64,
    depth: i64,
}

fn find_entry_for_csv(
    conn: &Connection,
    channel: &ChannelName,
    package: &PackageName,
    csv: &CsvName,
) -> rusqlite::Result<Option<ExistingEntry>> {
    conn.query_row(
        "SELECT entry_id, depth FROM channel_entry
         WHERE channel_name = ?1 AND package_name = ?2 AND operatorbundle_name = ?3 AND synthesized = 0
         ORDER BY depth ASC LIMIT 1",
        params![channel.as_str(), package.as_str(), csv.as_str()],
        |row| Ok(ExistingEntry { entry_id: row.get(0)?, depth: row.get(1)? }),
    )
    .optional()
}

fn predecessor_of(conn: &Connection, target_entry_id: i64) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT entry_id FROM channel_entry WHERE replaces = ?1 AND synthesized = 0",
        params![target_entry_id],
        |row| row.get(0),
    )
    .optional()
}

/// Inserts `bundle` immediately above `target`, shifting `target` and
/// everything at or deeper than it down by one. Used both when the new
/// bundle becomes the channel head (`target` is the current depth-0
/// entry) and when it slots in partway down an existing chain
/// (`spec.md` §4.4, "Loading a package in update mode").
fn insert_before(
    conn: &Connection,
    package: &PackageName,
    channel: &ChannelName,
    target: &ExistingEntry,
    bundle: &Bundle,
    new_default_channel: Option<&ChannelName>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE channel_entry SET depth = depth + 1
         WHERE channel_name = ?1 AND package_name = ?2 AND depth >= ?3",
        params![channel.as_str(), package.as_str(), target.depth],
    )?;

    let new_entry_id = insert_entry(conn, channel, package, &bundle.csv_name, target.depth, Some(target.entry_id), false)?;
    insert_entry_apis(conn, new_entry_id, bundle)?;
    synthesize_skips(conn, channel, package, bundle, target.depth + 1)?;

    if target.depth == 0 {
        conn.execute(
            "UPDATE channel SET head_operatorbundle_name = ?1 WHERE name = ?2 AND package_name = ?3",
            params![bundle.csv_name.as_str(), channel.as_str(), package.as_str()],
        )?;
        if let Some(default_channel) = new_default_channel {
            conn.execute(
                "UPDATE package SET default_channel = ?1 WHERE name = ?2",
                params![default_channel.as_str(), package.as_str()],
            )?;
        }
    } else if let Some(predecessor_id) = predecessor_of(conn, target.entry_id)? {
        set_entry_replaces(conn, predecessor_id, new_entry_id)?;
    }

    Ok(())
}

/// Adds a new head (or mid-chain) bundle to an already-populated channel.
/// Returns a `ValidationFailure` when the bundle's declared `skips` don't
/// match the CSVs strictly between the current head and its `replaces`
/// target, as required to slot it in anywhere but the head.
pub fn update_existing_channel(
    conn: &Connection,
    package: &PackageName,
    channel: &ChannelName,
    new_head: &Bundle,
    new_default_channel: Option<&ChannelName>,
    errors: &mut LoadErrors,
) -> rusqlite::Result<()> {
    let Some(replaces_csv) = new_head.replaces.clone() else {
        errors.push(
            new_head.csv_name.clone(),
            Error::ValidationFailure(format!(
                "bundle {} declares no replaces; cannot update channel {channel} of package {package}",
                new_head.csv_name
            )),
        );
        return Ok(());
    };

    let Some(target) = find_entry_for_csv(conn, channel, package, &replaces_csv)? else {
        errors.push(
            new_head.csv_name.clone(),
            Error::MissingReplacee {
                package: package.clone(),
                channel: channel.clone(),
                replacing: new_head.csv_name.clone(),
                missing: replaces_csv,
            },
        );
        return Ok(());
    };

    if target.depth > 0 {
        let intervening = collect_intervening_csvs(conn, channel, package, target.depth)?;
        let declared: HashSet<&str> = new_head.skips.iter().map(|c| c.as_str()).collect();
        let expected: HashSet<&str> = intervening.iter().map(|c| c.as_str()).collect();
        if declared != expected {
            errors.push(
                new_head.csv_name.clone(),
                Error::ValidationFailure(format!(
                    "bundle {} must skip exactly {:?} to slot in at depth {} of channel {channel}, declared {:?}",
                    new_head.csv_name, expected, target.depth, declared
                )),
            );
            return Ok(());
        }
    }

    insert_before(conn, package, channel, &target, new_head, new_default_channel)
}

/// The non-synthesized CSVs at depths `0..target_depth`, in depth order —
/// the history a mid-chain insertion must declare as `skips`.
fn collect_intervening_csvs(
    conn: &Connection,
    channel: &ChannelName,
    package: &PackageName,
    target_depth: i64,
) -> rusqlite::Result<Vec<CsvName>> {
    let mut stmt = conn.prepare(
        "SELECT operatorbundle_name FROM channel_entry
         WHERE channel_name = ?1 AND package_name = ?2 AND synthesized = 0 AND depth < ?3
         ORDER BY depth ASC",
    )?;
    let rows = stmt.query_map(params![channel.as_str(), package.as_str(), target_depth], |row| {
        let name: String = row.get(0)?;
        Ok(CsvName::new(name))
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opreg_model::{PackageName, Version};
    use opreg_store::Store;
    use pretty_assertions::assert_eq;

    fn bundle(csv: &str, replaces: Option<&str>, skips: &[&str]) -> Bundle {
        Bundle {
            csv_name: CsvName::new(csv),
            package_name: PackageName::new("etcd"),
            version: Version::parse("0.9.0").unwrap(),
            bundle_path: String::new(),
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
        }
    }

    fn store_err(e: rusqlite::Error) -> opreg_model::Error {
        opreg_model::Error::TransactionFailure(e.to_string())
    }

    /// Builds channel `alpha` as head A (`etcd.v0.9.1`) replacing base B
    /// (`etcd.v0.9.0`), depths 0 and 1 respectively.
    fn setup_two_entry_channel(store: &Store, package: &PackageName, channel: &ChannelName) {
        store
            .with_writer(|conn| {
                conn.execute("INSERT INTO package (name, default_channel) VALUES ('etcd', 'alpha')", []).map_err(store_err)?;
                conn.execute("INSERT INTO channel (name, package_name) VALUES ('alpha', 'etcd')", []).map_err(store_err)?;
                let mut errors = LoadErrors::new();
                let a = bundle("etcd.v0.9.1", Some("etcd.v0.9.0"), &[]);
                let b = bundle("etcd.v0.9.0", None, &[]);
                let bundles: BundlesByCsv = [(CsvName::new("etcd.v0.9.1"), &a), (CsvName::new("etcd.v0.9.0"), &b)].into_iter().collect();
                build_fresh_channel(conn, package, channel, &CsvName::new("etcd.v0.9.1"), &bundles, &mut errors).map_err(store_err)?;
                assert!(errors.is_empty());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn mid_chain_insertion_rejects_a_bundle_whose_declared_skips_miss_the_intervening_entry() {
        let store = Store::create(":memory:").unwrap();
        let package = PackageName::new("etcd");
        let channel = ChannelName::new("alpha");
        setup_two_entry_channel(&store, &package, &channel);

        store
            .with_writer(|conn| {
                let mut errors = LoadErrors::new();
                // Replaces B (depth 1), so it must declare A (the sole
                // entry strictly above B) as a skip — this one doesn't.
                let wrong_skip = bundle("etcd.v0.9.1.1", Some("etcd.v0.9.0"), &["etcd.v0.9.1-not-it"]);
                update_existing_channel(conn, &package, &channel, &wrong_skip, None, &mut errors).map_err(store_err)?;
                assert_eq!(errors.errors.len(), 1);
                assert!(matches!(errors.errors[0].1, Error::ValidationFailure(_)));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn mid_chain_insertion_accepts_a_bundle_whose_declared_skips_match_the_intervening_entry() {
        let store = Store::create(":memory:").unwrap();
        let package = PackageName::new("etcd");
        let channel = ChannelName::new("alpha");
        setup_two_entry_channel(&store, &package, &channel);

        store
            .with_writer(|conn| {
                let mut errors = LoadErrors::new();
                let right_skip = bundle("etcd.v0.9.1.1", Some("etcd.v0.9.0"), &["etcd.v0.9.1"]);
                update_existing_channel(conn, &package, &channel, &right_skip, None, &mut errors).map_err(store_err)?;
                assert!(errors.is_empty(), "unexpected errors: {errors:?}");

                // Inserted strictly below the existing head, so the head
                // pointer is untouched — only the new bundle slots in
                // between A and B.
                let head: String = conn
                    .query_row("SELECT head_operatorbundle_name FROM channel WHERE name = 'alpha' AND package_name = 'etcd'", [], |r| r.get(0))
                    .map_err(store_err)?;
                assert_eq!(head, "etcd.v0.9.1");

                let total: i64 = conn
                    .query_row("SELECT COUNT(*) FROM channel_entry WHERE channel_name = 'alpha' AND package_name = 'etcd'", [], |r| r.get(0))
                    .map_err(store_err)?;
                assert_eq!(total, 3);
                Ok(())
            })
            .unwrap();
    }
}
