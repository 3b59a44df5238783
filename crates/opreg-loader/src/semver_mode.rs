use crate::rows::insert_entry_apis;
use opreg_model::{Bundle, ChannelName, CsvName, Error, LoadErrors, PackageName};
use rusqlite::{params, Connection};
use std::collections::{HashMap, HashSet};

type BundlesByCsv<'a> = HashMap<CsvName, &'a Bundle>;

/// The non-synthesized (real, not skip-placeholder) bundle names already
/// persisted for a channel, so a rebuild can tell whether `bundles` covers
/// the channel's full history or only a subset of it.
fn existing_channel_members(conn: &Connection, package: &PackageName, channel: &ChannelName) -> rusqlite::Result<Vec<CsvName>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT operatorbundle_name FROM channel_entry
         WHERE channel_name = ?1 AND package_name = ?2 AND synthesized = 0",
    )?;
    let rows = stmt.query_map(params![channel.as_str(), package.as_str()], |row| row.get::<_, String>(0))?;
    rows.map(|r| r.map(CsvName::new)).collect()
}

/// Discovers a channel's membership the same way replaces-mode does —
/// by walking declared `replaces` edges from the head — since a bundle's
/// CSV always carries that field regardless of which `UpdateMode` its
/// package uses. SemVer modes then reorder this set by version rather
/// than trusting the walk order (`spec.md` §4.4, "SemVer modes").
fn discover_members<'a>(
    package: &PackageName,
    channel: &ChannelName,
    head_csv: &CsvName,
    bundles: &'a BundlesByCsv,
    errors: &mut LoadErrors,
) -> Vec<&'a Bundle> {
    let mut members = Vec::new();
    let mut visited: HashSet<CsvName> = HashSet::new();
    let mut current = head_csv.clone();

    loop {
        let Some(bundle) = bundles.get(&current).copied() else {
            errors.push(
                current.clone(),
                Error::MissingChannelEntry { package: package.clone(), channel: channel.clone(), csv: current.clone() },
            );
            break;
        };
        if !visited.insert(current.clone()) {
            errors.push(current.clone(), Error::Cycle { package: package.clone(), channel: channel.clone(), csv: current.clone() });
            break;
        }
        members.push(bundle);
        match &bundle.replaces {
            Some(next) => current = next.clone(),
            None => break,
        }
    }
    members
}

/// Rebuilds a channel's entries from scratch, ordered by descending
/// semantic version. In `skip_patch` mode, bundles sharing a major.minor
/// are collapsed into one advancing entry per group; the rest become
/// synthesized siblings that mutually skip one another, matching how
/// plain skips are represented under replaces mode.
///
/// `bundles` must cover every bundle already wired into the channel, not
/// just the ones a caller is freshly adding — a rebuild replaces the
/// channel's entire entry set, so a partial `bundles` would otherwise
/// silently drop whatever history it omits. That's checked upfront: any
/// persisted member missing from `bundles` aborts the rebuild with a
/// `MissingChannelEntry` error instead of deleting rows it can't restore.
pub fn rebuild_semver_channel(
    conn: &Connection,
    package: &PackageName,
    channel: &ChannelName,
    head_csv: &CsvName,
    bundles: &BundlesByCsv,
    skip_patch: bool,
    errors: &mut LoadErrors,
) -> rusqlite::Result<()> {
    let existing = existing_channel_members(conn, package, channel)?;
    let mut missing_existing = false;
    for csv in &existing {
        if !bundles.contains_key(csv) {
            errors.push(
                csv.clone(),
                Error::MissingChannelEntry { package: package.clone(), channel: channel.clone(), csv: csv.clone() },
            );
            missing_existing = true;
        }
    }
    if missing_existing {
        return Ok(());
    }

    let members = discover_members(package, channel, head_csv, bundles, errors);
    if members.is_empty() {
        return Ok(());
    }

    let mut sorted = members;
    sorted.sort_by(|a, b| b.version.cmp(&a.version));

    let groups: Vec<Vec<&Bundle>> = if skip_patch {
        let mut groups: Vec<Vec<&Bundle>> = Vec::new();
        for bundle in sorted {
            match groups.last_mut() {
                Some(last) if last[0].version.same_major_minor(&bundle.version) => last.push(bundle),
                _ => groups.push(vec![bundle]),
            }
        }
        groups
    } else {
        sorted.into_iter().map(|b| vec![b]).collect()
    };

    conn.execute(
        "DELETE FROM channel_entry WHERE channel_name = ?1 AND package_name = ?2",
        params![channel.as_str(), package.as_str()],
    )?;

    let mut previous_entry_id: Option<i64> = None;
    for (depth, group) in groups.iter().enumerate() {
        let depth = depth as i64;
        let (advancing, siblings) = group.split_first().expect("group is never empty");

        let entry_id = conn.query_row(
            "INSERT INTO channel_entry (channel_name, package_name, operatorbundle_name, replaces, depth, synthesized)
             VALUES (?1, ?2, ?3, NULL, ?4, 0) RETURNING entry_id",
            params![channel.as_str(), package.as_str(), advancing.csv_name.as_str(), depth],
            |row| row.get::<_, i64>(0),
        )?;
        insert_entry_apis(conn, entry_id, advancing)?;

        if let Some(prev) = previous_entry_id {
            conn.execute("UPDATE channel_entry SET replaces = ?1 WHERE entry_id = ?2", params![entry_id, prev])?;
        }

        for sibling in siblings {
            let sibling_id = conn.query_row(
                "INSERT INTO channel_entry (channel_name, package_name, operatorbundle_name, replaces, depth, synthesized)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1) RETURNING entry_id",
                params![channel.as_str(), package.as_str(), sibling.csv_name.as_str(), entry_id, depth],
                |row| row.get::<_, i64>(0),
            )?;
            insert_entry_apis(conn, sibling_id, sibling)?;
        }

        previous_entry_id = Some(entry_id);
    }

    let head = groups[0][0];
    conn.execute(
        "UPDATE channel SET head_operatorbundle_name = ?1 WHERE name = ?2 AND package_name = ?3",
        params![head.csv_name.as_str(), channel.as_str(), package.as_str()],
    )?;

    Ok(())
}
