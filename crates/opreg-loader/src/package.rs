use crate::graph::{build_fresh_channel, update_existing_channel};
use crate::semver_mode::rebuild_semver_channel;
use opreg_model::{Bundle, CsvName, Error, LoadErrors, PackageManifest, UpdateMode};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;

fn package_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    conn.query_row("SELECT 1 FROM package WHERE name = ?1", params![name], |_| Ok(()))
        .optional()
        .map(|r| r.is_some())
}

fn channel_entry_count(conn: &Connection, channel: &str, package: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM channel_entry WHERE channel_name = ?1 AND package_name = ?2",
        params![channel, package],
        |row| row.get(0),
    )
}

/// Wires `manifest`'s declared channels into the upgrade graph, using
/// `bundles` to resolve CSV names to their full bundle record
/// (`spec.md` §4.4). Errors are aggregated per offending bundle rather
/// than aborting the whole package.
pub fn add_package_channels(
    conn: &Connection,
    manifest: &PackageManifest,
    bundles: &[Bundle],
    mode: UpdateMode,
) -> rusqlite::Result<LoadErrors> {
    let mut errors = LoadErrors::new();

    if !manifest.channels.iter().any(|c| c.name == manifest.default_channel) {
        errors.push(CsvName::new("<package>"), Error::NoDefaultChannel(manifest.package_name.clone()));
        return Ok(errors);
    }

    let is_new_package = !package_exists(conn, manifest.package_name.as_str())?;
    if is_new_package {
        conn.execute(
            "INSERT INTO package (name, default_channel) VALUES (?1, ?2)",
            params![manifest.package_name.as_str(), manifest.default_channel.as_str()],
        )?;
    }

    let bundles_by_csv: HashMap<CsvName, &Bundle> = bundles.iter().map(|b| (b.csv_name.clone(), b)).collect();

    for channel_manifest in &manifest.channels {
        conn.execute(
            "INSERT OR IGNORE INTO channel (name, package_name) VALUES (?1, ?2)",
            params![channel_manifest.name.as_str(), manifest.package_name.as_str()],
        )?;

        match mode {
            UpdateMode::SemVer | UpdateMode::SkipPatch => {
                rebuild_semver_channel(
                    conn,
                    &manifest.package_name,
                    &channel_manifest.name,
                    &channel_manifest.current_csv_name,
                    &bundles_by_csv,
                    mode == UpdateMode::SkipPatch,
                    &mut errors,
                )?;
                continue;
            }
            UpdateMode::Replaces => {}
        }

        let is_new_channel = channel_entry_count(conn, channel_manifest.name.as_str(), manifest.package_name.as_str())? == 0;

        if is_new_channel {
            build_fresh_channel(
                conn,
                &manifest.package_name,
                &channel_manifest.name,
                &channel_manifest.current_csv_name,
                &bundles_by_csv,
                &mut errors,
            )?;
        } else {
            let Some(new_head) = bundles_by_csv.get(&channel_manifest.current_csv_name).copied() else {
                errors.push(
                    channel_manifest.current_csv_name.clone(),
                    Error::MissingChannelEntry {
                        package: manifest.package_name.clone(),
                        channel: channel_manifest.name.clone(),
                        csv: channel_manifest.current_csv_name.clone(),
                    },
                );
                continue;
            };
            let new_default = if is_new_package { None } else { Some(&manifest.default_channel) };
            update_existing_channel(conn, &manifest.package_name, &channel_manifest.name, new_head, new_default, &mut errors)?;
        }
    }

    Ok(errors)
}
