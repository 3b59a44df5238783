use opreg_loader::load_directory;
use opreg_manifest::ParseOutput;
use opreg_model::{Bundle, ChannelManifest, ChannelName, CsvName, PackageManifest, PackageName, UpdateMode, Version};
use opreg_store::Store;

fn bundle(csv: &str, package: &str, version: &str, replaces: Option<&str>) -> Bundle {
    let mut b = Bundle {
        csv_name: CsvName::new(csv),
        package_name: PackageName::new(package),
        version: Version::parse(version).unwrap(),
        bundle_path: String::new(),
        skip_range: None,
        replaces: replaces.map(CsvName::new),
        skips: Vec::new(),
        csv: serde_json::json!({"kind": "ClusterServiceVersion", "metadata": {"name": csv}}),
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

fn manifest(package: &str, default_channel: &str, channel: &str, head: &str) -> PackageManifest {
    PackageManifest {
        package_name: PackageName::new(package),
        default_channel: ChannelName::new(default_channel),
        channels: vec![ChannelManifest { name: ChannelName::new(channel), current_csv_name: CsvName::new(head) }],
    }
}

fn parsed(bundles: Vec<Bundle>, manifests: Vec<PackageManifest>) -> ParseOutput {
    ParseOutput { bundles, package_manifests: manifests, ..Default::default() }
}

#[test]
fn semver_mode_reorders_the_channel_by_version_rather_than_the_declared_replaces_chain() {
    // The declared `replaces` chain deliberately does not walk in version
    // order (v1.1.0 replaces v1.2.0, a *higher* version) to demonstrate
    // that SemVer mode reorders membership by version once it's
    // discovered, rather than trusting the chain it was discovered from.
    let v1 = bundle("pkg.v1.0.0", "pkg", "1.0.0", None);
    let v2 = bundle("pkg.v1.1.0", "pkg", "1.1.0", Some("pkg.v1.2.0"));
    let v3 = bundle("pkg.v1.2.0", "pkg", "1.2.0", Some("pkg.v1.0.0"));
    let manifest = manifest("pkg", "stable", "stable", "pkg.v1.1.0");

    let store = Store::create(":memory:").unwrap();
    let out = parsed(vec![v1, v2, v3], vec![manifest]);
    let errors = load_directory(&store, &out, UpdateMode::SemVer, true).unwrap();
    assert!(errors.is_empty(), "unexpected errors: {errors}");

    let conn = store.read_connection().unwrap();
    let head: String = conn
        .query_row("SELECT head_operatorbundle_name FROM channel WHERE name = 'stable' AND package_name = 'pkg'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(head, "pkg.v1.2.0", "the highest version becomes head even though the manifest declared v1.1.0");

    let mut stmt = conn
        .prepare("SELECT operatorbundle_name, depth FROM channel_entry WHERE channel_name = 'stable' AND package_name = 'pkg' ORDER BY depth")
        .unwrap();
    let rows: Vec<(String, i64)> = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?))).unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(rows, vec![("pkg.v1.2.0".to_string(), 0), ("pkg.v1.1.0".to_string(), 1), ("pkg.v1.0.0".to_string(), 2)]);
}

#[test]
fn skip_patch_mode_collapses_bundles_sharing_a_minor_into_one_advancing_entry() {
    let v100 = bundle("pkg.v1.0.0", "pkg", "1.0.0", None);
    let v101 = bundle("pkg.v1.0.1", "pkg", "1.0.1", Some("pkg.v1.0.0"));
    let v102 = bundle("pkg.v1.0.2", "pkg", "1.0.2", Some("pkg.v1.0.1"));
    let v110 = bundle("pkg.v1.1.0", "pkg", "1.1.0", Some("pkg.v1.0.2"));
    let manifest = manifest("pkg", "stable", "stable", "pkg.v1.1.0");

    let store = Store::create(":memory:").unwrap();
    let out = parsed(vec![v100, v101, v102, v110], vec![manifest]);
    let errors = load_directory(&store, &out, UpdateMode::SkipPatch, true).unwrap();
    assert!(errors.is_empty(), "unexpected errors: {errors}");

    let conn = store.read_connection().unwrap();
    let head: String = conn
        .query_row("SELECT head_operatorbundle_name FROM channel WHERE name = 'stable' AND package_name = 'pkg'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(head, "pkg.v1.1.0");

    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM channel_entry WHERE channel_name = 'stable' AND package_name = 'pkg'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(total, 4, "one advancing entry per minor (1.1, 1.0) plus two synthesized 1.0.x siblings");

    let advancing: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM channel_entry WHERE channel_name = 'stable' AND package_name = 'pkg' AND synthesized = 0",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(advancing, 2, "only the newest patch within each minor advances the chain");

    let advancing_1_0: String = conn
        .query_row(
            "SELECT operatorbundle_name FROM channel_entry
             WHERE channel_name = 'stable' AND package_name = 'pkg' AND synthesized = 0 AND depth = 1",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(advancing_1_0, "pkg.v1.0.2", "the newest 1.0.x patch is the one that advances the chain");

    let siblings: Vec<String> = {
        let mut stmt = conn
            .prepare(
                "SELECT operatorbundle_name FROM channel_entry
                 WHERE channel_name = 'stable' AND package_name = 'pkg' AND synthesized = 1
                 ORDER BY operatorbundle_name",
            )
            .unwrap();
        stmt.query_map([], |r| r.get(0)).unwrap().map(|r| r.unwrap()).collect()
    };
    assert_eq!(siblings, vec!["pkg.v1.0.0".to_string(), "pkg.v1.0.1".to_string()]);
}

#[test]
fn semver_mode_rebuild_refuses_to_drop_history_missing_from_an_incremental_bundle_set() {
    // Loads the full 1.0.0 -> 1.1.0 chain once, then replays a second
    // `add_package_channels` call carrying only the new head bundle — the
    // kind of incremental call an incremental ingest path might make. The
    // rebuild must refuse rather than silently deleting 1.0.0's history.
    use opreg_loader::Loader;

    let v100 = bundle("pkg.v1.0.0", "pkg", "1.0.0", None);
    let v110 = bundle("pkg.v1.1.0", "pkg", "1.1.0", Some("pkg.v1.0.0"));
    let manifest = manifest("pkg", "stable", "stable", "pkg.v1.1.0");

    let store = Store::create(":memory:").unwrap();
    let out = parsed(vec![v100.clone(), v110.clone()], vec![manifest.clone()]);
    let errors = load_directory(&store, &out, UpdateMode::SemVer, true).unwrap();
    assert!(errors.is_empty());

    let loader = Loader::new(&store, UpdateMode::SemVer);
    let errors = loader.add_package_channels(&manifest, &[v110]).unwrap();
    assert!(!errors.is_empty(), "omitting 1.0.0 from the rebuild's bundle set must be reported, not silently accepted");

    let conn = store.read_connection().unwrap();
    let v100_still_present: i64 = conn
        .query_row("SELECT COUNT(*) FROM channel_entry WHERE operatorbundle_name = 'pkg.v1.0.0'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(v100_still_present, 1, "the rebuild must leave the existing channel untouched rather than rebuild from a partial set");
}
