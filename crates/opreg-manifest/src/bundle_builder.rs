use crate::csv::CsvDoc;
use crate::walk::PendingBundle;
use opreg_model::{Bundle, CsvName, Error, PackageName, Result};
use serde_json::Value;

/// Assembles a `Bundle` from a CSV document and its object set, per
/// `spec.md` §4.2. `fallback_package_name` is the package manifest's name,
/// used when the CSV carries no `olm.package` annotation.
pub fn build(pending: &PendingBundle, fallback_package_name: Option<&PackageName>) -> Result<Bundle> {
    let csv = CsvDoc::new(&pending.csv);

    let csv_name = csv
        .name()
        .map(CsvName::new)
        .ok_or_else(|| Error::ValidationFailure("CSV document missing metadata.name".to_string()))?;

    let package_name = csv
        .package_annotation()
        .map(PackageName::new)
        .or_else(|| fallback_package_name.cloned())
        .ok_or_else(|| {
            Error::ValidationFailure(format!(
                "bundle {csv_name}: no package name from CSV annotation or package manifest"
            ))
        })?;

    let version = csv.version().ok_or_else(|| {
        Error::ValidationFailure(format!("bundle {csv_name}: CSV missing or invalid spec.version"))
    })?;

    let provided_apis = {
        let mut apis = csv.owned_crd_apis();
        apis.extend(csv.owned_api_service_apis());
        apis
    };
    let required_apis = {
        let mut apis = csv.required_crd_apis();
        apis.extend(csv.required_api_service_apis());
        apis
    };

    validate_all_provided_apis_in_bundle(&csv_name, &csv, &pending.objects)?;

    let mut properties = Vec::new();
    properties.push(opreg_model::Property::package(package_name.as_str(), &version.to_string()));
    for api in &provided_apis {
        properties.push(opreg_model::Property::gvk(api));
    }
    for api in &required_apis {
        properties.push(opreg_model::Property::gvk_required(api));
    }

    let mut dependencies: Vec<opreg_model::Dependency> = required_apis
        .iter()
        .map(opreg_model::Dependency::gvk)
        .collect();
    for dep in dependencies.iter() {
        dep.validate()
            .map_err(|e| Error::ValidationFailure(format!("bundle {csv_name}: {e}")))?;
    }
    // Explicit dependencies.yaml entries, if a caller merges them in later,
    // are appended rather than replacing the derived set (spec.md §3).
    dependencies.sort_by(|a, b| {
        serde_json::to_string(&a.value)
            .unwrap_or_default()
            .cmp(&serde_json::to_string(&b.value).unwrap_or_default())
    });

    let skip_range = csv.skip_range();

    let mut bundle = Bundle {
        csv_name,
        package_name,
        version,
        bundle_path: String::new(),
        skip_range,
        replaces: csv.replaces(),
        skips: csv.skips(),
        csv: pending.csv.clone(),
        objects: pending.objects.clone(),
        related_images: csv.related_images(),
        provided_apis,
        required_apis,
        properties,
        dependencies,
    };
    bundle.ensure_package_property();
    Ok(bundle)
}

/// `spec.md` §4.2: every API the CSV declares as owned (via a `CustomResourceDefinition`)
/// must be present in the bundle's object set, identified by the CRD's
/// conventional `<plural>.<group>` object name.
fn validate_all_provided_apis_in_bundle(csv_name: &CsvName, csv: &CsvDoc, objects: &[Value]) -> Result<()> {
    let crd_object_names: std::collections::HashSet<&str> = objects
        .iter()
        .filter(|o| o.get("kind").and_then(Value::as_str) == Some("CustomResourceDefinition"))
        .filter_map(|o| o.pointer("/metadata/name").and_then(Value::as_str))
        .collect();

    for item in csv
        .raw
        .pointer("/spec/customresourcedefinitions/owned")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let Some(name) = item.get("name").and_then(Value::as_str) else {
            continue;
        };
        if !crd_object_names.contains(name) {
            return Err(Error::ValidationFailure(format!(
                "bundle {csv_name}: owned CRD {name} has no corresponding object in the bundle"
            )));
        }
    }
    Ok(())
}
