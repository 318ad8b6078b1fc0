mod support;

use rayon::prelude::*;
use std::time::Duration;
use support::{identity, input_files, project_entries, Harness};
use tessera_fingerprint::{FingerprintEntry, ProjectSpecificEntry};

#[test]
fn parallel_observations_are_recorded_once() {
    let harness = Harness::new();
    let file = harness.write_file("catalog/libs.toml", "[versions]");

    (0..64).into_par_iter().for_each(|_| {
        let scope = harness.writer.build_scope();
        harness.writer.file_opened(&scope, &file, None).unwrap();
        harness
            .writer
            .system_property_read(&scope, "java.version", Some("21"), None)
            .unwrap();
    });

    assert_eq!(harness.problems.inputs().len(), 2);
    let (build, _) = harness.close();
    assert_eq!(input_files(&build), vec![file]);
    let properties = build
        .iter()
        .filter(|entry| matches!(entry, FingerprintEntry::UndeclaredSystemProperty { .. }))
        .count();
    assert_eq!(properties, 1);
}

#[test]
fn parallel_changing_values_keep_the_earliest_expiry() {
    let harness = Harness::new();

    (1..=100u64).into_par_iter().for_each(|millis| {
        harness
            .writer
            .changing_module_resolved(&format!("org:m{millis}:1.0-SNAPSHOT"), Duration::from_millis(millis));
    });

    let closest = harness.writer.closest_changing_value().unwrap();
    assert_eq!(closest.expire_at, 1);
    assert_eq!(closest.display_name, "org:m1:1.0-SNAPSHOT");
}

#[test]
fn parallel_project_configuration_writes_one_identity_per_kept_project() {
    let harness = Harness::new();
    let projects: Vec<String> = (0..8).map(|n| format!(":p{n}")).collect();
    let files: Vec<_> = projects
        .iter()
        .map(|path| harness.write_file(&format!("{}/build.tsr", &path[1..]), path))
        .collect();

    (0..4).into_par_iter().for_each(|_| {
        projects.par_iter().zip(files.par_iter()).for_each(|(path, file)| {
            let scope = harness.writer.build_scope();
            harness
                .writer
                .for_project(&scope, &identity(path), true, |project| {
                    harness.writer.file_observed(project, file).unwrap();
                })
                .unwrap();
        });
    });

    let (_, records) = harness.close();
    let identities = records
        .iter()
        .filter(|record| matches!(record, ProjectSpecificEntry::ProjectIdentity(_)))
        .count();
    assert_eq!(identities, projects.len());
    for (path, file) in projects.iter().zip(&files) {
        assert_eq!(input_files(&project_entries(&records, path)), vec![file.clone()]);
    }
}
