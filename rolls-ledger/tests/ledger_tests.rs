mod common;

use common::Project;
use pretty_assertions::assert_eq;
use rolls_ledger::{
    Entry, FindOptions, Ledger, LedgerError, Library, LibraryMetadata, Requested, Requirement,
    Version,
};
use rolls_version::VersionError;
use std::sync::Arc;

fn two_foos() -> Project {
    let mut project = Project::new();
    project.library("foo-1.0.0", "foo", "1.0.0", &["lib/foo.rb"]);
    project.library("foo-2.0.0", "foo", "2.0.0", &["lib/foo.rb"]);
    project
}

fn version(library: &Library) -> String {
    library.version().to_string()
}

// ── Population ───────────────────────────────────────────────────

#[test]
fn prime_groups_versions_by_name() {
    let mut project = two_foos();
    project.library("bar", "bar", "0.3", &[]);
    let ledger = project.ledger();

    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger.names().collect::<Vec<_>>(), vec!["foo", "bar"]);
    match ledger.get("foo").unwrap() {
        Entry::Candidates(list) => assert_eq!(list.len(), 2),
        Entry::Active(_) => panic!("nothing should be active after priming"),
    }
}

#[test]
fn location_without_metadata_is_skipped() {
    let mut project = two_foos();
    let stray = project.plain_dir("stray", &["lib/stray.rb"]);
    let mut ledger = project.ledger();

    assert!(ledger.add_location(&stray).is_none());
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.prime([stray.clone(), stray]), 0);
}

#[test]
fn strict_add_reports_metadata_failure() {
    let project = Project::new();
    let stray = project.plain_dir("stray", &[]);
    let mut ledger = Ledger::new(project.provider());

    let err = ledger.try_add_location(&stray).unwrap_err();
    assert!(matches!(err, LedgerError::Metadata { .. }));
    assert!(ledger.is_empty());
}

#[test]
fn omitted_library_is_not_entered() {
    let mut project = Project::new();
    let meta = LibraryMetadata::parse("hidden", "1.0").unwrap().with_omit(true);
    let location = project.library_with("hidden", meta, &["lib/hidden.rb"]);
    let mut ledger = Ledger::new(project.provider());

    assert!(ledger.try_add_location(&location).unwrap().is_none());
    assert!(!ledger.contains("hidden"));
}

#[test]
fn adding_the_same_location_twice_keeps_one_candidate() {
    let project = two_foos();
    let mut ledger = project.ledger();
    let again = ledger.add_location(project.root().join("foo-1.0.0")).unwrap();

    assert_eq!(ledger.get("foo").unwrap().libraries().len(), 2);
    assert!(ledger.get("foo").unwrap().libraries().iter().any(|l| Arc::ptr_eq(l, &again)));
}

#[test]
fn same_version_at_two_locations_conflicts() {
    let mut project = two_foos();
    let copy = project.library("copy-of-foo", "foo", "1.0", &[]);
    let mut ledger = project.ledger();

    let err = ledger.try_add_location(&copy).unwrap_err();
    match err {
        LedgerError::VersionConflict { existing, requested } => {
            assert_eq!(version(&existing), "1.0.0");
            assert!(matches!(requested, Requested::Library(lib) if lib.location().ends_with("copy-of-foo")));
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
    assert_eq!(ledger.get("foo").unwrap().libraries().len(), 2);
}

#[test]
fn candidates_added_after_activation_are_ignored() {
    let mut project = two_foos();
    let late = project.library("foo-3.0.0", "foo", "3.0.0", &[]);
    let mut ledger = Ledger::new(project.provider());
    ledger.add_location(project.root().join("foo-1.0.0"));
    ledger.activate("foo", None).unwrap();

    assert!(ledger.add_location(&late).is_some());
    assert_eq!(version(ledger.active("foo").unwrap()), "1.0.0");
    assert_eq!(ledger.get("foo").unwrap().libraries().len(), 1);
}

// ── Activation ───────────────────────────────────────────────────

#[test]
fn activating_unknown_name_is_not_found() {
    let mut ledger = two_foos().ledger();
    let err = ledger.activate("nope", None).unwrap_err();
    assert!(matches!(err, LedgerError::LibraryNotFound(ref name) if name == "nope"));
    assert!(err.is_not_found());
}

#[test]
fn newest_satisfying_version_is_activated() {
    let mut ledger = two_foos().ledger();
    let foo = ledger.activate("foo", Some(">=1.5")).unwrap();

    assert_eq!(version(&foo), "2.0.0");
    assert!(ledger.get("foo").unwrap().is_active());
    assert!(ledger.is_active("foo"));
}

#[test]
fn unconstrained_activation_picks_newest() {
    let mut ledger = two_foos().ledger();
    assert_eq!(version(&ledger.activate("foo", None).unwrap()), "2.0.0");
}

#[test]
fn constraint_can_select_older_version() {
    let mut ledger = two_foos().ledger();
    assert_eq!(version(&ledger.activate("foo", Some("~> 1.0")).unwrap()), "1.0.0");
}

#[test]
fn reactivation_returns_the_same_entity() {
    let mut ledger = two_foos().ledger();
    let first = ledger.activate("foo", Some(">= 1.0")).unwrap();
    let second = ledger.activate("foo", Some("2.0+")).unwrap();
    let third = ledger.activate("foo", None).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &third));
}

#[test]
fn incompatible_reactivation_conflicts() {
    let mut ledger = two_foos().ledger();
    ledger.activate("foo", Some("~> 2.0")).unwrap();

    let err = ledger.activate("foo", Some("< 2.0")).unwrap_err();
    match err {
        LedgerError::VersionConflict { existing, requested } => {
            assert_eq!(version(&existing), "2.0.0");
            assert!(matches!(requested, Requested::Constraint(c) if c.to_string() == "< 2.0"));
        }
        other => panic!("expected a conflict, got {other:?}"),
    }
    assert_eq!(version(ledger.active("foo").unwrap()), "2.0.0");
}

#[test]
fn no_satisfying_version_leaves_candidates() {
    let mut ledger = two_foos().ledger();
    let err = ledger.activate("foo", Some(">= 3")).unwrap_err();

    assert!(matches!(err, LedgerError::VersionNotFound { ref name, .. } if name == "foo"));
    assert!(!ledger.is_active("foo"));
    assert_eq!(ledger.get("foo").unwrap().libraries().len(), 2);
}

#[test]
fn malformed_constraint_is_surfaced() {
    let mut ledger = two_foos().ledger();
    let err = ledger.activate("foo", Some("newest")).unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Version(VersionError::InvalidConstraint(_))
    ));
    assert!(!ledger.is_active("foo"));
}

#[test]
fn instance_of_unknown_name_is_none() {
    let mut ledger = two_foos().ledger();
    assert!(ledger.instance("nope", None).unwrap().is_none());
    assert_eq!(version(&ledger.instance("foo", None).unwrap().unwrap()), "2.0.0");
}

#[test]
fn activate_library_conflicts_with_other_active_entity() {
    let project = two_foos();
    let mut ledger = project.ledger();
    let old = Arc::clone(&ledger.get("foo").unwrap().libraries()[0]);
    let new = Arc::clone(&ledger.get("foo").unwrap().libraries()[1]);

    ledger.activate_library(&new).unwrap();
    ledger.activate_library(&new).unwrap();
    let err = ledger.activate_library(&old).unwrap_err();
    assert!(matches!(err, LedgerError::VersionConflict { .. }));
    assert!(Arc::ptr_eq(ledger.active("foo").unwrap(), &new));
}

// ── Narrowing ────────────────────────────────────────────────────

#[test]
fn constrain_narrows_without_activating() {
    let mut project = two_foos();
    project.library("foo-1.5.0", "foo", "1.5.0", &[]);
    let mut ledger = project.ledger();

    ledger.constrain("foo", "< 2").unwrap();
    assert!(!ledger.is_active("foo"));
    assert_eq!(ledger.get("foo").unwrap().libraries().len(), 2);
    assert_eq!(version(&ledger.activate("foo", None).unwrap()), "1.5.0");
}

#[test]
fn constrain_to_nothing_fails_without_mutation() {
    let mut ledger = two_foos().ledger();
    let err = ledger.constrain("foo", "> 5").unwrap_err();
    assert!(matches!(err, LedgerError::VersionNotFound { .. }));
    assert_eq!(ledger.get("foo").unwrap().libraries().len(), 2);
}

#[test]
fn constrain_checks_active_entity() {
    let mut ledger = two_foos().ledger();
    ledger.activate("foo", None).unwrap();
    assert!(ledger.constrain("foo", ">= 2").is_ok());
    assert!(matches!(
        ledger.constrain("foo", "< 2"),
        Err(LedgerError::VersionConflict { .. })
    ));
}

// ── Requirements ─────────────────────────────────────────────────

fn app_with_dependencies() -> Project {
    let mut project = Project::new();
    let app = LibraryMetadata::parse("app", "1.0")
        .unwrap()
        .with_requirement(Requirement::runtime("ansi", Some("~> 1.4")).unwrap())
        .with_requirement(Requirement::development("qed", None).unwrap());
    project.library_with("app", app, &["lib/app.rb"]);
    let ansi = LibraryMetadata::parse("ansi", "1.4.3")
        .unwrap()
        .with_requirement(Requirement::runtime("tty", None).unwrap());
    project.library_with("ansi-1.4.3", ansi, &["lib/ansi.rb"]);
    project.library("ansi-1.5.0", "ansi", "1.5.0", &["lib/ansi.rb"]);
    project.library("tty", "tty", "0.2", &["lib/tty.rb"]);
    project.library("qed", "qed", "2.0", &["lib/qed.rb"]);
    project.library("unused", "unused", "1.0", &["lib/unused.rb"]);
    project
}

#[test]
fn activate_requirements_follows_runtime_chain() {
    let mut ledger = app_with_dependencies().ledger();
    let app = ledger.activate("app", None).unwrap();
    let activated = ledger.activate_requirements(&app, false).unwrap();

    let names: Vec<_> = activated.iter().map(|l| l.name().to_string()).collect();
    assert_eq!(names, vec!["app", "ansi", "tty"]);
    assert_eq!(version(ledger.active("ansi").unwrap()), "1.4.3");
    assert!(!ledger.is_active("qed"));
}

#[test]
fn activate_requirements_with_development() {
    let mut ledger = app_with_dependencies().ledger();
    let app = ledger.activate("app", None).unwrap();
    ledger.activate_requirements(&app, true).unwrap();
    assert!(ledger.is_active("qed"));
}

#[test]
fn isolate_drops_inactive_entries() {
    let mut ledger = app_with_dependencies().ledger();
    ledger.isolate("app", None).unwrap();

    let mut names: Vec<_> = ledger.names().map(String::from).collect();
    names.sort();
    assert_eq!(names, vec!["ansi", "app", "tty"]);
    assert!(ledger.iter().all(|(_, entry)| entry.is_active()));
}

#[test]
fn missing_requirements_reports_unsatisfiable() {
    let mut project = Project::new();
    let meta = LibraryMetadata::parse("app", "1.0")
        .unwrap()
        .with_requirement(Requirement::runtime("ansi", Some(">= 2")).unwrap())
        .with_requirement(Requirement::runtime("ghost", None).unwrap())
        .with_requirement(Requirement::runtime("tty", None).unwrap())
        .with_requirement(Requirement::development("qed", None).unwrap());
    project.library_with("app", meta, &[]);
    project.library("ansi", "ansi", "1.5", &[]);
    project.library("tty", "tty", "0.2", &[]);
    let ledger = project.ledger();

    let app = Arc::clone(&ledger.get("app").unwrap().libraries()[0]);
    let missing: Vec<_> = ledger
        .missing_requirements(&app, false)
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(missing, vec!["ansi", "ghost"]);
    assert_eq!(ledger.missing_requirements(&app, true).len(), 3);
    assert!(!ledger.is_active("ansi"));
}

// ── Brute-force search ───────────────────────────────────────────

fn shared_file_project() -> Project {
    let mut project = Project::new();
    project.library("alpha", "alpha", "1.0", &["lib/shared.rb"]);
    project.library("beta-1", "beta", "1.0", &["lib/shared.rb", "lib/old.rb"]);
    project.library("beta-2", "beta", "2.0", &["lib/shared.rb"]);
    project
}

#[test]
fn brute_force_prefers_active_libraries() {
    let project = shared_file_project();
    let mut ledger = project.ledger();
    ledger.activate("beta", Some("1.0")).unwrap();

    let found = ledger
        .brute_force_find("shared", &FindOptions::default(), None)
        .unwrap();
    assert_eq!(found.resolve(), project.path("beta-1/lib/shared.rb"));
}

#[test]
fn brute_force_tries_candidates_newest_first() {
    let project = shared_file_project();
    let ledger = project.ledger();

    let found = ledger
        .brute_force_search_all("shared", &FindOptions::default(), None)
        .into_iter()
        .map(|f| f.resolve().to_path_buf())
        .collect::<Vec<_>>();
    assert_eq!(
        found,
        vec![
            project.path("alpha/lib/shared.rb"),
            project.path("beta-2/lib/shared.rb"),
            project.path("beta-1/lib/shared.rb"),
        ]
    );
}

#[test]
fn brute_force_latest_only_ignores_older_candidates() {
    let project = shared_file_project();
    let ledger = project.ledger();
    let latest = FindOptions {
        latest_only: true,
        ..FindOptions::default()
    };

    assert!(ledger.brute_force_find("old", &latest, None).is_none());
    assert!(ledger.brute_force_find("old", &FindOptions::default(), None).is_some());
    assert_eq!(ledger.brute_force_search_all("shared", &latest, None).len(), 2);
}

#[test]
fn brute_force_skips_given_feature() {
    let project = shared_file_project();
    let ledger = project.ledger();
    let first = ledger
        .brute_force_find("shared", &FindOptions::default(), None)
        .unwrap();
    let next = ledger
        .brute_force_find("shared", &FindOptions::default(), Some(&first))
        .unwrap();

    assert_ne!(first, next);
    assert_eq!(next.resolve(), project.path("beta-2/lib/shared.rb"));
}

#[test]
fn brute_force_ignores_legacy_paths() {
    let mut project = Project::new();
    project.library("nested", "nested", "1.0", &["lib/nested/inner.rb"]);
    let ledger = project.ledger();

    assert!(ledger.brute_force_find("inner", &FindOptions::default(), None).is_none());
    assert!(ledger
        .brute_force_find("nested/inner", &FindOptions::default(), None)
        .is_some());
}

// ── Glob ─────────────────────────────────────────────────────────

#[test]
fn glob_matches_under_load_paths() {
    let mut project = Project::new();
    project.library(
        "plugins",
        "plugins",
        "1.0",
        &["lib/plugins/a.rb", "lib/plugins/b.rb", "lib/plugins/deep/c.rb", "lib/other.rb"],
    );
    let ledger = project.ledger();

    assert_eq!(
        ledger.glob("plugins/*.rb", false).unwrap(),
        vec![project.path("plugins/lib/plugins/a.rb"), project.path("plugins/lib/plugins/b.rb")]
    );
    assert_eq!(ledger.glob("plugins/**/*.rb", false).unwrap().len(), 3);
}

#[test]
fn glob_latest_only_uses_newest_candidate() {
    let project = shared_file_project();
    let ledger = project.ledger();

    assert_eq!(ledger.glob("*.rb", false).unwrap().len(), 4);
    assert_eq!(
        ledger.glob("*.rb", true).unwrap(),
        vec![project.path("alpha/lib/shared.rb"), project.path("beta-2/lib/shared.rb")]
    );
}

#[test]
fn glob_rejects_malformed_pattern() {
    let ledger = shared_file_project().ledger();
    assert!(matches!(ledger.glob("a[", false), Err(LedgerError::Pattern(_))));
}

// ── Providers ────────────────────────────────────────────────────

#[test]
fn closure_provider() {
    let project = Project::new();
    let location = project.plain_dir("anything", &["lib/anything.rb"]);
    let mut ledger = Ledger::new(|path: &std::path::Path| {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        LibraryMetadata::new(name, Version::parse("0.1").unwrap())
    });

    let library = ledger.add_location(&location).unwrap();
    assert_eq!(library.name(), "anything");
}

#[test]
fn default_ledger_knows_nothing() {
    let mut ledger = Ledger::default();
    assert!(ledger.add_location("/tmp").is_none());
    assert!(ledger.is_empty());
}
