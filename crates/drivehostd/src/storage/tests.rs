//! Unit tests for storage mounting.

use std::fs;
use std::sync::Barrier;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use drivehost_plugins::{
    Addition, DriverConfig, DriverRegistry, Link, LinkArgs, ListArgs, Meta, Object, Reader,
};
use rstest::{fixture, rstest};
use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::local::register_local;

struct Fixture {
    dir: TempDir,
    registry: HostDriverRegistry,
    storages: StorageSet,
}

impl Fixture {
    fn local(&self, mount_path: &str) -> Storage {
        Storage {
            mount_path: mount_path.to_owned(),
            driver: String::from("Local"),
            addition: json!({"root_folder_path": self.dir.path()}).to_string(),
            ..Storage::default()
        }
    }
}

/// Driver whose `init` takes a while and counts its calls.
struct SlowDriver {
    inits: Arc<AtomicUsize>,
    storage: Option<Storage>,
}

impl Meta for SlowDriver {
    fn config(&self) -> DriverConfig {
        DriverConfig::named("Slow")
    }

    fn storage(&self) -> Option<&Storage> {
        self.storage.as_ref()
    }

    fn set_storage(&mut self, storage: Storage) {
        self.storage = Some(storage);
    }

    fn addition(&self) -> Addition {
        Addition::Structured(Vec::new())
    }

    fn init(&mut self, _ctx: &CallContext) -> Result<(), DriverError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        Ok(())
    }

    fn drop_driver(&mut self, _ctx: &CallContext) -> Result<(), DriverError> {
        Ok(())
    }
}

impl Reader for SlowDriver {
    fn list(
        &self,
        _ctx: &CallContext,
        _dir: &Object,
        _args: &ListArgs,
    ) -> Result<Vec<Object>, DriverError> {
        Ok(Vec::new())
    }

    fn link(
        &self,
        _ctx: &CallContext,
        _file: &Object,
        _args: &LinkArgs,
    ) -> Result<Link, DriverError> {
        Ok(Link::default())
    }
}

fn register_slow(registry: &HostDriverRegistry) -> Arc<AtomicUsize> {
    let inits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&inits);
    registry
        .register(
            "Slow",
            Arc::new(move || -> Box<dyn Driver> {
                Box::new(SlowDriver {
                    inits: Arc::clone(&counter),
                    storage: None,
                })
            }),
        )
        .expect("register slow");
    inits
}

#[fixture]
fn setup() -> Fixture {
    let dir = TempDir::new().expect("temp dir");
    fs::write(dir.path().join("a.txt"), b"a").expect("write");
    let registry = HostDriverRegistry::new();
    register_local(&registry).expect("register local");
    Fixture {
        dir,
        registry,
        storages: StorageSet::new(),
    }
}

#[rstest]
fn mounted_storage_serves_listings(setup: Fixture) {
    setup
        .storages
        .mount(&setup.registry, setup.local("/files"), &CallContext::background())
        .expect("mount");

    let names = setup
        .storages
        .with_driver("/files", |driver| {
            driver
                .list(&CallContext::background(), &Object::default(), &ListArgs::default())
                .map(|objects| objects.into_iter().map(|object| object.name).collect::<Vec<_>>())
        })
        .expect("mounted")
        .expect("list");
    assert_eq!(names, vec!["a.txt"]);
}

#[rstest]
fn duplicate_mount_path_is_rejected(setup: Fixture) {
    let ctx = CallContext::background();
    setup
        .storages
        .mount(&setup.registry, setup.local("/files"), &ctx)
        .expect("first mount");
    let error = setup
        .storages
        .mount(&setup.registry, setup.local("/files"), &ctx)
        .expect_err("second mount");
    assert!(matches!(error, StorageError::DuplicateMount { .. }), "got {error}");
}

#[rstest]
fn unknown_driver_is_rejected(setup: Fixture) {
    let storage = Storage {
        mount_path: String::from("/cloud"),
        driver: String::from("Cloud"),
        ..Storage::default()
    };
    let error = setup
        .storages
        .mount(&setup.registry, storage, &CallContext::background())
        .expect_err("unknown driver");
    assert!(matches!(error, StorageError::UnknownDriver { .. }), "got {error}");
    assert!(setup.storages.mount_paths().is_empty());
}

#[rstest]
fn failed_init_mounts_nothing(setup: Fixture) {
    let storage = Storage {
        addition: String::from("{}"),
        ..setup.local("/broken")
    };
    let error = setup
        .storages
        .mount(&setup.registry, storage, &CallContext::background())
        .expect_err("init fails");
    assert!(matches!(error, StorageError::Init { .. }), "got {error}");
    assert!(setup.storages.mount_paths().is_empty());
}

#[rstest]
fn close_all_empties_the_set(setup: Fixture) {
    let ctx = CallContext::background();
    for mount_path in ["/one", "/two"] {
        setup
            .storages
            .mount(&setup.registry, setup.local(mount_path), &ctx)
            .expect("mount");
    }
    assert_eq!(setup.storages.mount_paths(), vec!["/one", "/two"]);

    setup.storages.close_all(&ctx);

    assert!(setup.storages.mount_paths().is_empty());
}

#[rstest]
fn storage_list_is_read_from_json(setup: Fixture) {
    let path = setup.dir.path().join("storages.json");
    let list = json!([
        {"mount_path": "/files", "driver": "Local", "order": 1},
        {"mount_path": "/demo", "driver": "DemoFS"},
    ]);
    fs::write(&path, list.to_string()).expect("write list");

    let storages = load_storages(&path).expect("load");

    let mounts: Vec<&str> = storages.iter().map(|storage| storage.mount_path.as_str()).collect();
    assert_eq!(mounts, vec!["/files", "/demo"]);
    assert_eq!(storages.first().map(|storage| storage.order), Some(1));
}

#[rstest]
#[case::missing("absent.json", None)]
#[case::malformed("bad.json", Some("{"))]
fn unreadable_storage_lists_are_errors(
    setup: Fixture,
    #[case] name: &str,
    #[case] contents: Option<&str>,
) {
    let path = setup.dir.path().join(name);
    if let Some(text) = contents {
        fs::write(&path, text).expect("write");
    }
    assert!(load_storages(&path).is_err());
}

#[rstest]
fn concurrent_mounts_of_one_path_initialise_once(setup: Fixture) {
    let inits = register_slow(&setup.registry);
    let start = Barrier::new(2);
    let storage = Storage {
        mount_path: String::from("/x"),
        driver: String::from("Slow"),
        ..Storage::default()
    };

    let results: Vec<Result<(), StorageError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let mount = storage.clone();
                let (storages, registry, start) = (&setup.storages, &setup.registry, &start);
                scope.spawn(move || {
                    start.wait();
                    storages.mount(registry, mount, &CallContext::background())
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("mount thread"))
            .collect()
    });

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|result| matches!(result, Err(StorageError::DuplicateMount { .. }))),
        "expected one duplicate mount"
    );
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(setup.storages.mount_paths(), vec!["/x"]);
}

#[rstest]
fn failed_mount_frees_the_path(setup: Fixture) {
    let ctx = CallContext::background();
    let broken = Storage {
        addition: String::from("{}"),
        ..setup.local("/files")
    };
    setup
        .storages
        .mount(&setup.registry, broken, &ctx)
        .expect_err("init fails");

    setup
        .storages
        .mount(&setup.registry, setup.local("/files"), &ctx)
        .expect("path is free again");
    assert_eq!(setup.storages.mount_paths(), vec!["/files"]);
}
