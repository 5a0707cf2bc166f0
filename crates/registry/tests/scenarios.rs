//! End-to-end scenarios wiring a settings-backed host environment into the
//! registry: module directories, library directories and the code path.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use autoload_core::{HostEnvironment, Settings};
use autoload_registry::{ExecError, LoadRegistry, LoaderOptions};

type Calls = Arc<Mutex<Vec<PathBuf>>>;

struct Host {
    _root: TempDir,
    modules: PathBuf,
    libdir: PathBuf,
    code: PathBuf,
    env: Arc<HostEnvironment>,
    registry: Arc<LoadRegistry>,
    calls: Calls,
}

fn host(initialized: bool) -> Host {
    let root = TempDir::new().expect("create tempdir");
    let modules = root.path().join("modules");
    let libdir = root.path().join("lib");
    let code = root.path().join("code");
    for dir in [&modules, &libdir, &code] {
        fs::create_dir_all(dir).unwrap();
    }

    let settings = Settings {
        modulepath: vec![modules.clone()],
        libdir: vec![libdir.clone()],
        code_path: vec![code.clone()],
        ..Settings::default()
    };
    let env = Arc::new(HostEnvironment::new(settings));
    if initialized {
        env.mark_initialized();
    }

    let calls: Calls = Arc::default();
    let recorded = Arc::clone(&calls);
    let exec = move |path: &Path, _wrap: bool| -> Result<(), ExecError> {
        recorded.lock().unwrap().push(path.to_path_buf());
        Ok(())
    };
    let registry = Arc::new(LoadRegistry::from_host(Arc::clone(&env), exec).unwrap());

    Host {
        _root: root,
        modules,
        libdir,
        code,
        env,
        registry,
        calls,
    }
}

fn write_unit(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(format!("{name}.plugin"));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "").unwrap();
    path
}

#[test]
fn module_directories_win_over_libdir_and_code_path() {
    let h = host(true);
    let module_unit = write_unit(&h.modules.join("stdlib/lib"), "puppet/type/file");
    write_unit(&h.libdir, "puppet/type/file");
    write_unit(&h.code, "puppet/type/file");

    assert!(h.registry.load("puppet/type/file", None).unwrap());
    assert_eq!(h.calls.lock().unwrap().as_slice(), &[module_unit]);
}

#[test]
fn libdir_wins_over_code_path() {
    let h = host(true);
    let lib_unit = write_unit(&h.libdir, "puppet/provider/apt");
    write_unit(&h.code, "puppet/provider/apt");

    let resolved = h.registry.resolve("puppet/provider/apt", None).unwrap();
    assert_eq!(resolved, Some(lib_unit));
}

#[test]
fn uninitialized_host_only_searches_code_path() {
    let h = host(false);
    write_unit(&h.modules.join("stdlib/lib"), "puppet/type/file");
    write_unit(&h.libdir, "puppet/type/user");

    assert!(!h.registry.load("puppet/type/file", None).unwrap());
    assert!(!h.registry.load("puppet/type/user", None).unwrap());

    h.env.mark_initialized();
    assert!(h.registry.load("puppet/type/file", None).unwrap());
    assert!(h.registry.load("puppet/type/user", None).unwrap());
}

#[test]
fn new_modules_visible_after_cache_clear() {
    let h = host(true);
    write_unit(&h.code, "puppet/type/file");
    h.registry.load("puppet/type/file", None).unwrap();
    assert!(!h.registry.changed("puppet/type/file", None).unwrap());

    // A module installed later shadows the code path once the cache is cleared.
    write_unit(&h.modules.join("newmod/lib"), "puppet/type/file");
    assert!(!h.registry.changed("puppet/type/file", None).unwrap());

    h.registry.clear_cache();
    assert!(h.registry.changed("puppet/type/file", None).unwrap());

    let reloaded = h.registry.reload_changed(None).unwrap();
    assert_eq!(reloaded, vec!["puppet/type/file"]);
    assert_eq!(
        h.registry.record("puppet/type/file").unwrap().path,
        h.modules.join("newmod/lib/puppet/type/file.plugin")
    );
}

#[test]
fn scoped_loaders_discover_units_across_sources() {
    let h = host(true);
    write_unit(&h.modules.join("stdlib/lib"), "puppet/type/stage");
    write_unit(&h.libdir, "puppet/type/file");
    write_unit(&h.code, "puppet/type/file");
    write_unit(&h.code, "puppet/type/user");
    write_unit(&h.code, "puppet/provider/user/useradd");

    let types = h
        .registry
        .register_scope("types", "puppet/type", LoaderOptions::default())
        .unwrap();

    assert_eq!(
        types.files_under(None).unwrap(),
        vec![
            "puppet/type/stage.plugin",
            "puppet/type/file.plugin",
            "puppet/type/user.plugin"
        ]
    );

    let loaded = types.load_all(None).unwrap();
    assert_eq!(loaded.len(), 3);
    assert!(types.load_all(None).unwrap().is_empty());
    assert!(!h.registry.loaded("puppet/provider/user/useradd"));

    let names: Vec<String> = h.registry.list_loaded().into_iter().map(|(n, _)| n).collect();
    assert_eq!(
        names,
        vec!["puppet/type/file", "puppet/type/stage", "puppet/type/user"]
    );
}

#[test]
fn named_environment_uses_its_own_modulepath() {
    let root = TempDir::new().unwrap();
    let prod = root.path().join("prod");
    let dev = root.path().join("dev");
    let prod_unit = write_unit(&prod.join("app/lib"), "app/widget");
    let dev_unit = write_unit(&dev.join("app/lib"), "app/widget");

    let mut settings = Settings::default();
    settings.environments.insert("production".into(), vec![prod]);
    settings.environments.insert("development".into(), vec![dev]);
    let env = Arc::new(HostEnvironment::initialized_with(settings));
    let registry =
        LoadRegistry::from_host(env, |_: &Path, _: bool| -> Result<(), ExecError> { Ok(()) })
            .unwrap();

    assert_eq!(registry.resolve("app/widget", Some("production")).unwrap(), Some(prod_unit));
    assert_eq!(registry.resolve("app/widget", Some("development")).unwrap(), Some(dev_unit));
    assert_eq!(registry.resolve("app/widget", None).unwrap(), None);
}

#[cfg(unix)]
#[test]
fn command_executor_runs_units() {
    use autoload_registry::{AutoloadError, CommandExecutor};

    let root = TempDir::new().unwrap();
    let marker = root.path().join("ran");
    let good = root.path().join("good.plugin");
    let bad = root.path().join("bad.plugin");
    fs::write(&good, format!("echo ran > {}\n", marker.display())).unwrap();
    fs::write(&bad, "exit 7\n").unwrap();

    let registry = LoadRegistry::builder(CommandExecutor::new("/bin/sh"))
        .code_path([root.path().to_path_buf()])
        .build()
        .unwrap();

    assert!(registry.load("good", None).unwrap());
    assert!(marker.exists());

    let err = registry.load("bad", None).unwrap_err();
    assert!(matches!(err, AutoloadError::Load { ref name, .. } if name == "bad"));
}
