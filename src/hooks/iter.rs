// src/hooks/iter.rs

//! Walking a package's integration points against the system hooks
//!
//! For every `(app, hook, source)` in the descriptor's `integration`
//! section, the hook's pattern is expanded to a target path under the
//! root. Installing links the target to the source file inside the
//! version directory; removing only deletes the target. In both cases the
//! hook's command runs afterwards (unless hooks are inhibited) so the
//! consumer can pick up the change.

use super::{HookDefinition, IGNORED_HOOKS, exec_hook, expand_hook_pattern, system_hooks};
use crate::engine::Engine;
use crate::error::Result;
use crate::manifest::PackageYaml;
use std::fs;
use std::os::unix::fs as unix_fs;
use std::path::Path;
use tracing::{debug, warn};

impl Engine {
    /// Call `action(source, target, hook)` for each declared hook
    ///
    /// A failing hook command removes that hook's target and aborts the
    /// walk; hooks handled earlier in the walk are left in place.
    pub(crate) fn iter_hooks<F>(
        &self,
        m: &PackageYaml,
        origin: &str,
        inhibit_hooks: bool,
        action: F,
    ) -> Result<()>
    where
        F: Fn(&str, &Path, &HookDefinition) -> Result<()>,
    {
        let hooks = system_hooks(&self.dirs.click_hooks)?;
        let qualified_name = m.qualified_name(origin);

        for (app, app_hooks) in &m.integration {
            for (hook_name, source) in app_hooks {
                if IGNORED_HOOKS.contains(&hook_name.as_str()) {
                    continue;
                }

                let Some(hook) = hooks.get(hook_name) else {
                    warn!("Skipping hook {:?}: no such system hook", hook_name);
                    continue;
                };

                let target = self.dirs.under_root(&expand_hook_pattern(
                    &qualified_name,
                    app,
                    &m.version,
                    &hook.pattern,
                ));

                if fs::symlink_metadata(&target).is_ok()
                    && let Err(e) = fs::remove_file(&target)
                {
                    warn!("Failed to remove {}: {}", target.display(), e);
                }

                action(source, &target, hook)?;

                if !hook.exec.is_empty()
                    && !inhibit_hooks
                    && let Err(e) = exec_hook(&hook.exec, self.config.hook_timeout())
                {
                    let _ = fs::remove_file(&target);
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Link every hook target to its source inside `base_dir`
    pub fn install_hooks(
        &self,
        base_dir: &Path,
        m: &PackageYaml,
        origin: &str,
        inhibit_hooks: bool,
    ) -> Result<()> {
        self.iter_hooks(m, origin, inhibit_hooks, |source, target, _| {
            let real_source = self.dirs.strip_root(&base_dir.join(source));
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            unix_fs::symlink(&real_source, target)?;
            debug!("Linked hook {} -> {}", target.display(), real_source.display());
            Ok(())
        })
    }

    /// Remove every hook target; the walk itself deletes them
    pub fn remove_hooks(&self, m: &PackageYaml, origin: &str, inhibit_hooks: bool) -> Result<()> {
        self.iter_hooks(m, origin, inhibit_hooks, |_, _, _| Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::Engine;
    use crate::error::Error;
    use crate::manifest::PackageYaml;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const YAML: &str = r#"
name: foo
version: "1.0"
integration:
  app1:
    apparmor: meta/app1.apparmor
    bin-path: bin/app1
    unknown-hook: whatever
"#;

    fn setup(root: &Path, exec: &str) -> Engine {
        let engine = Engine::for_root(root);
        fs::create_dir_all(&engine.dirs.click_hooks).unwrap();
        fs::write(
            engine.dirs.click_hooks.join("apparmor.hook"),
            format!("Pattern: /var/lib/apparmor/clicks/${{id}}.json\nExec: {}\n", exec),
        )
        .unwrap();
        fs::write(
            engine.dirs.click_hooks.join("bin-path.hook"),
            "Pattern: /should/not/${id}\n",
        )
        .unwrap();
        engine
    }

    #[test]
    fn test_install_and_remove_hooks() {
        let temp_dir = TempDir::new().unwrap();
        let engine = setup(temp_dir.path(), "true");
        let m = PackageYaml::parse(YAML).unwrap();
        let base_dir = engine.dirs.apps.join("foo.sideload/1.0");

        engine.install_hooks(&base_dir, &m, "sideload", false).unwrap();

        let target = temp_dir
            .path()
            .join("var/lib/apparmor/clicks/foo.sideload_app1_1.0.json");
        assert_eq!(
            fs::read_link(&target).unwrap(),
            Path::new("/apps/foo.sideload/1.0/meta/app1.apparmor")
        );
        assert!(!temp_dir.path().join("should").exists());

        // re-installing replaces the existing link
        engine.install_hooks(&base_dir, &m, "sideload", false).unwrap();
        assert!(fs::symlink_metadata(&target).is_ok());

        engine.remove_hooks(&m, "sideload", false).unwrap();
        assert!(fs::symlink_metadata(&target).is_err());
    }

    #[test]
    fn test_failing_hook_removes_target() {
        let temp_dir = TempDir::new().unwrap();
        let engine = setup(temp_dir.path(), "false");
        let m = PackageYaml::parse(YAML).unwrap();
        let base_dir = engine.dirs.apps.join("foo/1.0");

        let err = engine.install_hooks(&base_dir, &m, "", false).unwrap_err();
        assert!(matches!(err, Error::HookFailed { exit_code: 1, .. }));
        let target = temp_dir.path().join("var/lib/apparmor/clicks/foo_app1_1.0.json");
        assert!(fs::symlink_metadata(&target).is_err());
    }

    #[test]
    fn test_failing_hook_stops_walk() {
        let temp_dir = TempDir::new().unwrap();
        let engine = Engine::for_root(temp_dir.path());
        fs::create_dir_all(&engine.dirs.click_hooks).unwrap();
        let marker = temp_dir.path().join("third-ran");
        for (name, exec) in [
            ("first", "true".to_string()),
            ("second", "false".to_string()),
            ("third", format!("touch {}", marker.display())),
        ] {
            fs::write(
                engine.dirs.click_hooks.join(format!("{}.hook", name)),
                format!("Pattern: /hooks/{}/${{id}}\nExec: {}\n", name, exec),
            )
            .unwrap();
        }
        let m = PackageYaml::parse(
            "name: foo\nversion: \"1.0\"\nintegration:\n  app1:\n    first: a\n    second: b\n    third: c\n",
        )
        .unwrap();
        let base_dir = engine.dirs.apps.join("foo/1.0");

        let err = engine.install_hooks(&base_dir, &m, "", false).unwrap_err();
        assert!(matches!(err, Error::HookFailed { .. }));

        let hooks = temp_dir.path().join("hooks");
        assert_eq!(
            fs::read_link(hooks.join("first/foo_app1_1.0")).unwrap(),
            Path::new("/apps/foo/1.0/a")
        );
        assert!(fs::symlink_metadata(hooks.join("second/foo_app1_1.0")).is_err());
        assert!(fs::symlink_metadata(hooks.join("third/foo_app1_1.0")).is_err());
        assert!(!marker.exists());
    }

    #[test]
    fn test_inhibited_hooks_do_not_run() {
        let temp_dir = TempDir::new().unwrap();
        let engine = setup(temp_dir.path(), "false");
        let m = PackageYaml::parse(YAML).unwrap();
        let base_dir = engine.dirs.apps.join("foo/1.0");

        engine.install_hooks(&base_dir, &m, "", true).unwrap();
        let target = temp_dir.path().join("var/lib/apparmor/clicks/foo_app1_1.0.json");
        assert!(fs::symlink_metadata(&target).is_ok());
    }
}
