//! Infrastructure implementation of the `EnvironmentTemplater` port for
//! Android Virtual Devices.
//!
//! An AVD named `N` is the directory `<home>/N.avd/` plus the pointer file
//! `<home>/N.ini`. A fresh copy duplicates both and rewrites the name and
//! path references inside them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::EnvironmentTemplater;
use crate::domain::TemplateError;
use crate::domain::config::AVD_NAME_RE;

/// Overrides the default AVD home, as honoured by the Android tools.
pub const AVD_HOME_ENV: &str = "ANDROID_AVD_HOME";

#[derive(Debug, Clone)]
pub struct AvdTemplater {
    home: PathBuf,
}

impl AvdTemplater {
    #[must_use]
    pub fn new(home: PathBuf) -> Self {
        Self { home }
    }

    /// Configured home, else `$ANDROID_AVD_HOME`, else `~/.android/avd`.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn resolve(configured: Option<&Path>) -> Result<Self> {
        if let Some(home) = configured {
            return Ok(Self::new(home.to_path_buf()));
        }
        match std::env::var(AVD_HOME_ENV) {
            Ok(val) if !val.is_empty() => return Ok(Self::new(PathBuf::from(val))),
            _ => {}
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::new(home.join(".android").join("avd")))
    }

    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    fn avd_dir(&self, name: &str) -> PathBuf {
        self.home.join(format!("{name}.avd"))
    }

    fn ini(&self, name: &str) -> PathBuf {
        self.home.join(format!("{name}.ini"))
    }
}

impl EnvironmentTemplater for AvdTemplater {
    /// Runs the copy on the blocking pool; an AVD tree can be several GB.
    async fn produce_fresh_copy(
        &self,
        template: &str,
        new_name: &str,
    ) -> Result<(), TemplateError> {
        let templater = self.clone();
        let (template, new_name) = (template.to_string(), new_name.to_string());
        let name = new_name.clone();
        tokio::task::spawn_blocking(move || templater.copy_now(&template, &new_name))
            .await
            .map_err(|e| TemplateError::Io {
                name,
                reason: format!("copy task aborted: {e}"),
            })?
    }
}

impl AvdTemplater {
    /// Replace any stale `new_name` with a fresh copy of `template`,
    /// blocking the calling thread until the tree is written.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] describing the failed step.
    pub fn copy_now(&self, template: &str, new_name: &str) -> Result<(), TemplateError> {
        for name in [template, new_name] {
            if !AVD_NAME_RE.is_match(name) {
                return Err(TemplateError::InvalidName(name.to_string()));
            }
        }
        if template == new_name {
            return Err(TemplateError::InvalidName(new_name.to_string()));
        }

        let (base_dir, base_ini) = (self.avd_dir(template), self.ini(template));
        if !base_dir.is_dir() || !base_ini.is_file() {
            return Err(TemplateError::BaseMissing {
                name: template.to_string(),
                home: self.home.display().to_string(),
            });
        }

        let (new_dir, new_ini) = (self.avd_dir(new_name), self.ini(new_name));
        remove_stale(&new_dir, &new_ini).map_err(|e| TemplateError::Conflict {
            name: new_name.to_string(),
            reason: format!("{e:#}"),
        })?;

        clone(&base_dir, &base_ini, &new_dir, &new_ini, template, new_name).map_err(|e| {
            TemplateError::Io {
                name: new_name.to_string(),
                reason: format!("{e:#}"),
            }
        })?;
        tracing::debug!(from = template, to = new_name, home = %self.home.display(), "avd cloned");
        Ok(())
    }
}

fn remove_stale(dir: &Path, ini: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).with_context(|| format!("removing {}", dir.display()))?;
    }
    if ini.exists() {
        std::fs::remove_file(ini).with_context(|| format!("removing {}", ini.display()))?;
    }
    Ok(())
}

fn clone(
    base_dir: &Path,
    base_ini: &Path,
    new_dir: &Path,
    new_ini: &Path,
    template: &str,
    new_name: &str,
) -> Result<()> {
    copy_dir_all(base_dir, new_dir)?;
    let ini = std::fs::read_to_string(base_ini)
        .with_context(|| format!("reading {}", base_ini.display()))?;
    std::fs::write(new_ini, rewrite_pointer_ini(&ini, template, new_name, new_dir))
        .with_context(|| format!("writing {}", new_ini.display()))?;

    let config = new_dir.join("config.ini");
    if config.is_file() {
        let content = std::fs::read_to_string(&config)
            .with_context(|| format!("reading {}", config.display()))?;
        std::fs::write(&config, rewrite_config_ini(&content, template, new_name))
            .with_context(|| format!("writing {}", config.display()))?;
    }
    Ok(())
}

fn copy_dir_all(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to).with_context(|| format!("creating {}", to.display()))?;
    for entry in std::fs::read_dir(from).with_context(|| format!("reading {}", from.display()))? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_all(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("copying {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Rewrite `<name>.ini`: `path=` points at the new directory, every other
/// mention of the template becomes the new name.
#[must_use]
pub fn rewrite_pointer_ini(content: &str, template: &str, new_name: &str, new_dir: &Path) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.lines() {
        if line.starts_with("path=") {
            out.push_str(&format!("path={}", new_dir.display()));
        } else {
            out.push_str(&line.replace(template, new_name));
        }
        out.push('\n');
    }
    out
}

/// Rewrite `config.ini`: `avd.id` and `avd.name` are set to the new name
/// (appended when absent), every other mention of the template is replaced.
#[must_use]
pub fn rewrite_config_ini(content: &str, template: &str, new_name: &str) -> String {
    let (mut found_id, mut found_name) = (false, false);
    let mut out = String::with_capacity(content.len() + 64);
    for line in content.lines() {
        if line.starts_with("avd.id=") {
            out.push_str(&format!("avd.id={new_name}"));
            found_id = true;
        } else if line.starts_with("avd.name=") {
            out.push_str(&format!("avd.name={new_name}"));
            found_name = true;
        } else {
            out.push_str(&line.replace(template, new_name));
        }
        out.push('\n');
    }
    if !found_id {
        out.push_str(&format!("avd.id={new_name}\n"));
    }
    if !found_name {
        out.push_str(&format!("avd.name={new_name}\n"));
    }
    out
}
