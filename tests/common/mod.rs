// tests/common/mod.rs

//! Shared helpers for integration tests

// Not every test binary uses every helper
#![allow(dead_code)]

use quarry::{HookContext, PublishedInfo, Recipe, RecipeMeta, Result};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Configurable recipe for driving full install/build flows
pub struct TestRecipe {
    meta: RecipeMeta,
    /// (relative path, content) files written by the package step
    package_files: Vec<(String, String)>,
    env: Vec<(String, String)>,
    env_appends: Vec<(String, String)>,
    user: Vec<(String, String)>,
    libs: Vec<String>,
    fail_build: bool,
}

impl TestRecipe {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            meta: RecipeMeta::new(name, version),
            package_files: Vec::new(),
            env: Vec::new(),
            env_appends: Vec::new(),
            user: Vec::new(),
            libs: Vec::new(),
            fail_build: false,
        }
    }

    pub fn requires(mut self, requirement: &str) -> Self {
        self.meta.add_require(requirement).unwrap();
        self
    }

    pub fn settings(mut self, axes: &[&str]) -> Self {
        self.meta.declare_settings(axes.iter().copied());
        self
    }

    pub fn default_option(mut self, option: &str, value: &str) -> Self {
        self.meta
            .default_options
            .insert(option.to_string(), value.to_string());
        self
    }

    pub fn force_dep_option(mut self, dependency: &str, option: &str, value: &str) -> Self {
        self.meta.force_dep_option(dependency, option, value);
        self
    }

    pub fn package_file(mut self, rel: &str, content: &str) -> Self {
        self.package_files
            .push((rel.to_string(), content.to_string()));
        self
    }

    pub fn env(mut self, var: &str, value: &str) -> Self {
        self.env.push((var.to_string(), value.to_string()));
        self
    }

    pub fn env_append(mut self, var: &str, value: &str) -> Self {
        self.env_appends.push((var.to_string(), value.to_string()));
        self
    }

    pub fn user_value(mut self, name: &str, value: &str) -> Self {
        self.user.push((name.to_string(), value.to_string()));
        self
    }

    pub fn lib(mut self, name: &str) -> Self {
        self.libs.push(name.to_string());
        self
    }

    pub fn failing_build(mut self) -> Self {
        self.fail_build = true;
        self
    }
}

impl Recipe for TestRecipe {
    fn meta(&self) -> &RecipeMeta {
        &self.meta
    }

    fn build(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        if self.fail_build {
            return Err(quarry::Error::Internal(format!(
                "build blew up for {}",
                ctx.reference
            )));
        }
        ctx.info("BUILD RAN");
        Ok(())
    }

    fn package(&self, ctx: &mut HookContext<'_>) -> Result<()> {
        for (rel, content) in &self.package_files {
            let target = ctx.package_dir.join(rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, content)?;
        }
        Ok(())
    }

    fn package_info(&self, _ctx: &mut HookContext<'_>) -> Result<PublishedInfo> {
        let mut info = PublishedInfo::package_layout();
        info.build.libs = self.libs.clone();
        for (var, value) in &self.env {
            info.env.set(var.clone(), value.clone());
        }
        for (var, value) in &self.env_appends {
            info.env.append(var.clone(), value.clone());
        }
        for (name, value) in &self.user {
            info.user.set(name.clone(), value.clone());
        }
        Ok(info)
    }
}

/// A fresh cache directory plus a fresh workspace directory
pub struct Sandbox {
    pub cache_dir: TempDir,
    pub workspace: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            cache_dir: TempDir::new().unwrap(),
            workspace: TempDir::new().unwrap(),
        }
    }

    pub fn client(&self) -> quarry::Client {
        quarry::Client::new(self.cache_dir.path()).unwrap()
    }

    pub fn workspace_path(&self) -> PathBuf {
        self.workspace.path().to_path_buf()
    }
}
