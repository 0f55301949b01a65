use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use remind_core::occurrence::Occurrence;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::{
    document::OrgDocument,
    habit::{self, Habit},
};

/// Occurrence provider backed by org habit files under a set of roots.
pub struct HabitSource {
    roots: Vec<PathBuf>,
    documents: RwLock<HashMap<PathBuf, OrgDocument>>,
    watcher: Option<RecommendedWatcher>,
}

pub struct HabitSourceBuilder {
    roots: Vec<PathBuf>,
}

impl HabitSourceBuilder {
    pub fn new() -> Self {
        Self { roots: Vec::new() }
    }

    pub fn add_root(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        if !self.roots.contains(&path) {
            self.roots.push(path);
        }
        self
    }

    pub fn build(self) -> Result<HabitSource> {
        let source = HabitSource {
            roots: self.roots,
            documents: RwLock::new(HashMap::new()),
            watcher: None,
        };
        source.reload_all()?;
        Ok(source)
    }
}

impl Default for HabitSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitSource {
    pub fn builder() -> HabitSourceBuilder {
        HabitSourceBuilder::new()
    }

    pub fn reload_all(&self) -> Result<()> {
        let mut docs = self.documents.write();
        docs.clear();
        for root in &self.roots {
            Self::ingest_root(&mut docs, root)?;
        }
        info!(documents = docs.len(), "habit files loaded");
        Ok(())
    }

    pub fn habits(&self) -> Vec<Habit> {
        let docs = self.documents.read();
        let mut paths: Vec<&PathBuf> = docs.keys().collect();
        paths.sort();
        paths
            .into_iter()
            .flat_map(|path| habit::extract_habits(&docs[path]))
            .collect()
    }

    /// Occurrences for `date`, ordered by scheduled time.
    pub fn occurrences_on(&self, date: NaiveDate, default_time: NaiveTime) -> Vec<Occurrence> {
        let mut occurrences: Vec<Occurrence> = self
            .habits()
            .iter()
            .filter_map(|habit| habit.occurrence_on(date, default_time))
            .collect();
        occurrences.sort_by_key(|occurrence| occurrence.scheduled_at);
        occurrences
    }

    /// Watch every root; `on_change` runs on the watcher thread whenever an
    /// org file is created, modified or removed.
    pub fn watch<F>(&mut self, on_change: F) -> Result<()>
    where
        F: Fn() + Send + 'static,
    {
        if self.watcher.is_some() {
            return Ok(());
        }
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else {
                return;
            };
            let relevant = matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) && event.paths.iter().any(|path| is_org_file(path));
            if relevant {
                debug!(?event, "habit file change detected");
                on_change();
            }
        })?;
        for root in &self.roots {
            let mode = if root.is_file() {
                RecursiveMode::NonRecursive
            } else {
                RecursiveMode::Recursive
            };
            watcher.watch(root, mode)?;
        }
        self.watcher = Some(watcher);
        Ok(())
    }

    fn ingest_root(docs: &mut HashMap<PathBuf, OrgDocument>, path: &Path) -> Result<()> {
        if path.is_file() {
            if is_org_file(path) {
                docs.insert(path.to_path_buf(), OrgDocument::load(path)?);
            }
            return Ok(());
        }

        if path.is_dir() {
            for entry in WalkDir::new(path) {
                let entry = entry?;
                let entry_path = entry.path();
                if entry.file_type().is_file() && is_org_file(entry_path) {
                    let doc = OrgDocument::load(entry_path)?;
                    debug!(path = %doc.path().display(), loaded_at = %doc.loaded_at(), "loaded habit file");
                    docs.insert(entry_path.to_path_buf(), doc);
                }
            }
        }
        Ok(())
    }
}

fn is_org_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("org"))
        .unwrap_or(false)
}
