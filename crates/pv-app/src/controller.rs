//! Application state controller

use pv_core::events::events::{
    ColumnRenamed, DatasetClosed, DatasetLoadFailed, DatasetLoaded, SessionCleared, StorageWarningRaised,
};
use pv_core::{Dataset, DatasetId, EventBus, OverlayState};
use pv_data::{
    analyze, export_csv, export_file_name, parse_csv, KeyValueStore, ResourceFetcher, SessionManager,
    SharedFileLoader, StorageInfo, StorageWarning, StoredDataset, TabPreferences,
};
use pv_views::{TableConfig, TableView};
use tracing::{debug, error, info, warn};

use crate::{AppError, Result};

/// Owns the loaded datasets and their overlay state
///
/// Every call that changes datasets or overlay state persists the
/// user-uploaded datasets while the user is logged in. Shared datasets are
/// never persisted; they are reloaded from the data directory.
pub struct AppController<S, F> {
    session: SessionManager<S>,
    loader: SharedFileLoader<F>,
    datasets: Vec<Dataset>,
    overlay: OverlayState,
    authenticated: bool,
    storage_warning: Option<StorageWarning>,
    last_error: Option<String>,
    events: EventBus,
}

impl<S: KeyValueStore, F: ResourceFetcher> AppController<S, F> {
    pub fn new(session: SessionManager<S>, loader: SharedFileLoader<F>) -> Self {
        let authenticated = session.load_auth();
        Self {
            session,
            loader,
            datasets: Vec::new(),
            overlay: OverlayState::new(),
            authenticated,
            storage_warning: None,
            last_error: None,
            events: EventBus::new(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn dataset(&self, id: &DatasetId) -> Option<&Dataset> {
        self.datasets.iter().find(|d| &d.id == id)
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    pub fn active_dataset(&self) -> Option<&Dataset> {
        self.overlay.active_file_id.as_ref().and_then(|id| self.dataset(id))
    }

    /// Warning from the last persist that had to drop data
    pub fn storage_warning(&self) -> Option<&StorageWarning> {
        self.storage_warning.as_ref()
    }

    pub fn dismiss_storage_warning(&mut self) {
        self.storage_warning = None;
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn storage_info(&self) -> StorageInfo {
        self.session.storage_info()
    }

    /// Table over a dataset with its hidden columns and widths applied
    pub fn table_view(&self, id: &DatasetId, config: &TableConfig) -> Option<TableView<'_>> {
        let dataset = self.dataset(id)?;
        Some(
            TableView::new(&dataset.analysis, self.overlay.hidden_for(id), self.overlay.widths_for(id))
                .with_config(config.clone()),
        )
    }

    fn position(&self, id: &DatasetId) -> Result<usize> {
        self.datasets
            .iter()
            .position(|d| &d.id == id)
            .ok_or_else(|| AppError::UnknownDataset(id.clone()))
    }

    /// Rebuild the working set from the session and the shared data directory
    ///
    /// Does nothing until the user has logged in. Returns the number of
    /// datasets available afterwards.
    pub async fn restore(&mut self) -> usize {
        if !self.authenticated {
            debug!("Not authenticated, skipping session restore");
            return self.datasets.len();
        }

        let record = self.session.load();
        let mut datasets: Vec<Dataset> = record
            .datasets
            .into_iter()
            .filter_map(StoredDataset::into_dataset)
            .collect();

        let (shared, preferences) =
            tokio::join!(self.loader.load_shared_files(), self.loader.load_preferences());
        let shared = preferences.apply(shared);
        info!(
            session = datasets.len(),
            shared = shared.len(),
            "Restored datasets"
        );
        datasets.extend(shared);

        self.datasets = datasets;
        self.overlay = OverlayState {
            active_file_id: record.active_file_id,
            hidden_columns: record.hidden_columns,
            column_widths: record.column_widths,
        };
        let ids: Vec<DatasetId> = self.datasets.iter().map(|d| d.id.clone()).collect();
        self.overlay.retain_datasets(&ids);
        if self.overlay.active_file_id.is_none() {
            self.overlay.active_file_id = ids.first().cloned();
        }

        for dataset in &self.datasets {
            self.events.publish(DatasetLoaded {
                id: dataset.id.clone(),
                name: dataset.name.clone(),
                row_count: dataset.row_count(),
                column_count: dataset.analysis.total_columns,
                is_shared: dataset.is_shared,
            });
        }
        self.datasets.len()
    }

    /// Parse an uploaded CSV file and make it the active dataset
    pub fn upload(&mut self, name: &str, text: &str) -> Result<DatasetId> {
        self.last_error = None;

        let rows = match parse_csv(text) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to load {}: {}", name, e);
                self.last_error = Some(e.to_string());
                self.events.publish(DatasetLoadFailed {
                    name: name.to_string(),
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        };

        let analysis = analyze(&rows);
        let dataset = Dataset {
            id: DatasetId::generate(),
            name: name.to_string(),
            display_name: Dataset::default_display_name(name),
            rows,
            analysis,
            is_shared: false,
        };
        let id = dataset.id.clone();
        info!(
            "Loaded {} ({} rows, {} columns)",
            name,
            dataset.row_count(),
            dataset.analysis.total_columns
        );

        self.events.publish(DatasetLoaded {
            id: id.clone(),
            name: dataset.name.clone(),
            row_count: dataset.row_count(),
            column_count: dataset.analysis.total_columns,
            is_shared: false,
        });
        self.datasets.push(dataset);
        self.overlay.register_dataset(&id);
        self.overlay.active_file_id = Some(id.clone());
        self.persist();
        Ok(id)
    }

    pub fn switch_to(&mut self, id: &DatasetId) -> Result<()> {
        self.position(id)?;
        self.overlay.active_file_id = Some(id.clone());
        self.persist();
        Ok(())
    }

    /// Close an uploaded dataset. Shared datasets cannot be closed.
    pub fn close(&mut self, id: &DatasetId) -> Result<()> {
        let index = self.position(id)?;
        if self.datasets[index].is_shared {
            return Err(AppError::SharedDataset(id.clone()));
        }

        let closed = self.datasets.remove(index);
        let was_active = self.overlay.active_file_id.as_ref() == Some(id);
        self.overlay.remove_dataset(id);
        if was_active {
            self.overlay.active_file_id = self.datasets.first().map(|d| d.id.clone());
        }

        info!("Closed {}", closed.name);
        self.events.publish(DatasetClosed { id: id.clone() });
        self.persist();
        Ok(())
    }

    /// Rename a tab.
    ///
    /// Shared tab names live in the global preferences document rather than
    /// the session, so renaming a shared tab returns the regenerated
    /// preferences for the caller to publish.
    pub fn rename_tab(&mut self, id: &DatasetId, name: &str) -> Result<Option<TabPreferences>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidName(name.to_string()));
        }

        let index = self.position(id)?;
        self.datasets[index].display_name = name.to_string();
        if self.datasets[index].is_shared {
            info!("Shared tab {} renamed to \"{}\"", id, name);
            return Ok(Some(self.preferences()));
        }
        self.persist();
        Ok(None)
    }

    /// Move `dragged` to the position currently held by `target`
    pub fn reorder(&mut self, dragged: &DatasetId, target: &DatasetId) -> Result<()> {
        let from = self.position(dragged)?;
        let to = self.position(target)?;
        if from == to {
            return Ok(());
        }

        let dataset = self.datasets.remove(from);
        self.datasets.insert(to, dataset);
        self.persist();
        Ok(())
    }

    /// Hide or show a column. Returns whether it is now hidden.
    pub fn toggle_column(&mut self, id: &DatasetId, column: &str) -> Result<bool> {
        self.position(id)?;
        let hidden = self.overlay.toggle_column(id, column);
        self.persist();
        Ok(hidden)
    }

    /// Store a column width. Returns the width after clamping.
    pub fn set_column_width(&mut self, id: &DatasetId, column: &str, width: u32) -> Result<u32> {
        self.position(id)?;
        let width = self.overlay.set_column_width(id, column, width);
        self.persist();
        Ok(width)
    }

    /// Size a column to its content
    pub fn autofit_column(&mut self, id: &DatasetId, column: &str, config: &TableConfig) -> Result<u32> {
        let width = {
            let view = self
                .table_view(id, config)
                .ok_or_else(|| AppError::UnknownDataset(id.clone()))?;
            let rows = &self.datasets[self.position(id)?].rows;
            view.autofit_width(column, rows)
        };
        self.set_column_width(id, column, width)
    }

    /// Rename a column in every row, keeping its position, hidden flag and width
    pub fn rename_column(&mut self, id: &DatasetId, old: &str, new: &str) -> Result<()> {
        let new = new.trim();
        if new.is_empty() {
            return Err(AppError::InvalidName(new.to_string()));
        }

        let index = self.position(id)?;
        let dataset = &mut self.datasets[index];
        if !dataset.rename_column_in_rows(old, new) {
            return Err(AppError::InvalidName(format!(
                "cannot rename column '{old}' to '{new}'"
            )));
        }
        dataset.analysis = analyze(&dataset.rows);
        self.overlay.rename_column(id, old, new);

        debug!("Renamed column {} to {} in {}", old, new, id);
        self.events.publish(ColumnRenamed {
            id: id.clone(),
            old_name: old.to_string(),
            new_name: new.to_string(),
        });
        self.persist();
        Ok(())
    }

    /// Export a dataset as CSV. Returns the download file name and the contents.
    pub fn export(&self, id: &DatasetId) -> Result<(String, String)> {
        let dataset = self
            .dataset(id)
            .ok_or_else(|| AppError::UnknownDataset(id.clone()))?;
        let csv = export_csv(&dataset.rows, &dataset.analysis.columns)?;
        Ok((export_file_name(&dataset.name), csv))
    }

    pub fn export_active(&self) -> Result<(String, String)> {
        let id = self
            .overlay
            .active_file_id
            .as_ref()
            .ok_or(AppError::NoActiveDataset)?;
        self.export(id)
    }

    /// Tab preferences describing the current shared datasets
    pub fn preferences(&self) -> TabPreferences {
        let shared: Vec<Dataset> = self.datasets.iter().filter(|d| d.is_shared).cloned().collect();
        TabPreferences::generate(&shared)
    }

    pub fn login(&mut self) {
        self.authenticated = true;
        self.session.persist_auth(true);
        info!("Logged in");
    }

    /// Log out, keeping the persisted datasets but dropping view state
    pub fn logout(&mut self) {
        self.authenticated = false;
        self.overlay.reset();
        self.storage_warning = None;
        self.last_error = None;
        self.session.clear_auth();
        info!("Logged out");
    }

    /// Drop every dataset and all persisted session data, login included
    pub fn clear_all(&mut self) {
        self.authenticated = false;
        self.datasets.clear();
        self.overlay.reset();
        self.storage_warning = None;
        self.last_error = None;
        self.session.clear();
        self.events.publish(SessionCleared);
    }

    /// Write the uploaded datasets and overlay state to the session store
    fn persist(&mut self) {
        if !self.authenticated {
            return;
        }

        let result = self.session.persist(
            self.datasets.iter().filter(|d| !d.is_shared),
            self.overlay.active_file_id.as_ref(),
            &self.overlay.hidden_columns,
            &self.overlay.column_widths,
        );

        match result {
            Ok(outcome) => {
                if let Some(warning) = outcome.warning {
                    warn!("{}", warning);
                    self.events.publish(StorageWarningRaised {
                        message: warning.to_string(),
                        files_removed: outcome.files_removed,
                    });
                    self.storage_warning = Some(warning);
                }
            }
            Err(e) => {
                error!("{}", e);
                self.last_error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pv_core::handler_from_fn;
    use pv_data::{DiscoveryConfig, MemoryStore, SessionConfig};

    struct StaticFetcher {
        documents: HashMap<String, String>,
    }

    impl StaticFetcher {
        fn new(documents: &[(&str, &str)]) -> Self {
            Self {
                documents: documents.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            }
        }
    }

    #[async_trait]
    impl ResourceFetcher for StaticFetcher {
        async fn fetch_text(&self, path: &str) -> anyhow::Result<Option<String>> {
            if path == "down.csv" {
                anyhow::bail!("connection refused");
            }
            Ok(self.documents.get(path).cloned())
        }

        async fn exists(&self, path: &str) -> bool {
            path == "down.csv" || self.documents.contains_key(path)
        }
    }

    type Controller = AppController<MemoryStore, StaticFetcher>;

    fn controller_with(store: MemoryStore, documents: &[(&str, &str)]) -> Controller {
        let session = SessionManager::new(store, SessionConfig::default());
        let loader = SharedFileLoader::new(StaticFetcher::new(documents), DiscoveryConfig::default());
        let mut controller = AppController::new(session, loader);
        controller.login();
        controller
    }

    fn controller() -> Controller {
        controller_with(MemoryStore::unbounded(), &[])
    }

    /// Carry the persisted session over to a fresh controller
    fn reopen(controller: Controller, documents: &[(&str, &str)]) -> Controller {
        let store = MemoryStore::unbounded();
        for (key, _) in controller.session.store().entries().unwrap() {
            let value = controller.session.store().get(&key).unwrap().unwrap();
            store.set(&key, &value).unwrap();
        }
        let session = SessionManager::new(store, SessionConfig::default());
        let loader = SharedFileLoader::new(StaticFetcher::new(documents), DiscoveryConfig::default());
        AppController::new(session, loader)
    }

    #[test]
    fn test_upload_makes_dataset_active() {
        let mut app = controller();
        let loaded = Arc::new(Mutex::new(Vec::new()));
        let sink = loaded.clone();
        app.events().subscribe::<DatasetLoaded>(handler_from_fn(move |event| {
            if let Some(e) = event.as_any().downcast_ref::<DatasetLoaded>() {
                sink.lock().push(e.row_count);
            }
        }));

        let id = app.upload("leads.csv", "name,score\nAcme,3\nGlobex,5\n").unwrap();
        assert_eq!(app.active_dataset().map(|d| &d.id), Some(&id));
        assert_eq!(app.active_dataset().unwrap().display_name, "leads");
        assert!(app.overlay().hidden_for(&id).is_empty());
        assert_eq!(*loaded.lock(), vec![2]);
    }

    #[test]
    fn test_empty_upload_is_reported() {
        let mut app = controller();
        let err = app.upload("empty.csv", "name,score\n").unwrap_err();
        assert!(matches!(err, AppError::Data(pv_data::DataError::EmptyDataset)));
        assert_eq!(
            app.last_error(),
            Some("The CSV file appears to be empty or has no valid data")
        );
        assert!(app.datasets().is_empty());
    }

    #[test]
    fn test_close_prunes_overlay_and_picks_next() {
        let mut app = controller();
        let first = app.upload("a.csv", "x\n1\n").unwrap();
        let second = app.upload("b.csv", "y\n2\n").unwrap();
        app.set_column_width(&second, "y", 120).unwrap();
        app.toggle_column(&second, "y").unwrap();

        app.close(&second).unwrap();
        assert_eq!(app.overlay().active_file_id, Some(first.clone()));
        assert!(app.overlay().widths_for(&second).is_none());
        assert!(app.overlay().hidden_for(&second).is_empty());
        assert!(matches!(app.close(&second), Err(AppError::UnknownDataset(_))));

        app.close(&first).unwrap();
        assert_eq!(app.overlay().active_file_id, None);
        assert!(reopen(app, &[]).session.load().datasets.is_empty());
    }

    #[tokio::test]
    async fn test_restore_combines_session_and_shared() {
        let documents = [
            ("file-manifest.json", r#"{"files": ["shared.csv", "down.csv"]}"#),
            ("shared.csv", "company\nInitech\n"),
            ("tab-preferences.json", r#"{"tabNames": {"shared-shared.csv": "Team list"}, "tabOrder": ["shared-shared.csv"]}"#),
        ];
        let mut app = controller_with(MemoryStore::unbounded(), &documents);
        let id = app.upload("mine.csv", "a,b\n1,2\n").unwrap();
        app.set_column_width(&id, "a", 10).unwrap();
        app.toggle_column(&id, "b").unwrap();

        let mut restored = reopen(app, &documents);
        assert!(restored.is_authenticated());
        assert_eq!(restored.restore().await, 2);

        let datasets = restored.datasets();
        assert_eq!(datasets[0].id, id);
        assert_eq!(datasets[0].analysis.total_rows, 1);
        assert!(datasets[1].is_shared);
        assert_eq!(datasets[1].display_name, "Team list");
        assert_eq!(restored.overlay().width_of(&id, "a"), Some(60));
        assert!(restored.overlay().is_hidden(&id, "b"));
        assert_eq!(restored.overlay().active_file_id, Some(id));
    }

    #[tokio::test]
    async fn test_restore_requires_login() {
        let mut app = controller();
        app.upload("mine.csv", "a\n1\n").unwrap();
        app.logout();

        let mut restored = reopen(app, &[]);
        assert!(!restored.is_authenticated());
        assert_eq!(restored.restore().await, 0);

        restored.login();
        assert_eq!(restored.restore().await, 1);
    }

    #[tokio::test]
    async fn test_shared_datasets_cannot_be_closed() {
        let documents = [("file-manifest.json", r#"{"files": ["s.csv"]}"#), ("s.csv", "x\n1\n")];
        let mut app = controller_with(MemoryStore::unbounded(), &documents);
        app.restore().await;

        let shared = DatasetId::shared("s.csv");
        assert!(matches!(app.close(&shared), Err(AppError::SharedDataset(_))));
        assert_eq!(app.datasets().len(), 1);

        let preferences = app.rename_tab(&shared, "  Shared list ").unwrap().unwrap();
        assert_eq!(preferences.tab_order, vec![shared.clone()]);
        assert_eq!(preferences.tab_names[&shared], "Shared list");
        assert!(matches!(app.rename_tab(&shared, "   "), Err(AppError::InvalidName(_))));

        let upload = app.upload("mine.csv", "a\n1\n").unwrap();
        assert_eq!(app.rename_tab(&upload, "Mine").unwrap(), None);
        assert_eq!(app.session.load().datasets[0].display_name, "Mine");
    }

    #[test]
    fn test_reorder() {
        let mut app = controller();
        let a = app.upload("a.csv", "x\n1\n").unwrap();
        let b = app.upload("b.csv", "x\n1\n").unwrap();
        let c = app.upload("c.csv", "x\n1\n").unwrap();

        app.reorder(&c, &a).unwrap();
        let ids: Vec<_> = app.datasets().iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec![c.clone(), a.clone(), b.clone()]);

        app.reorder(&c, &b).unwrap();
        let ids: Vec<_> = app.datasets().iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn test_rename_column_keeps_order_and_overlay() {
        let mut app = controller();
        let id = app.upload("a.csv", "first,second,third\n1,2,3\n").unwrap();
        app.set_column_width(&id, "second", 200).unwrap();
        app.toggle_column(&id, "second").unwrap();

        app.rename_column(&id, "second", " middle ").unwrap();
        let dataset = app.dataset(&id).unwrap();
        assert_eq!(dataset.analysis.columns, vec!["first", "middle", "third"]);
        let keys: Vec<_> = dataset.rows[0].keys().cloned().collect();
        assert_eq!(keys, vec!["first", "middle", "third"]);
        assert_eq!(app.overlay().width_of(&id, "middle"), Some(200));
        assert!(app.overlay().is_hidden(&id, "middle"));

        assert!(app.rename_column(&id, "middle", "first").is_err());
        assert!(app.rename_column(&id, "missing", "other").is_err());
    }

    #[test]
    fn test_autofit_and_export() {
        let mut app = controller();
        let id = app.upload("report.csv", "id,description\n1,short\n").unwrap();

        let width = app.autofit_column(&id, "id", &TableConfig::default()).unwrap();
        assert_eq!(width, 80);
        assert_eq!(app.overlay().width_of(&id, "id"), Some(80));

        let (file_name, csv) = app.export_active().unwrap();
        assert_eq!(file_name, "processed_report.csv");
        assert_eq!(csv, "id,description\n1,short\n");
    }

    #[test]
    fn test_storage_warning_is_surfaced() {
        let rows: String = (0..40).map(|i| format!("{i},{}\n", "x".repeat(60))).collect();
        let text = format!("id,notes\n{rows}");
        let capacity = text.len() * 3;
        let mut app = controller_with(MemoryStore::with_capacity(capacity), &[]);

        let warnings = Arc::new(Mutex::new(0usize));
        let counter = warnings.clone();
        app.events().subscribe::<StorageWarningRaised>(handler_from_fn(move |_| {
            *counter.lock() += 1;
        }));

        for name in ["a.csv", "b.csv", "c.csv"] {
            app.upload(name, &text).unwrap();
        }

        assert!(matches!(
            app.storage_warning(),
            Some(StorageWarning::ReducedToRecent { kept: 2, .. })
        ));
        assert_eq!(*warnings.lock(), 1);
        assert_eq!(app.datasets().len(), 3);

        app.dismiss_storage_warning();
        assert!(app.storage_warning().is_none());
    }

    #[test]
    fn test_logout_keeps_files_and_clear_all_drops_them() {
        let mut app = controller();
        app.upload("a.csv", "x\n1\n").unwrap();

        app.logout();
        assert!(!app.is_authenticated());
        assert_eq!(app.datasets().len(), 1);
        assert_eq!(app.overlay().active_file_id, None);

        app.login();
        app.clear_all();
        assert!(app.datasets().is_empty());
        assert!(!app.is_authenticated());
        assert!(app.session.load().datasets.is_empty());
        assert!(!app.session.load_auth());
    }
}
