//! ConfigStore: the live [`ProjectSpec`] for a session.
//!
//! Every mutation writes the full snapshot through the storage port before
//! returning. A failed write is logged and swallowed; the in-memory spec
//! stays authoritative for the rest of the session.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::PlannerError;
use crate::preset;
use crate::spec::{ProjectSpec, SpecField, SpecPatch};
use crate::storage::{Namespace, Storage};

const IMPORT_PARSE_FAILED: &str = "Failed to parse the spec file.";
const IMPORT_INVALID_FORMAT: &str = "Invalid spec file format.";

/// Fields an imported document must carry as strings.
const IMPORT_REQUIRED_FIELDS: [SpecField; 2] = [SpecField::ProjectName, SpecField::Framework];

static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

fn whitespace_re() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("valid literal regex"))
}

/// A serialized spec ready to be saved under `file_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExport {
    pub file_name: String,
    pub contents: String,
}

/// `{projectName with whitespace runs collapsed to "_"}_spec.json`
pub fn export_file_name(project_name: &str) -> String {
    format!("{}_spec.json", whitespace_re().replace_all(project_name, "_"))
}

pub struct ConfigStore {
    spec: ProjectSpec,
    storage: Arc<dyn Storage>,
}

impl ConfigStore {
    /// Read the persisted spec, merged over the default spec.
    ///
    /// Missing, unreadable or corrupt data yields the default spec.
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let spec = load_spec(storage.as_ref());
        Self { spec, storage }
    }

    pub fn spec(&self) -> &ProjectSpec {
        &self.spec
    }

    pub fn snapshot(&self) -> ProjectSpec {
        self.spec.clone()
    }

    /// Shallow-merge `patch` over the current spec.
    pub fn update(&mut self, patch: SpecPatch) -> &ProjectSpec {
        let next = patch.apply_to(&self.spec);
        self.commit(next)
    }

    /// Set a scalar field from text, parsed according to the field's kind.
    ///
    /// A framework change goes through [`ConfigStore::apply_framework`] so
    /// its preset is merged.
    pub fn set_field_text(
        &mut self,
        field: SpecField,
        raw: &str,
    ) -> Result<&ProjectSpec, PlannerError> {
        let mut patch = SpecPatch::from_field_text(field, raw)?;
        debug!(field = %field, "setting field");
        if let Some(framework) = patch.framework.take() {
            return Ok(self.apply_framework(&framework));
        }
        Ok(self.update(patch))
    }

    /// Replace a list field wholesale, keeping the given order and duplicates.
    pub fn set_list_field(
        &mut self,
        field: SpecField,
        values: Vec<String>,
    ) -> Result<&ProjectSpec, PlannerError> {
        let mut next = self.spec.clone();
        let list = next.list_mut(field).ok_or_else(|| PlannerError::NotAListField {
            field: field.name().to_owned(),
        })?;
        *list = values;
        Ok(self.commit(next))
    }

    /// Add `value` when `present` and absent; remove every occurrence when not `present`.
    pub fn toggle_set_membership(
        &mut self,
        field: SpecField,
        value: &str,
        present: bool,
    ) -> Result<&ProjectSpec, PlannerError> {
        let mut next = self.spec.clone();
        let list = next.list_mut(field).ok_or_else(|| PlannerError::NotAListField {
            field: field.name().to_owned(),
        })?;
        if present {
            if !list.iter().any(|v| v == value) {
                list.push(value.to_owned());
            }
        } else {
            list.retain(|v| v != value);
        }
        Ok(self.commit(next))
    }

    /// Set the framework and merge its preset, if one exists.
    pub fn apply_framework(&mut self, framework: &str) -> &ProjectSpec {
        let next = preset::apply_preset(&self.spec, framework);
        self.commit(next)
    }

    /// Swap in a whole spec, e.g. one restored from history.
    pub fn replace(&mut self, spec: ProjectSpec) -> &ProjectSpec {
        self.commit(spec)
    }

    /// Merge an imported JSON document over the current spec.
    ///
    /// The document must be a JSON object with string `projectName` and
    /// `framework` fields; fields it does not mention keep their current
    /// value. On any error nothing changes.
    pub fn import_json(&mut self, text: &str) -> Result<&ProjectSpec, PlannerError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| PlannerError::ImportFormatInvalid {
                message: IMPORT_PARSE_FAILED,
                detail: e.to_string(),
            })?;

        let invalid = |detail: String| PlannerError::ImportFormatInvalid {
            message: IMPORT_INVALID_FORMAT,
            detail,
        };

        let map = value
            .as_object()
            .ok_or_else(|| invalid("document is not a JSON object".to_owned()))?;

        for field in IMPORT_REQUIRED_FIELDS {
            match map.get(field.name()) {
                Some(Value::String(s)) if !s.trim().is_empty() => {}
                _ => return Err(invalid(format!("missing required string field `{field}`"))),
            }
        }

        let patch = SpecPatch::from_json_object(map).map_err(|e| invalid(e.to_string()))?;

        info!(fields = map.len(), "importing spec");
        Ok(self.update(patch))
    }

    pub fn export(&self) -> Result<SpecExport, PlannerError> {
        let file_name = export_file_name(&self.spec.project_name);
        let contents = serde_json::to_string_pretty(&self.spec).map_err(|e| {
            PlannerError::ExportWriteFailed {
                path: PathBuf::from(&file_name),
                detail: e.to_string(),
            }
        })?;
        Ok(SpecExport { file_name, contents })
    }

    /// Write the export into `dir` and return the file path.
    pub fn write_export(&self, dir: &Path) -> Result<PathBuf, PlannerError> {
        let export = self.export()?;
        let path = dir.join(&export.file_name);
        fs::write(&path, &export.contents).map_err(|e| PlannerError::ExportWriteFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        info!(path = %path.display(), "spec exported");
        Ok(path)
    }

    fn commit(&mut self, next: ProjectSpec) -> &ProjectSpec {
        self.spec = next;
        self.persist();
        &self.spec
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.spec) {
            Ok(s) => s,
            Err(e) => {
                warn!(namespace = %Namespace::Spec, err = %e, "failed to serialize spec");
                return;
            }
        };
        if let Err(e) = self.storage.write(Namespace::Spec, &json) {
            warn!(
                namespace = %Namespace::Spec,
                err = %e,
                "spec not persisted; keeping in-memory state"
            );
        }
    }
}

fn load_spec(storage: &dyn Storage) -> ProjectSpec {
    let raw = match storage.read(Namespace::Spec) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("no persisted spec; using defaults");
            return ProjectSpec::default();
        }
        Err(e) => {
            warn!(err = %e, "failed to read persisted spec; using defaults");
            return ProjectSpec::default();
        }
    };

    let parsed = serde_json::from_str::<Value>(&raw)
        .map_err(|e| e.to_string())
        .and_then(|v| ProjectSpec::from_persisted(&v));

    match parsed {
        Ok((spec, rejected)) => {
            if !rejected.is_empty() {
                warn!(?rejected, "ignoring malformed persisted spec fields");
            }
            spec
        }
        Err(detail) => {
            let err = PlannerError::PersistenceCorrupt {
                namespace: Namespace::Spec,
                detail,
            };
            warn!(err = %err, "using defaults");
            ProjectSpec::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ProjectType;
    use crate::storage::MemoryStorage;

    fn fresh() -> (Arc<MemoryStorage>, ConfigStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = ConfigStore::load(storage.clone());
        (storage, store)
    }

    fn persisted(storage: &MemoryStorage) -> Value {
        serde_json::from_str(&storage.get(Namespace::Spec).expect("spec written")).unwrap()
    }

    #[test]
    fn load_without_data_returns_default() {
        let (_, store) = fresh();
        assert_eq!(store.spec(), &ProjectSpec::default());
    }

    #[test]
    fn load_corrupt_data_returns_default() {
        let storage = Arc::new(MemoryStorage::new().with_record(Namespace::Spec, "{not json"));
        let store = ConfigStore::load(storage);
        assert_eq!(store.spec(), &ProjectSpec::default());
    }

    #[test]
    fn load_read_failure_returns_default_and_keeps_working() {
        let storage = Arc::new(
            MemoryStorage::new().with_record(Namespace::Spec, r#"{"projectName":"Stored"}"#),
        );
        storage.set_fail_reads(true);

        let mut store = ConfigStore::load(storage.clone());
        assert_eq!(store.spec(), &ProjectSpec::default());

        store.set_field_text(SpecField::Goal, "after outage").unwrap();
        assert_eq!(persisted(&storage)["goal"], "after outage");
    }

    #[test]
    fn load_read_failure_from_file_storage_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(Namespace::Spec.file_name())).unwrap();

        let store = ConfigStore::load(Arc::new(crate::storage::FileStorage::new(dir.path())));
        assert_eq!(store.spec(), &ProjectSpec::default());
    }

    #[test]
    fn load_partial_record_keeps_default_for_missing_fields() {
        let raw = r#"{"projectName":"Legacy","useMigrations":false}"#;
        let storage = Arc::new(MemoryStorage::new().with_record(Namespace::Spec, raw));
        let store = ConfigStore::load(storage);

        assert_eq!(store.spec().project_name, "Legacy");
        assert!(!store.spec().use_migrations);
        assert_eq!(store.spec().model, ProjectSpec::default().model);
    }

    #[test]
    fn update_persists_and_reloads() {
        let (storage, mut store) = fresh();
        let before = store.snapshot();
        let patch = SpecPatch {
            goal: Some("Ship it".into()),
            temperature: Some(0.4),
            ..SpecPatch::default()
        };
        store.update(patch);

        let reloaded = ConfigStore::load(storage.clone());
        assert_eq!(reloaded.spec().goal, "Ship it");
        assert_eq!(reloaded.spec().temperature, 0.4);
        assert_eq!(reloaded.spec().project_name, before.project_name);
        assert_eq!(reloaded.spec().key_commands, before.key_commands);
    }

    #[test]
    fn write_failure_keeps_in_memory_state() {
        let (storage, mut store) = fresh();
        storage.set_fail_writes(true);

        store.set_field_text(SpecField::ProjectName, "Offline").unwrap();

        assert_eq!(store.spec().project_name, "Offline");
        assert!(storage.get(Namespace::Spec).is_none());
    }

    #[test]
    fn set_field_text_parses_numbers() {
        let (storage, mut store) = fresh();
        store.set_field_text(SpecField::TopP, "0.5").unwrap();
        assert_eq!(store.spec().top_p, 0.5);
        assert_eq!(persisted(&storage)["topP"], 0.5);
    }

    #[test]
    fn set_field_text_error_leaves_state() {
        let (storage, mut store) = fresh();
        let err = store.set_field_text(SpecField::ProjectType, "Blog").unwrap_err();
        assert!(matches!(err, PlannerError::InvalidFieldValue { .. }));
        assert_eq!(store.spec().project_type, ProjectType::Api);
        assert!(storage.get(Namespace::Spec).is_none());
    }

    #[test]
    fn set_field_text_rejects_blank_project_name() {
        let (storage, mut store) = fresh();
        let err = store.set_field_text(SpecField::ProjectName, "   ").unwrap_err();
        assert!(matches!(err, PlannerError::InvalidFieldValue { .. }));
        assert_eq!(store.spec().project_name, ProjectSpec::default().project_name);
        assert!(storage.get(Namespace::Spec).is_none());
    }

    #[test]
    fn set_field_text_framework_applies_preset() {
        let (storage, mut store) = fresh();
        store.set_field_text(SpecField::Framework, "Symfony").unwrap();

        let expected = preset::apply_preset(&ProjectSpec::default(), "Symfony");
        assert_eq!(store.spec(), &expected);
        assert_eq!(store.spec().database_layer, "Doctrine");
        assert_eq!(persisted(&storage)["framework"], "Symfony");
    }

    #[test]
    fn set_field_text_unknown_framework_only_sets_name() {
        let (_, mut store) = fresh();
        let before = store.snapshot();
        store.set_field_text(SpecField::Framework, "Slim").unwrap();

        let mut expected = before;
        expected.framework = "Slim".into();
        assert_eq!(store.spec(), &expected);
    }

    #[test]
    fn set_list_field_replaces_in_order() {
        let (_, mut store) = fresh();
        let values = vec!["b".to_owned(), "a".to_owned(), "b".to_owned()];
        store.set_list_field(SpecField::CoreFeatures, values.clone()).unwrap();
        assert_eq!(store.spec().core_features, values);
    }

    #[test]
    fn set_list_field_rejects_scalar() {
        let (_, mut store) = fresh();
        let err = store.set_list_field(SpecField::Goal, vec![]).unwrap_err();
        assert!(matches!(err, PlannerError::NotAListField { .. }));
    }

    #[test]
    fn toggle_adds_once_and_removes_all() {
        let (_, mut store) = fresh();
        let servers = vec!["Nginx".into(), "Apache".into(), "Nginx".into()];
        store.set_list_field(SpecField::WebServer, servers).unwrap();

        store.toggle_set_membership(SpecField::WebServer, "Apache", true).unwrap();
        assert_eq!(store.spec().web_server, vec!["Nginx", "Apache", "Nginx"]);

        store.toggle_set_membership(SpecField::WebServer, "LiteSpeed", true).unwrap();
        assert_eq!(store.spec().web_server, vec!["Nginx", "Apache", "Nginx", "LiteSpeed"]);

        store.toggle_set_membership(SpecField::WebServer, "Nginx", false).unwrap();
        assert_eq!(store.spec().web_server, vec!["Apache", "LiteSpeed"]);
    }

    #[test]
    fn apply_framework_merges_preset_and_persists() {
        let (storage, mut store) = fresh();
        store.apply_framework("Symfony");

        assert_eq!(store.spec().framework, "Symfony");
        assert_eq!(store.spec().database_layer, "Doctrine");
        assert_eq!(persisted(&storage)["databaseLayer"], "Doctrine");
    }

    #[test]
    fn import_requires_project_name_and_framework() {
        let (_, mut store) = fresh();
        let before = store.snapshot();

        let err = store.import_json(r#"{"projectName":"X"}"#).unwrap_err();
        assert!(matches!(
            err,
            PlannerError::ImportFormatInvalid { message: IMPORT_INVALID_FORMAT, .. }
        ));
        assert_eq!(store.spec(), &before);
    }

    #[test]
    fn import_merges_only_given_fields() {
        let (_, mut store) = fresh();
        store.set_field_text(SpecField::Goal, "keep me").unwrap();
        let before = store.snapshot();

        store
            .import_json(r#"{"projectName":"X","framework":"Symfony"}"#)
            .unwrap();

        let mut expected = before;
        expected.project_name = "X".into();
        expected.framework = "Symfony".into();
        assert_eq!(store.spec(), &expected, "import must not apply presets");
    }

    #[test]
    fn import_rejects_unparseable_and_non_object() {
        let (_, mut store) = fresh();
        let err = store.import_json("not json").unwrap_err();
        assert_eq!(err.to_string(), IMPORT_PARSE_FAILED);

        let err = store.import_json("[1,2,3]").unwrap_err();
        assert_eq!(err.to_string(), IMPORT_INVALID_FORMAT);

        let err = store
            .import_json(r#"{"projectName":"","framework":"Laravel"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), IMPORT_INVALID_FORMAT);

        let err = store
            .import_json(r#"{"projectName":"  ","framework":"Laravel"}"#)
            .unwrap_err();
        assert_eq!(err.to_string(), IMPORT_INVALID_FORMAT);
    }

    #[test]
    fn import_rejects_malformed_known_field_without_change() {
        let (_, mut store) = fresh();
        let before = store.snapshot();
        let err = store
            .import_json(r#"{"projectName":"X","framework":"Laravel","coreFeatures":"oops"}"#)
            .unwrap_err();
        assert!(matches!(err, PlannerError::ImportFormatInvalid { .. }));
        assert_eq!(store.spec(), &before);
    }

    #[test]
    fn export_file_name_collapses_whitespace() {
        assert_eq!(export_file_name("My  Cool\tApp"), "My_Cool_App_spec.json");
        assert_eq!(export_file_name("Single"), "Single_spec.json");
    }

    #[test]
    fn export_then_import_restores_spec() {
        let (_, mut store) = fresh();
        store.set_field_text(SpecField::ProjectName, "Round Trip").unwrap();
        let export = store.export().unwrap();
        assert_eq!(export.file_name, "Round_Trip_spec.json");

        let (_, mut other) = fresh();
        other.import_json(&export.contents).unwrap();
        assert_eq!(other.spec(), store.spec());
    }

    #[test]
    fn write_export_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let (_, store) = fresh();
        let path = store.write_export(dir.path()).unwrap();

        assert_eq!(path, dir.path().join("Modern_Laravel_API_with_Redis_spec.json"));
        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["framework"], "Laravel");
    }
}
