use std::collections::{BTreeMap, HashMap};

use anyhow::anyhow;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue, json};
use tracing::{debug, info};

use super::options::{ActionKind, ActionOutcome, InlineAdmin, ListFilter, ModelAdmin};
use crate::{
    error::{AppError, AppResult},
    repository::{Choice, FieldKind, ListQuery, ModelOps, Page},
};

const SEARCH_PARAM: &str = "q";
const PAGE_PARAM: &str = "p";

struct Registration {
    admin: &'static ModelAdmin,
    ops: Box<dyn ModelOps>,
}

/// Registry of administered models. Built once at startup and shared
/// read-only between requests.
pub struct AdminSite {
    models: BTreeMap<&'static str, Registration>,
    page_size: u64,
    autocomplete_limit: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SaveRequest {
    #[serde(default)]
    pub data: JsonValue,
    /// Child rows to save with the parent, keyed by inline model name.
    #[serde(default)]
    pub inlines: BTreeMap<String, InlineFormset>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlineFormset {
    #[serde(default)]
    pub add: Vec<Map<String, JsonValue>>,
    #[serde(default)]
    pub change: Vec<InlineChange>,
    #[serde(default)]
    pub delete: Vec<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InlineChange {
    pub id: i32,
    #[serde(default)]
    pub data: Map<String, JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct ChangeView {
    pub model: &'static str,
    pub object: JsonValue,
    pub inlines: Vec<InlineRows>,
}

#[derive(Debug, Serialize)]
pub struct InlineRows {
    pub model: &'static str,
    pub fields: &'static [&'static str],
    pub readonly_fields: &'static [&'static str],
    pub rows: Vec<JsonValue>,
    /// Blank rows offered for adding children.
    pub extra: Vec<JsonValue>,
}

#[derive(Debug, Serialize)]
pub struct FilterChoices {
    pub parameter: &'static str,
    pub title: &'static str,
    pub choices: Vec<FilterChoice>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct FilterChoice {
    pub value: JsonValue,
    pub label: String,
}

impl AdminSite {
    pub fn new(page_size: u64, autocomplete_limit: u64) -> Self {
        Self { models: BTreeMap::new(), page_size, autocomplete_limit }
    }

    pub fn register(&mut self, admin: &'static ModelAdmin, ops: Box<dyn ModelOps>) -> &mut Self {
        self.models.insert(admin.name, Registration { admin, ops });
        self
    }

    /// Every registered model's configuration, ordered by name.
    pub fn index(&self) -> Vec<&'static ModelAdmin> {
        self.models.values().map(|reg| reg.admin).collect()
    }

    /// Verify that every field, relation and inline named by a descriptor
    /// exists on the registered models.
    pub fn check(&self) -> AppResult<()> {
        let mut problems = Vec::new();

        for reg in self.models.values() {
            let (admin, ops) = (reg.admin, reg.ops.as_ref());
            if admin.name != ops.name() {
                problems.push(format!("{}: registered with the {} repository", admin.name, ops.name()));
            }
            for field in admin.list_display {
                if !resolves(ops, field) {
                    problems.push(format!("{}: list_display {field:?} is not a field", admin.name));
                }
            }
            for path in admin.search_fields {
                if !self.resolves_path(ops, path) {
                    problems.push(format!("{}: search field {path:?} does not resolve", admin.name));
                }
            }
            for filter in admin.list_filter {
                let valid = match filter {
                    ListFilter::Field { field } => ops.has_column(field),
                    ListFilter::Related { relation, .. } => self.target(ops, relation).is_some(),
                };
                if !valid {
                    problems.push(format!("{}: filter {:?} does not resolve", admin.name, filter.parameter()));
                }
            }
            for field in admin.autocomplete_fields {
                if let Err(problem) = self.autocomplete_target(ops, field) {
                    problems.push(format!("{}: {problem}", admin.name));
                }
            }
            for inline in admin.inlines {
                let Some(child) = self.models.get(inline.model) else {
                    problems.push(format!("{}: inline model {:?} is not registered", admin.name, inline.model));
                    continue;
                };
                let child_ops = child.ops.as_ref();
                if !child_ops.has_column(inline.fk) {
                    problems.push(format!("{}: {} has no column {:?}", admin.name, inline.model, inline.fk));
                }
                for field in inline.fields {
                    if !resolves(child_ops, field) {
                        problems.push(format!("{}: inline field {field:?} is not a field of {}", admin.name, inline.model));
                    }
                }
                for field in inline.autocomplete_fields {
                    if let Err(problem) = self.autocomplete_target(child_ops, field) {
                        problems.push(format!("{}: {problem}", admin.name));
                    }
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("invalid admin configuration: {}", problems.join("; ")).into())
        }
    }

    pub async fn list(
        &self,
        db: &DatabaseConnection,
        model: &str,
        params: &HashMap<String, String>,
    ) -> AppResult<Page> {
        let reg = self.registration(model)?;
        let query = self.list_query(reg, params)?;

        let txn = db.begin().await?;
        let page =
            reg.ops.list(&txn, reg.admin.list_display, reg.admin.search_fields, &query).await?;
        txn.commit().await?;
        Ok(page)
    }

    /// The choices each configured list filter offers.
    pub async fn filters(
        &self,
        db: &DatabaseConnection,
        model: &str,
    ) -> AppResult<Vec<FilterChoices>> {
        let reg = self.registration(model)?;
        let txn = db.begin().await?;

        let mut out = Vec::with_capacity(reg.admin.list_filter.len());
        for filter in reg.admin.list_filter {
            let choices = match filter {
                ListFilter::Field { field } => self.field_choices(&txn, reg, field).await?,
                ListFilter::Related { relation, .. } => {
                    let target = self
                        .target(reg.ops.as_ref(), relation)
                        .ok_or_else(|| anyhow!("{model}: relation {relation:?} is not registered"))?;
                    target
                        .ops
                        .choices(&txn, &[], None, None)
                        .await?
                        .into_iter()
                        .map(|choice| FilterChoice { value: json!(choice.id), label: choice.label })
                        .collect()
                },
            };
            out.push(FilterChoices { parameter: filter.parameter(), title: filter.title(), choices });
        }

        txn.commit().await?;
        Ok(out)
    }

    pub async fn autocomplete(
        &self,
        db: &DatabaseConnection,
        model: &str,
        field: &str,
        term: &str,
    ) -> AppResult<Vec<Choice>> {
        let reg = self.registration(model)?;
        if !self.autocompletes(reg.admin, field) {
            return Err(AppError::validation(format!(
                "{field:?} is not an autocomplete field of {model}"
            )));
        }
        let target = self.autocomplete_target(reg.ops.as_ref(), field).map_err(AppError::Validation)?;

        let txn = db.begin().await?;
        let choices = target
            .ops
            .choices(&txn, target.admin.search_fields, Some(term), Some(self.autocomplete_limit))
            .await?;
        txn.commit().await?;
        Ok(choices)
    }

    pub async fn change_view(
        &self,
        db: &DatabaseConnection,
        model: &str,
        id: i32,
    ) -> AppResult<ChangeView> {
        let reg = self.registration(model)?;
        let txn = db.begin().await?;
        let view = self.change_view_in(&txn, reg, id).await?;
        txn.commit().await?;
        Ok(view)
    }

    /// Create a row and its inline children atomically.
    pub async fn create(
        &self,
        db: &DatabaseConnection,
        model: &str,
        request: SaveRequest,
    ) -> AppResult<ChangeView> {
        let reg = self.registration(model)?;
        let txn = db.begin().await?;

        let object = reg.ops.create(&txn, request.data).await?;
        let id = object_id(&object)?;
        self.save_inlines(&txn, reg.admin, id, &request.inlines).await?;
        let view = self.change_view_in(&txn, reg, id).await?;

        txn.commit().await?;
        info!(model, id, "row added");
        Ok(view)
    }

    /// Update a row and its inline children atomically.
    pub async fn update(
        &self,
        db: &DatabaseConnection,
        model: &str,
        id: i32,
        request: SaveRequest,
    ) -> AppResult<ChangeView> {
        let reg = self.registration(model)?;
        let txn = db.begin().await?;

        reg.ops.update(&txn, id, request.data).await?;
        if self.save_inlines(&txn, reg.admin, id, &request.inlines).await? > 0 {
            reg.ops.touch(&txn, id).await?;
        }
        let view = self.change_view_in(&txn, reg, id).await?;

        txn.commit().await?;
        info!(model, id, "row changed");
        Ok(view)
    }

    pub async fn delete(&self, db: &DatabaseConnection, model: &str, id: i32) -> AppResult<()> {
        let reg = self.registration(model)?;
        let txn = db.begin().await?;
        if reg.ops.delete(&txn, &[id]).await? == 0 {
            return Err(AppError::not_found(model, id));
        }
        txn.commit().await?;
        info!(model, id, "row deleted");
        Ok(())
    }

    pub async fn run_action(
        &self,
        db: &DatabaseConnection,
        model: &str,
        name: &str,
        ids: &[i32],
    ) -> AppResult<ActionOutcome> {
        let reg = self.registration(model)?;
        let action = reg
            .admin
            .action(name)
            .ok_or_else(|| AppError::validation(format!("unknown action {name:?} for {model}")))?;

        let outcome = match action.kind {
            ActionKind::DeleteSelected { noun } => {
                let txn = db.begin().await?;
                let affected = reg.ops.delete(&txn, ids).await?;
                txn.commit().await?;
                ActionOutcome {
                    action: action.name,
                    affected,
                    message: format!("{affected} {noun}(s) deleted successfully."),
                }
            },
            ActionKind::Notice(message) => {
                ActionOutcome { action: action.name, affected: 0, message: message.to_string() }
            },
        };

        info!(model, action = action.name, selected = ids.len(), affected = outcome.affected, "action ran");
        Ok(outcome)
    }

    fn registration(&self, model: &str) -> AppResult<&Registration> {
        self.models.get(model).ok_or_else(|| AppError::NotFound(format!("unknown model {model:?}")))
    }

    fn target(&self, ops: &dyn ModelOps, relation: &str) -> Option<&Registration> {
        ops.related(relation).and_then(|related| self.models.get(related.model))
    }

    fn resolves_path(&self, ops: &dyn ModelOps, path: &str) -> bool {
        match path.split_once("__") {
            Some((relation, field)) => {
                self.target(ops, relation).is_some_and(|target| target.ops.has_column(field))
            },
            None => ops.has_column(path),
        }
    }

    fn autocomplete_target(&self, ops: &dyn ModelOps, field: &str) -> Result<&Registration, String> {
        let target = self
            .target(ops, field)
            .ok_or_else(|| format!("autocomplete field {field:?} is not a registered relation"))?;
        if target.admin.search_fields.is_empty() {
            return Err(format!(
                "autocomplete field {field:?} needs search fields on {}",
                target.admin.name
            ));
        }
        Ok(target)
    }

    /// Whether `field` of `admin`'s model uses an autocomplete widget, either
    /// on its own admin or where it appears inline.
    fn autocompletes(&self, admin: &ModelAdmin, field: &str) -> bool {
        admin.autocomplete_fields.contains(&field)
            || self
                .models
                .values()
                .flat_map(|reg| reg.admin.inlines.iter())
                .any(|inline| inline.model == admin.name && inline.autocomplete_fields.contains(&field))
    }

    fn list_query(&self, reg: &Registration, params: &HashMap<String, String>) -> AppResult<ListQuery> {
        let mut query = ListQuery { page: 1, per_page: self.page_size, ..Default::default() };

        for (key, value) in params {
            match key.as_str() {
                SEARCH_PARAM => query.search = Some(value.clone()),
                PAGE_PARAM => {
                    query.page = value
                        .parse::<u64>()
                        .ok()
                        .filter(|page| *page >= 1)
                        .ok_or_else(|| AppError::validation(format!("invalid page {value:?}")))?;
                },
                parameter => {
                    let filter = reg.admin.filter(parameter).ok_or_else(|| {
                        AppError::validation(format!("unknown filter {parameter:?} for {}", reg.admin.name))
                    })?;
                    if value.is_empty() {
                        continue;
                    }
                    let column = match filter {
                        ListFilter::Field { field } => *field,
                        ListFilter::Related { relation, .. } => {
                            reg.ops
                                .related(relation)
                                .ok_or_else(|| anyhow!("unknown relation {relation:?}"))?
                                .column
                        },
                    };
                    query.filters.push((column.to_string(), value.clone()));
                },
            }
        }

        debug!(model = reg.admin.name, ?query, "list query");
        Ok(query)
    }

    async fn field_choices(
        &self,
        txn: &DatabaseTransaction,
        reg: &Registration,
        field: &str,
    ) -> AppResult<Vec<FilterChoice>> {
        if reg.ops.field_kind(field) == Some(FieldKind::Boolean) {
            return Ok(vec![
                FilterChoice { value: json!(true), label: "Yes".to_string() },
                FilterChoice { value: json!(false), label: "No".to_string() },
            ]);
        }

        let values = reg.ops.distinct_values(txn, field).await?;
        if reg.ops.field_kind(field) == Some(FieldKind::Temporal) {
            let mut days: Vec<String> = values
                .iter()
                .filter_map(JsonValue::as_str)
                .map(|value| value.chars().take(10).collect())
                .collect();
            days.dedup();
            return Ok(days
                .into_iter()
                .map(|day| FilterChoice { value: json!(day), label: day })
                .collect());
        }

        Ok(values
            .into_iter()
            .map(|value| {
                let label = match &value {
                    JsonValue::String(text) => text.clone(),
                    other => other.to_string(),
                };
                FilterChoice { value, label }
            })
            .collect())
    }

    async fn change_view_in(
        &self,
        txn: &DatabaseTransaction,
        reg: &Registration,
        id: i32,
    ) -> AppResult<ChangeView> {
        let object = reg.ops.get(txn, id).await?;

        let mut inlines = Vec::with_capacity(reg.admin.inlines.len());
        for inline in reg.admin.inlines {
            let child = self.registration(inline.model)?;
            let mut display = vec!["id"];
            display.extend_from_slice(inline.fields);
            let rows = child.ops.children(txn, &display, inline.fk, id).await?;
            let blank = JsonValue::Object(
                inline.fields.iter().map(|field| (field.to_string(), JsonValue::Null)).collect(),
            );
            inlines.push(InlineRows {
                model: inline.model,
                fields: inline.fields,
                readonly_fields: inline.readonly_fields,
                rows,
                extra: vec![blank; inline.extra],
            });
        }

        Ok(ChangeView { model: reg.admin.name, object, inlines })
    }

    /// Apply each formset to the children of `parent`, returning how many
    /// rows were touched.
    async fn save_inlines(
        &self,
        txn: &DatabaseTransaction,
        admin: &ModelAdmin,
        parent: i32,
        formsets: &BTreeMap<String, InlineFormset>,
    ) -> AppResult<usize> {
        let mut saved = 0;
        for (model, formset) in formsets {
            let inline = admin.inline(model).ok_or_else(|| {
                AppError::validation(format!("{model} is not editable inline on {}", admin.name))
            })?;
            let child = self.registration(model)?;
            let ops = child.ops.as_ref();

            for &id in &formset.delete {
                if !inline.can_delete {
                    return Err(AppError::validation(format!("{model} rows cannot be deleted here")));
                }
                ensure_child(txn, ops, inline, id, parent).await?;
                ops.delete(txn, &[id]).await?;
            }
            for change in &formset.change {
                ensure_child(txn, ops, inline, change.id, parent).await?;
                ops.update(txn, change.id, inline_data(ops, inline, &change.data, parent)?).await?;
            }
            for row in &formset.add {
                ops.create(txn, inline_data(ops, inline, row, parent)?).await?;
            }

            debug!(
                parent_model = admin.name,
                parent,
                model = model.as_str(),
                added = formset.add.len(),
                changed = formset.change.len(),
                deleted = formset.delete.len(),
                "inline rows saved"
            );
            saved += formset.add.len() + formset.change.len() + formset.delete.len();
        }
        Ok(saved)
    }
}

fn resolves(ops: &dyn ModelOps, field: &str) -> bool {
    ops.has_column(field) || ops.related(field).is_some()
}

async fn ensure_child(
    txn: &DatabaseTransaction,
    ops: &dyn ModelOps,
    inline: &InlineAdmin,
    id: i32,
    parent: i32,
) -> AppResult<()> {
    if !ops.belongs_to(txn, id, inline.fk, parent).await? {
        return Err(AppError::not_found(inline.model, id));
    }
    Ok(())
}

/// Keep only the inline's editable fields, renaming relations to their
/// foreign key column, and point the row at `parent`.
fn inline_data(
    ops: &dyn ModelOps,
    inline: &InlineAdmin,
    row: &Map<String, JsonValue>,
    parent: i32,
) -> AppResult<JsonValue> {
    let mut data = Map::new();
    for (key, value) in row {
        if inline.readonly_fields.contains(&key.as_str()) {
            continue;
        }
        let column = inline.editable_fields().find_map(|field| {
            let column = ops.related(field).map_or(field, |related| related.column);
            (key.as_str() == field || key.as_str() == column).then_some(column)
        });
        let Some(column) = column else {
            return Err(AppError::validation(format!("{key} is not editable on {} rows", inline.model)));
        };
        data.insert(column.to_string(), value.clone());
    }
    data.insert(inline.fk.to_string(), json!(parent));
    Ok(JsonValue::Object(data))
}

fn object_id(object: &JsonValue) -> AppResult<i32> {
    object
        .get("id")
        .and_then(JsonValue::as_i64)
        .and_then(|id| i32::try_from(id).ok())
        .ok_or_else(|| anyhow!("saved row has no integer id").into())
}
