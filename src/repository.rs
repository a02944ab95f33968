use std::{marker::PhantomData, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ColumnType, Condition, ConnectionTrait,
    DatabaseTransaction, EntityTrait, FromQueryResult, IdenStatic, IntoActiveModel, JoinType,
    PaginatorTrait, PrimaryKeyTrait, QueryFilter, QueryOrder, QuerySelect, RelationDef, Select,
    sea_query::{Alias, Expr, Func, Query, SimpleExpr},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{AppError, AppResult};

const UPDATED_AT: &str = "updated_at";

/// A foreign key on a model, resolved to the table it points at.
#[derive(Clone, Debug)]
pub struct RelatedField {
    /// Foreign key column on the referencing model, e.g. `movie_id`.
    pub column: &'static str,
    /// Admin name of the referenced model.
    pub model: &'static str,
    pub table: String,
    /// Column of the referenced table used as its display label.
    pub label: &'static str,
    /// Builds the join from the referencing model to the referenced one.
    pub def: fn() -> RelationDef,
}

impl RelatedField {
    pub fn to<T: AdminModel>(column: &'static str, def: fn() -> RelationDef) -> Self {
        Self {
            column,
            model: T::NAME,
            table: T::default().table_name().to_owned(),
            label: T::LABEL,
            def,
        }
    }
}

/// A table holding rows that reference a model and are deleted with it.
#[derive(Clone, Copy, Debug)]
pub struct Dependent {
    pub table: &'static str,
    pub column: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Boolean,
    Temporal,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct Choice {
    pub id: i32,
    pub label: String,
}

#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub search: Option<String>,
    /// `(column, raw value)` pairs, all of which must match.
    pub filters: Vec<(String, String)>,
    /// 1-based.
    pub page: u64,
    pub per_page: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Page {
    pub count: u64,
    pub page: u64,
    pub num_pages: u64,
    pub results: Vec<JsonValue>,
}

/// An entity the admin site can manage.
#[async_trait]
pub trait AdminModel: EntityTrait {
    /// Name the model is registered under.
    const NAME: &'static str;
    /// Column shown when another model references a row of this one.
    const LABEL: &'static str;
    const DEPENDENTS: &'static [Dependent] = &[];

    type Form: DeserializeOwned + Send;

    fn related(name: &str) -> Option<RelatedField> {
        let _ = name;
        None
    }

    /// Validate `form` and copy it onto `model`. When `creating`, every
    /// required field must be present.
    async fn apply(
        form: Self::Form,
        model: &mut Self::ActiveModel,
        txn: &DatabaseTransaction,
        creating: bool,
    ) -> AppResult<()>;
}

/// Object-safe view of a [`Repository`], so the admin site can dispatch on
/// model names.
#[async_trait]
pub trait ModelOps: Send + Sync {
    fn name(&self) -> &'static str;
    fn has_column(&self, name: &str) -> bool;
    fn related(&self, name: &str) -> Option<RelatedField>;
    fn field_kind(&self, name: &str) -> Option<FieldKind>;

    async fn list(
        &self,
        txn: &DatabaseTransaction,
        display: &[&str],
        search_fields: &[&str],
        query: &ListQuery,
    ) -> AppResult<Page>;
    async fn children(
        &self,
        txn: &DatabaseTransaction,
        display: &[&str],
        fk: &str,
        parent: i32,
    ) -> AppResult<Vec<JsonValue>>;
    async fn choices(
        &self,
        txn: &DatabaseTransaction,
        search_fields: &[&str],
        term: Option<&str>,
        limit: Option<u64>,
    ) -> AppResult<Vec<Choice>>;
    async fn distinct_values(&self, txn: &DatabaseTransaction, field: &str)
    -> AppResult<Vec<JsonValue>>;
    async fn get(&self, txn: &DatabaseTransaction, id: i32) -> AppResult<JsonValue>;
    async fn belongs_to(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
        fk: &str,
        parent: i32,
    ) -> AppResult<bool>;
    async fn create(&self, txn: &DatabaseTransaction, data: JsonValue) -> AppResult<JsonValue>;
    async fn update(&self, txn: &DatabaseTransaction, id: i32, data: JsonValue)
    -> AppResult<JsonValue>;
    async fn delete(&self, txn: &DatabaseTransaction, ids: &[i32]) -> AppResult<u64>;
    /// Refresh `updated_at` on a row whose children changed. Models without
    /// the column are left alone.
    async fn touch(&self, txn: &DatabaseTransaction, id: i32) -> AppResult<()>;
}

/// Generic CRUD and list queries over one entity type.
pub struct Repository<E>(PhantomData<fn() -> E>);

impl<E> Default for Repository<E>
where
    E: AdminModel,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Repository<E>
where
    E: AdminModel,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    pub fn new() -> Self {
        Self(PhantomData)
    }

    pub fn boxed() -> Box<dyn ModelOps> {
        Box::new(Self::new())
    }

    fn table() -> String {
        E::default().table_name().to_owned()
    }

    fn primary_key() -> AppResult<E::Column> {
        column::<E>("id")
    }

    pub async fn find(txn: &DatabaseTransaction, id: i32) -> AppResult<E::Model> {
        E::find_by_id(id).one(txn).await?.ok_or_else(|| AppError::not_found(E::NAME, id))
    }

    pub async fn insert(txn: &DatabaseTransaction, data: JsonValue) -> AppResult<E::Model> {
        let form = parse_form::<E::Form>(data)?;
        let mut active = <E::ActiveModel as ActiveModelBehavior>::new();
        E::apply(form, &mut active, txn, true).await?;
        let model = active.insert(txn).await?;
        debug!(model = E::NAME, "row created");
        Ok(model)
    }

    /// Partial update: fields absent from `data` keep their stored values.
    pub async fn save(txn: &DatabaseTransaction, id: i32, data: JsonValue) -> AppResult<E::Model> {
        let form = parse_form::<E::Form>(data)?;
        let existing = Self::find(txn, id).await?;
        let mut active: E::ActiveModel = existing.clone().into_active_model();
        E::apply(form, &mut active, txn, false).await?;
        if !active.is_changed() {
            return Ok(existing);
        }
        let model = active.update(txn).await?;
        debug!(model = E::NAME, id, "row updated");
        Ok(model)
    }

    /// Delete rows by id along with every dependent row, returning how many
    /// of the requested rows existed.
    pub async fn delete_cascade(txn: &DatabaseTransaction, ids: &[i32]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let backend = txn.get_database_backend();
        for dependent in E::DEPENDENTS {
            let stmt = Query::delete()
                .from_table(Alias::new(dependent.table))
                .and_where(Expr::col(Alias::new(dependent.column)).is_in(ids.iter().copied()))
                .to_owned();
            let res = txn.execute(backend.build(&stmt)).await?;
            debug!(
                model = E::NAME,
                table = dependent.table,
                rows = res.rows_affected(),
                "cascaded delete"
            );
        }

        let res = E::delete_many()
            .filter(Self::primary_key()?.is_in(ids.iter().copied()))
            .exec(txn)
            .await?;
        debug!(model = E::NAME, rows = res.rows_affected, "rows deleted");
        Ok(res.rows_affected)
    }

    fn exact_match(column: E::Column, raw: &str) -> AppResult<Condition> {
        let invalid = || {
            AppError::validation(format!("{raw:?} is not a valid value for {}", column.as_str()))
        };

        let condition = match column.def().get_column_type() {
            ColumnType::Boolean => column.eq(parse_bool(raw).ok_or_else(invalid)?),
            ColumnType::TinyInteger
            | ColumnType::SmallInteger
            | ColumnType::Integer
            | ColumnType::BigInteger => column.eq(raw.parse::<i64>().map_err(|_| invalid())?),
            ColumnType::Float | ColumnType::Double | ColumnType::Decimal(_) => {
                column.eq(raw.parse::<f64>().map_err(|_| invalid())?)
            },
            ColumnType::Date => {
                column.eq(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| invalid())?)
            },
            ColumnType::DateTime | ColumnType::Timestamp | ColumnType::TimestampWithTimeZone => {
                if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                    let start = day.and_time(NaiveTime::MIN).and_utc();
                    return Ok(Condition::all()
                        .add(column.gte(start))
                        .add(column.lt(start + TimeDelta::days(1))));
                }
                let at = DateTime::parse_from_rfc3339(raw).map_err(|_| invalid())?;
                column.eq(at.with_timezone(&Utc))
            },
            _ => column.eq(raw.to_string()),
        };

        Ok(Condition::all().add(condition))
    }

    /// Every whitespace-separated word of `term` must match at least one of
    /// `fields`. `rel__column` reaches one relationship hop away.
    fn search(
        mut select: Select<E>,
        joined: &mut Vec<String>,
        fields: &[&str],
        term: Option<&str>,
    ) -> AppResult<Select<E>> {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(select);
        };
        if fields.is_empty() {
            return Ok(select);
        }

        let mut targets: Vec<SimpleExpr> = Vec::with_capacity(fields.len());
        for path in fields {
            let target = match path.split_once("__") {
                Some((relation, field)) => {
                    let related = E::related(relation).ok_or_else(|| unknown_field::<E>(path))?;
                    select = join_once(select, joined, &related);
                    Expr::col((Alias::new(related.table.as_str()), Alias::new(field)))
                },
                None => {
                    let column = column::<E>(path)?;
                    Expr::col((column.entity_name(), column))
                },
            };
            targets.push(target.into());
        }

        let mut all = Condition::all();
        for word in term.split_whitespace() {
            let pattern = glob_pattern(word);
            let mut any = Condition::any();
            for target in &targets {
                any = any.add(Expr::cust_with_exprs(
                    "$1 GLOB $2",
                    [target.clone(), Expr::val(pattern.clone()).into()],
                ));
            }
            all = all.add(any);
        }

        Ok(select.filter(all))
    }

    async fn project(
        txn: &DatabaseTransaction,
        select: Select<E>,
        joined: &mut Vec<String>,
        display: &[&str],
        window: Option<(u64, u64)>,
    ) -> AppResult<Vec<JsonValue>> {
        let table = Self::table();
        let primary_key = Self::primary_key()?;
        let mut select = select.select_only();

        for field in display {
            match E::related(field) {
                Some(related) => {
                    select = join_once(select, joined, &related);
                    let label: SimpleExpr =
                        Expr::col((Alias::new(related.table.as_str()), Alias::new(related.label)))
                            .into();
                    let key: SimpleExpr =
                        Expr::col((Alias::new(table.as_str()), Alias::new(related.column))).into();
                    select = select.column_as(label, *field).column_as(key, related.column);
                },
                None => {
                    select = select.column(column::<E>(field)?);
                },
            }
        }

        let mut select = select.order_by_asc(primary_key);
        if let Some((offset, limit)) = window {
            select = select.offset(offset).limit(limit);
        }

        Ok(select.into_json().all(txn).await?)
    }
}

#[async_trait]
impl<E> ModelOps for Repository<E>
where
    E: AdminModel,
    E::Model: IntoActiveModel<E::ActiveModel> + Serialize + Sync,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    fn name(&self) -> &'static str {
        E::NAME
    }

    fn has_column(&self, name: &str) -> bool {
        E::Column::from_str(name).is_ok()
    }

    fn related(&self, name: &str) -> Option<RelatedField> {
        E::related(name)
    }

    fn field_kind(&self, name: &str) -> Option<FieldKind> {
        let column = E::Column::from_str(name).ok()?;
        Some(match column.def().get_column_type() {
            ColumnType::Boolean => FieldKind::Boolean,
            ColumnType::Date
            | ColumnType::DateTime
            | ColumnType::Timestamp
            | ColumnType::TimestampWithTimeZone => FieldKind::Temporal,
            _ => FieldKind::Other,
        })
    }

    async fn list(
        &self,
        txn: &DatabaseTransaction,
        display: &[&str],
        search_fields: &[&str],
        query: &ListQuery,
    ) -> AppResult<Page> {
        let mut joined = Vec::new();
        let mut select = E::find();
        for (field, raw) in &query.filters {
            select = select.filter(Self::exact_match(column::<E>(field)?, raw)?);
        }
        let select = Self::search(select, &mut joined, search_fields, query.search.as_deref())?;

        let count = select.clone().count(txn).await?;
        let per_page = query.per_page.max(1);
        let num_pages = count.div_ceil(per_page).max(1);
        let page = query.page.max(1);
        if page > num_pages {
            return Err(AppError::NotFound(format!("invalid page {page}: that page contains no results")));
        }

        let results =
            Self::project(txn, select, &mut joined, display, Some(((page - 1) * per_page, per_page)))
                .await?;
        debug!(model = E::NAME, count, page, "listed rows");

        Ok(Page { count, page, num_pages, results })
    }

    async fn children(
        &self,
        txn: &DatabaseTransaction,
        display: &[&str],
        fk: &str,
        parent: i32,
    ) -> AppResult<Vec<JsonValue>> {
        let select = E::find().filter(column::<E>(fk)?.eq(parent));
        Self::project(txn, select, &mut Vec::new(), display, None).await
    }

    async fn choices(
        &self,
        txn: &DatabaseTransaction,
        search_fields: &[&str],
        term: Option<&str>,
        limit: Option<u64>,
    ) -> AppResult<Vec<Choice>> {
        let select = Self::search(E::find(), &mut Vec::new(), search_fields, term)?;
        let primary_key = Self::primary_key()?;
        let label: SimpleExpr = Func::cast_as(
            Expr::col((Alias::new(Self::table()), Alias::new(E::LABEL))),
            Alias::new("TEXT"),
        )
        .into();

        let mut select = select
            .select_only()
            .column_as(primary_key, "id")
            .column_as(label, "label")
            .order_by_asc(primary_key);
        if let Some(limit) = limit {
            select = select.limit(limit);
        }

        Ok(select.into_model::<Choice>().all(txn).await?)
    }

    async fn distinct_values(
        &self,
        txn: &DatabaseTransaction,
        field: &str,
    ) -> AppResult<Vec<JsonValue>> {
        let column = column::<E>(field)?;
        let rows = E::find()
            .select_only()
            .column_as(column, "value")
            .distinct()
            .order_by_asc(column)
            .into_json()
            .all(txn)
            .await?;

        Ok(rows.into_iter().filter_map(|mut row| row.get_mut("value").map(JsonValue::take)).collect())
    }

    async fn get(&self, txn: &DatabaseTransaction, id: i32) -> AppResult<JsonValue> {
        to_json(Self::find(txn, id).await?)
    }

    async fn belongs_to(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
        fk: &str,
        parent: i32,
    ) -> AppResult<bool> {
        let matches = E::find_by_id(id).filter(column::<E>(fk)?.eq(parent)).count(txn).await?;
        Ok(matches > 0)
    }

    async fn create(&self, txn: &DatabaseTransaction, data: JsonValue) -> AppResult<JsonValue> {
        to_json(Self::insert(txn, data).await?)
    }

    async fn update(
        &self,
        txn: &DatabaseTransaction,
        id: i32,
        data: JsonValue,
    ) -> AppResult<JsonValue> {
        to_json(Self::save(txn, id, data).await?)
    }

    async fn delete(&self, txn: &DatabaseTransaction, ids: &[i32]) -> AppResult<u64> {
        Self::delete_cascade(txn, ids).await
    }

    async fn touch(&self, txn: &DatabaseTransaction, id: i32) -> AppResult<()> {
        let Ok(column) = E::Column::from_str(UPDATED_AT) else {
            return Ok(());
        };
        E::update_many()
            .col_expr(column, Expr::value(Utc::now()))
            .filter(Self::primary_key()?.eq(id))
            .exec(txn)
            .await?;
        debug!(model = E::NAME, id, "row touched");
        Ok(())
    }
}

/// Fails with a validation error when no `T` row has primary key `id`.
pub async fn ensure_exists<T>(txn: &DatabaseTransaction, id: i32, field: &str) -> AppResult<()>
where
    T: AdminModel,
    T::Model: Sync,
    <T::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i32>,
{
    if T::find_by_id(id).count(txn).await? == 0 {
        return Err(AppError::validation(format!("{field}: {} {id} does not exist", T::NAME)));
    }
    Ok(())
}

fn column<E: EntityTrait>(name: &str) -> AppResult<E::Column> {
    E::Column::from_str(name).map_err(|_| unknown_field::<E>(name))
}

fn unknown_field<E: EntityTrait>(name: &str) -> AppError {
    AppError::validation(format!("unknown field {name:?} on {}", E::default().table_name()))
}

fn join_once<E: EntityTrait>(
    select: Select<E>,
    joined: &mut Vec<String>,
    related: &RelatedField,
) -> Select<E> {
    if joined.contains(&related.table) {
        return select;
    }
    joined.push(related.table.clone());
    select.join(JoinType::LeftJoin, (related.def)())
}

/// A GLOB pattern matching any text that contains `word`, ignoring case.
/// SQLite's `LOWER` and `LIKE` only fold ASCII, so each cased character
/// becomes a class of its upper and lower forms.
fn glob_pattern(word: &str) -> String {
    let mut pattern = String::from("*");
    for ch in word.chars() {
        let mut forms = vec![ch];
        for form in [single(ch.to_lowercase()), single(ch.to_uppercase())].into_iter().flatten() {
            if !forms.contains(&form) {
                forms.push(form);
            }
        }
        match forms.as_slice() {
            [only] if !matches!(only, '*' | '?' | '[') => pattern.push(*only),
            _ => {
                pattern.push('[');
                pattern.extend(forms);
                pattern.push(']');
            },
        }
    }
    pattern.push('*');
    pattern
}

fn single(mut chars: impl Iterator<Item = char>) -> Option<char> {
    let ch = chars.next()?;
    chars.next().is_none().then_some(ch)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_form<F: DeserializeOwned>(data: JsonValue) -> AppResult<F> {
    let data = if data.is_null() { JsonValue::Object(Default::default()) } else { data };
    serde_json::from_value(data).map_err(|err| AppError::validation(err.to_string()))
}

fn to_json<T: Serialize>(value: T) -> AppResult<JsonValue> {
    Ok(serde_json::to_value(value).map_err(anyhow::Error::from)?)
}
