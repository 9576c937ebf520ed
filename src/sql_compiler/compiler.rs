use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use serde::Serialize;

use crate::geometry::Footprint;
use crate::object_catalog::{
    ClassSchema, Direction, ObjectCatalog, PropertySchema, PropertyType, RelationshipKeys,
};
use crate::query_model::{AbstractQuery, LogicalOperator, PropertyValue, WhereNode};

use super::errors::CompileError;
use super::params::ParamMap;
use super::query_builder::{BindingMode, Paging, SqlQueryBuilder};
use super::table_ref::TableRef;
use super::type_mapping::{native_db_type, sql_operator_token, NativeDbType};

/// Source-tag and completeness columns every cache table carries next
/// to its mimic columns.
pub const CACHE_SOURCE_TAG_COLUMN: &str = "source_tag";
pub const CACHE_COMPLETE_COLUMN: &str = "is_complete";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetaColumn {
    SourceTag,
    CompleteFlag,
}

/// How one select-layout entry maps onto physical result columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SelectColumnKind {
    /// One column read with the typed getter for the property type
    Scalar(PropertyType),
    /// Two columns: WKT text followed by the SRID
    Spatial,
    /// One cache bookkeeping column routed into extended data
    Meta(MetaColumn),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectColumn {
    pub property: String,
    pub kind: SelectColumnKind,
}

impl SelectColumn {
    /// Number of physical result columns this entry occupies.
    pub fn width(&self) -> usize {
        match self.kind {
            SelectColumnKind::Spatial => 2,
            _ => 1,
        }
    }
}

/// Positional description of a compiled query's select list. The row
/// mapper walks it to turn result rows into object instances.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectLayout {
    pub class_name: String,
    pub key_property: String,
    pub columns: Vec<SelectColumn>,
}

impl SelectLayout {
    pub fn width(&self) -> usize {
        self.columns.iter().map(|c| c.width()).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    /// Present when the caller asked for an instance count
    pub count_sql: Option<String>,
    pub params: ParamMap,
    pub layout: SelectLayout,
}

#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// TOP cap applied when the caller does not page explicitly
    pub row_cap: u32,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions { row_cap: 1000 }
    }
}

/// Class context a criterion tree compiles against. Related criteria
/// push a new context for the joined class.
struct CompileContext {
    class_name: String,
    root: TableRef,
}

/// Compiles abstract queries into parameterized dialect SQL using the
/// catalog's table/column bindings.
pub struct QueryCompiler<'a> {
    catalog: &'a ObjectCatalog,
    options: CompilerOptions,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(catalog: &'a ObjectCatalog, options: CompilerOptions) -> Self {
        QueryCompiler { catalog, options }
    }

    pub fn catalog(&self) -> &ObjectCatalog {
        self.catalog
    }

    pub fn compile(
        &self,
        query: &AbstractQuery,
        mode: BindingMode,
    ) -> Result<CompiledQuery, CompileError> {
        let class = self.catalog.class_schema(&query.class_name)?;
        let (key_owner, key_property) = self
            .catalog
            .primary_key_property(&class.name)
            .map_err(|_| CompileError::UnqueriableClass(class.name.clone()))?;

        let root_table = match mode {
            BindingMode::Live => class.table.as_deref(),
            BindingMode::Cache => class.cache_table.as_deref(),
        }
        .ok_or_else(|| CompileError::UnqueriableClass(class.name.clone()))?;

        let mut builder = SqlQueryBuilder::new(mode, Paging::RowCap(self.options.row_cap));
        let mut params = ParamMap::new();
        let root_ref = builder.specify_from_clause(root_table);
        let ctx = CompileContext {
            class_name: class.name.clone(),
            root: root_ref,
        };

        let selected = self.resolve_selection(class, query.properties.as_deref(), key_property)?;
        let mut layout = SelectLayout {
            class_name: class.name.clone(),
            key_property: key_property.name.clone(),
            columns: Vec::new(),
        };
        for (owner, property) in &selected {
            self.add_property_select(&mut builder, &ctx, owner, property, &mut layout)?;
        }
        if mode == BindingMode::Cache {
            builder.add_select_clause(&ctx.root.alias, CACHE_SOURCE_TAG_COLUMN, false);
            layout.columns.push(SelectColumn {
                property: CACHE_SOURCE_TAG_COLUMN.to_string(),
                kind: SelectColumnKind::Meta(MetaColumn::SourceTag),
            });
            builder.add_select_clause(&ctx.root.alias, CACHE_COMPLETE_COLUMN, false);
            layout.columns.push(SelectColumn {
                property: CACHE_COMPLETE_COLUMN.to_string(),
                kind: SelectColumnKind::Meta(MetaColumn::CompleteFlag),
            });
        }

        // Caller order-by goes in before the criterion tree so the
        // id-set default only fires when nothing else ordered the rows.
        for order in &query.order_by {
            let (alias, column, _) = self.resolve_column(&mut builder, &ctx, &order.property)?;
            builder.add_order_by_clause(&alias, &column, order.ascending);
        }

        if let Some(criteria) = &query.criteria {
            self.compile_where(&mut builder, &mut params, &ctx, criteria)?;
        }

        if let Some(polygon) = query.polygon_value() {
            self.compile_polygon(&mut builder, &mut params, &ctx, class, polygon)?;
        }

        if let (Some(offset), Some(limit)) = (query.offset, query.limit) {
            if builder.order_by_list_is_empty() {
                let (alias, column, _) =
                    self.key_binding(&mut builder, &ctx, key_owner, key_property)?;
                builder.add_order_by_clause(&alias, &column, true);
            }
            let lower = params.add(PropertyValue::Long(i64::from(offset) + 1), NativeDbType::Int64);
            let upper = params.add(
                PropertyValue::Long(i64::from(offset) + i64::from(limit)),
                NativeDbType::Int64,
            );
            builder.set_paging(Paging::Window {
                lower_placeholder: lower,
                upper_placeholder: upper,
            });
        } else if let Some(limit) = query.limit {
            builder.set_paging(Paging::RowCap(limit.min(self.options.row_cap)));
        }

        let sql = builder.build_query()?;
        let count_sql = if query.wants_instance_count() {
            Some(builder.build_count_query()?)
        } else {
            None
        };

        debug!(
            "Compiled {:?} query for class {}: {} ({} params)",
            mode,
            class.name,
            sql,
            params.len()
        );

        Ok(CompiledQuery {
            sql,
            count_sql,
            params,
            layout,
        })
    }

    /// Selected properties with their owning classes. An explicit list
    /// that omits the primary key gets it appended; None selects every
    /// property of the class and its bases.
    fn resolve_selection(
        &self,
        class: &ClassSchema,
        requested: Option<&[String]>,
        key_property: &'a PropertySchema,
    ) -> Result<Vec<(&'a ClassSchema, &'a PropertySchema)>, CompileError> {
        let mut selected = Vec::new();
        match requested {
            None => {
                for chain_class in self.catalog.base_chain(&class.name)? {
                    for property in &chain_class.properties {
                        selected.push((chain_class, property));
                    }
                }
            }
            Some(names) => {
                for name in names {
                    let resolved = self
                        .catalog
                        .resolve_property(&class.name, name)
                        .map_err(|_| {
                            CompileError::unknown_property_with_context(&class.name, name)
                        })?;
                    selected.push(resolved);
                }
                if !selected.iter().any(|(_, p)| p.name == key_property.name) {
                    let key = self
                        .catalog
                        .resolve_property(&class.name, &key_property.name)
                        .map_err(|_| CompileError::UnqueriableClass(class.name.clone()))?;
                    selected.push(key);
                }
            }
        }
        Ok(selected)
    }

    fn add_property_select(
        &self,
        builder: &mut SqlQueryBuilder,
        ctx: &CompileContext,
        owner: &ClassSchema,
        property: &PropertySchema,
        layout: &mut SelectLayout,
    ) -> Result<(), CompileError> {
        let cache = builder.mode() == BindingMode::Cache;
        let column = property
            .column_for_cache(cache)
            .ok_or_else(|| CompileError::MissingColumnBinding {
                property: property.name.clone(),
                mode: mode_name(builder.mode()).to_string(),
            })?
            .to_string();
        let alias = self.property_alias(builder, ctx, owner, property)?;

        if property.spatial {
            builder.add_select_clause(&alias, &column, true);
            layout.columns.push(SelectColumn {
                property: property.name.clone(),
                kind: SelectColumnKind::Spatial,
            });
        } else {
            // Rejects struct/point columns before any SQL is rendered
            native_db_type(property.value_type)?;
            builder.add_select_clause(&alias, &column, false);
            layout.columns.push(SelectColumn {
                property: property.name.clone(),
                kind: SelectColumnKind::Scalar(property.value_type),
            });
        }
        Ok(())
    }

    /// Table alias a property reads from, joining inheritance and
    /// secondary tables on demand. Cache tables are flat, so cache mode
    /// always answers with the root alias.
    fn property_alias(
        &self,
        builder: &mut SqlQueryBuilder,
        ctx: &CompileContext,
        owner: &ClassSchema,
        property: &PropertySchema,
    ) -> Result<String, CompileError> {
        if builder.mode() == BindingMode::Cache {
            return Ok(ctx.root.alias.clone());
        }
        let owner_ref = self.ensure_class_table(builder, ctx, owner)?;
        if let Some(secondary) = &property.secondary {
            let candidate = TableRef::unaliased(&secondary.table).with_parent_join(
                owner_ref,
                secondary.key.clone(),
                secondary.parent_key.clone(),
            );
            return Ok(builder.add_left_join_clause(candidate).alias);
        }
        Ok(owner_ref.alias)
    }

    /// Join the inheritance chain from the context class up to `owner`
    /// and return the table reference holding the owner's columns. An
    /// explicit loop over the chain; every step goes through the
    /// builder's join de-duplication so repeated walks stay cheap.
    fn ensure_class_table(
        &self,
        builder: &mut SqlQueryBuilder,
        ctx: &CompileContext,
        owner: &ClassSchema,
    ) -> Result<TableRef, CompileError> {
        if owner.name == ctx.class_name {
            return Ok(ctx.root.clone());
        }

        let chain = self.catalog.base_chain(&ctx.class_name)?;
        let mut current = ctx.root.clone();
        for pair in chain.windows(2) {
            let (child, base) = (pair[0], pair[1]);
            let base_table = base
                .table
                .as_deref()
                .ok_or_else(|| CompileError::UnqueriableClass(base.name.clone()))?;
            let child_key = child.key_column.as_deref().ok_or_else(|| {
                CompileError::Catalog(crate::object_catalog::CatalogError::MissingBinding {
                    class_name: child.name.clone(),
                    what: "key_column".to_string(),
                })
            })?;
            let base_key = base.key_column.as_deref().ok_or_else(|| {
                CompileError::Catalog(crate::object_catalog::CatalogError::MissingBinding {
                    class_name: base.name.clone(),
                    what: "key_column".to_string(),
                })
            })?;

            let candidate = TableRef::unaliased(base_table).with_parent_join(
                current.clone(),
                base_key.to_string(),
                child_key.to_string(),
            );
            current = builder.add_left_join_clause(candidate);

            if base.name == owner.name {
                return Ok(current);
            }
        }

        // resolve_property produced an owner outside the chain
        Err(CompileError::Catalog(
            crate::object_catalog::CatalogError::Class {
                class_name: owner.name.clone(),
            },
        ))
    }

    /// Alias, column and schema for a property referenced by name in
    /// the current context.
    fn resolve_column(
        &self,
        builder: &mut SqlQueryBuilder,
        ctx: &CompileContext,
        property_name: &str,
    ) -> Result<(String, String, &'a PropertySchema), CompileError> {
        let (owner, property) = self
            .catalog
            .resolve_property(&ctx.class_name, property_name)
            .map_err(|_| {
                CompileError::unknown_property_with_context(&ctx.class_name, property_name)
            })?;
        let cache = builder.mode() == BindingMode::Cache;
        let column = property
            .column_for_cache(cache)
            .ok_or_else(|| CompileError::MissingColumnBinding {
                property: property.name.clone(),
                mode: mode_name(builder.mode()).to_string(),
            })?
            .to_string();
        let alias = self.property_alias(builder, ctx, owner, property)?;
        Ok((alias, column, property))
    }

    fn key_binding(
        &self,
        builder: &mut SqlQueryBuilder,
        ctx: &CompileContext,
        key_owner: &ClassSchema,
        key_property: &PropertySchema,
    ) -> Result<(String, String, NativeDbType), CompileError> {
        let cache = builder.mode() == BindingMode::Cache;
        let column = key_property
            .column_for_cache(cache)
            .ok_or_else(|| CompileError::MissingColumnBinding {
                property: key_property.name.clone(),
                mode: mode_name(builder.mode()).to_string(),
            })?
            .to_string();
        let alias = if cache {
            ctx.root.alias.clone()
        } else {
            self.ensure_class_table(builder, ctx, key_owner)?.alias
        };
        let db_type = native_db_type(key_property.value_type)?;
        Ok((alias, column, db_type))
    }

    fn compile_where(
        &self,
        builder: &mut SqlQueryBuilder,
        params: &mut ParamMap,
        ctx: &CompileContext,
        node: &WhereNode,
    ) -> Result<(), CompileError> {
        match node {
            WhereNode::Comparison {
                property,
                operator,
                value,
            } => self.compile_comparison(builder, params, ctx, property, *operator, value),
            WhereNode::IdSet { ids } => self.compile_id_set(builder, params, ctx, ids),
            WhereNode::Related {
                relationship,
                direction,
                related_class,
                criteria,
            } => self.compile_related(
                builder,
                params,
                ctx,
                relationship,
                *direction,
                related_class,
                criteria,
            ),
            WhereNode::Group { items } => {
                if items.is_empty() {
                    return Err(CompileError::EmptyWhereGroup);
                }
                builder.start_of_inner_where_clause();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        builder.add_operator_to_where_clause(item.operator)?;
                    }
                    self.compile_where(builder, params, ctx, &item.criteria)?;
                }
                builder.end_of_inner_where_clause()
            }
        }
    }

    fn compile_comparison(
        &self,
        builder: &mut SqlQueryBuilder,
        params: &mut ParamMap,
        ctx: &CompileContext,
        property: &str,
        operator: crate::query_model::RelationalOperator,
        value: &PropertyValue,
    ) -> Result<(), CompileError> {
        let (alias, column, schema) = self.resolve_column(builder, ctx, property)?;
        let token = sql_operator_token(operator)?;

        if operator.is_null_check() {
            builder.add_where_clause(&alias, &column, token, None);
            return Ok(());
        }

        let db_type = native_db_type(schema.value_type)?;
        if operator.is_list_operator() {
            let items = value.as_list_opt().ok_or_else(|| {
                CompileError::value_mismatch(property, "list", value.type_name())
            })?;
            if items.is_empty() {
                return Err(CompileError::value_mismatch(property, "non-empty list", "empty list"));
            }
            let mut placeholders = Vec::with_capacity(items.len());
            for item in items {
                let coerced = coerce_value(item, schema.value_type, property)?;
                placeholders.push(params.add(coerced, db_type));
            }
            let rhs = format!("({})", placeholders.join(", "));
            builder.add_where_clause(&alias, &column, token, Some(&rhs));
        } else {
            let coerced = coerce_value(value, schema.value_type, property)?;
            let placeholder = params.add(coerced, db_type);
            builder.add_where_clause(&alias, &column, token, Some(&placeholder));
        }
        Ok(())
    }

    /// Id sets compile to a parenthesized OR group over the key column.
    /// Paged execution needs deterministic row order, so a default
    /// ascending key order is appended when the caller gave none.
    fn compile_id_set(
        &self,
        builder: &mut SqlQueryBuilder,
        params: &mut ParamMap,
        ctx: &CompileContext,
        ids: &[String],
    ) -> Result<(), CompileError> {
        if ids.is_empty() {
            return Err(CompileError::EmptyIdSet);
        }

        let (key_owner, key_property) = self
            .catalog
            .primary_key_property(&ctx.class_name)
            .map_err(CompileError::Catalog)?;
        let (alias, column, db_type) = self.key_binding(builder, ctx, key_owner, key_property)?;

        builder.start_of_inner_where_clause();
        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                builder.add_operator_to_where_clause(LogicalOperator::Or)?;
            }
            let value = coerce_value(
                &PropertyValue::Str(id.clone()),
                key_property.value_type,
                &key_property.name,
            )?;
            let placeholder = params.add(value, db_type);
            builder.add_where_clause(&alias, &column, "=", Some(&placeholder));
        }
        builder.end_of_inner_where_clause()?;

        if builder.order_by_list_is_empty() {
            builder.add_order_by_clause(&alias, &column, true);
        }
        Ok(())
    }

    fn compile_related(
        &self,
        builder: &mut SqlQueryBuilder,
        params: &mut ParamMap,
        ctx: &CompileContext,
        relationship: &str,
        direction: Direction,
        related_class: &str,
        criteria: &WhereNode,
    ) -> Result<(), CompileError> {
        if builder.mode() == BindingMode::Cache {
            return Err(CompileError::UnsupportedCacheCriterion(
                relationship.to_string(),
            ));
        }

        let rel = self.catalog.relationship(relationship)?;
        let near = rel.near_class(direction);
        let far = rel.far_class(direction);

        let mismatch = || CompileError::RelationshipMismatch {
            relationship: relationship.to_string(),
            class_name: ctx.class_name.clone(),
            related_class: related_class.to_string(),
            direction: direction.to_string(),
        };
        if !self.catalog.is_same_or_derived(&ctx.class_name, near)? {
            return Err(mismatch());
        }
        if related_class != far {
            return Err(mismatch());
        }

        let near_class = self.catalog.class_schema(near)?;
        let near_ref = self.ensure_class_table(builder, ctx, near_class)?;
        let far_class = self.catalog.class_schema(far)?;
        let far_table = far_class
            .table
            .as_deref()
            .ok_or_else(|| CompileError::UnqueriableClass(far_class.name.clone()))?;

        let far_ref = match &rel.keys {
            RelationshipKeys::Direct {
                container_column,
                contained_column,
            } => {
                let (near_col, far_col) = match direction {
                    Direction::Forward => (container_column, contained_column),
                    Direction::Backward => (contained_column, container_column),
                };
                builder.add_left_join_clause(TableRef::unaliased(far_table).with_parent_join(
                    near_ref,
                    far_col.clone(),
                    near_col.clone(),
                ))
            }
            RelationshipKeys::ManyToMany {
                link_table,
                container_column,
                link_container_column,
                link_contained_column,
                contained_column,
            } => {
                let (near_col, link_near_col, link_far_col, far_col) = match direction {
                    Direction::Forward => (
                        container_column,
                        link_container_column,
                        link_contained_column,
                        contained_column,
                    ),
                    Direction::Backward => (
                        contained_column,
                        link_contained_column,
                        link_container_column,
                        container_column,
                    ),
                };
                let link_ref = builder.add_left_join_clause(
                    TableRef::unaliased(link_table).with_parent_join(
                        near_ref,
                        link_near_col.clone(),
                        near_col.clone(),
                    ),
                );
                builder.add_left_join_clause(TableRef::unaliased(far_table).with_parent_join(
                    link_ref,
                    far_col.clone(),
                    link_far_col.clone(),
                ))
            }
        };

        let nested_ctx = CompileContext {
            class_name: related_class.to_string(),
            root: far_ref,
        };
        builder.start_of_inner_where_clause();
        self.compile_where(builder, params, &nested_ctx, criteria)?;
        builder.end_of_inner_where_clause()
    }

    /// Polygon filters require exactly one spatial property reachable
    /// from the class. AND-joined onto whatever WHERE content exists.
    fn compile_polygon(
        &self,
        builder: &mut SqlQueryBuilder,
        params: &mut ParamMap,
        ctx: &CompileContext,
        class: &ClassSchema,
        polygon: &serde_json::Value,
    ) -> Result<(), CompileError> {
        let footprint = Footprint::from_extended_value(polygon)
            .map_err(|e| CompileError::InvalidPolygon(e.to_string()))?;

        let spatial = self.catalog.spatial_properties(&class.name)?;
        let (owner, property) = match spatial.as_slice() {
            [] => return Err(CompileError::NoSpatialProperty(class.name.clone())),
            [one] => *one,
            many => {
                return Err(CompileError::AmbiguousSpatialProperty(
                    class.name.clone(),
                    many.len(),
                ))
            }
        };

        let cache = builder.mode() == BindingMode::Cache;
        let column = property
            .column_for_cache(cache)
            .ok_or_else(|| CompileError::MissingColumnBinding {
                property: property.name.clone(),
                mode: mode_name(builder.mode()).to_string(),
            })?
            .to_string();
        let alias = if cache {
            ctx.root.alias.clone()
        } else {
            self.ensure_class_table(builder, ctx, owner)?.alias
        };

        if !builder.where_clause_is_empty() {
            builder.add_operator_to_where_clause(LogicalOperator::And)?;
        }
        builder.add_spatial_intersects_where_clause(&alias, &column, &footprint, params)
    }
}

fn mode_name(mode: BindingMode) -> &'static str {
    match mode {
        BindingMode::Live => "live",
        BindingMode::Cache => "cache",
    }
}

/// Coerce a criterion literal to the property's declared type. Numeric
/// and temporal literals are accepted as strings too, since ids and
/// datetimes always travel as text.
fn coerce_value(
    value: &PropertyValue,
    target: PropertyType,
    property: &str,
) -> Result<PropertyValue, CompileError> {
    let mismatch = || CompileError::value_mismatch(property, target.to_string(), value.render_for_log());
    match target {
        PropertyType::String => match value {
            PropertyValue::Str(s) => Ok(PropertyValue::Str(s.clone())),
            _ => Err(mismatch()),
        },
        PropertyType::Double => match value {
            PropertyValue::Double(d) => Ok(PropertyValue::Double(*d)),
            PropertyValue::Int(i) => Ok(PropertyValue::Double(f64::from(*i))),
            PropertyValue::Long(l) => Ok(PropertyValue::Double(*l as f64)),
            PropertyValue::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(PropertyValue::Double)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        PropertyType::Boolean => match value {
            PropertyValue::Bool(b) => Ok(PropertyValue::Bool(*b)),
            PropertyValue::Str(s) if s.eq_ignore_ascii_case("true") => Ok(PropertyValue::Bool(true)),
            PropertyValue::Str(s) if s.eq_ignore_ascii_case("false") => {
                Ok(PropertyValue::Bool(false))
            }
            _ => Err(mismatch()),
        },
        PropertyType::Int => match value {
            PropertyValue::Int(i) => Ok(PropertyValue::Int(*i)),
            PropertyValue::Long(l) => i32::try_from(*l)
                .map(PropertyValue::Int)
                .map_err(|_| mismatch()),
            PropertyValue::Str(s) => s
                .trim()
                .parse::<i32>()
                .map(PropertyValue::Int)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        PropertyType::Long => match value {
            PropertyValue::Int(i) => Ok(PropertyValue::Long(i64::from(*i))),
            PropertyValue::Long(l) => Ok(PropertyValue::Long(*l)),
            PropertyValue::Str(s) => s
                .trim()
                .parse::<i64>()
                .map(PropertyValue::Long)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        },
        PropertyType::DateTime => match value {
            PropertyValue::DateTime(dt) => Ok(PropertyValue::DateTime(*dt)),
            PropertyValue::Str(s) => parse_datetime(s.trim()).ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        PropertyType::Geometry | PropertyType::Struct | PropertyType::Point => {
            Err(CompileError::UnsupportedType(target.to_string()))
        }
    }
}

fn parse_datetime(text: &str) -> Option<PropertyValue> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(PropertyValue::DateTime(dt));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(PropertyValue::DateTime(dt));
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Some(PropertyValue::DateTime(dt));
        }
    }
    None
}
