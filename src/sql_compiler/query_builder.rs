use crate::geometry::Footprint;
use crate::query_model::{LogicalOperator, PropertyValue};

use super::errors::CompileError;
use super::params::ParamMap;
use super::table_ref::{AliasGenerator, TableRef};
use super::type_mapping::NativeDbType;

/// Which physical schema the SQL binds against. Live mode reads the
/// native tables (spatial columns through the dialect's geometry
/// methods); cache mode reads the flat mimic tables with their
/// precomputed WKT/SRID and bounding-box columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingMode {
    Live,
    Cache,
}

/// Row limiting strategy. `RowCap` renders a fixed `TOP <n>`; `Window`
/// wraps the query in a ROW_NUMBER() window with parameterized bounds.
#[derive(Debug, Clone, PartialEq)]
pub enum Paging {
    RowCap(u32),
    Window {
        lower_placeholder: String,
        upper_placeholder: String,
    },
}

/// Incremental SQL builder. The compiler drives it clause by clause;
/// the builder owns alias assignment, join de-duplication and the final
/// rendering for both the row query and the count query.
#[derive(Debug)]
pub struct SqlQueryBuilder {
    mode: BindingMode,
    paging: Paging,
    aliases: AliasGenerator,
    from: Option<TableRef>,
    select: Vec<String>,
    joins: Vec<TableRef>,
    where_sql: String,
    open_groups: u32,
    order_by: Vec<String>,
}

impl SqlQueryBuilder {
    pub fn new(mode: BindingMode, paging: Paging) -> Self {
        SqlQueryBuilder {
            mode,
            paging,
            aliases: AliasGenerator::new(),
            from: None,
            select: Vec::new(),
            joins: Vec::new(),
            where_sql: String::new(),
            open_groups: 0,
            order_by: Vec::new(),
        }
    }

    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    pub fn set_paging(&mut self, paging: Paging) {
        self.paging = paging;
    }

    /// Set the root table. Overwrites any previously specified FROM.
    pub fn specify_from_clause(&mut self, table: &str) -> TableRef {
        let table_ref = TableRef::new(table, self.aliases.next_alias());
        self.from = Some(table_ref.clone());
        table_ref
    }

    /// Add a select expression for one logical property. A spatial
    /// column expands into two physical expressions (text + SRID in
    /// live mode, the mimic `_wkt`/`_srid` columns in cache mode).
    pub fn add_select_clause(&mut self, alias: &str, column: &str, spatial: bool) {
        if spatial {
            match self.mode {
                BindingMode::Live => {
                    self.select.push(format!("{}.{}.STAsText()", alias, column));
                    self.select.push(format!("{}.{}.STSrid", alias, column));
                }
                BindingMode::Cache => {
                    self.select.push(format!("{}.{}_wkt", alias, column));
                    self.select.push(format!("{}.{}_srid", alias, column));
                }
            }
        } else {
            self.select.push(format!("{}.{}", alias, column));
        }
    }

    /// Register a LEFT JOIN. When a structurally equal join is already
    /// present, the existing descriptor is returned so the caller reuses
    /// its alias; otherwise the candidate gets the next alias and is
    /// appended.
    pub fn add_left_join_clause(&mut self, mut candidate: TableRef) -> TableRef {
        if let Some(from) = &self.from {
            if from.structural_equals(&candidate) {
                return from.clone();
            }
        }
        if let Some(existing) = self.joins.iter().find(|j| j.structural_equals(&candidate)) {
            return existing.clone();
        }
        candidate.alias = self.aliases.next_alias();
        self.joins.push(candidate.clone());
        candidate
    }

    pub fn join_count(&self) -> usize {
        self.joins.len()
    }

    /// Append one comparison leaf. `rhs` is the prerendered right-hand
    /// side (a placeholder, or a parenthesized placeholder list); null
    /// checks pass None.
    pub fn add_where_clause(&mut self, alias: &str, column: &str, operator_token: &str, rhs: Option<&str>) {
        self.where_sql.push_str(&format!("{}.{} {}", alias, column, operator_token));
        if let Some(rhs) = rhs {
            self.where_sql.push(' ');
            self.where_sql.push_str(rhs);
        }
    }

    /// Append an explicit AND/OR between two criteria.
    pub fn add_operator_to_where_clause(&mut self, operator: LogicalOperator) -> Result<(), CompileError> {
        if self.where_sql.is_empty() || self.where_sql.ends_with('(') {
            return Err(CompileError::MisplacedLogicalOperator);
        }
        self.where_sql.push_str(&format!(" {} ", operator));
        Ok(())
    }

    pub fn start_of_inner_where_clause(&mut self) {
        self.where_sql.push('(');
        self.open_groups += 1;
    }

    pub fn end_of_inner_where_clause(&mut self) -> Result<(), CompileError> {
        if self.open_groups == 0 {
            return Err(CompileError::UnbalancedWhereGroup);
        }
        self.where_sql.push(')');
        self.open_groups -= 1;
        Ok(())
    }

    /// Append the spatial intersection predicate for a polygon filter.
    /// Live mode emits an STIntersects call with a parameterized WKT;
    /// cache mode decomposes into four comparisons against the mimic
    /// table's bounding-box columns.
    pub fn add_spatial_intersects_where_clause(
        &mut self,
        alias: &str,
        column: &str,
        footprint: &Footprint,
        params: &mut ParamMap,
    ) -> Result<(), CompileError> {
        match self.mode {
            BindingMode::Live => {
                let srid: i32 = footprint
                    .coordinate_system
                    .trim()
                    .parse()
                    .map_err(|_| CompileError::InvalidSrid(footprint.coordinate_system.clone()))?;
                let wkt = footprint
                    .to_wkt()
                    .map_err(|e| CompileError::InvalidPolygon(e.to_string()))?;
                let placeholder = params.add(PropertyValue::Str(wkt), NativeDbType::String);
                self.where_sql.push_str(&format!(
                    "{}.{}.STIntersects(geometry::STGeomFromText({}, {})) = 1",
                    alias, column, placeholder, srid
                ));
            }
            BindingMode::Cache => {
                let (min_x, min_y, max_x, max_y) = footprint
                    .bounding_box()
                    .map_err(|e| CompileError::InvalidPolygon(e.to_string()))?;
                let max_x_ph = params.add(PropertyValue::Double(max_x), NativeDbType::Double);
                let min_x_ph = params.add(PropertyValue::Double(min_x), NativeDbType::Double);
                let max_y_ph = params.add(PropertyValue::Double(max_y), NativeDbType::Double);
                let min_y_ph = params.add(PropertyValue::Double(min_y), NativeDbType::Double);
                self.where_sql.push_str(&format!(
                    "({a}.{c}_minx <= {maxx} AND {a}.{c}_maxx >= {minx} AND {a}.{c}_miny <= {maxy} AND {a}.{c}_maxy >= {miny})",
                    a = alias,
                    c = column,
                    maxx = max_x_ph,
                    minx = min_x_ph,
                    maxy = max_y_ph,
                    miny = min_y_ph,
                ));
            }
        }
        Ok(())
    }

    pub fn add_order_by_clause(&mut self, alias: &str, column: &str, ascending: bool) {
        let direction = if ascending { "ASC" } else { "DESC" };
        self.order_by.push(format!("{}.{} {}", alias, column, direction));
    }

    pub fn order_by_list_is_empty(&self) -> bool {
        self.order_by.is_empty()
    }

    pub fn where_clause_is_empty(&self) -> bool {
        self.where_sql.is_empty()
    }

    fn validate(&self) -> Result<&TableRef, CompileError> {
        let from = self.from.as_ref().ok_or(CompileError::MissingFromClause)?;
        if self.open_groups != 0 {
            return Err(CompileError::UnbalancedWhereGroup);
        }
        Ok(from)
    }

    fn render_from_and_joins(&self, from: &TableRef) -> String {
        let mut sql = format!(" FROM {} {}", from.table, from.alias);
        for join in &self.joins {
            // Joins are always registered with their hook attached
            if let Some(parent_join) = &join.parent_join {
                sql.push_str(&format!(
                    " LEFT JOIN {} {} ON {}.{} = {}.{}",
                    join.table,
                    join.alias,
                    join.alias,
                    parent_join.child_column,
                    parent_join.parent.alias,
                    parent_join.parent_column
                ));
            }
        }
        sql
    }

    fn render_where(&self) -> String {
        if self.where_sql.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.where_sql)
        }
    }

    /// Render the row query for the configured paging strategy.
    pub fn build_query(&self) -> Result<String, CompileError> {
        let from = self.validate()?;
        if self.select.is_empty() {
            return Err(CompileError::EmptySelectList);
        }

        let select_list = self.select.join(", ");
        let body = format!("{}{}", self.render_from_and_joins(from), self.render_where());

        match &self.paging {
            Paging::RowCap(cap) => {
                let mut sql = format!("SELECT TOP {} {}{}", cap, select_list, body);
                if !self.order_by.is_empty() {
                    sql.push_str(&format!(" ORDER BY {}", self.order_by.join(", ")));
                }
                Ok(sql)
            }
            Paging::Window {
                lower_placeholder,
                upper_placeholder,
            } => {
                if self.order_by.is_empty() {
                    return Err(CompileError::MissingOrderByForWindow);
                }
                Ok(format!(
                    "SELECT * FROM (SELECT {}, ROW_NUMBER() OVER (ORDER BY {}) AS row_num{}) AS paged \
                     WHERE paged.row_num BETWEEN {} AND {} ORDER BY paged.row_num",
                    select_list,
                    self.order_by.join(", "),
                    body,
                    lower_placeholder,
                    upper_placeholder
                ))
            }
        }
    }

    /// Render the count query: same FROM/JOIN/WHERE, a COUNT(*) select
    /// list, no ORDER BY and no paging.
    pub fn build_count_query(&self) -> Result<String, CompileError> {
        let from = self.validate()?;
        Ok(format!(
            "SELECT COUNT(*){}{}",
            self.render_from_and_joins(from),
            self.render_where()
        ))
    }
}
