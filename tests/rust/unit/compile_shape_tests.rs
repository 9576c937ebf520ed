//! Unit tests for the SQL text the query compiler produces: join
//! topology, parameter placement, paging forms and the cache-mode
//! bindings.

use geofed::object_catalog::{Direction, ObjectCatalog};
use geofed::query_model::{
    AbstractQuery, OrderBy, PropertyValue, RelationalOperator, WhereNode,
};
use geofed::sql_compiler::{
    BindingMode, CompileError, CompilerOptions, NativeDbType, QueryCompiler,
};

/// Catalog with one inheritance chain (MapSheet -> Entity), a secondary
/// text table, a many-to-many relationship and one cache-only class.
fn catalog() -> ObjectCatalog {
    let yaml = r#"
classes:
  - name: Entity
    table: ENTITIES
    key_column: ENTITY_ID
    primary_key: Id
    properties:
      - name: Id
        type: string
        column: ENTITY_ID
      - name: Name
        type: string
        column: NAME
      - name: Updated
        type: datetime
        column: UPDATED_AT
      - name: Description
        type: string
        column: TEXT_VALUE
        secondary:
          table: ENTITY_TEXTS
          key: FK_ENTITY
          parent_key: ENTITY_ID
  - name: MapSheet
    kind: spatial_entity
    bases: [Entity]
    table: MAP_SHEETS
    key_column: ENTITY_REF
    properties:
      - name: Scale
        type: int
        column: SCALE
      - name: Footprint
        type: geometry
        column: GEOM
  - name: Dataset
    kind: metadata
    table: DATASETS
    key_column: DATASET_ID
    primary_key: Id
    properties:
      - name: Id
        type: string
        column: DATASET_ID
      - name: Title
        type: string
        column: TITLE
  - name: SurveySheet
    kind: detail_view
    primary_key: Id
    cache_table: cb_survey_sheets
    cache_key_column: record_id
    properties:
      - name: Id
        type: string
        mimic_column: record_id
      - name: Name
        type: string
        mimic_column: name
relationships:
  - name: SheetDatasets
    container: MapSheet
    contained: Dataset
    container_column: ENTITY_REF
    contained_column: DATASET_ID
    link:
      table: SHEET_DATASETS
      container_column: FK_SHEET
      contained_column: FK_DATASET
"#;
    ObjectCatalog::from_yaml_str(yaml).expect("catalog should build")
}

fn compile_live(query: &AbstractQuery) -> geofed::sql_compiler::CompiledQuery {
    let catalog = catalog();
    QueryCompiler::new(&catalog, CompilerOptions::default())
        .compile(query, BindingMode::Live)
        .expect("query should compile")
}

#[test]
fn test_select_all_without_criteria_caps_rows() {
    let compiled = compile_live(&AbstractQuery::new("Entity"));

    println!("Generated SQL:\n{}", compiled.sql);
    assert!(compiled.sql.starts_with("SELECT TOP 1000 "));
    assert!(!compiled.sql.contains(" WHERE "));
    assert!(compiled.sql.contains("FROM ENTITIES tab0"));
    assert!(compiled.params.is_empty());
    assert!(compiled.count_sql.is_none());
}

#[test]
fn test_two_inherited_properties_share_one_base_join() {
    let mut query = AbstractQuery::new("MapSheet");
    query.properties = Some(vec![
        "Scale".to_string(),
        "Name".to_string(),
        "Updated".to_string(),
    ]);

    let compiled = compile_live(&query);
    println!("Generated SQL:\n{}", compiled.sql);

    // Name, Updated and the appended key all live on ENTITIES; the
    // inheritance join must be emitted exactly once.
    assert_eq!(compiled.sql.matches("LEFT JOIN ENTITIES").count(), 1);
    assert!(compiled
        .sql
        .contains("LEFT JOIN ENTITIES tab1 ON tab1.ENTITY_ID = tab0.ENTITY_REF"));
    assert!(compiled.sql.contains("tab0.SCALE"));
    assert!(compiled.sql.contains("tab1.NAME"));
    // Key was not requested but is appended for instance identity
    assert_eq!(compiled.layout.key_property, "Id");
    assert!(compiled.sql.contains("tab1.ENTITY_ID"));
}

#[test]
fn test_id_set_renders_or_group_and_default_order() {
    let query = AbstractQuery::by_ids("Entity", vec!["1".to_string(), "2".to_string()]);
    let compiled = compile_live(&query);

    println!("Generated SQL:\n{}", compiled.sql);
    assert!(compiled
        .sql
        .contains("WHERE (tab0.ENTITY_ID = @p0 OR tab0.ENTITY_ID = @p1)"));
    assert!(compiled.sql.ends_with("ORDER BY tab0.ENTITY_ID ASC"));
    assert_eq!(compiled.params.len(), 2);
    assert_eq!(
        compiled.params.get("@p0").unwrap().value,
        PropertyValue::Str("1".to_string())
    );
}

#[test]
fn test_caller_order_by_suppresses_id_set_default() {
    let mut query = AbstractQuery::by_ids("Entity", vec!["1".to_string()]);
    query.order_by = vec![OrderBy {
        property: "Name".to_string(),
        ascending: false,
    }];

    let compiled = compile_live(&query);
    assert!(compiled.sql.ends_with("ORDER BY tab0.NAME DESC"));
    assert_eq!(compiled.sql.matches("ORDER BY").count(), 1);
}

#[test]
fn test_secondary_table_property_joins_on_demand() {
    let mut query = AbstractQuery::new("Entity");
    query.properties = Some(vec!["Description".to_string()]);

    let compiled = compile_live(&query);
    println!("Generated SQL:\n{}", compiled.sql);
    assert!(compiled
        .sql
        .contains("LEFT JOIN ENTITY_TEXTS tab1 ON tab1.FK_ENTITY = tab0.ENTITY_ID"));
    assert!(compiled.sql.contains("tab1.TEXT_VALUE"));
}

#[test]
fn test_many_to_many_related_criterion_joins_link_table() {
    let mut query = AbstractQuery::new("MapSheet");
    query.properties = Some(vec!["Scale".to_string()]);
    query.criteria = Some(WhereNode::Related {
        relationship: "SheetDatasets".to_string(),
        direction: Direction::Forward,
        related_class: "Dataset".to_string(),
        criteria: Box::new(WhereNode::Comparison {
            property: "Title".to_string(),
            operator: RelationalOperator::Eq,
            value: PropertyValue::Str("Orthophoto 2023".to_string()),
        }),
    });

    let compiled = compile_live(&query);
    println!("Generated SQL:\n{}", compiled.sql);

    // Sheet -> link -> dataset, then the criterion scoped to the far side
    assert!(compiled
        .sql
        .contains("LEFT JOIN SHEET_DATASETS tab2 ON tab2.FK_SHEET = tab0.ENTITY_REF"));
    assert!(compiled
        .sql
        .contains("LEFT JOIN DATASETS tab3 ON tab3.DATASET_ID = tab2.FK_DATASET"));
    assert!(compiled.sql.contains("WHERE (tab3.TITLE = @p0)"));
    assert_eq!(
        compiled.params.get("@p0").unwrap().value,
        PropertyValue::Str("Orthophoto 2023".to_string())
    );
}

#[test]
fn test_relationship_direction_mismatch_is_rejected() {
    let mut query = AbstractQuery::new("Dataset");
    query.criteria = Some(WhereNode::Related {
        relationship: "SheetDatasets".to_string(),
        direction: Direction::Forward,
        related_class: "MapSheet".to_string(),
        criteria: Box::new(WhereNode::IdSet {
            ids: vec!["1".to_string()],
        }),
    });

    let catalog = catalog();
    let error = QueryCompiler::new(&catalog, CompilerOptions::default())
        .compile(&query, BindingMode::Live)
        .unwrap_err();
    assert!(matches!(error, CompileError::RelationshipMismatch { .. }));
}

#[test]
fn test_polygon_filter_parameterizes_wkt_with_srid() {
    let mut query = AbstractQuery::new("MapSheet");
    query.properties = Some(vec!["Scale".to_string()]);
    query.extended.insert(
        "polygon".to_string(),
        serde_json::json!(geofed::geometry::footprint_to_json("16", "57", "17", "58", "4326")),
    );

    let compiled = compile_live(&query);
    println!("Generated SQL:\n{}", compiled.sql);
    assert!(compiled
        .sql
        .contains(".GEOM.STIntersects(geometry::STGeomFromText(@p0, 4326)) = 1"));
    assert_eq!(
        compiled.params.get("@p0").unwrap().value,
        PropertyValue::Str("POLYGON ((16 57, 17 57, 17 58, 16 58, 16 57))".to_string())
    );
}

#[test]
fn test_window_paging_binds_one_based_bounds() {
    let mut query = AbstractQuery::new("Entity");
    query.properties = Some(vec!["Name".to_string()]);
    query.offset = Some(20);
    query.limit = Some(10);

    let compiled = compile_live(&query);
    println!("Generated SQL:\n{}", compiled.sql);
    assert!(compiled.sql.contains("ROW_NUMBER() OVER (ORDER BY tab0.ENTITY_ID ASC)"));
    assert!(compiled.sql.contains("BETWEEN @p0 AND @p1"));
    assert_eq!(
        compiled.params.get("@p0").unwrap().value,
        PropertyValue::Long(21)
    );
    assert_eq!(
        compiled.params.get("@p1").unwrap().value,
        PropertyValue::Long(30)
    );
}

#[test]
fn test_limit_alone_tightens_the_row_cap() {
    let mut query = AbstractQuery::new("Entity");
    query.limit = Some(25);

    let compiled = compile_live(&query);
    assert!(compiled.sql.starts_with("SELECT TOP 25 "));
    assert!(!compiled.sql.contains("ROW_NUMBER"));
}

#[test]
fn test_instance_count_produces_count_statement() {
    let mut query = AbstractQuery::by_ids("Entity", vec!["1".to_string()]);
    query
        .extended
        .insert("instanceCount".to_string(), serde_json::json!(true));

    let compiled = compile_live(&query);
    let count_sql = compiled.count_sql.expect("count statement expected");
    assert!(count_sql.starts_with("SELECT COUNT(*) FROM ENTITIES"));
    assert!(count_sql.contains("tab0.ENTITY_ID = @p0"));
    assert!(!count_sql.contains("ORDER BY"));
}

#[test]
fn test_datetime_criterion_accepts_iso_text() {
    let mut query = AbstractQuery::new("Entity");
    query.properties = Some(vec!["Name".to_string()]);
    query.criteria = Some(WhereNode::Comparison {
        property: "Updated".to_string(),
        operator: RelationalOperator::GtEq,
        value: PropertyValue::Str("2024-03-01T08:30:00".to_string()),
    });

    let compiled = compile_live(&query);
    assert!(compiled.sql.contains("tab0.UPDATED_AT >= @p0"));
    let param = compiled.params.get("@p0").unwrap();
    assert_eq!(param.db_type, NativeDbType::DateTime);
    assert!(matches!(param.value, PropertyValue::DateTime(_)));
}

#[test]
fn test_cache_mode_reads_mimic_table_with_meta_columns() {
    let catalog = catalog();
    let query = AbstractQuery::by_ids("SurveySheet", vec!["r1".to_string()]);
    let compiled = QueryCompiler::new(&catalog, CompilerOptions::default())
        .compile(&query, BindingMode::Cache)
        .expect("cache query should compile");

    println!("Generated SQL:\n{}", compiled.sql);
    assert!(compiled.sql.contains("FROM cb_survey_sheets tab0"));
    assert!(compiled.sql.contains("tab0.record_id"));
    assert!(compiled.sql.contains("tab0.source_tag"));
    assert!(compiled.sql.contains("tab0.is_complete"));
    assert!(compiled.sql.contains("WHERE (tab0.record_id = @p0)"));
    // Bookkeeping columns ride at the end of the layout
    let width = compiled.layout.width();
    assert_eq!(width, 4);
}

#[test]
fn test_cache_only_class_is_not_live_queriable() {
    let catalog = catalog();
    let error = QueryCompiler::new(&catalog, CompilerOptions::default())
        .compile(&AbstractQuery::new("SurveySheet"), BindingMode::Live)
        .unwrap_err();
    assert!(matches!(error, CompileError::UnqueriableClass(name) if name == "SurveySheet"));
}

#[test]
fn test_cache_mode_rejects_related_criteria() {
    let catalog = catalog();
    let mut query = AbstractQuery::new("SurveySheet");
    query.criteria = Some(WhereNode::Related {
        relationship: "SheetDatasets".to_string(),
        direction: Direction::Forward,
        related_class: "Dataset".to_string(),
        criteria: Box::new(WhereNode::IdSet {
            ids: vec!["1".to_string()],
        }),
    });

    let error = QueryCompiler::new(&catalog, CompilerOptions::default())
        .compile(&query, BindingMode::Cache)
        .unwrap_err();
    assert!(matches!(error, CompileError::UnsupportedCacheCriterion(_)));
}

#[test]
fn test_unknown_property_names_the_class() {
    let mut query = AbstractQuery::new("Entity");
    query.properties = Some(vec!["Altitude".to_string()]);

    let catalog = catalog();
    let error = QueryCompiler::new(&catalog, CompilerOptions::default())
        .compile(&query, BindingMode::Live)
        .unwrap_err();
    assert_eq!(
        error,
        CompileError::UnknownProperty {
            class_name: "Entity".to_string(),
            property: "Altitude".to_string(),
        }
    );
}

#[test]
fn test_empty_id_list_is_rejected() {
    let query = AbstractQuery::by_ids("Entity", Vec::new());
    let catalog = catalog();
    let error = QueryCompiler::new(&catalog, CompilerOptions::default())
        .compile(&query, BindingMode::Live)
        .unwrap_err();
    assert_eq!(error, CompileError::EmptyIdSet);
}
