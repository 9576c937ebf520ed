//! Turns result rows into object instances by walking the compiled
//! select layout. Spatial pairs collapse back into the canonical
//! footprint JSON; cache bookkeeping columns land in the instance's
//! extended data.

use crate::geometry::{extract_bounding_box, footprint_to_json};
use crate::object_catalog::PropertyType;
use crate::query_model::{ObjectInstance, PropertyValue};
use crate::sql_compiler::{MetaColumn, SelectColumnKind, SelectLayout};
use crate::store::{RowSet, SqlValue, StoreError};

/// Drain a forward-only cursor into instances.
pub async fn map_rows(
    layout: &SelectLayout,
    rows: &mut dyn RowSet,
) -> Result<Vec<ObjectInstance>, StoreError> {
    let mut instances = Vec::new();
    while rows.advance().await? {
        instances.push(map_current_row(layout, rows)?);
    }
    Ok(instances)
}

/// Map the row the cursor is positioned on.
pub fn map_current_row(
    layout: &SelectLayout,
    rows: &dyn RowSet,
) -> Result<ObjectInstance, StoreError> {
    if rows.width() != layout.width() {
        return Err(StoreError::UnexpectedShape(format!(
            "result has {} columns, layout for {} expects {}",
            rows.width(),
            layout.class_name,
            layout.width()
        )));
    }

    let mut instance = ObjectInstance::new(&layout.class_name);
    let mut cursor = 0usize;
    for column in &layout.columns {
        match &column.kind {
            SelectColumnKind::Scalar(value_type) => {
                let cell = rows.value(cursor)?;
                let value = scalar_value(&cell, *value_type, &column.property)?;
                if column.property == layout.key_property {
                    instance.id = cell.to_id_string();
                }
                instance.set_property(&column.property, value);
            }
            SelectColumnKind::Spatial => {
                let wkt_cell = rows.value(cursor)?;
                let srid_cell = rows.value(cursor + 1)?;
                let value = spatial_value(&wkt_cell, &srid_cell, &column.property)?;
                instance.set_property(&column.property, value);
            }
            SelectColumnKind::Meta(which) => {
                let cell = rows.value(cursor)?;
                match which {
                    MetaColumn::SourceTag => {
                        if let Some(tag) = cell.as_text() {
                            instance.set_source_tag(tag);
                        }
                    }
                    MetaColumn::CompleteFlag => {
                        if let Some(flag) = cell.as_bool() {
                            instance.set_complete(flag);
                        }
                    }
                }
            }
        }
        cursor += column.width();
    }
    Ok(instance)
}

fn scalar_value(
    cell: &SqlValue,
    target: PropertyType,
    property: &str,
) -> Result<PropertyValue, StoreError> {
    if cell.is_null() {
        return Ok(PropertyValue::Null);
    }
    let mismatch = || {
        StoreError::UnexpectedShape(format!(
            "column for property {} does not hold a {} value",
            property, target
        ))
    };
    match target {
        PropertyType::String => cell
            .as_text()
            .map(|s| PropertyValue::Str(s.to_string()))
            .ok_or_else(mismatch),
        PropertyType::Int => cell.as_int().map(PropertyValue::Int).ok_or_else(mismatch),
        PropertyType::Long => cell.as_long().map(PropertyValue::Long).ok_or_else(mismatch),
        PropertyType::Double => cell
            .as_double()
            .map(PropertyValue::Double)
            .ok_or_else(mismatch),
        PropertyType::Boolean => cell.as_bool().map(PropertyValue::Bool).ok_or_else(mismatch),
        PropertyType::DateTime => cell
            .as_datetime()
            .map(PropertyValue::DateTime)
            .ok_or_else(mismatch),
        PropertyType::Geometry | PropertyType::Struct | PropertyType::Point => Err(mismatch()),
    }
}

/// Collapse the (WKT, SRID) column pair into footprint JSON built from
/// the geometry's bounding box. The box corners keep the database's
/// own numeric literals.
fn spatial_value(
    wkt_cell: &SqlValue,
    srid_cell: &SqlValue,
    property: &str,
) -> Result<PropertyValue, StoreError> {
    let wkt = match wkt_cell {
        SqlValue::Null => return Ok(PropertyValue::Null),
        SqlValue::Text(wkt) => wkt,
        _ => {
            return Err(StoreError::UnexpectedShape(format!(
                "geometry column for property {} is not text",
                property
            )))
        }
    };
    let srid = srid_cell.to_id_string().ok_or_else(|| {
        StoreError::UnexpectedShape(format!(
            "geometry column for property {} has no spatial reference id",
            property
        ))
    })?;

    let bbox = extract_bounding_box(wkt).map_err(|e| {
        StoreError::UnexpectedShape(format!("geometry for property {}: {}", property, e))
    })?;
    Ok(PropertyValue::Geometry(footprint_to_json(
        &bbox.min_x,
        &bbox.min_y,
        &bbox.max_x,
        &bbox.max_y,
        &srid,
    )))
}
