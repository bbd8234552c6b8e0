//! Sibling ordering shared by courses (inside a version) and units (inside a course)
//!
//! Within one container `order_index` is always `0..n` with no gaps or
//! duplicates. Inserts append at `n`, deletes re-compact, and a reorder
//! must name every sibling exactly once.

use std::collections::{HashMap, HashSet};

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Deserialize;

use crate::error::ApiError;

/// A table whose rows are ordered inside a parent container
#[derive(Debug, Clone, Copy)]
pub struct OrderedTable {
    pub table: &'static str,
    pub container_column: &'static str,
    pub label: &'static str,
}

pub const COURSES: OrderedTable = OrderedTable {
    table: "courses",
    container_column: "version_id",
    label: "Course",
};

pub const UNITS: OrderedTable = OrderedTable {
    table: "units",
    container_column: "course_id",
    label: "Unit",
};

/// One entry of a reorder request
#[derive(Debug, Clone, Deserialize)]
pub struct OrderEntry {
    pub id: String,
    pub order_index: i64,
}

impl OrderedTable {
    /// Number of rows in the container, i.e. the next free index
    pub fn count(&self, conn: &Connection, container_id: &str) -> Result<i64, ApiError> {
        Ok(conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {} = ?", self.table, self.container_column),
            params![container_id],
            |r| r.get(0),
        )?)
    }

    /// Ids in the container, by current order
    pub fn sibling_ids(&self, conn: &Connection, container_id: &str) -> Result<Vec<String>, ApiError> {
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} WHERE {} = ? ORDER BY order_index, created_at",
            self.table, self.container_column
        ))?;
        let ids = stmt
            .query_map(params![container_id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    fn container_of(&self, conn: &Connection, tenant_id: &str, id: &str) -> Result<Option<String>, ApiError> {
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE id = ? AND tenant_id = ?",
                    self.container_column, self.table
                ),
                params![id, tenant_id],
                |r| r.get(0),
            )
            .optional()?)
    }

    /// Rewrite indices to `0..n` following the current order
    pub fn compact(&self, tx: &Transaction<'_>, container_id: &str) -> Result<(), ApiError> {
        let ids = self.sibling_ids(tx, container_id)?;
        self.write_positions(tx, ids.iter().enumerate().map(|(i, id)| (id.as_str(), i as i64)))
    }

    /// Shift every sibling at or after `from_index` one place down
    pub fn make_room(&self, tx: &Transaction<'_>, container_id: &str, from_index: i64) -> Result<(), ApiError> {
        tx.execute(
            &format!(
                "UPDATE {} SET order_index = order_index + 1 WHERE {} = ? AND order_index >= ?",
                self.table, self.container_column
            ),
            params![container_id, from_index],
        )?;
        Ok(())
    }

    fn write_positions<'a>(
        &self,
        tx: &Transaction<'_>,
        positions: impl Iterator<Item = (&'a str, i64)>,
    ) -> Result<(), ApiError> {
        let mut stmt = tx.prepare(&format!(
            "UPDATE {} SET order_index = ?, updated_at = ? WHERE id = ?",
            self.table
        ))?;
        let now = super::now();
        for (id, index) in positions {
            stmt.execute(params![index, now, id])?;
        }
        Ok(())
    }

    /// Validate and apply a reorder request; returns the container id.
    ///
    /// The caller resolves tenancy and editability of the container through
    /// `check_container` before anything is written.
    pub fn reorder<F>(
        &self,
        conn: &mut Connection,
        tenant_id: &str,
        orders: &[OrderEntry],
        check_container: F,
    ) -> Result<String, ApiError>
    where
        F: FnOnce(&Connection, &str) -> Result<(), ApiError>,
    {
        if orders.is_empty() {
            return Err(ApiError::Validation("orders must not be empty".into()));
        }

        let tx = conn.transaction()?;

        let mut container: Option<String> = None;
        for entry in orders {
            let found = self
                .container_of(&tx, tenant_id, &entry.id)?
                .ok_or_else(|| ApiError::Validation(format!("{} {} does not exist", self.label, entry.id)))?;
            match &container {
                None => container = Some(found),
                Some(c) if *c != found => {
                    return Err(ApiError::Validation(format!(
                        "All {}s in a reorder must share one parent",
                        self.label.to_lowercase()
                    )))
                }
                Some(_) => {}
            }
        }
        let container = container.ok_or_else(|| ApiError::Validation("orders must not be empty".into()))?;

        check_container(&tx, &container)?;

        let siblings = self.sibling_ids(&tx, &container)?;
        validate_permutation(&siblings, orders)?;

        self.write_positions(&tx, orders.iter().map(|o| (o.id.as_str(), o.order_index)))?;
        tx.commit()?;

        Ok(container)
    }
}

/// `orders` must cover exactly `siblings`, with indices a permutation of `0..n`
pub fn validate_permutation(siblings: &[String], orders: &[OrderEntry]) -> Result<(), ApiError> {
    let n = siblings.len();
    if orders.len() != n {
        return Err(ApiError::Validation(format!(
            "Reorder must include all {} items of the container, got {}",
            n,
            orders.len()
        )));
    }

    let expected: HashSet<&str> = siblings.iter().map(String::as_str).collect();
    let mut seen_ids = HashSet::with_capacity(n);
    let mut seen_indices: HashMap<i64, &str> = HashMap::with_capacity(n);

    for entry in orders {
        if !expected.contains(entry.id.as_str()) {
            return Err(ApiError::Validation(format!("{} is not in this container", entry.id)));
        }
        if !seen_ids.insert(entry.id.as_str()) {
            return Err(ApiError::Validation(format!("{} appears more than once", entry.id)));
        }
        if entry.order_index < 0 || entry.order_index >= n as i64 {
            return Err(ApiError::Validation(format!(
                "order_index {} is out of range 0..{}",
                entry.order_index, n
            )));
        }
        if let Some(other) = seen_indices.insert(entry.order_index, entry.id.as_str()) {
            return Err(ApiError::Validation(format!(
                "order_index {} is used by both {} and {}",
                entry.order_index, other, entry.id
            )));
        }
    }

    Ok(())
}
