/// Reference to a physical table in a compiled query: the table, its
/// alias and optionally the join hook back to an already-present table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub table: String,
    pub alias: String,
    pub parent_join: Option<ParentJoin>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParentJoin {
    /// Table this one joins onto
    pub parent: Box<TableRef>,
    /// Join column on this table
    pub child_column: String,
    /// Join column on the parent table
    pub parent_column: String,
}

impl TableRef {
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Self {
        TableRef {
            table: table.into(),
            alias: alias.into(),
            parent_join: None,
        }
    }

    /// Descriptor without an alias yet; the builder assigns one if the
    /// join turns out to be new.
    pub fn unaliased(table: impl Into<String>) -> Self {
        Self::new(table, "")
    }

    /// Attach (or replace) the join hook back to `parent`.
    pub fn set_parent_join(
        &mut self,
        parent: TableRef,
        child_column: impl Into<String>,
        parent_column: impl Into<String>,
    ) {
        self.parent_join = Some(ParentJoin {
            parent: Box::new(parent),
            child_column: child_column.into(),
            parent_column: parent_column.into(),
        });
    }

    pub fn with_parent_join(
        mut self,
        parent: TableRef,
        child_column: impl Into<String>,
        parent_column: impl Into<String>,
    ) -> Self {
        self.set_parent_join(parent, child_column, parent_column);
        self
    }

    /// Structural equality ignoring aliases: same table, and either both
    /// stand alone or both join the same columns onto structurally equal
    /// parents. This is what join de-duplication compares.
    pub fn structural_equals(&self, other: &TableRef) -> bool {
        if self.table != other.table {
            return false;
        }
        match (&self.parent_join, &other.parent_join) {
            (None, None) => true,
            (Some(a), Some(b)) => {
                a.child_column == b.child_column
                    && a.parent_column == b.parent_column
                    && a.parent.structural_equals(&b.parent)
            }
            _ => false,
        }
    }
}

/// Hands out `tab0`, `tab1`, ... within a single compiled query.
#[derive(Debug, Default)]
pub struct AliasGenerator {
    next: u32,
}

impl AliasGenerator {
    pub fn new() -> Self {
        AliasGenerator { next: 0 }
    }

    pub fn next_alias(&mut self) -> String {
        let alias = format!("tab{}", self.next);
        self.next += 1;
        alias
    }
}
