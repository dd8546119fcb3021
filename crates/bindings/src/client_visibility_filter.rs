/// A row-level security filter, which can be registered using the
/// [`crate::register_client_visibility_filter!`] macro.
#[non_exhaustive]
pub enum Filter {
    /// A SQL query. Rows that match this query will be made visible to clients.
    ///
    /// The query must be of the form `SELECT * FROM table`
    /// or `SELECT table.* FROM table`, followed by any number of `JOIN`
    /// clauses and a `WHERE` clause, and must select all of the columns
    /// from a single table, and nothing else.
    ///
    /// Queries are not checked for syntactic or semantic validity
    /// until they are processed by the host, i.e., at publish time
    /// rather than compile time.
    Sql(&'static str),
}

impl Filter {
    #[doc(hidden)]
    pub fn sql_text(&self) -> &'static str {
        let Filter::Sql(sql) = self;
        sql
    }
}
