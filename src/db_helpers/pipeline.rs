//! Composable list queries.
//!
//! A [`Pipeline`] is built stage by stage the way an aggregation is: project
//! the source columns, look up related rows, add computed fields, filter,
//! sort. It compiles to a single SQLite statement of the shape
//!
//! ```text
//! WITH viewer(id) AS (SELECT ?)
//! SELECT * FROM (SELECT <fields> FROM <source> <joins> WHERE <matches>) AS docs
//! WHERE <computed matches> ORDER BY <sort> LIMIT ? OFFSET ?
//! ```
//!
//! The requesting identity is bound once as `viewer`; computed fields refer to
//! it through [`VIEWER`]. An anonymous request binds NULL, so every
//! membership probe against it is false.

use serde::Serialize;
use sqlx::{
    query::{Query, QueryAs},
    sqlite::{SqliteArguments, SqliteRow},
    FromRow, Sqlite, SqlitePool,
};

use crate::errors::RequestError;

/// The requesting user's id inside a pipeline expression. NULL when anonymous.
pub const VIEWER: &str = "(SELECT id FROM viewer)";

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Text(String),
    Null,
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_owned())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<Option<i64>> for SqlParam {
    fn from(value: Option<i64>) -> Self {
        value.map_or(SqlParam::Null, SqlParam::Int)
    }
}

pub(crate) fn bind_params<'q, O>(
    mut query: QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    params: &[SqlParam],
) -> QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Int(value) => query.bind(*value),
            SqlParam::Text(value) => query.bind(value.clone()),
            SqlParam::Null => query.bind(Option::<i64>::None),
        };
    }
    query
}

/// [`bind_params`] for statements that return no rows.
pub(crate) fn bind_statement<'q>(
    mut statement: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlParam],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        statement = match param {
            SqlParam::Int(value) => statement.bind(*value),
            SqlParam::Text(value) => statement.bind(value.clone()),
            SqlParam::Null => statement.bind(Option::<i64>::None),
        };
    }
    statement
}

/// Escapes `%`, `_` and the escape character itself for a `LIKE ... ESCAPE '\'`.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// A validated sort key: a column of the compiled `docs` set and a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: &'static str,
    pub direction: Direction,
}

impl Sort {
    pub const fn desc(column: &'static str) -> Self {
        Sort {
            column,
            direction: Direction::Desc,
        }
    }

    pub const fn asc(column: &'static str) -> Self {
        Sort {
            column,
            direction: Direction::Asc,
        }
    }

    /// Resolves client `sortBy` / `sortType` against `allowed`, a list of
    /// `(api name, column)` pairs. `default` names the api field used when
    /// `sortBy` is absent; the direction defaults to descending.
    pub fn from_query(
        sort_by: Option<&str>,
        sort_type: Option<&str>,
        allowed: &[(&str, &'static str)],
        default: &str,
    ) -> Result<Sort, RequestError> {
        let key = sort_by.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(default);
        let column = allowed
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, column)| *column)
            .ok_or_else(|| {
                let names: Vec<_> = allowed.iter().map(|(name, _)| *name).collect();
                RequestError::bad_request(format!(
                    "Invalid sortBy {key:?}, expected one of {}",
                    names.join(", ")
                ))
            })?;
        let direction = match sort_type.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("desc") => Direction::Desc,
            Some("asc") => Direction::Asc,
            Some(other) => {
                return Err(RequestError::bad_request(format!(
                    "Invalid sortType {other:?}, expected asc or desc"
                )))
            }
        };
        Ok(Sort { column, direction })
    }
}

/// A validated `page` / `limit` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Result<Self, RequestError> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        if page == 0 {
            return Err(RequestError::bad_request("page must be a positive integer"));
        }
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 {
            return Err(RequestError::bad_request("limit must be a positive integer"));
        }
        if limit > MAX_LIMIT {
            return Err(RequestError::bad_request(format!(
                "Limit too high: maximum allowed is {MAX_LIMIT}"
            )));
        }
        Ok(PageRequest { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

/// One page of a list, with the bookkeeping clients use to walk the rest.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub docs: Vec<T>,
    pub total_docs: i64,
    pub limit: u32,
    pub page: u32,
    pub total_pages: i64,
    pub paging_counter: i64,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

impl<T> Paginated<T> {
    pub fn new(docs: Vec<T>, total_docs: i64, request: PageRequest) -> Self {
        let limit = request.limit as i64;
        let total_pages = ((total_docs + limit - 1) / limit).max(1);
        let page = request.page;
        let has_prev_page = page > 1;
        let has_next_page = (page as i64) < total_pages;
        Paginated {
            docs,
            total_docs,
            limit: request.limit,
            page,
            total_pages,
            paging_counter: request.offset() + 1,
            has_prev_page,
            has_next_page,
            prev_page: has_prev_page.then(|| page - 1),
            next_page: has_next_page.then(|| page + 1),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            docs: self.docs.into_iter().map(f).collect(),
            total_docs: self.total_docs,
            limit: self.limit,
            page: self.page,
            total_pages: self.total_pages,
            paging_counter: self.paging_counter,
            has_prev_page: self.has_prev_page,
            has_next_page: self.has_next_page,
            prev_page: self.prev_page,
            next_page: self.next_page,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    viewer: Option<i64>,
    source: String,
    fields: Vec<String>,
    joins: Vec<String>,
    matches: Vec<String>,
    match_params: Vec<SqlParam>,
    computed_matches: Vec<String>,
    sort: Option<Sort>,
}

impl Pipeline {
    /// `source` is a table with its alias, e.g. `videos v`.
    pub fn new(source: &str, viewer: Option<i64>) -> Self {
        Pipeline {
            viewer,
            source: source.to_owned(),
            fields: vec![],
            joins: vec![],
            matches: vec![],
            match_params: vec![],
            computed_matches: vec![],
            sort: None,
        }
    }

    /// Adds `(expression, alias)` pairs to the output.
    pub fn project(mut self, fields: &[(&str, &str)]) -> Self {
        for (expression, alias) in fields {
            self.fields.push(format!("{expression} AS {alias}"));
        }
        self
    }

    /// Joins related rows and projects the public fields taken from them.
    pub fn lookup(mut self, join: &str, fields: &[(&str, &str)]) -> Self {
        self.joins.push(join.to_owned());
        self.project(fields)
    }

    pub fn add_field(mut self, expression: &str, alias: &str) -> Self {
        self.fields.push(format!("{expression} AS {alias}"));
        self
    }

    pub fn match_eq(self, column: &str, value: impl Into<SqlParam>) -> Self {
        let clause = format!("{column} = ?");
        self.match_clause(&clause, vec![value.into()])
    }

    /// A raw predicate over source columns. Its `?` placeholders take `params`.
    pub fn match_clause(mut self, clause: &str, params: Vec<SqlParam>) -> Self {
        self.matches.push(format!("({clause})"));
        self.match_params.extend(params);
        self
    }

    /// Case-insensitive substring match of `term` against any of `columns`.
    /// A blank term adds no stage.
    pub fn search(self, columns: &[&str], term: Option<&str>) -> Self {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return self;
        };
        let escaped = escape_like(term);
        let clause = columns
            .iter()
            .map(|column| format!("{column} LIKE '%' || ? || '%' ESCAPE '\\'"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let params = columns.iter().map(|_| SqlParam::from(escaped.as_str())).collect();
        self.match_clause(&clause, params)
    }

    /// A predicate over projected aliases, applied after computed fields exist.
    pub fn match_computed(mut self, clause: &str) -> Self {
        self.computed_matches.push(format!("({clause})"));
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    fn inner(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.fields.join(", "), self.source);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.matches.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.matches.join(" AND "));
        }
        sql
    }

    fn outer(&self, head: &str) -> String {
        let mut sql = format!("WITH viewer(id) AS (SELECT ?) {head} FROM ({}) AS docs", self.inner());
        if !self.computed_matches.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.computed_matches.join(" AND "));
        }
        sql
    }

    fn ordered(&self) -> String {
        let mut sql = self.outer("SELECT *");
        if let Some(sort) = self.sort {
            let direction = sort.direction.as_sql();
            // id breaks ties so pages never overlap
            sql.push_str(&format!(
                " ORDER BY docs.{} {direction}, docs.id {direction}",
                sort.column
            ));
        }
        sql
    }

    fn params(&self) -> Vec<SqlParam> {
        let mut params = vec![SqlParam::from(self.viewer)];
        params.extend(self.match_params.iter().cloned());
        params
    }

    pub fn compile(&self) -> (String, Vec<SqlParam>) {
        (self.ordered(), self.params())
    }

    pub fn compile_page(&self, page: PageRequest) -> (String, Vec<SqlParam>) {
        let mut params = self.params();
        params.push(SqlParam::Int(page.limit as i64));
        params.push(SqlParam::Int(page.offset()));
        (format!("{} LIMIT ? OFFSET ?", self.ordered()), params)
    }

    pub fn compile_count(&self) -> (String, Vec<SqlParam>) {
        (self.outer("SELECT COUNT(*)"), self.params())
    }

    pub async fn fetch_optional<T>(&self, pool: &SqlitePool) -> Result<Option<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let (sql, params) = self.compile();
        let query = bind_params(sqlx::query_as::<Sqlite, T>(&sql), &params);
        query.fetch_optional(pool).await
    }

    pub async fn fetch_all<T>(&self, pool: &SqlitePool) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let (sql, params) = self.compile();
        let query = bind_params(sqlx::query_as::<Sqlite, T>(&sql), &params);
        query.fetch_all(pool).await
    }

    /// Counts the full result, then fetches the requested page of it. Both
    /// statements run in one read transaction so they see the same rows.
    pub async fn paginate<T>(
        &self,
        pool: &SqlitePool,
        page: PageRequest,
    ) -> Result<Paginated<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut tx = pool.begin().await?;
        let (count_sql, count_params) = self.compile_count();
        let (total,) = bind_params(sqlx::query_as::<Sqlite, (i64,)>(&count_sql), &count_params)
            .fetch_one(&mut tx)
            .await?;
        let (page_sql, page_params) = self.compile_page(page);
        let docs = bind_params(sqlx::query_as::<Sqlite, T>(&page_sql), &page_params)
            .fetch_all(&mut tx)
            .await?;
        tx.commit().await?;
        Ok(Paginated::new(docs, total, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: &[(&str, &str)] = &[("createdAt", "created_at"), ("views", "views")];

    #[test]
    fn compiles_stages_in_order() {
        let pipeline = Pipeline::new("videos v", Some(3))
            .project(&[("v.id", "id"), ("v.title", "title")])
            .lookup(
                "JOIN users u ON u.id = v.owner_id",
                &[("u.username", "owner_username")],
            )
            .add_field(
                &format!("EXISTS (SELECT 1 FROM likes l WHERE l.liked_by = {VIEWER})"),
                "is_liked",
            )
            .match_eq("v.is_published", 1_i64)
            .match_computed("is_liked")
            .sort(Sort::desc("created_at"));
        let (sql, params) = pipeline.compile_page(PageRequest { page: 2, limit: 5 });

        assert_eq!(
            sql,
            "WITH viewer(id) AS (SELECT ?) SELECT * FROM (SELECT v.id AS id, v.title AS title, \
             u.username AS owner_username, EXISTS (SELECT 1 FROM likes l WHERE l.liked_by = \
             (SELECT id FROM viewer)) AS is_liked FROM videos v JOIN users u ON u.id = v.owner_id \
             WHERE (v.is_published = ?)) AS docs WHERE (is_liked) \
             ORDER BY docs.created_at DESC, docs.id DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            params,
            vec![
                SqlParam::Int(3),
                SqlParam::Int(1),
                SqlParam::Int(5),
                SqlParam::Int(5)
            ]
        );
    }

    #[test]
    fn count_drops_sort_and_paging() {
        let pipeline = Pipeline::new("tweets t", None)
            .project(&[("t.id", "id")])
            .sort(Sort::asc("id"));
        let (sql, params) = pipeline.compile_count();
        assert_eq!(
            sql,
            "WITH viewer(id) AS (SELECT ?) SELECT COUNT(*) FROM (SELECT t.id AS id FROM tweets t) AS docs"
        );
        assert_eq!(params, vec![SqlParam::Null]);
    }

    #[test]
    fn search_binds_escaped_term_per_column() {
        let pipeline = Pipeline::new("videos v", None)
            .project(&[("v.id", "id")])
            .search(&["v.title", "v.description"], Some(" 50%_off "));
        let (sql, params) = pipeline.compile();
        assert!(sql.contains(
            "WHERE (v.title LIKE '%' || ? || '%' ESCAPE '\\' OR v.description LIKE '%' || ? || '%' ESCAPE '\\')"
        ));
        assert_eq!(
            params[1..],
            [
                SqlParam::from("50\\%\\_off"),
                SqlParam::from("50\\%\\_off")
            ]
        );
    }

    #[test]
    fn blank_search_adds_nothing() {
        let (sql, params) = Pipeline::new("videos v", None)
            .project(&[("v.id", "id")])
            .search(&["v.title"], Some("   "))
            .compile();
        assert!(!sql.contains("LIKE"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn sort_defaults_to_descending() {
        let sort = Sort::from_query(None, None, ALLOWED, "createdAt").unwrap();
        assert_eq!(sort, Sort::desc("created_at"));
        let sort = Sort::from_query(Some("views"), Some("ASC"), ALLOWED, "createdAt").unwrap();
        assert_eq!(sort, Sort::asc("views"));
    }

    #[test]
    fn sort_rejects_unknown_keys() {
        assert!(matches!(
            Sort::from_query(Some("password"), None, ALLOWED, "createdAt"),
            Err(RequestError::BadRequest(_))
        ));
        assert!(matches!(
            Sort::from_query(Some("views"), Some("sideways"), ALLOWED, "createdAt"),
            Err(RequestError::BadRequest(_))
        ));
    }

    #[test]
    fn page_request_bounds() {
        assert_eq!(PageRequest::new(None, None).unwrap(), PageRequest::default());
        assert!(PageRequest::new(Some(0), None).is_err());
        assert!(PageRequest::new(None, Some(0)).is_err());
        assert!(PageRequest::new(None, Some(MAX_LIMIT + 1)).is_err());
        assert_eq!(PageRequest::new(Some(3), Some(20)).unwrap().offset(), 40);
    }

    #[test]
    fn pagination_math() {
        let page = Paginated::new(vec![1, 2, 3], 23, PageRequest { page: 2, limit: 10 });
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.paging_counter, 11);
        assert!(page.has_prev_page && page.has_next_page);
        assert_eq!((page.prev_page, page.next_page), (Some(1), Some(3)));

        let empty = Paginated::<i32>::new(vec![], 0, PageRequest::default());
        assert_eq!(empty.total_pages, 1);
        assert!(!empty.has_next_page && !empty.has_prev_page);
        assert_eq!(empty.next_page, None);
    }

    #[test]
    fn paginated_serializes_camel_case() {
        let page = Paginated::new(vec!["a"], 1, PageRequest::default()).map(str::to_uppercase);
        let value = serde_json::to_value(page).unwrap();
        assert_eq!(value["docs"][0], "A");
        assert_eq!(value["totalDocs"], 1);
        assert_eq!(value["hasNextPage"], false);
        assert_eq!(value["prevPage"], serde_json::Value::Null);
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("a%b_c\\d"), "a\\%b\\_c\\\\d");
        assert_eq!(escape_like("plain"), "plain");
    }
}
