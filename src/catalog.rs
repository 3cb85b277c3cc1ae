use crate::db::DatabaseManager;
use crate::error::{ApiError, Result};
use crate::icons::icon_url;
use async_trait::async_trait;
use libsql::Value;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

/// One row of the monster catalog as stored upstream. The `obtainable`
/// column never leaves the store layer; eligibility is applied at query
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterRecord {
    pub id: i64,
    pub name: String,
    pub element: String,
    pub archetype: String,
    pub natural_stars: i64,
    pub base_stars: i64,
}

/// Listing entry handed back to clients: the stored record plus the
/// derived icon location.
#[derive(Debug, Clone, Serialize)]
pub struct MonsterEntry {
    #[serde(flatten)]
    pub record: MonsterRecord,
    pub icon_url: String,
}

impl MonsterEntry {
    pub fn new(record: MonsterRecord, public_base_url: &str) -> Self {
        let icon_url = icon_url(public_base_url, record.id);
        Self { record, icon_url }
    }
}

/// Response envelope for the listing endpoint. `count` is the size of
/// the returned page, not the total match count; no second query is run.
#[derive(Debug, Serialize)]
pub struct MonsterListResponse {
    pub count: usize,
    pub results: Vec<MonsterEntry>,
}

/// One user-supplied constraint on the listing. Each clause lowers
/// independently to a parameterized predicate fragment; user input never
/// reaches the SQL text itself.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterClause {
    /// natural_stars set membership
    Stars(Vec<i64>),
    /// element set membership
    Elements(Vec<String>),
    /// case-insensitive substring on name; `%` and `_` in the needle
    /// pass through to LIKE unescaped
    Text(String),
}

impl FilterClause {
    /// Lower to a predicate fragment plus its bound values.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        match self {
            FilterClause::Stars(stars) => (
                format!("natural_stars IN ({})", placeholders(stars.len())),
                stars.iter().map(|s| Value::Integer(*s)).collect(),
            ),
            FilterClause::Elements(elements) => (
                format!("element IN ({})", placeholders(elements.len())),
                elements.iter().map(|e| Value::Text(e.clone())).collect(),
            ),
            FilterClause::Text(needle) => (
                "LOWER(name) LIKE ?".to_string(),
                vec![Value::Text(format!("%{}%", needle.to_lowercase()))],
            ),
        }
    }

    /// The same constraint, interpreted against an in-memory record.
    pub fn matches(&self, record: &MonsterRecord) -> bool {
        match self {
            FilterClause::Stars(stars) => stars.contains(&record.natural_stars),
            FilterClause::Elements(elements) => elements.iter().any(|e| e == &record.element),
            FilterClause::Text(needle) => record
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// A fully validated listing query: zero or more filter clauses plus
/// pagination. The two eligibility conditions are not represented here;
/// every store applies them unconditionally.
#[derive(Debug, Clone)]
pub struct MonsterQuery {
    pub clauses: Vec<FilterClause>,
    pub limit: i64,
    pub offset: i64,
}

impl MonsterQuery {
    /// Assemble a query from raw filter inputs. Filter parsing is
    /// lenient: unusable tokens are dropped, and a filter whose token
    /// set comes out empty is omitted rather than matching nothing.
    /// `limit` and `offset` must already be validated.
    pub fn new(
        stars: Option<&str>,
        elements: Option<&str>,
        q: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Self {
        let mut clauses = Vec::new();

        if let Some(raw) = stars {
            let stars = parse_star_list(raw);
            if !stars.is_empty() {
                clauses.push(FilterClause::Stars(stars));
            }
        }

        if let Some(raw) = elements {
            let elements = parse_element_list(raw);
            if !elements.is_empty() {
                clauses.push(FilterClause::Elements(elements));
            }
        }

        if let Some(needle) = q {
            if !needle.is_empty() {
                clauses.push(FilterClause::Text(needle.to_string()));
            }
        }

        Self {
            clauses,
            limit,
            offset,
        }
    }

    /// Lower the whole query to one SELECT statement plus its bound
    /// values. The eligibility conditions and the ordering contract
    /// (natural_stars descending, then name ascending) are fixed here;
    /// pagination depends on that ordering being stable.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::from(
            "SELECT id, name, element, archetype, natural_stars, base_stars \
             FROM monsters \
             WHERE base_stars != natural_stars AND obtainable = 1",
        );
        let mut params: Vec<Value> = Vec::new();

        for clause in &self.clauses {
            let (fragment, mut values) = clause.to_sql();
            sql.push_str(" AND ");
            sql.push_str(&fragment);
            params.append(&mut values);
        }

        sql.push_str(" ORDER BY natural_stars DESC, name ASC LIMIT ? OFFSET ?");
        params.push(Value::Integer(self.limit));
        params.push(Value::Integer(self.offset));

        (sql, params)
    }
}

/// Comma-separated star tiers; non-numeric and empty tokens are
/// silently discarded.
pub fn parse_star_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|token| token.trim().parse::<i64>().ok())
        .collect()
}

/// Comma-separated element names, trimmed; empty tokens are discarded.
pub fn parse_element_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|token| token.trim())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}

/// Page size. Absent means the default; out-of-range values are a
/// request fault, never silently clamped.
pub fn parse_limit(raw: Option<&str>) -> Result<i64> {
    let limit = match raw {
        None => return Ok(DEFAULT_LIMIT),
        Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
            ApiError::Validation(format!("limit must be an integer, got '{raw}'"))
        })?,
    };

    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}, got {limit}"
        )));
    }

    Ok(limit)
}

pub fn parse_offset(raw: Option<&str>) -> Result<i64> {
    let offset = match raw {
        None => return Ok(0),
        Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
            ApiError::Validation(format!("offset must be an integer, got '{raw}'"))
        })?,
    };

    if offset < 0 {
        return Err(ApiError::Validation(format!(
            "offset must not be negative, got {offset}"
        )));
    }

    Ok(offset)
}

/// Read access to the monster catalog. The production implementation
/// runs the lowered SQL against libsql; the in-memory one backs tests
/// and local development without a database.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_monsters(&self, query: &MonsterQuery) -> Result<Vec<MonsterRecord>>;
}

pub struct LibsqlCatalog {
    db: DatabaseManager,
}

impl LibsqlCatalog {
    pub fn new(db: DatabaseManager) -> Self {
        Self { db }
    }
}

fn row_to_record(row: &libsql::Row) -> Result<MonsterRecord> {
    let column = |idx: i32, name: &str| -> ApiError {
        ApiError::Database {
            message: format!("Failed to read column {name} at index {idx}"),
        }
    };

    Ok(MonsterRecord {
        id: row.get(0).map_err(|_| column(0, "id"))?,
        name: row.get(1).map_err(|_| column(1, "name"))?,
        element: row.get(2).map_err(|_| column(2, "element"))?,
        archetype: row.get(3).map_err(|_| column(3, "archetype"))?,
        natural_stars: row.get(4).map_err(|_| column(4, "natural_stars"))?,
        base_stars: row.get(5).map_err(|_| column(5, "base_stars"))?,
    })
}

#[async_trait]
impl CatalogStore for LibsqlCatalog {
    async fn list_monsters(&self, query: &MonsterQuery) -> Result<Vec<MonsterRecord>> {
        let conn = self.db.get_connection().await?;

        let (sql, params) = query.to_sql();
        debug!("Executing catalog query: {}", sql);

        let mut rows = conn
            .query(&sql, params)
            .await
            .map_err(|e| ApiError::Database {
                message: format!("Failed to query monsters: {e}"),
            })?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| ApiError::Database {
            message: format!("Failed to read row: {e}"),
        })? {
            records.push(row_to_record(&row)?);
        }

        Ok(records)
    }
}

/// In-memory catalog implementation for development/testing.
pub struct InMemoryCatalog {
    monsters: Arc<Mutex<Vec<(MonsterRecord, bool)>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            monsters: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn insert(&self, record: MonsterRecord, obtainable: bool) {
        let mut monsters = self.monsters.lock().unwrap();
        monsters.push((record, obtainable));
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn list_monsters(&self, query: &MonsterQuery) -> Result<Vec<MonsterRecord>> {
        let monsters = self.monsters.lock().unwrap();

        let mut matched: Vec<MonsterRecord> = monsters
            .iter()
            .filter(|(record, obtainable)| *obtainable && record.base_stars != record.natural_stars)
            .filter(|(record, _)| query.clauses.iter().all(|clause| clause.matches(record)))
            .map(|(record, _)| record.clone())
            .collect();

        // Same ordering contract the SQL path applies.
        matched.sort_by(|a, b| {
            b.natural_stars
                .cmp(&a.natural_stars)
                .then_with(|| a.name.cmp(&b.name))
        });

        Ok(matched
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_list_parsing_is_lenient() {
        assert_eq!(parse_star_list("4,5"), vec![4, 5]);
        assert_eq!(parse_star_list(" 4 , 5 "), vec![4, 5]);
        assert_eq!(parse_star_list("abc,5,,x"), vec![5]);
        assert!(parse_star_list("abc").is_empty());
        assert!(parse_star_list("").is_empty());
    }

    #[test]
    fn element_list_parsing_trims_and_drops_empty_tokens() {
        assert_eq!(
            parse_element_list("Fire, Water ,,Wind"),
            vec!["Fire", "Water", "Wind"]
        );
        assert!(parse_element_list(" , ").is_empty());
    }

    #[test]
    fn unusable_filters_are_omitted_not_match_nothing() {
        let query = MonsterQuery::new(Some("abc"), Some(" , "), Some(""), 100, 0);
        assert!(query.clauses.is_empty());
    }

    #[test]
    fn limit_bounds_are_enforced() {
        assert_eq!(parse_limit(None).unwrap(), DEFAULT_LIMIT);
        assert_eq!(parse_limit(Some("1")).unwrap(), 1);
        assert_eq!(parse_limit(Some("1000")).unwrap(), 1000);
        assert!(matches!(
            parse_limit(Some("0")),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            parse_limit(Some("1001")),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            parse_limit(Some("ten")),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn offset_must_not_be_negative() {
        assert_eq!(parse_offset(None).unwrap(), 0);
        assert_eq!(parse_offset(Some("25")).unwrap(), 25);
        assert!(matches!(
            parse_offset(Some("-1")),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            parse_offset(Some("x")),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn star_clause_lowers_to_membership_with_one_placeholder_per_value() {
        let (fragment, values) = FilterClause::Stars(vec![4, 5]).to_sql();
        assert_eq!(fragment, "natural_stars IN (?, ?)");
        assert_eq!(values, vec![Value::Integer(4), Value::Integer(5)]);
    }

    #[test]
    fn text_clause_lowers_to_lowercased_like_pattern() {
        let (fragment, values) = FilterClause::Text("Fire".to_string()).to_sql();
        assert_eq!(fragment, "LOWER(name) LIKE ?");
        assert_eq!(values, vec![Value::Text("%fire%".to_string())]);
    }

    #[test]
    fn user_text_never_lands_in_the_sql_string() {
        let needle = "'; DROP TABLE monsters; --";
        let query = MonsterQuery::new(None, None, Some(needle), 100, 0);
        let (sql, params) = query.to_sql();
        assert!(!sql.contains("DROP TABLE"));
        assert_eq!(params.len(), 3); // needle + limit + offset
    }

    #[test]
    fn full_query_always_carries_eligibility_ordering_and_pagination() {
        let query = MonsterQuery::new(Some("4,5"), Some("Fire,Water"), Some("fi"), 50, 10);
        let (sql, params) = query.to_sql();
        assert!(sql.contains("base_stars != natural_stars"));
        assert!(sql.contains("obtainable = 1"));
        assert!(sql.contains("natural_stars IN (?, ?)"));
        assert!(sql.contains("element IN (?, ?)"));
        assert!(sql.ends_with("ORDER BY natural_stars DESC, name ASC LIMIT ? OFFSET ?"));
        // 2 stars + 2 elements + 1 needle + limit + offset
        assert_eq!(params.len(), 7);
        assert_eq!(params[5], Value::Integer(50));
        assert_eq!(params[6], Value::Integer(10));
    }

    #[test]
    fn text_match_is_case_insensitive_in_memory() {
        let record = MonsterRecord {
            id: 1,
            name: "Fire Elemental".to_string(),
            element: "Fire".to_string(),
            archetype: "Attack".to_string(),
            natural_stars: 3,
            base_stars: 2,
        };
        assert!(FilterClause::Text("fire".to_string()).matches(&record));
        assert!(FilterClause::Text("ELEMENTAL".to_string()).matches(&record));
        assert!(!FilterClause::Text("water".to_string()).matches(&record));
    }
}
