use crate::errors::ApiError;
use sea_orm::sea_query::SelectStatement;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const OFFSET_PARAM: &str = "offset";
pub const LIMIT_PARAM: &str = "limit";

/// Row cap used when only an offset is requested; some backends reject OFFSET without LIMIT.
const UNLIMITED: u64 = i64::MAX.unsigned_abs();

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub offset: u64,
    /// Zero means no limit.
    pub limit: u64,
    /// Matching rows before pagination.
    pub total: u64,
}

/// Reads `offset` and `limit` from query pairs (last occurrence wins), both defaulting to 0.
///
/// # Errors
/// A value that is not a non-negative integer is a validation error.
pub fn parse_pagination(query: &[(String, String)]) -> Result<(u64, u64), ApiError> {
    let read = |param: &str| -> Result<u64, ApiError> {
        query
            .iter()
            .rev()
            .find(|(key, _)| key == param)
            .map_or(Ok(0), |(_, raw)| {
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| ApiError::invalid_field(param, "value is not a valid integer"))
            })
    };
    Ok((read(OFFSET_PARAM)?, read(LIMIT_PARAM)?))
}

pub fn paginate(statement: &mut SelectStatement, offset: u64, limit: u64) {
    if limit > 0 {
        statement.limit(limit);
    } else if offset > 0 {
        statement.limit(UNLIMITED);
    }
    if offset > 0 {
        statement.offset(offset);
    }
}

/// The list envelope: `{data, pagination: {offset, limit, total}}`.
pub fn prepare_response(data: Vec<Value>, pagination: Pagination) -> Value {
    json!({
        "data": data,
        "pagination": pagination,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::sea_query::{Alias, Asterisk, Query, SqliteQueryBuilder};

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_and_parsing() {
        assert_eq!(parse_pagination(&[]).unwrap(), (0, 0));
        assert_eq!(
            parse_pagination(&pairs(&[("offset", "5"), ("limit", "2"), ("limit", "3")])).unwrap(),
            (5, 3)
        );
    }

    #[test]
    fn test_bad_numbers_are_rejected() {
        let err = parse_pagination(&pairs(&[("limit", "-1")])).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_zero_limit_is_unlimited() {
        let mut statement = Query::select().column(Asterisk).from(Alias::new("users")).to_owned();
        paginate(&mut statement, 0, 0);
        let sql = statement.to_string(SqliteQueryBuilder);
        assert!(!sql.contains("LIMIT"));
        assert!(!sql.contains("OFFSET"));

        paginate(&mut statement, 2, 0);
        let sql = statement.to_string(SqliteQueryBuilder);
        assert!(sql.contains("OFFSET 2"));
    }

    #[test]
    fn test_limit_and_offset() {
        let mut statement = Query::select().column(Asterisk).from(Alias::new("users")).to_owned();
        paginate(&mut statement, 1, 2);
        assert!(statement.to_string(SqliteQueryBuilder).ends_with("LIMIT 2 OFFSET 1"));
    }

    #[test]
    fn test_envelope_shape() {
        let body = prepare_response(
            vec![json!({"id": 1})],
            Pagination {
                offset: 0,
                limit: 0,
                total: 1,
            },
        );
        assert_eq!(
            body,
            json!({"data": [{"id": 1}], "pagination": {"offset": 0, "limit": 0, "total": 1}})
        );
    }
}
